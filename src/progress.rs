//! Progress bar construction shared by the downloaders and the scorer

use indicatif::{ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const ITEMS_TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {pos} entries";

/// Byte-counting bar; falls back to a spinner when the length is unknown
pub(crate) fn bytes_bar(total: Option<u64>, message: &str) -> ProgressBar {
    match total {
        Some(total) => styled(ProgressBar::new(total), BYTES_TEMPLATE, message),
        None => styled(ProgressBar::new_spinner(), "{spinner} {msg} {bytes}", message),
    }
}

/// Item-counting bar, hidden when `visible` is false
pub(crate) fn items_bar(len: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    styled(ProgressBar::new(len), ITEMS_TEMPLATE, message)
}

/// Open-ended counter for streams of unknown length
pub(crate) fn counter(message: &str) -> ProgressBar {
    styled(ProgressBar::new_spinner(), SPINNER_TEMPLATE, message)
}

fn styled(bar: ProgressBar, template: &str, message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar
}

//! Tarball downloader for the EarthNet2021 splits
//!
//! Each split is published as one gzipped tarball. [`download_archives`] fetches
//! the requested splits into a data directory, extracts them in place and
//! optionally removes the tarball afterwards. A tarball that is already on disk
//! is never fetched again unless `overwrite` is set.
//!
//! The network side sits behind [`ArchiveFetcher`] so tests can count requests
//! without touching the network.

use crate::config::{Split, SplitSelection, ToolkitConfig};
use crate::errors::Result;
use crate::progress;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Retrieves a remote archive into a local file
pub trait ArchiveFetcher {
    /// Stream `url` into `destination`, returning the number of bytes written
    fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Blocking HTTP fetcher with a byte progress bar
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }
}

impl ArchiveFetcher for HttpFetcher {
    #[instrument(skip(self, destination))]
    fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self.client.get(url).send()?.error_for_status()?;

        let label = url.rsplit('/').next().unwrap_or(url);
        let bar = progress::bytes_bar(response.content_length(), label);

        let mut file = File::create(destination)?;
        let written = io::copy(&mut bar.wrap_read(response), &mut file)?;
        bar.finish();

        Ok(written)
    }
}

/// Flags controlling an archive download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Remove an existing tarball and fetch it again
    pub overwrite: bool,
    /// Remove the tarball once it has been extracted
    pub delete: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            delete: true,
        }
    }
}

/// What happened to a single split
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Fetched and extracted; `tarball` is `None` when it was deleted afterwards
    Extracted { entries: usize, tarball: Option<PathBuf> },
    /// The tarball was already present and left untouched
    AlreadyPresent { tarball: PathBuf },
}

/// Download and extract the selected splits into `data_dir`
///
/// # Errors
///
/// Fails on the first network, I/O or extraction error; nothing is retried.
/// A failed fetch or extraction leaves no tarball behind, so the next run
/// fetches the split again.
pub fn download_archives<F: ArchiveFetcher>(
    fetcher: &F,
    config: &ToolkitConfig,
    data_dir: &Path,
    selection: &SplitSelection,
    options: ArchiveOptions,
) -> Result<Vec<(Split, ArchiveStatus)>> {
    fs::create_dir_all(data_dir)?;

    let mut outcomes = Vec::new();
    for split in selection.splits() {
        let source = config.archive(split)?;
        let tarball = data_dir.join(&source.filename);

        if options.overwrite && tarball.is_file() {
            info!("Removing existing tarball {}", tarball.display());
            fs::remove_file(&tarball)?;
        }

        if tarball.is_file() {
            warn!(
                "File {} already exists. Erase it or pass overwrite to download it again",
                tarball.display()
            );
            outcomes.push((split, ArchiveStatus::AlreadyPresent { tarball }));
            continue;
        }

        info!(
            "Downloading split {split} as temporary file {} to {}",
            source.filename,
            data_dir.display()
        );
        // the final name only appears once the fetch has completed
        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(data_dir)?;
        let bytes = fetcher.fetch(&source.url, partial.path())?;
        partial.persist(&tarball).map_err(|e| e.error)?;
        info!("Downloaded {bytes} bytes");

        info!("Extracting tarball {}", tarball.display());
        let entries = match extract_tarball(&tarball, data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Extraction failed, removing {}", tarball.display());
                fs::remove_file(&tarball)?;
                return Err(e);
            }
        };
        info!("Extracted {entries} entries");

        let kept = if options.delete {
            info!("Deleting tarball {}", tarball.display());
            fs::remove_file(&tarball)?;
            None
        } else {
            Some(tarball)
        };
        outcomes.push((
            split,
            ArchiveStatus::Extracted {
                entries,
                tarball: kept,
            },
        ));
    }

    Ok(outcomes)
}

/// Download with the default HTTP fetcher
pub fn get(
    config: &ToolkitConfig,
    data_dir: &Path,
    selection: &SplitSelection,
    options: ArchiveOptions,
) -> Result<Vec<(Split, ArchiveStatus)>> {
    let fetcher = HttpFetcher::new()?;
    download_archives(&fetcher, config, data_dir, selection, options)
}

/// Unpack every member of a `.tar.gz` into `target`, returning the member count
pub fn extract_tarball(tarball: &Path, target: &Path) -> Result<usize> {
    let decoder = GzDecoder::new(BufReader::new(File::open(tarball)?));
    let mut archive = tar::Archive::new(decoder);

    let bar = progress::counter("Extracting");
    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        entry.unpack_in(target)?;
        count += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(count)
}

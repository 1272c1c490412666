//! Forecast skill scoring
//!
//! # Organization
//!
//! - [`nse`]: per-pixel normalized Nash-Sutcliffe efficiency for one sample
//! - [`dataset`]: pairing targets with predictions and aggregating by land cover

pub mod dataset;
pub mod nse;

pub use dataset::{
    class_mean, score_over_dataset, DatasetScores, LandCover, ScoreOptions, ScoreRecord,
};
pub use nse::{normalized_nse, pixel_nnse, PixelScore, DEFAULT_PRED_VAR};

//! Scoring a whole prediction directory against a test set

use super::nse::{normalized_nse, PixelScore, DEFAULT_PRED_VAR};
use crate::errors::Result;
use crate::minicube::Minicube;
use crate::progress;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// ESA WorldCover classes the scores are stratified by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandCover {
    Tree = 10,
    Shrub = 20,
    Grass = 30,
    Crop = 40,
    Swamp = 90,
    Mangroves = 95,
    Moss = 100,
}

impl LandCover {
    #[must_use]
    pub fn code(self) -> f64 {
        self as i32 as f64
    }
}

/// Codes up to and including this one form the low-vegetation aggregate
const LOW_VEGETATION_MAX: f64 = 30.0;

/// One row of the per-pixel score table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// File stem of the sample
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub nnse: f64,
    pub landcover: f64,
}

impl ScoreRecord {
    fn from_pixel(id: &str, pixel: PixelScore) -> Self {
        Self {
            id: id.to_string(),
            lat: pixel.lat,
            lon: pixel.lon,
            nnse: pixel.nnse,
            landcover: pixel.landcover,
        }
    }
}

/// Summary scores plus the full per-pixel table
///
/// Means exclude NaN scores; a class without any valid score is NaN.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetScores {
    /// Mean of the tree, shrub and grass scores that are defined
    pub veg_macro_score: f64,
    /// Mean over all pixels with land cover up to 30
    pub veg_micro_score: f64,
    pub tree_score: f64,
    pub shrub_score: f64,
    pub grass_score: f64,
    pub crop_score: f64,
    pub swamp_score: f64,
    pub mangroves_score: f64,
    pub moss_score: f64,
    #[serde(skip)]
    pub all_scores: Vec<ScoreRecord>,
}

impl DatasetScores {
    /// Aggregate a per-pixel table
    #[must_use]
    pub fn from_records(records: Vec<ScoreRecord>) -> Self {
        let tree_score = class_mean(&records, LandCover::Tree);
        let shrub_score = class_mean(&records, LandCover::Shrub);
        let grass_score = class_mean(&records, LandCover::Grass);

        Self {
            veg_macro_score: nan_mean([tree_score, shrub_score, grass_score].into_iter()),
            veg_micro_score: nan_mean(
                records
                    .iter()
                    .filter(|r| r.landcover <= LOW_VEGETATION_MAX)
                    .map(|r| r.nnse),
            ),
            tree_score,
            shrub_score,
            grass_score,
            crop_score: class_mean(&records, LandCover::Crop),
            swamp_score: class_mean(&records, LandCover::Swamp),
            mangroves_score: class_mean(&records, LandCover::Mangroves),
            moss_score: class_mean(&records, LandCover::Moss),
            all_scores: records,
        }
    }

    /// Summary scores as pretty JSON (undefined scores become `null`)
    pub fn summary_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the per-pixel table as a JSON array
    pub fn write_records(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = io::BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(file, &self.all_scores)?;
        Ok(())
    }
}

/// Mean score of the pixels whose land cover equals `class` exactly
#[must_use]
pub fn class_mean(records: &[ScoreRecord], class: LandCover) -> f64 {
    let code = class.code();
    nan_mean(
        records
            .iter()
            .filter(|r| r.landcover == code)
            .map(|r| r.nnse),
    )
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Options for [`score_over_dataset`]
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    /// Name of the NDVI prediction variable
    pub pred_var: String,
    /// Log progress
    pub verbose: bool,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            pred_var: DEFAULT_PRED_VAR.to_string(),
            verbose: true,
        }
    }
}

/// Every `.nc` file below `dir`, sorted
pub fn find_target_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("nc")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Prediction file mirroring a target: `{pred_dir}/{region}/{file name}`
#[must_use]
pub fn prediction_path(target_file: &Path, pred_dir: &Path) -> PathBuf {
    let region = target_file
        .parent()
        .and_then(Path::file_name)
        .unwrap_or_default();
    let name = target_file.file_name().unwrap_or_default();
    pred_dir.join(region).join(name)
}

/// Score every target minicube below `target_dir` against its prediction
///
/// # Errors
///
/// The whole run fails on the first sample whose target or prediction cannot
/// be opened or scored.
pub fn score_over_dataset(
    target_dir: &Path,
    pred_dir: &Path,
    options: &ScoreOptions,
) -> Result<DatasetScores> {
    let target_files = find_target_files(target_dir)?;
    if options.verbose {
        info!(
            "Scoring {} against {} ({} samples)",
            target_dir.display(),
            pred_dir.display(),
            target_files.len()
        );
    }

    let bar = progress::items_bar(target_files.len() as u64, "Scoring", options.verbose);
    let mut records = Vec::new();
    for target_file in &target_files {
        let pred_file = prediction_path(target_file, pred_dir);
        if !pred_file.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("prediction {} not found", pred_file.display()),
            )
            .into());
        }

        let target = Minicube::from_netcdf(target_file)?;
        let prediction = Minicube::from_netcdf(&pred_file)?;

        let id = target_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pixels = normalized_nse(&target, &prediction, &options.pred_var)?;
        debug!("Scored {} pixels of {id}", pixels.len());
        records.extend(
            pixels
                .into_iter()
                .map(|pixel| ScoreRecord::from_pixel(&id, pixel)),
        );
        bar.inc(1);
    }
    bar.finish_and_clear();

    let scores = DatasetScores::from_records(records);
    if options.verbose {
        info!("Done! veg_macro_score = {:.4}", scores.veg_macro_score);
    }
    Ok(scores)
}

//! Defines command-line interface options using `clap` for the earthnet tool.

use clap::{Args, Parser, Subcommand};
use earthnet::config::{SplitSelection, DEFAULT_DATASET};
use earthnet::remote::ALL_SPLITS;
use earthnet::render::{PlotVariable, DEFAULT_NCOLS};
use earthnet::score::DEFAULT_PRED_VAR;
use std::path::PathBuf;

/// Toolkit for the EarthNet Earth surface forecasting benchmark
#[derive(Parser, Debug)]
#[command(name = "earthnet", version, about)]
pub struct Cli {
    /// JSON file overriding archive URLs, object-store settings and dataset splits
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// HTTP proxy for object-store access
    #[arg(long, global = true, env = "EARTHNET_PROXY")]
    pub proxy: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download and extract packaged split archives
    Download(DownloadArgs),
    /// Mirror minicubes of a dataset split from the object store
    Fetch(FetchArgs),
    /// Open one remote minicube and print its variables
    Load(LoadArgs),
    /// Convert a minicube NetCDF file into a legacy `.npz` bundle
    Convert(ConvertArgs),
    /// Render a gallery of every time step of a cube
    Plot(PlotArgs),
    /// Score a prediction directory against the targets
    Score(ScoreArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Directory the archives are extracted into
    pub data_dir: PathBuf,

    /// `all` or a comma separated list of splits
    #[arg(short, long, default_value = "all", value_parser = parse_selection)]
    pub splits: SplitSelection,

    /// Fetch again even if a tarball is already present
    #[arg(long)]
    pub overwrite: bool,

    /// Keep the tarball after extraction
    #[arg(long)]
    pub keep: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Directory the object keys are mirrored into
    #[arg(short, long)]
    pub save_directory: PathBuf,

    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    #[arg(long, default_value = ALL_SPLITS)]
    pub split: String,

    /// Maximum number of minicubes per split
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Minicube id (file stem)
    #[arg(long)]
    pub id: String,

    #[arg(long, default_value = DEFAULT_DATASET)]
    pub dataset: String,

    #[arg(long, default_value = "train")]
    pub split: String,

    /// Region directory; searched for when omitted
    #[arg(long)]
    pub region: Option<String>,

    /// Convert the loaded minicube and save it as a legacy `.npz` bundle
    #[arg(long)]
    pub legacy_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Minicube NetCDF file
    pub input: PathBuf,

    /// Output `.npz` path
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// `.npz` bundle or `.npy` array
    pub cube: PathBuf,

    /// One of rgb, ndvi, rr, pp, tg, tn, tx
    #[arg(long, default_value = "rgb", value_parser = parse_variable)]
    pub variable: PlotVariable,

    /// Land-cover `.npy` or `.npz` used to mark non-vegetation pixels red
    #[arg(long)]
    pub vegetation_mask: Option<PathBuf>,

    /// Ignore the cloud mask channel
    #[arg(long)]
    pub no_cloud_mask: bool,

    /// Frames per gallery row
    #[arg(long, default_value_t = DEFAULT_NCOLS)]
    pub ncols: usize,

    /// Output PNG path
    #[arg(short, long)]
    pub save_path: PathBuf,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Directory containing the target minicubes
    pub target_dir: PathBuf,

    /// Directory containing the predictions, mirroring the target layout
    pub pred_dir: PathBuf,

    /// Prediction variable
    #[arg(long, default_value = DEFAULT_PRED_VAR)]
    pub pred_var: String,

    /// Write the per-pixel scores as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hide progress output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_selection(s: &str) -> Result<SplitSelection, String> {
    s.parse().map_err(|e: earthnet::EarthNetError| e.to_string())
}

fn parse_variable(s: &str) -> Result<PlotVariable, String> {
    s.parse().map_err(|e: earthnet::EarthNetError| e.to_string())
}

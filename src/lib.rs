//! EarthNet: data access, conversion, plotting and scoring for the EarthNet
//! Earth surface forecasting benchmark
//!
//! The toolkit covers the full life cycle of a benchmark sample, from fetching
//! it to scoring a model's forecast of it.
//!
//! ## Module Organization
//!
//! - [`archive`]: download and extract the packaged split archives
//! - [`remote`]: mirror or open minicubes from the public object store
//! - [`minicube`]: labeled multi-variable arrays read from NetCDF
//! - [`adapter`]: conversion of a minicube into the legacy four-array bundle
//! - [`legacy`]: the legacy bundle and its `.npz` layout
//! - [`render`]: cube galleries with colormaps, masks and PNG output
//! - [`score`]: per-pixel normalized NSE and land-cover aggregation
//! - [`config`]: archive locations, object-store settings and dataset splits
//! - [`errors`]: centralized error handling
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use earthnet::prelude::*;
//! use std::path::Path;
//!
//! let cube = Minicube::from_netcdf(Path::new("29SND_2017-06-10_2017-11-06_2105_2233_2873_3001_32_112_44_124.nc")).unwrap();
//! let bundle = to_legacy(&cube).unwrap();
//!
//! let options = GalleryOptions {
//!     variable: PlotVariable::Ndvi,
//!     ncols: 5,
//!     ..GalleryOptions::default()
//! };
//! let figure = cube_gallery(CubeInput::Bundle(bundle), &options).unwrap();
//! figure.save_png(Path::new("ndvi.png")).unwrap();
//!
//! let scores = score_over_dataset(
//!     Path::new("data/iid_test"),
//!     Path::new("predictions/iid_test"),
//!     &ScoreOptions::default(),
//! )
//! .unwrap();
//! println!("{}", scores.summary_json().unwrap());
//! ```

pub mod adapter;
pub mod archive;
pub mod config;
pub mod errors;
pub mod legacy;
pub mod minicube;
pub mod remote;
pub mod render;
pub mod score;

mod progress;

pub use errors::{EarthNetError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::adapter::to_legacy;
    pub use crate::archive::{download_archives, ArchiveFetcher, ArchiveOptions, ArchiveStatus};
    pub use crate::config::{Split, SplitSelection, ToolkitConfig};
    pub use crate::errors::{EarthNetError, Result};
    pub use crate::legacy::LegacyCube;
    pub use crate::minicube::{DataVariable, Minicube};
    pub use crate::remote::RemoteStore;
    pub use crate::render::{cube_gallery, CubeInput, Figure, GalleryOptions, PlotVariable};
    pub use crate::score::{normalized_nse, score_over_dataset, DatasetScores, ScoreOptions};
}

//! Legacy EarthNet2021 bundle schema
//!
//! Older tooling stores a sample as four flat arrays in a compressed `.npz`:
//!
//! | key              | layout                     |
//! |------------------|----------------------------|
//! | `highresdynamic` | (lat, lon, band, time)     |
//! | `highresstatic`  | (lat, lon, 1)              |
//! | `mesodynamic`    | (80, 80, variable, time)   |
//! | `mesostatic`     | (80, 80, 1)                |

use crate::errors::{EarthNetError, Result};
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError};
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Spatial size of high resolution (satellite) arrays
pub const HIGHRES_SIZE: usize = 128;
/// Spatial size of meso-scale (weather) arrays
pub const MESO_SIZE: usize = 80;

pub const HIGHRES_DYNAMIC: &str = "highresdynamic";
pub const HIGHRES_STATIC: &str = "highresstatic";
pub const MESO_DYNAMIC: &str = "mesodynamic";
pub const MESO_STATIC: &str = "mesostatic";

/// A sample in the legacy flattened schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyCube {
    pub highresdynamic: Option<ArrayD<f32>>,
    pub highresstatic: Option<ArrayD<f32>>,
    pub mesodynamic: Option<ArrayD<f32>>,
    pub mesostatic: Option<ArrayD<f32>>,
}

impl LegacyCube {
    /// Satellite imagery, falling back to any array with a 128-pixel axis
    pub fn satellite(&self) -> Result<&ArrayD<f32>> {
        if let Some(data) = &self.highresdynamic {
            return Ok(data);
        }
        [&self.highresstatic, &self.mesodynamic, &self.mesostatic]
            .into_iter()
            .flatten()
            .find(|array| array.shape().contains(&HIGHRES_SIZE))
            .ok_or_else(|| {
                EarthNetError::MissingData("data does not contain satellite imagery.".to_string())
            })
    }

    /// E-OBS weather variables
    pub fn meso(&self) -> Result<&ArrayD<f32>> {
        self.mesodynamic
            .as_ref()
            .ok_or_else(|| EarthNetError::MissingData("data does not contain E-OBS.".to_string()))
    }

    fn entries(&self) -> [(&'static str, Option<&ArrayD<f32>>); 4] {
        [
            (HIGHRES_DYNAMIC, self.highresdynamic.as_ref()),
            (HIGHRES_STATIC, self.highresstatic.as_ref()),
            (MESO_DYNAMIC, self.mesodynamic.as_ref()),
            (MESO_STATIC, self.mesostatic.as_ref()),
        ]
    }

    /// Load a bundle from a `.npz` archive
    pub fn load_npz(path: &Path) -> Result<Self> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        let names = npz.names()?;
        debug!("Bundle {} holds {:?}", path.display(), names);

        Ok(Self {
            highresdynamic: read_entry(&mut npz, &names, HIGHRES_DYNAMIC)?,
            highresstatic: read_entry(&mut npz, &names, HIGHRES_STATIC)?,
            mesodynamic: read_entry(&mut npz, &names, MESO_DYNAMIC)?,
            mesostatic: read_entry(&mut npz, &names, MESO_STATIC)?,
        })
    }

    /// Write the present arrays to a compressed `.npz` archive
    pub fn save_npz(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut npz = NpzWriter::new_compressed(File::create(path)?);
        for (key, array) in self.entries() {
            if let Some(array) = array {
                npz.add_array(format!("{key}.npy"), array)?;
            }
        }
        npz.finish()?;
        Ok(())
    }
}

/// Read a single array from a `.npz` file
pub fn read_npz_array(path: &Path, key: &str) -> Result<ArrayD<f32>> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;
    read_entry(&mut npz, &names, key)?.ok_or_else(|| {
        EarthNetError::MissingData(format!("{} does not contain '{key}'", path.display()))
    })
}

/// numpy stores `key` as `key.npy`; accept either spelling and f32 or f64 payloads
fn read_entry<R: Read + Seek>(
    npz: &mut NpzReader<R>,
    names: &[String],
    key: &str,
) -> Result<Option<ArrayD<f32>>> {
    let with_suffix = format!("{key}.npy");
    let Some(name) = names.iter().find(|n| **n == key || **n == with_suffix) else {
        return Ok(None);
    };

    match npz.by_name::<ndarray::OwnedRepr<f32>, IxDyn>(name) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpzError::Npy(_)) => {
            let array = npz.by_name::<ndarray::OwnedRepr<f64>, IxDyn>(name)?;
            Ok(Some(array.mapv(|v| v as f32)))
        }
        Err(e) => Err(e.into()),
    }
}

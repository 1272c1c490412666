//! Conversion from labeled minicubes to the legacy bundle schema
//!
//! Recent datasets ship daily labeled cubes; the legacy tooling expects the
//! EarthNet2021 layout with satellite frames on a 5-day cadence, normalized
//! weather forcing on an 80x80 grid and a rescaled elevation layer.

use crate::errors::{EarthNetError, Result};
use crate::legacy::{LegacyCube, HIGHRES_SIZE, MESO_SIZE};
use crate::minicube::{DataVariable, Minicube, LAT, LON, TIME};
use ndarray::{s, Array3, Array4, ArrayD, Axis, Ix3};
use tracing::debug;

/// First daily frame that coincides with a satellite revisit
pub const TIME_OFFSET: usize = 4;
/// Days between satellite revisits
pub const TIME_STRIDE: usize = 5;

/// Sentinel-2 bands in legacy channel order (blue, green, red, near infrared)
pub const BANDS: [&str; 4] = ["s2_B02", "s2_B03", "s2_B04", "s2_B8A"];
/// Sentinel-2 cloud mask, nonzero where the observation is contaminated
pub const CLOUD_MASK: &str = "s2_mask";
/// Elevation layer used for the static arrays
pub const ELEVATION: &str = "cop_dem";

/// Normalization of one E-OBS variable: `(value + offset) / scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherScaling {
    pub variable: &'static str,
    pub offset: f32,
    pub scale: f32,
}

/// E-OBS variables in legacy channel order: rr, pp, tg, tn, tx
pub const WEATHER: [WeatherScaling; 5] = [
    WeatherScaling { variable: "eobs_rr", offset: 0.0, scale: 50.0 },
    WeatherScaling { variable: "eobs_pp", offset: -900.0, scale: 200.0 },
    WeatherScaling { variable: "eobs_tg", offset: 50.0, scale: 100.0 },
    WeatherScaling { variable: "eobs_tn", offset: 50.0, scale: 100.0 },
    WeatherScaling { variable: "eobs_tx", offset: 50.0, scale: 100.0 },
];

const ELEVATION_OFFSET: f32 = 2000.0;
const ELEVATION_SCALE: f32 = 4000.0;

/// Convert a labeled minicube into a [`LegacyCube`]
///
/// # Errors
///
/// Fails when a required variable is missing, when the spatial grid is not
/// 128x128, or when a variable is not laid out over (time, lat, lon).
pub fn to_legacy(cube: &Minicube) -> Result<LegacyCube> {
    for dim in [LAT, LON] {
        match cube.dim_len(dim) {
            Some(HIGHRES_SIZE) => {}
            other => {
                return Err(EarthNetError::shape(format!(
                    "expected {dim} of length {HIGHRES_SIZE}, found {other:?}"
                )))
            }
        }
    }

    let cube = cube.subsample_time(TIME_OFFSET, TIME_STRIDE);
    let frames = cube.time_len();
    debug!("Converting minicube with {frames} satellite frames");

    Ok(LegacyCube {
        highresdynamic: Some(highres_dynamic(&cube, frames)?.into_dyn()),
        highresstatic: Some(highres_static(&cube)?.into_dyn()),
        mesodynamic: Some(meso_dynamic(&cube, frames)?.into_dyn()),
        mesostatic: Some(meso_static(&cube)?.into_dyn()),
    })
}

/// (lat, lon, band, time): four bands followed by the binarized cloud mask
fn highres_dynamic(cube: &Minicube, frames: usize) -> Result<Array4<f32>> {
    let mut out = Array4::<f32>::zeros((HIGHRES_SIZE, HIGHRES_SIZE, BANDS.len() + 1, frames));

    for (channel, name) in BANDS.iter().enumerate() {
        let band = lat_lon_time(cube, name)?;
        out.slice_mut(s![.., .., channel, ..]).assign(&band);
    }

    let mask = lat_lon_time(cube, CLOUD_MASK)?.mapv(binarize);
    out.slice_mut(s![.., .., BANDS.len(), ..]).assign(&mask);

    Ok(out)
}

/// (lat, lon, 1): rescaled elevation
fn highres_static(cube: &Minicube) -> Result<Array3<f32>> {
    let dem = elevation(cube)?;
    Ok(dem.insert_axis(Axis(2)).into_dimensionality::<Ix3>()?)
}

/// (80, 80, variable, time): normalized weather broadcast over the meso grid
fn meso_dynamic(cube: &Minicube, frames: usize) -> Result<Array4<f32>> {
    let series = WEATHER
        .iter()
        .map(|scaling| {
            let variable = cube.variable(scaling.variable)?;
            let values = spatial_mean_series(scaling.variable, variable)?;
            if values.len() != frames {
                return Err(EarthNetError::shape(format!(
                    "'{}' has {} time steps, expected {frames}",
                    scaling.variable,
                    values.len()
                )));
            }
            Ok(values
                .into_iter()
                .map(|v| (v + scaling.offset) / scaling.scale)
                .collect::<Vec<f32>>())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Array4::from_shape_fn(
        (MESO_SIZE, MESO_SIZE, WEATHER.len(), frames),
        |(_, _, var, t)| series[var][t],
    ))
}

/// (80, 80, 1): mean rescaled elevation
fn meso_static(cube: &Minicube) -> Result<Array3<f32>> {
    let mean = nan_mean(elevation(cube)?.iter().copied());
    Ok(Array3::from_elem((MESO_SIZE, MESO_SIZE, 1), mean))
}

fn elevation(cube: &Minicube) -> Result<ArrayD<f32>> {
    let dem = cube.variable(ELEVATION)?;
    let dem = dem.transposed(ELEVATION, &[LAT, LON])?;
    Ok(dem.mapv(|v| (v + ELEVATION_OFFSET) / ELEVATION_SCALE))
}

fn lat_lon_time(cube: &Minicube, name: &str) -> Result<Array3<f32>> {
    let variable = cube.variable(name)?;
    Ok(variable
        .transposed(name, &[LAT, LON, TIME])?
        .into_dimensionality::<Ix3>()?)
}

/// One value per time step; spatial dimensions, if any, are averaged out
fn spatial_mean_series(name: &str, variable: &DataVariable) -> Result<Vec<f32>> {
    let axis = variable
        .axis(TIME)
        .ok_or_else(|| EarthNetError::DimensionNotFound {
            var: name.to_string(),
            dim: TIME.to_string(),
        })?;
    Ok(variable
        .data
        .axis_iter(Axis(axis))
        .map(|lane| nan_mean(lane.iter().copied()))
        .collect())
}

/// Nonzero codes are cloudy; a missing (NaN) code counts as clear
fn binarize(v: f32) -> f32 {
    if v != 0.0 && !v.is_nan() {
        1.0
    } else {
        0.0
    }
}

/// Mean over the non-NaN values, NaN when there are none
fn nan_mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + f64::from(v), count + 1));
    if count == 0 {
        f32::NAN
    } else {
        (sum / count as f64) as f32
    }
}

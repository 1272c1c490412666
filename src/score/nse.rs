//! Per-pixel normalized Nash-Sutcliffe efficiency of NDVI forecasts

use crate::adapter::{CLOUD_MASK, TIME_OFFSET, TIME_STRIDE};
use crate::errors::{EarthNetError, Result};
use crate::minicube::{DataVariable, Minicube, LAT, LON, TIME};
use ndarray::{Array2, Array3, Axis, Ix2, Ix3, Zip};
use serde::{Deserialize, Serialize};

/// Prediction variable scored when none is named
pub const DEFAULT_PRED_VAR: &str = "ndvi_pred";
/// Near infrared band of the target cube
pub const NIR: &str = "s2_B8A";
/// Red band of the target cube
pub const RED: &str = "s2_B04";
/// Land-cover classification of the target cube
pub const LANDCOVER: &str = "esawc_lc";

const NDVI_EPSILON: f64 = 1e-8;

/// Score of one pixel of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelScore {
    pub lat: f64,
    pub lon: f64,
    /// Normalized NSE in (0, 1], NaN when undefined
    pub nnse: f64,
    pub landcover: f64,
}

/// Score every pixel of a target/prediction pair
///
/// The target is brought to the satellite cadence (every fifth step from the
/// fifth) and its leading frames are dropped so that the remaining frames line
/// up with the prediction. Cloudy observations (nonzero cloud mask) are
/// ignored. Per pixel, `nnse = 1 / (2 - nse)` with
/// `nse = 1 - sum((obs - pred)^2) / sum((obs - mean(obs))^2)`.
///
/// # Errors
///
/// Fails when a variable is missing, when the prediction covers more frames
/// than the target, or when the spatial grids differ.
pub fn normalized_nse(
    target: &Minicube,
    prediction: &Minicube,
    pred_var: &str,
) -> Result<Vec<PixelScore>> {
    let target = target.subsample_time(TIME_OFFSET, TIME_STRIDE);
    let available = target.time_len();

    let predicted = prediction.variable(pred_var)?;
    let horizon = predicted
        .len_of(TIME)
        .ok_or_else(|| EarthNetError::DimensionNotFound {
            var: pred_var.to_string(),
            dim: TIME.to_string(),
        })?;
    if horizon > available {
        return Err(EarthNetError::shape(format!(
            "prediction has {horizon} frames but the target only {available}"
        )));
    }
    let target = target.slice_dim(TIME, available - horizon, 1);

    let nir = time_lat_lon(&target, NIR)?;
    let red = time_lat_lon(&target, RED)?;
    let mask = time_lat_lon(&target, CLOUD_MASK)?;
    let pred = predicted
        .transposed(pred_var, &[TIME, LAT, LON])?
        .into_dimensionality::<Ix3>()?;
    if pred.dim() != nir.dim() {
        return Err(EarthNetError::shape(format!(
            "prediction grid {:?} does not match target grid {:?}",
            pred.dim(),
            nir.dim()
        )));
    }

    let mut observed = Array3::<f64>::zeros(nir.raw_dim());
    Zip::from(&mut observed)
        .and(&nir)
        .and(&red)
        .and(&mask)
        .for_each(|obs, &n, &r, &m| {
            *obs = if m == 0.0 {
                let (n, r) = (f64::from(n), f64::from(r));
                (n - r) / (n + r + NDVI_EPSILON)
            } else {
                f64::NAN
            };
        });

    let nnse = pixel_nnse(&observed, &pred);
    let landcover = landcover_grid(&target)?;
    if landcover.dim() != nnse.dim() {
        return Err(EarthNetError::shape(format!(
            "land cover grid {:?} does not match target grid {:?}",
            landcover.dim(),
            nnse.dim()
        )));
    }

    let lats = coordinate(&target, LAT, nnse.dim().0);
    let lons = coordinate(&target, LON, nnse.dim().1);

    Ok(nnse
        .indexed_iter()
        .map(|((y, x), &score)| PixelScore {
            lat: lats[y],
            lon: lons[x],
            nnse: score,
            landcover: f64::from(landcover[[y, x]]),
        })
        .collect())
}

/// NNSE over the time axis of (time, lat, lon) observations and predictions
///
/// NaN terms are skipped in both sums, so a pixel without any valid
/// observation ends up as NaN.
pub fn pixel_nnse(observed: &Array3<f64>, predicted: &Array3<f32>) -> Array2<f64> {
    let (_, height, width) = observed.dim();
    let mut out = Array2::<f64>::zeros((height, width));

    Zip::from(&mut out)
        .and(observed.lanes(Axis(0)))
        .and(predicted.lanes(Axis(0)))
        .for_each(|score, obs, pred| {
            let (sum, count) = obs
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0_usize), |(s, c), v| (s + v, c + 1));
            let mean = if count == 0 { f64::NAN } else { sum / count as f64 };

            let residual: f64 = obs
                .iter()
                .zip(pred.iter())
                .map(|(&o, &p)| (o - f64::from(p)).powi(2))
                .filter(|v| !v.is_nan())
                .sum();
            let spread: f64 = obs
                .iter()
                .map(|&o| (o - mean).powi(2))
                .filter(|v| !v.is_nan())
                .sum();

            let nse = 1.0 - residual / spread;
            *score = 1.0 / (2.0 - nse);
        });

    out
}

fn time_lat_lon(cube: &Minicube, name: &str) -> Result<Array3<f32>> {
    Ok(cube
        .variable(name)?
        .transposed(name, &[TIME, LAT, LON])?
        .into_dimensionality::<Ix3>()?)
}

/// Land cover as (lat, lon); a time dimension, if any, contributes its first frame
fn landcover_grid(cube: &Minicube) -> Result<Array2<f32>> {
    let variable = cube.variable(LANDCOVER)?;
    let variable = match variable.axis(TIME) {
        Some(axis) => {
            let mut dims = variable.dims.clone();
            dims.remove(axis);
            DataVariable::new(dims, variable.data.index_axis(Axis(axis), 0).to_owned())?
        }
        None => variable.clone(),
    };
    Ok(variable
        .transposed(LANDCOVER, &[LAT, LON])?
        .into_dimensionality::<Ix2>()?)
}

/// Coordinate values of a dimension, falling back to positional indices
fn coordinate(cube: &Minicube, dim: &str, len: usize) -> Vec<f64> {
    match cube.variable(dim) {
        Ok(coord) if coord.dims == [dim] && coord.data.len() == len => {
            coord.data.iter().map(|&v| f64::from(v)).collect()
        }
        _ => (0..len).map(|i| i as f64).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_forecast_scores_one() {
        let obs = Array3::from_shape_fn((4, 1, 1), |(t, _, _)| t as f64 * 0.1);
        let pred = obs.mapv(|v| v as f32);
        let nnse = pixel_nnse(&obs, &pred);
        assert!((nnse[[0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn all_nan_observations_are_undefined() {
        let obs = Array3::from_elem((3, 1, 1), f64::NAN);
        let pred = Array3::<f32>::zeros((3, 1, 1));
        assert!(pixel_nnse(&obs, &pred)[[0, 0]].is_nan());
    }

    #[test]
    fn nan_observations_are_skipped() {
        let obs = Array3::from_shape_vec((4, 1, 1), vec![0.2, f64::NAN, 0.4, 0.6]).unwrap();
        let pred = Array3::from_shape_vec((4, 1, 1), vec![0.2, 0.9, 0.4, 0.6]).unwrap();
        assert!((pixel_nnse(&obs, &pred)[[0, 0]] - 1.0).abs() < 1e-6);
    }
}

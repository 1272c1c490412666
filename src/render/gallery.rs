//! Array layout normalization and frame tiling

use crate::errors::{EarthNetError, Result};
use ndarray::{s, Array3, Array4, ArrayD, Ix4};

/// Default number of columns in a gallery
pub const DEFAULT_NCOLS: usize = 10;

/// Reorder a 4-d cube into (time, height, width, channel)
///
/// The two axes of length `spatial` are taken as height and width. When they
/// are not already axes 1 and 2, the shorter remaining axis is the channel
/// axis and the longer one is time. Cubes whose time or channel length also
/// equals `spatial` are assumed to be canonical already.
pub fn canonicalize(data: &ArrayD<f32>, spatial: usize) -> Result<Array4<f32>> {
    if data.ndim() != 4 {
        return Err(EarthNetError::shape(format!(
            "expected a 4-d cube, got shape {:?}",
            data.shape()
        )));
    }
    let shape = data.shape();
    let hw_axes: Vec<usize> = (0..4).filter(|&i| shape[i] == spatial).collect();
    if hw_axes.len() < 2 {
        return Err(EarthNetError::shape(format!(
            "expected two axes of length {spatial}, got shape {shape:?}"
        )));
    }

    let canonical = if hw_axes.len() == 2 && hw_axes != [1, 2] {
        let rest: Vec<usize> = (0..4).filter(|i| !hw_axes.contains(i)).collect();
        let (channel, time) = if shape[rest[0]] <= shape[rest[1]] {
            (rest[0], rest[1])
        } else {
            (rest[1], rest[0])
        };
        data.view()
            .permuted_axes(vec![time, hw_axes[0], hw_axes[1], channel])
            .as_standard_layout()
            .into_owned()
    } else {
        data.clone()
    };

    Ok(canonical.into_dimensionality::<Ix4>()?)
}

/// Tile (n, h, w, c) frames into a single (rows*(h+2), ncols*(w+2), c) mosaic
///
/// Every frame gets a one pixel zero border. `n` must be a multiple of `ncols`.
pub fn tile(frames: &Array4<f32>, ncols: usize) -> Result<Array3<f32>> {
    let (n, h, w, c) = frames.dim();
    if ncols == 0 || n % ncols != 0 {
        return Err(EarthNetError::shape(format!(
            "cannot arrange {n} frames into {ncols} columns"
        )));
    }
    let nrows = n / ncols;
    let (ph, pw) = (h + 2, w + 2);

    let mut padded = Array4::<f32>::zeros((n, ph, pw, c));
    padded.slice_mut(s![.., 1..ph - 1, 1..pw - 1, ..]).assign(frames);

    let grid = padded
        .into_shape((nrows, ncols, ph, pw, c))?
        .permuted_axes([0, 2, 1, 3, 4])
        .as_standard_layout()
        .into_owned();

    Ok(grid.into_shape((nrows * ph, ncols * pw, c))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn canonicalize_moves_channel_and_time() {
        // (lat, lon, band, time) as stored in legacy bundles
        let data = ArrayD::from_shape_fn(IxDyn(&[8, 8, 5, 30]), |ix| {
            (ix[2] * 100 + ix[3]) as f32
        });
        let cube = canonicalize(&data, 8).unwrap();
        assert_eq!(cube.dim(), (30, 8, 8, 5));
        assert_eq!(cube[[7, 0, 0, 3]], 307.0);
    }

    #[test]
    fn canonicalize_requires_two_spatial_axes() {
        let data = ArrayD::zeros(IxDyn(&[8, 4, 5, 30]));
        assert!(canonicalize(&data, 8).is_err());
    }

    #[test]
    fn tile_places_frames_row_major() {
        let frames = Array4::from_shape_fn((4, 1, 1, 1), |(i, _, _, _)| i as f32 + 1.0);
        let mosaic = tile(&frames, 2).unwrap();
        assert_eq!(mosaic.dim(), (6, 6, 1));
        assert_eq!(mosaic[[1, 1, 0]], 1.0);
        assert_eq!(mosaic[[1, 4, 0]], 2.0);
        assert_eq!(mosaic[[4, 1, 0]], 3.0);
        assert_eq!(mosaic[[4, 4, 0]], 4.0);
        assert_eq!(mosaic[[0, 0, 0]], 0.0);
    }

    #[test]
    fn tile_rejects_ragged_grids() {
        let frames = Array4::<f32>::zeros((7, 2, 2, 3));
        assert!(tile(&frames, 3).is_err());
        assert!(tile(&frames, 0).is_err());
    }
}

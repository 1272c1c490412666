//! Gallery plots of minicube time series
//!
//! [`cube_gallery`] turns a cube into a grid of frames: true color (`rgb`),
//! vegetation index (`ndvi`) or one of the E-OBS weather variables. Non-RGB
//! figures carry a [`Colorbar`] describing the value range shown.
//!
//! # Organization
//!
//! - [`colormap`]: color ramps and mask-aware colorization
//! - [`gallery`]: layout normalization and tiling
//! - [`png`]: PNG encoding

pub mod colormap;
pub mod gallery;
pub mod png;

pub use colormap::{colorize, Colormap};
pub use gallery::{canonicalize, tile, DEFAULT_NCOLS};

use crate::errors::{EarthNetError, Result};
use crate::legacy::{read_npz_array, LegacyCube, HIGHRES_SIZE, MESO_SIZE};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use ndarray::{s, Array3, Array4, ArrayD, Zip};
use rusttype::{Font, Scale};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Resolution written into saved figures
pub const DPI: u32 = 300;

/// DejaVu Sans, see `assets/DejaVuSans-LICENSE`
const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
const FONT_SIZE: f32 = 12.0;
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const NDVI_EPSILON: f32 = 1e-6;
const RGB_CEILING: f32 = 0.5;
/// Land-cover codes strictly between these bounds count as vegetation
const VEGETATION_RANGE: (f32, f32) = (63.0, 105.0);

/// What a gallery shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotVariable {
    Rgb,
    Ndvi,
    /// Precipitation
    Rr,
    /// Sea-level pressure
    Pp,
    /// Mean temperature
    Tg,
    /// Minimum temperature
    Tn,
    /// Maximum temperature
    Tx,
}

impl PlotVariable {
    pub const ALL: [PlotVariable; 7] = [
        Self::Rgb,
        Self::Ndvi,
        Self::Rr,
        Self::Pp,
        Self::Tg,
        Self::Tn,
        Self::Tx,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Ndvi => "ndvi",
            Self::Rr => "rr",
            Self::Pp => "pp",
            Self::Tg => "tg",
            Self::Tn => "tn",
            Self::Tx => "tx",
        }
    }

    /// Whether the variable is drawn from satellite imagery
    #[must_use]
    pub const fn is_satellite(self) -> bool {
        matches!(self, Self::Rgb | Self::Ndvi)
    }

    /// Height and width of the arrays the variable is read from
    #[must_use]
    pub const fn spatial_size(self) -> usize {
        if self.is_satellite() {
            HIGHRES_SIZE
        } else {
            MESO_SIZE
        }
    }

    /// Weather channel and colormap, `None` for satellite variables
    #[must_use]
    pub const fn meso_channel(self) -> Option<(usize, Colormap)> {
        match self {
            Self::Rr => Some((0, Colormap::Blues)),
            Self::Pp => Some((1, Colormap::Rainbow)),
            Self::Tg => Some((2, Colormap::Coolwarm)),
            Self::Tn => Some((3, Colormap::Coolwarm)),
            Self::Tx => Some((4, Colormap::Coolwarm)),
            Self::Rgb | Self::Ndvi => None,
        }
    }

    /// Colorbar attached to the figure; RGB galleries have none
    #[must_use]
    pub fn colorbar(self) -> Option<Colorbar> {
        let (colormap, vmin, vmax, label) = match self {
            Self::Rgb => return None,
            Self::Ndvi => (Colormap::Ndvi, 0.0, 1.0, "NDVI"),
            Self::Rr => (Colormap::Blues, 0.0, 50.0, "Precipitation in mm/d"),
            Self::Pp => (Colormap::Rainbow, 900.0, 1100.0, "Sea-level pressure in hPa"),
            Self::Tg => (Colormap::Coolwarm, -50.0, 50.0, "Mean temperature in °C"),
            Self::Tn => (Colormap::Coolwarm, -50.0, 50.0, "Minimum Temperature in °C"),
            Self::Tx => (Colormap::Coolwarm, -50.0, 50.0, "Maximum Temperature in °C"),
        };
        Some(Colorbar {
            colormap,
            vmin,
            vmax,
            label: label.to_string(),
        })
    }
}

impl fmt::Display for PlotVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlotVariable {
    type Err = EarthNetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| EarthNetError::InvalidVariable {
                variable: s.to_string(),
            })
    }
}

/// A cube handed to the renderer
#[derive(Debug, Clone)]
pub enum CubeInput {
    /// Raw 4-d array in any axis order
    Array(ArrayD<f32>),
    /// Loaded legacy bundle
    Bundle(LegacyCube),
    /// `.npz` bundle or `.npy` array on disk
    Path(PathBuf),
}

/// Land-cover layer for the red non-vegetation overlay
#[derive(Debug, Clone)]
pub enum VegetationMask {
    Array(ArrayD<f32>),
    /// `.npz` with a `landcover` entry, or a `.npy` array
    Path(PathBuf),
}

/// Gallery settings
#[derive(Debug, Clone)]
pub struct GalleryOptions {
    pub variable: PlotVariable,
    pub vegetation_mask: Option<VegetationMask>,
    /// Use the last satellite channel as cloud mask when present
    pub cloud_mask: bool,
    pub ncols: usize,
    pub save_path: Option<PathBuf>,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            variable: PlotVariable::Rgb,
            vegetation_mask: None,
            cloud_mask: true,
            ncols: DEFAULT_NCOLS,
            save_path: None,
        }
    }
}

/// Value range and label of a figure's colorbar
#[derive(Debug, Clone, PartialEq)]
pub struct Colorbar {
    pub colormap: Colormap,
    pub vmin: f32,
    pub vmax: f32,
    pub label: String,
}

/// A rendered gallery
#[derive(Debug, Clone)]
pub struct Figure {
    /// (height, width, rgb) in `[0, 1]`
    pub mosaic: Array3<f32>,
    pub colorbar: Option<Colorbar>,
}

impl Figure {
    /// Compose mosaic and colorbar into RGBA bytes, returning (pixels, width, height)
    ///
    /// The colorbar is a vertical strip 5% as wide as the mosaic, separated by a
    /// small gap; the top row is `vmax`. Its `vmax` and `vmin` ticks are drawn
    /// at the top and bottom of a text column to its right, the label halfway
    /// between them.
    pub fn to_rgba(&self) -> Result<(Vec<u8>, usize, usize)> {
        let (height, mosaic_width, _) = self.mosaic.dim();
        let Some(colorbar) = &self.colorbar else {
            let mut canvas = RgbaImage::new(mosaic_width as u32, height as u32);
            self.draw_mosaic(&mut canvas);
            return Ok((canvas.into_raw(), mosaic_width, height));
        };

        let font = Font::try_from_bytes(FONT_DATA).ok_or_else(|| {
            EarthNetError::Generic("failed to load the colorbar font".to_string())
        })?;
        let scale = Scale::uniform(FONT_SIZE);

        let bar_width = ((mosaic_width as f32 * 0.05).round() as usize).max(1);
        let gap = ((bar_width as f32 * 0.1).round() as usize).max(1);
        let padding = gap.max(2);
        let top = format_tick(colorbar.vmax);
        let bottom = format_tick(colorbar.vmin);
        let text_width = [top.as_str(), bottom.as_str(), colorbar.label.as_str()]
            .into_iter()
            .map(|text| text_size(scale, &font, text).0.max(0) as usize)
            .max()
            .unwrap_or(0);

        let bar_x = mosaic_width + gap;
        let text_x = bar_x + bar_width + padding;
        let width = text_x + text_width + padding;

        // transparent outside the mosaic and the bar; text blends into alpha
        let mut canvas = RgbaImage::new(width as u32, height as u32);
        self.draw_mosaic(&mut canvas);

        let lut = colorbar.colormap.lut();
        for y in 0..height {
            let fraction = if height > 1 {
                1.0 - y as f32 / (height - 1) as f32
            } else {
                1.0
            };
            let color = colormap::lut_index(fraction).map_or(colormap::BAD_COLOR, |i| lut[i]);
            let pixel = Rgba([to_byte(color[0]), to_byte(color[1]), to_byte(color[2]), 255]);
            for x in bar_x..bar_x + bar_width {
                canvas.put_pixel(x as u32, y as u32, pixel);
            }
        }

        let x = text_x as i32;
        let height_px = height as i32;
        draw_text_mut(&mut canvas, TEXT_COLOR, x, 0, scale, &font, &top);
        let (_, bottom_height) = text_size(scale, &font, &bottom);
        let bottom_y = height_px - bottom_height;
        draw_text_mut(&mut canvas, TEXT_COLOR, x, bottom_y, scale, &font, &bottom);
        let (_, label_height) = text_size(scale, &font, &colorbar.label);
        let label_y = (height_px - label_height) / 2;
        draw_text_mut(&mut canvas, TEXT_COLOR, x, label_y, scale, &font, &colorbar.label);

        Ok((canvas.into_raw(), width, height))
    }

    fn draw_mosaic(&self, canvas: &mut RgbaImage) {
        for ((y, x, k), &v) in self.mosaic.indexed_iter() {
            let pixel = canvas.get_pixel_mut(x as u32, y as u32);
            pixel[k] = to_byte(v);
            pixel[3] = 255;
        }
    }

    /// Encode the figure as PNG bytes
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let (pixels, width, height) = self.to_rgba()?;
        let mut text = vec![("Software", format!("earthnet {}", env!("CARGO_PKG_VERSION")))];
        if let Some(colorbar) = &self.colorbar {
            text.push(("Colorbar", colorbar.label.clone()));
            text.push(("Colormap", colorbar.colormap.name().to_string()));
            text.push(("Range", format!("{} {}", colorbar.vmin, colorbar.vmax)));
        }
        png::encode_rgba(&pixels, width, height, DPI, &text)
    }

    /// Write the figure as PNG, creating parent directories
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_png()?)?;
        info!("Saved gallery to {}", path.display());
        Ok(())
    }
}

/// Render a gallery of every time step of `cube`
///
/// # Errors
///
/// Fails when the cube cannot be loaded, lacks the data for the variable, has
/// no two axes of the expected spatial size, or when the number of frames is
/// not a multiple of `options.ncols`.
pub fn cube_gallery(cube: CubeInput, options: &GalleryOptions) -> Result<Figure> {
    let variable = options.variable;
    let data = match cube {
        CubeInput::Array(array) => array,
        CubeInput::Bundle(bundle) => select(&bundle, variable)?,
        CubeInput::Path(path) => load_cube(&path, variable)?,
    };

    let hw = variable.spatial_size();
    let data = canonicalize(&data, hw)?;

    let frames = match variable.meso_channel() {
        Some((channel, colormap)) => {
            let values = channel_values(&data, channel)?;
            let bad = values.mapv(f32::is_nan);
            colorize(&values, colormap, Some(&bad), None)
        }
        None if variable == PlotVariable::Rgb => rgb_frames(&data, options.cloud_mask)?,
        None => {
            let vegetation = match &options.vegetation_mask {
                Some(mask) => Some(non_vegetation(mask, hw, data.dim().0)?),
                None => None,
            };
            ndvi_frames(&data, vegetation.as_ref(), options.cloud_mask)?
        }
    };

    let figure = Figure {
        mosaic: tile(&frames, options.ncols)?,
        colorbar: variable.colorbar(),
    };

    if let Some(path) = &options.save_path {
        figure.save_png(path)?;
    }

    Ok(figure)
}

/// True color frames: channels (2, 1, 0) clipped to [0, 0.5] and stretched
fn rgb_frames(data: &Array4<f32>, cloud_mask: bool) -> Result<Array4<f32>> {
    let (t, h, w, c) = data.dim();
    if c < 3 {
        return Err(EarthNetError::shape(format!(
            "rgb needs at least 3 channels, cube has {c}"
        )));
    }
    let use_mask = c > 4 && cloud_mask;

    let mut out = Array4::<f32>::zeros((t, h, w, 3));
    Zip::from(out.rows_mut())
        .and(data.rows())
        .for_each(|mut pixel, channels| {
            let cloudy = use_mask && channels[c - 1] as u8 != 0;
            for (k, band) in [2, 1, 0].into_iter().enumerate() {
                let mut v = channels[band];
                if v < 0.0 {
                    v = 0.0;
                } else if v > RGB_CEILING {
                    v = RGB_CEILING;
                }
                v *= 2.0;

                pixel[k] = if use_mask && (cloudy || v.is_nan()) {
                    colormap::NO_DATA_COLOR[k]
                } else if v.is_nan() {
                    0.0
                } else {
                    v
                };
            }
        });
    Ok(out)
}

/// NDVI frames with optional red non-vegetation and blue cloud overlays
fn ndvi_frames(
    data: &Array4<f32>,
    vegetation: Option<&Array3<bool>>,
    cloud_mask: bool,
) -> Result<Array4<f32>> {
    let c = data.dim().3;
    if c < 4 {
        return Err(EarthNetError::shape(format!(
            "ndvi needs at least 4 channels, cube has {c}"
        )));
    }
    let red = data.slice(s![.., .., .., 2]);
    let nir = data.slice(s![.., .., .., 3]);
    let mut ndvi = Array3::<f32>::zeros(red.raw_dim());
    Zip::from(&mut ndvi)
        .and(&nir)
        .and(&red)
        .for_each(|out, &n, &r| *out = (n - r) / (r + n + NDVI_EPSILON));

    let clouds = (c > 4 && cloud_mask)
        .then(|| data.slice(s![.., .., .., c - 1]).mapv(|m| 1.0 - m == 0.0));

    Ok(colorize(&ndvi, Colormap::Ndvi, vegetation, clouds.as_ref()))
}

fn channel_values(data: &Array4<f32>, channel: usize) -> Result<Array3<f32>> {
    let c = data.dim().3;
    if channel >= c {
        return Err(EarthNetError::shape(format!(
            "channel {channel} requested from a cube with {c} channels"
        )));
    }
    Ok(data.slice(s![.., .., .., channel]).to_owned())
}

/// Red overlay: pixels whose land cover is outside the vegetation range,
/// repeated over `frames` time steps
fn non_vegetation(mask: &VegetationMask, hw: usize, frames: usize) -> Result<Array3<bool>> {
    let landcover = match mask {
        VegetationMask::Array(array) => array.clone(),
        VegetationMask::Path(path) if has_extension(path, "npy") => {
            ndarray_npy::read_npy::<_, ArrayD<f32>>(path).map_err(|e| {
                EarthNetError::Generic(format!("failed to read {}: {e}", path.display()))
            })?
        }
        VegetationMask::Path(path) => read_npz_array(path, "landcover")?,
    };
    if landcover.len() != hw * hw {
        return Err(EarthNetError::shape(format!(
            "vegetation mask has {} values, expected {hw}x{hw}",
            landcover.len()
        )));
    }
    let (lo, hi) = VEGETATION_RANGE;
    let outside: Vec<bool> = landcover.iter().map(|&v| !(v > lo && v < hi)).collect();
    Ok(Array3::from_shape_fn((frames, hw, hw), |(_, y, x)| {
        outside[y * hw + x]
    }))
}

/// Array a variable is drawn from inside a legacy bundle
fn select(bundle: &LegacyCube, variable: PlotVariable) -> Result<ArrayD<f32>> {
    let data = if variable.is_satellite() {
        bundle.satellite()?
    } else {
        bundle.meso()?
    };
    Ok(data.clone())
}

fn load_cube(path: &Path, variable: PlotVariable) -> Result<ArrayD<f32>> {
    if has_extension(path, "npy") {
        return ndarray_npy::read_npy::<_, ArrayD<f32>>(path).map_err(|e| {
            EarthNetError::Generic(format!("failed to read {}: {e}", path.display()))
        });
    }
    select(&LegacyCube::load_npz(path)?, variable)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Integral ticks print without a fraction
fn format_tick(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

fn to_byte(v: f32) -> u8 {
    if v.is_nan() {
        0
    } else {
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Range;

    /// Pixels with any coverage right of `from_x` within `rows`
    fn ink_pixels(pixels: &[u8], width: usize, from_x: usize, rows: Range<usize>) -> usize {
        rows.flat_map(|y| (from_x..width).map(move |x| (y * width + x) * 4 + 3))
            .filter(|&alpha| pixels[alpha] > 0)
            .count()
    }

    #[test]
    fn colorbar_ticks_and_label_are_drawn() {
        let figure = Figure {
            mosaic: Array3::zeros((100, 200, 3)),
            colorbar: PlotVariable::Ndvi.colorbar(),
        };
        let (pixels, width, height) = figure.to_rgba().unwrap();
        assert_eq!(height, 100);
        assert_eq!(pixels.len(), width * height * 4);

        // 10 px bar after a 1 px gap, text 2 px further right
        let text_x = 200 + 1 + 10 + 2;
        assert!(width > text_x);
        assert!(ink_pixels(&pixels, width, text_x, 0..20) > 0);
        assert!(ink_pixels(&pixels, width, text_x, 40..60) > 0);
        assert!(ink_pixels(&pixels, width, text_x, 80..100) > 0);
        // nothing between the ticks and the label
        assert_eq!(ink_pixels(&pixels, width, text_x, 25..35), 0);

        let lut = Colormap::Ndvi.lut();
        let top = 205 * 4;
        let bottom = (99 * width + 205) * 4;
        assert_eq!(pixels[top + 1], to_byte(lut[255][1]));
        assert_eq!(pixels[bottom + 1], to_byte(lut[0][1]));
    }

    #[test]
    fn rgb_figure_is_only_the_mosaic() {
        let figure = Figure {
            mosaic: Array3::from_elem((4, 6, 3), 1.0),
            colorbar: None,
        };
        let (pixels, width, height) = figure.to_rgba().unwrap();
        assert_eq!((width, height), (6, 4));
        assert!(pixels.iter().all(|&b| b == 255));
    }

    #[test]
    fn ticks_drop_integral_fractions() {
        assert_eq!(format_tick(-50.0), "-50");
        assert_eq!(format_tick(1100.0), "1100");
        assert_eq!(format_tick(0.5), "0.5");
    }
}

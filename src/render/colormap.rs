//! Color ramps and mask-aware colorization
//!
//! Each [`Colormap`] is sampled into a 256-entry lookup table. Values are
//! expected in `[0, 1]`: anything below maps to the first entry, anything
//! above to the last, NaN to [`BAD_COLOR`].

use ndarray::{Array3, Array4, Zip};
use std::f32::consts::PI;

/// Number of entries in every lookup table
pub const LUT_SIZE: usize = 256;

/// Color used for NaN and red-masked values
pub const BAD_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

/// Color used for blue-masked (cloudy / no data) values
pub const NO_DATA_COLOR: [f32; 3] = [0.0, 0.0, 0.1];

/// Tan through deep green to near-black
const NDVI_STOPS: [&str; 9] = [
    "#cbbe9a", "#fffde4", "#bccea5", "#66985b", "#2e6a32", "#123f1e", "#0e371a", "#01140f",
    "#000d0a",
];

const BLUES_STOPS: [&str; 9] = [
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
    "#08306b",
];

const COOLWARM_STOPS: [[f32; 3]; 5] = [
    [0.2298, 0.2987, 0.7537],
    [0.5543, 0.6901, 0.9955],
    [0.8674, 0.8644, 0.8626],
    [0.9567, 0.5980, 0.4773],
    [0.7057, 0.0156, 0.1502],
];

/// Color ramps used by the gallery renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Vegetation index ramp
    Ndvi,
    /// Sequential blues, for precipitation
    Blues,
    /// Full hue sweep, for pressure
    Rainbow,
    /// Diverging blue-red, for temperatures
    Coolwarm,
}

impl Colormap {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ndvi => "ndvi",
            Self::Blues => "Blues",
            Self::Rainbow => "rainbow",
            Self::Coolwarm => "coolwarm",
        }
    }

    /// The sampled lookup table
    #[must_use]
    pub fn lut(self) -> Vec<[f32; 3]> {
        match self {
            Self::Ndvi => sample_stops(&NDVI_STOPS.map(hex_to_rgb)),
            Self::Blues => sample_stops(&BLUES_STOPS.map(hex_to_rgb)),
            Self::Coolwarm => sample_stops(&COOLWARM_STOPS),
            Self::Rainbow => (0..LUT_SIZE)
                .map(|i| {
                    let x = i as f32 / (LUT_SIZE - 1) as f32;
                    [
                        (2.0 * x - 0.5).abs().min(1.0),
                        (PI * x).sin().clamp(0.0, 1.0),
                        (PI * x / 2.0).cos().clamp(0.0, 1.0),
                    ]
                })
                .collect(),
        }
    }
}

/// Lookup-table index of a normalized value; `None` for NaN
#[must_use]
pub fn lut_index(value: f32) -> Option<usize> {
    if value.is_nan() {
        return None;
    }
    let scaled = value * LUT_SIZE as f32;
    Some(if scaled < 0.0 {
        0
    } else {
        (scaled as usize).min(LUT_SIZE - 1)
    })
}

/// Map (time, height, width) values to (time, height, width, rgb)
///
/// `mask_red` entries render as [`BAD_COLOR`]; `mask_blue` entries render as
/// [`NO_DATA_COLOR`] and take precedence over everything else.
#[must_use]
pub fn colorize(
    data: &Array3<f32>,
    colormap: Colormap,
    mask_red: Option<&Array3<bool>>,
    mask_blue: Option<&Array3<bool>>,
) -> Array4<f32> {
    let lut = colormap.lut();
    let (t, h, w) = data.dim();
    let mut out = Array4::<f32>::zeros((t, h, w, 3));

    Zip::from(out.rows_mut())
        .and(data)
        .for_each(|mut pixel, &value| {
            let color = lut_index(value).map_or(BAD_COLOR, |i| lut[i]);
            pixel.iter_mut().zip(color).for_each(|(p, c)| *p = c);
        });

    if let Some(mask) = mask_red {
        Zip::from(out.rows_mut()).and(mask).for_each(|mut pixel, &red| {
            if red {
                pixel.iter_mut().zip(BAD_COLOR).for_each(|(p, c)| *p = c);
            }
        });
    }

    if let Some(mask) = mask_blue {
        Zip::from(out.rows_mut()).and(mask).for_each(|mut pixel, &blue| {
            if blue {
                pixel.iter_mut().zip(NO_DATA_COLOR).for_each(|(p, c)| *p = c);
            }
        });
    }

    out
}

/// Linear interpolation between evenly spaced stops
fn sample_stops(stops: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let segments = (stops.len() - 1) as f32;
    (0..LUT_SIZE)
        .map(|i| {
            let x = i as f32 / (LUT_SIZE - 1) as f32 * segments;
            let lower = (x.floor() as usize).min(stops.len() - 2);
            let frac = x - lower as f32;
            let (a, b) = (stops[lower], stops[lower + 1]);
            [
                a[0] * (1.0 - frac) + b[0] * frac,
                a[1] * (1.0 - frac) + b[1] * frac,
                a[2] * (1.0 - frac) + b[2] * frac,
            ]
        })
        .collect()
}

fn hex_to_rgb(hex: &str) -> [f32; 3] {
    let channel = |i: usize| {
        u8::from_str_radix(&hex[1 + 2 * i..3 + 2 * i], 16).map_or(0.0, |v| f32::from(v) / 255.0)
    };
    [channel(0), channel(1), channel(2)]
}

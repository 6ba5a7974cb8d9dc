//! Scalar-to-color mapping for heatmap display.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::NormalizedField;

/// Available colour maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Blue → cyan → yellow → red.
    Thermal,
    /// Black → white.
    Grayscale,
}

impl Colormap {
    /// Map `v` (clamped to [0, 1], NaN = 0) to RGB.
    pub fn map(&self, v: f32) -> [u8; 3] {
        match self {
            Self::Thermal => jet_color(v),
            Self::Grayscale => {
                let g = (clamp_unit(v) * 255.0) as u8;
                [g, g, g]
            }
        }
    }
}

#[inline]
fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Piecewise-linear thermal ramp in four segments. Channels are floored.
pub fn jet_color(v: f32) -> [u8; 3] {
    let v = clamp_unit(v);
    let (r, g, b) = if v < 0.25 {
        (0.0, 4.0 * v * 255.0, 255.0)
    } else if v < 0.5 {
        (0.0, 255.0, 255.0 * (1.0 - 4.0 * (v - 0.25)))
    } else if v < 0.75 {
        (4.0 * (v - 0.5) * 255.0, 255.0, 0.0)
    } else {
        (255.0, 255.0 * (1.0 - 4.0 * (v - 0.75)), 0.0)
    };
    [floor_channel(r), floor_channel(g), floor_channel(b)]
}

#[inline]
fn floor_channel(c: f32) -> u8 {
    c.floor().clamp(0.0, 255.0) as u8
}

/// Render a normalized field as an opaque RGBA raster.
pub fn render_normalized(field: &NormalizedField, colormap: Colormap) -> RgbaImage {
    let mut out = RgbaImage::new(field.width(), field.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let [r, g, b] = colormap.map(field.get(x, y));
        *pixel = Rgba([r, g, b, 255]);
    }
    out
}

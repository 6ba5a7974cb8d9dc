//! Sobel edge map. Duplicated or inconsistent edge structure corroborates
//! ELA findings.

use image::{GrayImage, Rgba, RgbaImage};

use super::{
    AnalysisKind, ForensicError, Heatmap, HeatmapEngine, ImageCodec, ScalarField, WorkingImage,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeEngine;

impl HeatmapEngine for EdgeEngine {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Edge
    }

    fn render(
        &self,
        source: &WorkingImage,
        _codec: &dyn ImageCodec,
    ) -> Result<Heatmap, ForensicError> {
        let field = sobel_magnitude(source.gray());
        Ok(Heatmap {
            kind: AnalysisKind::Edge,
            image: render_gray_field(&field),
            stats: field.stats(),
        })
    }
}

/// 3x3 Sobel gradient magnitude, clamped to 255.
///
/// The 1-pixel border is skipped and stays 0. Inputs narrower or shorter
/// than 3 pixels yield an all-zero field.
pub fn sobel_magnitude(gray: &GrayImage) -> ScalarField {
    let (w, h) = gray.dimensions();
    let mut field = ScalarField::new(w, h);
    if w < 3 || h < 3 {
        return field;
    }

    let p = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as f32;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let (tl, tc, tr) = (p(x - 1, y - 1), p(x, y - 1), p(x + 1, y - 1));
            let (ml, mr) = (p(x - 1, y), p(x + 1, y));
            let (bl, bc, br) = (p(x - 1, y + 1), p(x, y + 1), p(x + 1, y + 1));

            let gx = (tr - tl) + 2.0 * (mr - ml) + (br - bl);
            let gy = (bl - tl) + 2.0 * (bc - tc) + (br - tr);
            field.set(x, y, (gx * gx + gy * gy).sqrt().min(255.0));
        }
    }
    field
}

/// Write `min(255, v)` (truncated) to R, G and B; alpha opaque.
pub fn render_gray_field(field: &ScalarField) -> RgbaImage {
    let mut out = RgbaImage::new(field.width(), field.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let v = field.get(x, y).clamp(0.0, 255.0) as u8;
        *pixel = Rgba([v, v, v, 255]);
    }
    out
}

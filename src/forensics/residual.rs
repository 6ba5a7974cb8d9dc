//! Median Filter Residual.
//!
//! A 3x3 median keeps structure and drops impulsive detail; what it drops
//! (`|center - median|`) is the residual texture. Copy-paste and AI inpainting
//! disturb that texture. Raw residuals are too sparse to read, so a second
//! pass box-averages them into a density map.

use image::GrayImage;

use super::edge::render_gray_field;
use super::{
    AnalysisKind, ForensicError, Heatmap, HeatmapEngine, ImageCodec, ScalarField, WorkingImage,
};
use crate::config::ResidualConfig;

#[derive(Debug, Clone, Default)]
pub struct ResidualEngine {
    config: ResidualConfig,
}

impl ResidualEngine {
    pub fn new(config: ResidualConfig) -> Self {
        Self { config }
    }
}

impl HeatmapEngine for ResidualEngine {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Residual
    }

    fn render(
        &self,
        source: &WorkingImage,
        _codec: &dyn ImageCodec,
    ) -> Result<Heatmap, ForensicError> {
        let residual = median_residual_field(source.gray(), self.config.gain);
        let density = box_smooth(&residual, self.config.smoothing_radius);
        Ok(Heatmap {
            kind: AnalysisKind::Residual,
            image: render_gray_field(&density),
            stats: density.stats(),
        })
    }
}

/// `|center - median3x3| * gain` for interior pixels; the border stays 0.
pub fn median_residual_field(gray: &GrayImage, gain: f32) -> ScalarField {
    let (w, h) = gray.dimensions();
    let mut field = ScalarField::new(w, h);
    if w < 3 || h < 3 {
        return field;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut window = [0u8; 9];
            let mut i = 0;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    window[i] = gray.get_pixel(nx, ny).0[0];
                    i += 1;
                }
            }
            window.sort_unstable();

            let center = gray.get_pixel(x, y).0[0] as f32;
            let median = window[4] as f32;
            field.set(x, y, (center - median).abs() * gain);
        }
    }
    field
}

/// Mean over a `(2r+1)^2` window, clamped to 255.
///
/// Only pixels with the full window inside the image are written; the
/// `radius`-wide frame stays 0.
pub fn box_smooth(field: &ScalarField, radius: u32) -> ScalarField {
    let (w, h) = (field.width(), field.height());
    let mut out = ScalarField::new(w, h);
    let span = match radius.checked_mul(2).and_then(|d| d.checked_add(1)) {
        Some(span) if span <= w && span <= h => span,
        _ => return out,
    };

    let count = span as f32 * span as f32;
    for y in radius..h - radius {
        for x in radius..w - radius {
            let mut sum = 0.0f32;
            for ny in y - radius..=y + radius {
                for nx in x - radius..=x + radius {
                    sum += field.get(nx, ny);
                }
            }
            out.set(x, y, (sum / count).min(255.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensics::ImageCrateCodec;
    use image::{Luma, Rgba, RgbaImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn single_impulse_residual() {
        let mut gray = GrayImage::from_pixel(5, 5, Luma([10]));
        gray.put_pixel(2, 2, Luma([30]));
        let field = median_residual_field(&gray, 10.0);
        // median of the 3x3 around the impulse is 10 -> |30 - 10| * 10
        assert_eq!(field.get(2, 2), 200.0);
        // neighbour centred at 10 with one 30 in its window: median 10
        assert_eq!(field.get(1, 1), 0.0);
        // border untouched
        assert_eq!(field.get(0, 2), 0.0);
    }

    #[test]
    fn residual_and_density_are_non_negative() {
        let mut rng = StdRng::seed_from_u64(5);
        let gray = GrayImage::from_fn(30, 20, |_, _| Luma([rng.gen()]));
        let residual = median_residual_field(&gray, 10.0);
        let density = box_smooth(&residual, 2);
        assert!(residual.values().iter().all(|&v| v >= 0.0));
        assert!(density.values().iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn box_smooth_averages_window() {
        let mut field = ScalarField::new(5, 5);
        field.set(2, 2, 250.0);
        let out = box_smooth(&field, 2);
        assert!((out.get(2, 2) - 10.0).abs() < 1e-4);
        // frame without a full window stays 0
        assert_eq!(out.get(1, 2), 0.0);
        assert_eq!(out.get(4, 4), 0.0);
    }

    #[test]
    fn box_smooth_small_field_is_zero() {
        let mut field = ScalarField::new(4, 9);
        field.set(1, 1, 100.0);
        let out = box_smooth(&field, 2);
        assert!(out.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn box_smooth_huge_radius_is_zero() {
        let field = ScalarField::new(8, 8);
        for radius in [u32::MAX, u32::MAX / 2, 1 << 16] {
            let out = box_smooth(&field, radius);
            assert!(out.values().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn engine_output_matches_working_size() {
        let mut rng = StdRng::seed_from_u64(9);
        let rgba = RgbaImage::from_fn(21, 13, |_, _| Rgba([rng.gen(), rng.gen(), rng.gen(), 255]));
        let source = WorkingImage::from_rgba(rgba, 21, 13);
        let heatmap = ResidualEngine::default().render(&source, &ImageCrateCodec).unwrap();

        assert_eq!(heatmap.image.dimensions(), (21, 13));
        assert_eq!(heatmap.image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(heatmap.image.get_pixel(1, 6).0, [0, 0, 0, 255]);
        assert!(heatmap.stats.mean >= 0.0);
    }
}

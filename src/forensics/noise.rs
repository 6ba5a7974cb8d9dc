//! Local Noise Analysis.
//!
//! Sensor noise is roughly uniform across an authentic photo. Smoothed,
//! inpainted or pasted regions show up as blocks whose local standard
//! deviation breaks from their neighbours. Per-pixel variance is meaningless,
//! so the image is tiled into non-overlapping blocks (8x8 = 64 samples by
//! default) and each block is painted with a single intensity.

use image::{GrayImage, Rgba, RgbaImage};

use super::{
    AnalysisKind, ForensicError, Heatmap, HeatmapEngine, ImageCodec, ScalarField, WorkingImage,
};
use crate::config::NoiseConfig;

#[derive(Debug, Clone, Default)]
pub struct NoiseEngine {
    config: NoiseConfig,
}

impl NoiseEngine {
    pub fn new(config: NoiseConfig) -> Self {
        Self { config }
    }
}

impl HeatmapEngine for NoiseEngine {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Noise
    }

    fn render(
        &self,
        source: &WorkingImage,
        _codec: &dyn ImageCodec,
    ) -> Result<Heatmap, ForensicError> {
        let field = block_noise_field(source.gray(), self.config.block_size, self.config.gain);
        Ok(Heatmap {
            kind: AnalysisKind::Noise,
            image: render_green_tint(&field, self.config.tint_ratio),
            stats: field.stats(),
        })
    }
}

/// Block-wise `min(255, sqrt(variance) * gain)`, painted over each block.
///
/// Blocks at the right/bottom edge are truncated to the image bounds.
/// A zero `block_size` is treated as 1.
pub fn block_noise_field(gray: &GrayImage, block_size: u32, gain: f32) -> ScalarField {
    let (w, h) = gray.dimensions();
    let block = block_size.max(1);
    let mut field = ScalarField::new(w, h);

    for by in (0..h).step_by(block as usize) {
        let y_end = by.saturating_add(block).min(h);
        for bx in (0..w).step_by(block as usize) {
            let x_end = bx.saturating_add(block).min(w);

            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for y in by..y_end {
                for x in bx..x_end {
                    let val = gray.get_pixel(x, y).0[0] as f64;
                    sum += val;
                    sum_sq += val * val;
                }
            }

            let count = (x_end - bx) as f64 * (y_end - by) as f64;
            let mean = sum / count;
            let variance = (sum_sq / count) - (mean * mean);
            let intensity = ((variance.max(0.0).sqrt() as f32) * gain).min(255.0);

            for y in by..y_end {
                for x in bx..x_end {
                    field.set(x, y, intensity);
                }
            }
        }
    }
    field
}

/// Green carries the full intensity, red and blue `tint_ratio` of it.
pub fn render_green_tint(field: &ScalarField, tint_ratio: f32) -> RgbaImage {
    let mut out = RgbaImage::new(field.width(), field.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let v = field.get(x, y).clamp(0.0, 255.0);
        let tint = (v * tint_ratio) as u8;
        *pixel = Rgba([tint, v as u8, tint, 255]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forensics::ImageCrateCodec;
    use image::Luma;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn flat_image_has_zero_noise() {
        let gray = GrayImage::from_pixel(16, 16, Luma([200]));
        let field = block_noise_field(&gray, 8, 5.0);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn checkerboard_block_intensity() {
        // alternating 0/20 -> std dev 10 -> intensity 50
        let gray = GrayImage::from_fn(8, 8, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 20 }]));
        let field = block_noise_field(&gray, 8, 5.0);
        assert!((field.get(3, 3) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn intensity_clamped_at_255() {
        let gray = GrayImage::from_fn(8, 8, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]));
        let field = block_noise_field(&gray, 8, 5.0);
        assert_eq!(field.get(0, 0), 255.0);
    }

    #[test]
    fn interior_blocks_are_uniform() {
        let mut rng = StdRng::seed_from_u64(11);
        let rgba = RgbaImage::from_fn(40, 32, |_, _| Rgba([rng.gen(), rng.gen(), rng.gen(), 255]));
        let source = WorkingImage::from_rgba(rgba, 40, 32);
        let heatmap = NoiseEngine::default().render(&source, &ImageCrateCodec).unwrap();

        for by in (0..32).step_by(8) {
            for bx in (0..40).step_by(8) {
                let first = *heatmap.image.get_pixel(bx, by);
                for y in by..by + 8 {
                    for x in bx..bx + 8 {
                        assert_eq!(*heatmap.image.get_pixel(x, y), first, "block ({bx},{by})");
                    }
                }
            }
        }
    }

    #[test]
    fn partial_edge_blocks_are_truncated() {
        // 10x10 with 8px blocks: right/bottom blocks are 2 pixels wide/tall
        let gray =
            GrayImage::from_fn(10, 10, |x, _| Luma([if x >= 8 && x % 2 == 0 { 40 } else { 0 }]));
        let field = block_noise_field(&gray, 8, 1.0);
        // top-left block is flat
        assert_eq!(field.get(0, 0), 0.0);
        // right strip: columns 8 (40) and 9 (0) -> std dev 20
        assert!((field.get(9, 0) - 20.0).abs() < 1e-3);
        assert_eq!(field.get(8, 9), field.get(9, 0));
    }

    #[test]
    fn block_larger_than_image_covers_whole_image() {
        let gray = GrayImage::from_fn(6, 4, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 20 }]));
        let field = block_noise_field(&gray, u32::MAX, 5.0);
        assert!((field.get(0, 0) - 50.0).abs() < 1e-3);
        assert_eq!(field.get(5, 3), field.get(0, 0));
    }

    #[test]
    fn green_dominant_rendering() {
        let mut field = ScalarField::new(1, 1);
        field.set(0, 0, 100.0);
        let img = render_green_tint(&field, 0.2);
        assert_eq!(img.get_pixel(0, 0).0, [20, 100, 20, 255]);
    }
}

//! Error Level Analysis.
//!
//! The working image is re-encoded as JPEG and decoded back. Regions that
//! went through a single compression generation lose detail predictably;
//! spliced or retouched regions carry a different compression history and
//! show an anomalous error level against their surroundings.
//!
//! Visual contrast adapts per image: the display ceiling is a sampled
//! percentile of the difference field rather than its maximum, so a handful
//! of outlier pixels cannot wash out the rest of the map.

use image::RgbaImage;
use tracing::debug;

use super::colormap::{render_normalized, Colormap};
use super::{
    AnalysisKind, ForensicError, Heatmap, HeatmapEngine, ImageCodec, NormalizedField,
    ScalarField, WorkingImage,
};
use crate::config::ElaConfig;

#[derive(Debug, Clone, Default)]
pub struct ElaEngine {
    config: ElaConfig,
}

/// Intermediate ELA result, exposed for callers that want the numbers
/// rather than the picture.
#[derive(Debug, Clone)]
pub struct ElaField {
    pub difference: ScalarField,
    pub normalized: NormalizedField,
    /// `p98` (or the configured percentile) of the sampled difference.
    pub percentile_value: f32,
    pub scale: f32,
}

impl ElaEngine {
    pub fn new(config: ElaConfig) -> Self {
        Self { config }
    }

    /// Round-trip, diff and normalize without rendering.
    pub fn compute(
        &self,
        source: &WorkingImage,
        codec: &dyn ImageCodec,
    ) -> Result<ElaField, ForensicError> {
        let original = source.rgba();
        let compressed = codec.jpeg_round_trip(original, self.config.encoder_quality())?;
        if compressed.dimensions() != original.dimensions() {
            return Err(ForensicError::Encode(format!(
                "JPEG round trip changed dimensions: {:?} -> {:?}",
                original.dimensions(),
                compressed.dimensions()
            )));
        }

        let difference = difference_field(original, &compressed);
        let percentile_value =
            difference.sampled_percentile(self.config.max_samples, self.config.percentile);
        let scale = percentile_scale(percentile_value, &self.config);
        let normalized = difference.normalize(scale);

        Ok(ElaField {
            difference,
            normalized,
            percentile_value,
            scale,
        })
    }
}

impl HeatmapEngine for ElaEngine {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Ela
    }

    fn render(
        &self,
        source: &WorkingImage,
        codec: &dyn ImageCodec,
    ) -> Result<Heatmap, ForensicError> {
        let field = self.compute(source, codec)?;

        let mut stats = field.difference.stats();
        stats.normalization_scale = Some(field.scale);

        debug!(
            percentile = field.percentile_value,
            scale = field.scale,
            mean_diff = stats.mean,
            max_diff = stats.max,
            "ELA normalized"
        );

        Ok(Heatmap {
            kind: AnalysisKind::Ela,
            image: render_normalized(&field.normalized, Colormap::Thermal),
            stats,
        })
    }
}

/// Per-pixel mean absolute RGB difference: `(|dR| + |dG| + |dB|) / 3`.
///
/// Unweighted on purpose; the percentile calibration assumes it.
pub fn difference_field(original: &RgbaImage, compressed: &RgbaImage) -> ScalarField {
    let (w, h) = original.dimensions();
    let mut field = ScalarField::new(w, h);
    for (x, y, o) in original.enumerate_pixels() {
        let c = compressed.get_pixel(x, y);
        let sum: i32 = (0..3).map(|i| (o.0[i] as i32 - c.0[i] as i32).abs()).sum();
        field.set(x, y, sum as f32 / 3.0);
    }
    field
}

/// `255 / (percentile * multiplier)`, or the fixed fallback when the
/// percentile is zero (uniform or losslessly round-tripped images).
pub fn percentile_scale(percentile_value: f32, config: &ElaConfig) -> f32 {
    if percentile_value > 0.0 {
        255.0 / (percentile_value * config.contrast_multiplier)
    } else {
        config.fallback_scale
    }
}

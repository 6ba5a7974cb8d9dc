use std::ops::Range;

use base64::Engine;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// The four diagnostic analyses the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Error Level Analysis (JPEG recompression difference).
    Ela,
    /// Sobel gradient magnitude.
    Edge,
    /// Local Noise Analysis (block variance).
    Noise,
    /// Median Filter Residual density.
    Residual,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [Self::Ela, Self::Edge, Self::Noise, Self::Residual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ela => "ela",
            Self::Edge => "edge",
            Self::Noise => "noise",
            Self::Residual => "residual",
        }
    }
}

/// Per-pixel diagnostic intensity, one `f32` per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl ScalarField {
    /// Zero-filled field.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = self.index(x, y);
        self.values[idx] = value;
    }

    /// Mean and maximum over the whole field.
    pub fn stats(&self) -> FieldStats {
        if self.values.is_empty() {
            return FieldStats::default();
        }
        let mut sum = 0.0f64;
        let mut max = 0.0f32;
        for &v in &self.values {
            sum += v as f64;
            max = max.max(v);
        }
        FieldStats {
            mean: (sum / self.values.len() as f64) as f32,
            max,
            normalization_scale: None,
        }
    }

    /// Percentile estimate from at most `max_samples` evenly-strided values.
    ///
    /// Stride is `ceil(len / max_samples)`, starting at index 0, so the
    /// samples span the whole field. Returns 0.0 for an empty field.
    pub fn sampled_percentile(&self, max_samples: usize, percentile: f32) -> f32 {
        if self.values.is_empty() || max_samples == 0 {
            return 0.0;
        }
        let step = self.values.len().div_ceil(max_samples).max(1);
        let mut samples: Vec<f32> = self
            .values
            .iter()
            .step_by(step)
            .take(max_samples)
            .copied()
            .collect();
        samples.sort_by(f32::total_cmp);

        let idx = ((samples.len() as f32 * percentile) as usize).min(samples.len() - 1);
        samples[idx]
    }

    /// Rescale into [0, 1]: `clamp(v * scale, 0, 255) / 255`.
    pub fn normalize(&self, scale: f32) -> NormalizedField {
        let values = self
            .values
            .iter()
            .map(|&v| {
                let scaled = v * scale;
                // NaN fails both comparisons in clamp's contract; map it to 0
                if scaled.is_nan() {
                    0.0
                } else {
                    scaled.clamp(0.0, 255.0) / 255.0
                }
            })
            .collect();
        NormalizedField {
            width: self.width,
            height: self.height,
            values,
        }
    }
}

/// A `ScalarField` rescaled into [0, 1], ready for colormap lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl NormalizedField {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Mean over a rectangle, clipped to the field. Empty rectangle = 0.
    pub fn mean_in(&self, xs: Range<u32>, ys: Range<u32>) -> f32 {
        let xs = xs.start.min(self.width)..xs.end.min(self.width);
        let ys = ys.start.min(self.height)..ys.end.min(self.height);
        let mut sum = 0.0f64;
        let mut count = 0u64;
        for y in ys {
            for x in xs.clone() {
                sum += self.get(x, y) as f64;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            (sum / count as f64) as f32
        }
    }
}

/// Summary of an engine's scalar field before rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub mean: f32,
    pub max: f32,
    /// Scale applied before colormap lookup (ELA only).
    pub normalization_scale: Option<f32>,
}

/// Rendered engine output, not yet encoded.
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub kind: AnalysisKind,
    pub image: RgbaImage,
    pub stats: FieldStats,
}

/// PNG-encoded heatmap handed to the UI/report layer.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapOutput {
    pub kind: AnalysisKind,
    pub width: u32,
    pub height: u32,
    pub stats: FieldStats,
    #[serde(skip)]
    pub png_bytes: Vec<u8>,
}

impl HeatmapOutput {
    /// `data:` URL for embedding in HTML/JSON transport.
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png_bytes)
        )
    }
}

/// Result of one analysis invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Base64 SHA-256 of the input bytes. `None` for pre-decoded bitmaps.
    pub input_digest: Option<String>,
    pub original_width: u32,
    pub original_height: u32,
    pub working_width: u32,
    pub working_height: u32,
    pub analyzed_at: DateTime<Utc>,
    pub heatmaps: Vec<HeatmapOutput>,
}

impl AnalysisReport {
    pub fn heatmap(&self, kind: AnalysisKind) -> Option<&HeatmapOutput> {
        self.heatmaps.iter().find(|h| h.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_from(width: u32, height: u32, values: &[f32]) -> ScalarField {
        let mut field = ScalarField::new(width, height);
        for (i, &v) in values.iter().enumerate() {
            field.set(i as u32 % width, i as u32 / width, v);
        }
        field
    }

    #[test]
    fn new_field_is_zeroed() {
        let field = ScalarField::new(4, 3);
        assert_eq!(field.values().len(), 12);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn stats_mean_and_max() {
        let field = field_from(2, 2, &[0.0, 2.0, 4.0, 6.0]);
        let stats = field.stats();
        assert!((stats.mean - 3.0).abs() < 1e-6);
        assert_eq!(stats.max, 6.0);
        assert!(stats.normalization_scale.is_none());
    }

    #[test]
    fn percentile_of_zero_field_is_zero() {
        let field = ScalarField::new(64, 64);
        assert_eq!(field.sampled_percentile(2000, 0.98), 0.0);
    }

    #[test]
    fn percentile_small_field_uses_every_value() {
        let values: Vec<f32> = (0..100).map(|v| v as f32).collect();
        let field = field_from(10, 10, &values);
        // floor(100 * 0.98) = 98
        assert_eq!(field.sampled_percentile(2000, 0.98), 98.0);
        assert_eq!(field.sampled_percentile(2000, 1.0), 99.0);
    }

    #[test]
    fn percentile_respects_sample_cap() {
        // 10_000 values, cap 2000 -> stride 5 -> samples 0,5,...,9995
        let values: Vec<f32> = (0..10_000).map(|v| v as f32).collect();
        let field = field_from(100, 100, &values);
        // sample index floor(2000 * 0.5) = 1000 -> value 5000
        assert_eq!(field.sampled_percentile(2000, 0.5), 5000.0);
    }

    #[test]
    fn percentile_sees_error_confined_to_bottom_rows() {
        // 3000 values: stride 2 keeps 1500 samples reaching the last row
        let mut field = ScalarField::new(60, 50);
        for y in 34..50 {
            for x in 0..60 {
                field.set(x, y, 40.0);
            }
        }
        assert_eq!(field.sampled_percentile(2000, 0.98), 40.0);
    }

    #[test]
    fn percentile_samples_reach_last_value() {
        // 2001 values -> stride 2 -> samples 0, 2, ..., 2000
        let values: Vec<f32> = (0..2001).map(|v| v as f32).collect();
        let field = field_from(2001, 1, &values);
        assert_eq!(field.sampled_percentile(2000, 1.0), 2000.0);
    }

    #[test]
    fn normalize_clamps_into_unit_range() {
        let field = field_from(3, 1, &[0.0, 1.0, 100.0]);
        let norm = field.normalize(10.0);
        assert_eq!(norm.get(0, 0), 0.0);
        assert!((norm.get(1, 0) - 10.0 / 255.0).abs() < 1e-6);
        assert_eq!(norm.get(2, 0), 1.0);
    }

    #[test]
    fn normalize_nan_scale_maps_to_zero() {
        let field = field_from(1, 1, &[0.0]);
        let norm = field.normalize(f32::INFINITY);
        assert_eq!(norm.get(0, 0), 0.0);
    }

    #[test]
    fn mean_in_clips_rectangle() {
        let field = field_from(2, 2, &[0.0, 255.0, 255.0, 255.0]).normalize(1.0);
        assert!((field.mean_in(0..2, 0..2) - 0.75).abs() < 1e-6);
        assert_eq!(field.mean_in(1..10, 1..10), 1.0);
        assert_eq!(field.mean_in(5..6, 0..1), 0.0);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&AnalysisKind::Residual).unwrap();
        assert_eq!(json, "\"residual\"");
        assert_eq!(AnalysisKind::Ela.as_str(), "ela");
    }

    #[test]
    fn data_url_has_png_prefix() {
        let output = HeatmapOutput {
            kind: AnalysisKind::Edge,
            width: 1,
            height: 1,
            stats: FieldStats::default(),
            png_bytes: vec![0x89, b'P', b'N', b'G'],
        };
        assert_eq!(output.data_url(), "data:image/png;base64,iVBORw==");
    }
}

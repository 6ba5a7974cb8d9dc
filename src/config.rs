//! Tuned constants and the runtime configuration for the forensic pipeline.
//!
//! Every knob has a compile-time default below. `ForensicConfig` carries them
//! so callers (and tests) can swap presets without touching engine code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::forensics::ForensicError;

/// Application-level constants
pub const APP_NAME: &str = "Pixelproof";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ═══════════════════════════════════════════════════════════
// Defaults
// ═══════════════════════════════════════════════════════════

/// Working-resolution cap. Trades fidelity for speed; all engines share it.
pub const PROCESSING_MAX_DIM: u32 = 512;

/// Cap used by the `preview()` preset and by callers retrying after an
/// encode failure.
pub const PREVIEW_MAX_DIM: u32 = 256;

/// Maximum input size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_INPUT_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// ELA re-encode quality on the 0..=1 scale.
pub const ELA_JPEG_QUALITY: f32 = 0.90;

/// Percentile of the sampled ELA difference used as the display ceiling.
pub const ELA_PERCENTILE: f32 = 0.98;

/// Headroom above the percentile so the brightest regions don't all clip.
pub const ELA_CONTRAST_MULTIPLIER: f32 = 1.2;

/// Scale applied when the sampled percentile is zero (uniform images).
pub const ELA_FALLBACK_SCALE: f32 = 50.0;

/// Upper bound on values sampled for the percentile estimate.
pub const ELA_MAX_SAMPLES: usize = 2000;

/// LNA block edge in pixels. 8x8 = 64 samples per variance estimate.
pub const LNA_BLOCK_SIZE: u32 = 8;

/// LNA standard-deviation gain before clamping to 255.
pub const LNA_GAIN: f32 = 5.0;

/// Red/blue share of the LNA intensity (green carries the full value).
pub const LNA_TINT_RATIO: f32 = 0.2;

/// MFR residual gain: `|center - median| * gain`.
pub const MFR_RESIDUAL_GAIN: f32 = 10.0;

/// MFR box-smoothing radius (2 = 5x5 window).
pub const MFR_SMOOTHING_RADIUS: u32 = 2;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,pixelproof_lib=debug"
}

// ═══════════════════════════════════════════════════════════
// Configuration types (separated by concern)
// ═══════════════════════════════════════════════════════════

/// Resize filter quality levels for the working-resolution downscale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// CatmullRom. Sharper, slower.
    High,
    /// Triangle (bilinear). Close to a browser canvas downscale.
    Fast,
}

/// Error Level Analysis tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElaConfig {
    /// JPEG quality in (0, 1].
    pub jpeg_quality: f32,
    /// Percentile in (0, 1] used for contrast scaling.
    pub percentile: f32,
    pub contrast_multiplier: f32,
    pub fallback_scale: f32,
    pub max_samples: usize,
}

impl Default for ElaConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: ELA_JPEG_QUALITY,
            percentile: ELA_PERCENTILE,
            contrast_multiplier: ELA_CONTRAST_MULTIPLIER,
            fallback_scale: ELA_FALLBACK_SCALE,
            max_samples: ELA_MAX_SAMPLES,
        }
    }
}

impl ElaConfig {
    /// JPEG quality on the encoder's 1..=100 scale.
    pub fn encoder_quality(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Local Noise Analysis tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub block_size: u32,
    pub gain: f32,
    pub tint_ratio: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            block_size: LNA_BLOCK_SIZE,
            gain: LNA_GAIN,
            tint_ratio: LNA_TINT_RATIO,
        }
    }
}

/// Median Filter Residual tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualConfig {
    pub gain: f32,
    pub smoothing_radius: u32,
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            gain: MFR_RESIDUAL_GAIN,
            smoothing_radius: MFR_SMOOTHING_RADIUS,
        }
    }
}

/// Full pipeline configuration. Missing JSON fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicConfig {
    /// Working-resolution cap (longest edge, pixels).
    pub max_dimension: u32,
    pub resize_quality: ResizeQuality,
    pub max_input_bytes: usize,
    /// Rotate/flip by the EXIF orientation tag before analysis.
    pub apply_exif_orientation: bool,
    pub ela: ElaConfig,
    pub noise: NoiseConfig,
    pub residual: ResidualConfig,
}

impl Default for ForensicConfig {
    fn default() -> Self {
        Self {
            max_dimension: PROCESSING_MAX_DIM,
            resize_quality: ResizeQuality::Fast,
            max_input_bytes: MAX_INPUT_BYTES,
            apply_exif_orientation: true,
            ela: ElaConfig::default(),
            noise: NoiseConfig::default(),
            residual: ResidualConfig::default(),
        }
    }
}

impl ForensicConfig {
    /// Smaller working resolution for thumbnails and encode-failure retries.
    pub fn preview() -> Self {
        Self {
            max_dimension: PREVIEW_MAX_DIM,
            ..Self::default()
        }
    }

    /// Parse a JSON document, then validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ForensicError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ForensicError::Config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, ForensicError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ForensicError> {
        if self.max_dimension == 0 {
            return Err(ForensicError::Config("max_dimension must be > 0".into()));
        }
        if self.max_input_bytes == 0 {
            return Err(ForensicError::Config("max_input_bytes must be > 0".into()));
        }
        if !(self.ela.jpeg_quality > 0.0 && self.ela.jpeg_quality <= 1.0) {
            return Err(ForensicError::Config(format!(
                "ela.jpeg_quality must be in (0, 1], got {}",
                self.ela.jpeg_quality
            )));
        }
        if !(self.ela.percentile > 0.0 && self.ela.percentile <= 1.0) {
            return Err(ForensicError::Config(format!(
                "ela.percentile must be in (0, 1], got {}",
                self.ela.percentile
            )));
        }
        if !(self.ela.contrast_multiplier > 0.0) || !(self.ela.fallback_scale > 0.0) {
            return Err(ForensicError::Config(
                "ela.contrast_multiplier and ela.fallback_scale must be > 0".into(),
            ));
        }
        if self.ela.max_samples == 0 {
            return Err(ForensicError::Config("ela.max_samples must be > 0".into()));
        }
        if self.noise.block_size == 0 {
            return Err(ForensicError::Config("noise.block_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.noise.tint_ratio) {
            return Err(ForensicError::Config(format!(
                "noise.tint_ratio must be in [0, 1], got {}",
                self.noise.tint_ratio
            )));
        }
        if self.noise.block_size > self.max_dimension {
            return Err(ForensicError::Config(format!(
                "noise.block_size must be <= max_dimension ({}), got {}",
                self.max_dimension, self.noise.block_size
            )));
        }
        if self.residual.smoothing_radius > self.max_dimension {
            return Err(ForensicError::Config(format!(
                "residual.smoothing_radius must be <= max_dimension ({}), got {}",
                self.max_dimension, self.residual.smoothing_radius
            )));
        }
        if self.noise.gain < 0.0 || self.residual.gain < 0.0 {
            return Err(ForensicError::Config("gains must be non-negative".into()));
        }
        Ok(())
    }
}

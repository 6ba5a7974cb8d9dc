//! Pixelproof: forensic heatmaps for tamper review.
//!
//! Given an image, the pipeline produces up to four diagnostic heatmaps at a
//! shared working resolution:
//!
//! - **ELA**: JPEG recompression error, percentile-normalized, thermal colormap
//! - **Edge**: Sobel gradient magnitude
//! - **Noise**: 8x8 block standard deviation (LNA)
//! - **Residual**: smoothed 3x3 median-filter residual (MFR)
//!
//! ```no_run
//! use pixelproof_lib::forensics::ForensicPipeline;
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let report = ForensicPipeline::standard().analyze(&bytes)?;
//! for heatmap in &report.heatmaps {
//!     std::fs::write(format!("{}.png", heatmap.kind.as_str()), &heatmap.png_bytes)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod forensics;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honouring `RUST_LOG`, falling back to
/// `config::default_log_filter()`. Call once from a binary's `main`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

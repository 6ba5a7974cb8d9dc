pub mod types;
pub mod codec;
pub mod source;
pub mod grayscale;
pub mod colormap;
pub mod ela;
pub mod edge;
pub mod noise;
pub mod residual;
pub mod orchestrator;

pub use types::*;
pub use codec::*;
pub use source::*;
pub use grayscale::*;
pub use colormap::*;
pub use ela::*;
pub use edge::*;
pub use noise::*;
pub use residual::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Image encode failed: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

/// One analysis engine: reads the shared working image, owns its output.
///
/// Engines never mutate the `WorkingImage`, so any number of them may run
/// on separate threads over the same source.
pub trait HeatmapEngine: Send + Sync {
    /// Which analysis this engine produces.
    fn kind(&self) -> AnalysisKind;

    /// Compute the engine's field and render it as an RGBA heatmap at the
    /// working resolution. `codec` is only needed by engines that re-encode.
    fn render(
        &self,
        source: &WorkingImage,
        codec: &dyn ImageCodec,
    ) -> Result<Heatmap, ForensicError>;
}

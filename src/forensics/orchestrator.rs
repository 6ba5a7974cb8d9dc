//! Forensic pipeline orchestrator.
//!
//! Pipeline flow:
//! 1. Validate + decode the input (`PixelBufferSource`)
//! 2. Downscale to the working resolution, derive grayscale
//! 3. Run each requested `HeatmapEngine` over the shared working image
//! 4. PNG-encode every heatmap and collect an `AnalysisReport`
//!
//! Engines only read the working image, so `analyze_concurrent` can fan
//! them out over tokio's blocking pool without any locking.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use chrono::Utc;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{
    AnalysisKind, AnalysisReport, EdgeEngine, ElaEngine, ForensicError, Heatmap, HeatmapEngine,
    HeatmapOutput, ImageCodec, ImageCrateCodec, NoiseEngine, PixelBufferSource, ResidualEngine,
    WorkingImage,
};
use crate::config::ForensicConfig;

/// Composes the codec and the engines into the "image in, heatmaps out"
/// capability exposed to the UI/report layer.
pub struct ForensicPipeline {
    config: ForensicConfig,
    codec: Box<dyn ImageCodec>,
    engines: Vec<Box<dyn HeatmapEngine>>,
}

impl ForensicPipeline {
    /// Pipeline with all four engines. Fails on invalid configuration.
    pub fn new(config: ForensicConfig, codec: Box<dyn ImageCodec>) -> Result<Self, ForensicError> {
        config.validate()?;
        let engines = default_engines(&config);
        Ok(Self {
            config,
            codec,
            engines,
        })
    }

    /// Default configuration with the `image`-crate codec.
    pub fn standard() -> Self {
        let config = ForensicConfig::default();
        Self {
            engines: default_engines(&config),
            config,
            codec: Box::new(ImageCrateCodec),
        }
    }

    /// Replace the engine set (e.g. ELA only for a quick scan).
    pub fn with_engines(mut self, engines: Vec<Box<dyn HeatmapEngine>>) -> Self {
        self.engines = engines;
        self
    }

    pub fn config(&self) -> &ForensicConfig {
        &self.config
    }

    pub fn engine_kinds(&self) -> Vec<AnalysisKind> {
        self.engines.iter().map(|e| e.kind()).collect()
    }

    /// Decode and downscale without running any engine.
    pub fn prepare(&self, bytes: &[u8]) -> Result<WorkingImage, ForensicError> {
        PixelBufferSource::new(self.codec.as_ref(), &self.config).load(bytes)
    }

    /// Run every configured engine, sequentially.
    pub fn analyze(&self, bytes: &[u8]) -> Result<AnalysisReport, ForensicError> {
        let working = self.prepare(bytes)?;
        let heatmaps = self.render_engines(&working, self.engines.iter())?;
        Ok(self.build_report(Some(digest(bytes)), &working, heatmaps))
    }

    /// Run only the requested analyses, in the requested order.
    pub fn analyze_kinds(
        &self,
        bytes: &[u8],
        kinds: &[AnalysisKind],
    ) -> Result<AnalysisReport, ForensicError> {
        let working = self.prepare(bytes)?;
        let heatmaps = self.render_engines(&working, self.select(kinds))?;
        Ok(self.build_report(Some(digest(bytes)), &working, heatmaps))
    }

    /// Analyse a bitmap the caller already decoded. No EXIF handling and no
    /// input digest.
    pub fn analyze_image(&self, img: &DynamicImage) -> Result<AnalysisReport, ForensicError> {
        let working = PixelBufferSource::new(self.codec.as_ref(), &self.config).from_dynamic(img)?;
        let heatmaps = self.render_engines(&working, self.engines.iter())?;
        Ok(self.build_report(None, &working, heatmaps))
    }

    /// Read an image file and analyse it.
    pub fn analyze_path(&self, path: &Path) -> Result<AnalysisReport, ForensicError> {
        let bytes = std::fs::read(path)?;
        self.analyze(&bytes)
    }

    /// Run every engine on its own blocking worker.
    ///
    /// Output order matches engine order, so the report is identical to
    /// `analyze` for the same input. A panicking engine surfaces as
    /// `ForensicError::Worker`.
    pub async fn analyze_concurrent(
        self: Arc<Self>,
        bytes: Vec<u8>,
    ) -> Result<AnalysisReport, ForensicError> {
        let prep = Arc::clone(&self);
        let (working, input_digest) = tokio::task::spawn_blocking(move || {
            let working = prep.prepare(&bytes)?;
            Ok::<_, ForensicError>((working, digest(&bytes)))
        })
        .await
        .map_err(|e| ForensicError::Worker(format!("Preparation task failed: {e}")))??;
        let working = Arc::new(working);

        let handles: Vec<_> = (0..self.engines.len())
            .map(|idx| {
                let pipeline = Arc::clone(&self);
                let working = Arc::clone(&working);
                tokio::task::spawn_blocking(move || pipeline.run_engine(idx, &working))
            })
            .collect();

        // Every worker is awaited; the first failure in engine order is returned.
        let mut heatmaps = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| ForensicError::Worker(format!("Engine task failed: {e}")))
                .and_then(|output| output);
            match result {
                Ok(output) => heatmaps.push(output),
                Err(e) => {
                    warn!(error = %e, "Heatmap engine failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(self.build_report(Some(input_digest), &working, heatmaps))
    }

    fn select<'a>(
        &'a self,
        kinds: &'a [AnalysisKind],
    ) -> impl Iterator<Item = &'a Box<dyn HeatmapEngine>> + 'a {
        kinds.iter().filter_map(move |kind| {
            let engine = self.engines.iter().find(|e| e.kind() == *kind);
            if engine.is_none() {
                warn!(kind = kind.as_str(), "No engine configured for analysis, skipping");
            }
            engine
        })
    }

    fn render_engines<'a>(
        &self,
        working: &WorkingImage,
        engines: impl Iterator<Item = &'a Box<dyn HeatmapEngine>>,
    ) -> Result<Vec<HeatmapOutput>, ForensicError> {
        engines
            .map(|engine| self.render_one(engine.as_ref(), working))
            .collect()
    }

    fn run_engine(
        &self,
        idx: usize,
        working: &WorkingImage,
    ) -> Result<HeatmapOutput, ForensicError> {
        self.render_one(self.engines[idx].as_ref(), working)
    }

    fn render_one(
        &self,
        engine: &dyn HeatmapEngine,
        working: &WorkingImage,
    ) -> Result<HeatmapOutput, ForensicError> {
        let started = Instant::now();
        let heatmap = engine.render(working, self.codec.as_ref())?;
        let output = self.encode(heatmap)?;

        debug!(
            kind = output.kind.as_str(),
            size = format!("{}x{}", output.width, output.height),
            pixels = working.resolution().pixel_count(),
            png_size = output.png_bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Heatmap rendered"
        );
        Ok(output)
    }

    fn encode(&self, heatmap: Heatmap) -> Result<HeatmapOutput, ForensicError> {
        let png_bytes = self.codec.encode_png(&heatmap.image)?;
        Ok(HeatmapOutput {
            kind: heatmap.kind,
            width: heatmap.image.width(),
            height: heatmap.image.height(),
            stats: heatmap.stats,
            png_bytes,
        })
    }

    fn build_report(
        &self,
        input_digest: Option<String>,
        working: &WorkingImage,
        heatmaps: Vec<HeatmapOutput>,
    ) -> AnalysisReport {
        let (original_width, original_height) = working.original_dimensions();
        let res = working.resolution();
        AnalysisReport {
            input_digest,
            original_width,
            original_height,
            working_width: res.width,
            working_height: res.height,
            analyzed_at: Utc::now(),
            heatmaps,
        }
    }
}

/// ELA, edge, noise and residual engines, in that order.
pub fn default_engines(config: &ForensicConfig) -> Vec<Box<dyn HeatmapEngine>> {
    vec![
        Box::new(ElaEngine::new(config.ela.clone())),
        Box::new(EdgeEngine),
        Box::new(NoiseEngine::new(config.noise.clone())),
        Box::new(ResidualEngine::new(config.residual.clone())),
    ]
}

/// Base64 SHA-256 of the input bytes.
fn digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

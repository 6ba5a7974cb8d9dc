//! Analyse one image and write every heatmap next to a JSON report.
//!
//! Usage: cargo run --example analyze_image -- <image> [output-dir] [config.json]

use std::path::PathBuf;
use std::sync::Arc;

use pixelproof_lib::config::{ForensicConfig, APP_NAME, APP_VERSION};
use pixelproof_lib::forensics::{ForensicPipeline, ImageCrateCodec};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pixelproof_lib::init_tracing();

    let mut args = std::env::args().skip(1);
    let input = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: analyze_image <image> [output-dir] [config.json]");
            std::process::exit(2);
        }
    };
    let out_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let config = match args.next() {
        Some(path) => ForensicConfig::from_json_file(&PathBuf::from(path))?,
        None => ForensicConfig::default(),
    };

    tracing::info!("{APP_NAME} v{APP_VERSION} analysing {}", input.display());

    let bytes = std::fs::read(&input)?;
    let pipeline = Arc::new(ForensicPipeline::new(config, Box::new(ImageCrateCodec))?);
    let report = pipeline.analyze_concurrent(bytes).await?;

    std::fs::create_dir_all(&out_dir)?;
    for heatmap in &report.heatmaps {
        let path = out_dir.join(format!("{}.png", heatmap.kind.as_str()));
        std::fs::write(&path, &heatmap.png_bytes)?;
        tracing::info!(
            kind = heatmap.kind.as_str(),
            mean = heatmap.stats.mean,
            max = heatmap.stats.max,
            "Wrote {}",
            path.display()
        );
    }
    std::fs::write(out_dir.join("report.json"), serde_json::to_string_pretty(&report)?)?;

    Ok(())
}

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use layercap::{CaptureConfig, Viewport};

/// Capture a rendered document as a layout tree plus isolated images
#[derive(Debug, Parser)]
#[command(name = "layercap", version, about)]
#[command(group(ArgGroup::new("scale").args(["pixel_ratio", "physical_width"])))]
struct Args {
    /// URL or file path of the document
    document: String,

    /// Logical viewport width in CSS pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Logical viewport height in CSS pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Device pixel ratio
    #[arg(long)]
    pixel_ratio: Option<f64>,

    /// Output width in device pixels; derives the pixel ratio
    #[arg(long)]
    physical_width: Option<u32>,

    /// CSS selector of the capture root
    #[arg(long = "root", value_name = "SELECTOR")]
    root_selector: Option<String>,

    /// Output directory
    #[arg(long, value_name = "DIR", default_value = "layercap-out")]
    out: PathBuf,

    /// Also write the analysis, plan, trace and validation dumps
    #[arg(long)]
    debug: bool,

    /// Session timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> CaptureConfig {
        CaptureConfig {
            document: self.document,
            viewport: Viewport {
                width: self.width,
                height: self.height,
            },
            pixel_ratio: self.pixel_ratio,
            physical_width: self.physical_width,
            root_selector: self.root_selector,
            debug: self.debug,
            output_dir: self.out,
            timeout_ms: self.timeout_ms,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    let report = layercap::pipeline::capture(&config)
        .with_context(|| format!("Capturing {} failed", config.document))?;

    println!(
        "{}: {} nodes, {} images ({} vanished, {} failed) -> {}",
        report.summary.source,
        report.summary.node_count,
        report.summary.captured,
        report.summary.vanished,
        report.summary.failed,
        config.output_dir.display()
    );
    Ok(())
}

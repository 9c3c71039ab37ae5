use anyhow::{bail, Context, Result};
use clap::Parser;
use facesweep_core::{OnnxFaceEncoder, Session, SessionOptions};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

/// Find every photo of a person in a folder and move the ones you pick
/// into `<folder>/removed_faces`.
///
/// Paths not given as flags are asked for interactively.
#[derive(Parser, Debug)]
#[command(name = "facesweep", version, about)]
struct Cli {
    /// Image containing the face to look for
    #[arg(long)]
    target: Option<PathBuf>,

    /// Folder to scan recursively
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Maximum face distance counted as a match (lower = stricter) [env: FACESWEEP_TOLERANCE]
    #[arg(long)]
    tolerance: Option<f32>,

    /// Directory holding det_10g.onnx and w600k_r50.onnx [env: FACESWEEP_MODEL_DIR]
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    config.tolerance = check_tolerance(config.tolerance)?;
    tracing::debug!(?config, "configuration");

    let mut encoder = OnnxFaceEncoder::load(&config.model_dir, config.detection_threshold)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;

    let options = SessionOptions {
        target: cli.target,
        folder: cli.folder,
        tolerance: config.tolerance,
    };
    let summary = Session::new(&mut encoder, io::stdin().lock(), io::stdout(), options).run()?;

    if let Some(path) = cli.report {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}

/// Any finite tolerance is accepted; zero or below simply never matches.
fn check_tolerance(tolerance: f32) -> Result<f32> {
    if !tolerance.is_finite() {
        bail!("tolerance must be a finite number, got {tolerance}");
    }
    Ok(tolerance)
}

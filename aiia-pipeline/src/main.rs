//! aiia - AI image analysis pipeline CLI
//!
//! Curates a photo directory by image quality, classifies the survivors
//! with vision-language backends and writes ratings and tags as XMP
//! sidecars or embedded metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aiia_common::events::{ProgressEvent, ProgressSink};
use aiia_common::models::{ProcessingResult, ScoreScale};
use aiia_common::taxonomy::PERSONAS;
use aiia_pipeline::config::{BackendKind, MetadataMode, PipelineConfig};
use aiia_pipeline::report::write_csv_report;
use aiia_pipeline::WorkflowOrchestrator;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for aiia
#[derive(Parser, Debug)]
#[command(name = "aiia")]
#[command(about = "Curate, analyze and tag photographs")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "AIIA_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging for the pipeline crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Curate, analyze and persist a directory
    Process {
        directory: PathBuf,

        /// Analyze every image, skipping curation
        #[arg(long)]
        archive: bool,

        /// Write a CSV report of per-image results
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Analyze and persist one image
    Image {
        path: PathBuf,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Analyze and persist every image listed in a file, one path per line
    Batch {
        #[arg(long, value_name = "FILE")]
        images: PathBuf,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// List available personas
    Personas,
}

/// Per-run overrides layered over the config file
#[derive(Args, Debug)]
struct ConfigOverrides {
    /// Fraction of scored images kept, in (0, 1]
    #[arg(long, value_name = "FRACTION")]
    threshold: Option<f64>,

    /// IQA metric (brisque, niqe, musiq, sharpness, heuristic, ...)
    #[arg(long)]
    iqa: Option<String>,

    /// Backend priority; repeat for a fallback chain (ollama, gemini)
    #[arg(long = "backend", value_parser = parse_backend)]
    backends: Vec<BackendKind>,

    /// Ollama model name
    #[arg(long)]
    ollama_model: Option<String>,

    /// Ollama server URL
    #[arg(long)]
    ollama_url: Option<String>,

    /// Gemini model name
    #[arg(long)]
    gemini_model: Option<String>,

    /// Persona key (see `aiia personas`)
    #[arg(long)]
    persona: Option<String>,

    /// Vocabulary: photography or classic
    #[arg(long)]
    taxonomy: Option<String>,

    /// Score on a 1-5 scale instead of 1-10
    #[arg(long)]
    five_point: bool,

    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// Embed metadata with exiftool instead of writing XMP sidecars
    #[arg(long)]
    embedded: bool,

    /// Request a critique for every image
    #[arg(long)]
    gallery_critique: bool,

    /// Keep critiques at or below this score when gallery critique is off
    #[arg(long, value_name = "SCORE")]
    critique_threshold: Option<u8>,

    /// pyiqa command used for ML quality metrics
    #[arg(long, value_name = "COMMAND")]
    iqa_command: Option<String>,

    /// Longest edge of the image sent to backends
    #[arg(long, value_name = "PIXELS")]
    max_dimension: Option<u32>,

    /// JPEG quality of the image sent to backends
    #[arg(long, value_name = "1-100")]
    jpeg_quality: Option<u8>,

    /// exiftool binary for embedded mode
    #[arg(long, value_name = "PATH", env = "AIIA_EXIFTOOL")]
    exiftool: Option<String>,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    BackendKind::parse(value).ok_or_else(|| format!("unknown backend '{}' (expected ollama or gemini)", value))
}

impl ConfigOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(threshold) = self.threshold {
            config.quality_threshold = threshold;
        }
        if let Some(iqa) = self.iqa {
            config.iqa_metric = iqa;
        }
        if !self.backends.is_empty() {
            config.backends = self.backends;
        }
        if let Some(model) = self.ollama_model {
            config.ollama.model = model;
        }
        if let Some(url) = self.ollama_url {
            config.ollama.url = url;
        }
        if let Some(model) = self.gemini_model {
            config.gemini.model = model;
        }
        if let Some(persona) = self.persona {
            config.persona = persona;
        }
        if let Some(taxonomy) = self.taxonomy {
            config.taxonomy = taxonomy;
        }
        if self.five_point {
            config.score_scale = ScoreScale::FivePoint;
        }
        if self.no_recursive {
            config.recursive = false;
        }
        if self.embedded {
            config.metadata_mode = MetadataMode::Embedded;
        }
        if self.gallery_critique {
            config.gallery_critique = true;
        }
        if let Some(threshold) = self.critique_threshold {
            config.critique_threshold = threshold;
        }
        if let Some(command) = self.iqa_command {
            config.iqa_command = command;
        }
        if let Some(max) = self.max_dimension {
            config.max_image_dimension = max;
        }
        if let Some(quality) = self.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if let Some(path) = self.exiftool {
            config.exiftool_path = path;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "aiia=debug,aiia_pipeline=debug,aiia_common=debug"
    } else {
        "aiia=info,aiia_pipeline=info,aiia_common=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Personas => {
            for persona in PERSONAS {
                println!("{:<32} {}", persona.key, persona.name);
            }
            Ok(())
        }
        Command::Process {
            directory,
            archive,
            csv,
            overrides,
        } => {
            let orchestrator = build_orchestrator(cli.config.as_deref(), overrides)?;
            run_directory(orchestrator, directory, archive, csv).await
        }
        Command::Image { path, overrides } => {
            let orchestrator = build_orchestrator(cli.config.as_deref(), overrides)?;
            let result = orchestrator.process_single_image(&path).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                bail!(result.error.unwrap_or_else(|| "Processing failed".to_string()));
            }
            Ok(())
        }
        Command::Batch { images, overrides } => {
            let orchestrator = build_orchestrator(cli.config.as_deref(), overrides)?;
            run_batch(&orchestrator, &images).await
        }
    }
}

fn build_orchestrator(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Arc<WorkflowOrchestrator>> {
    let mut config = PipelineConfig::load(config_path).context("Failed to load configuration")?;
    overrides.apply(&mut config);
    let orchestrator = WorkflowOrchestrator::new(config).context("Invalid pipeline configuration")?;
    info!(ai_model = orchestrator.ai_model(), "Pipeline ready");
    Ok(Arc::new(orchestrator))
}

async fn run_directory(
    orchestrator: Arc<WorkflowOrchestrator>,
    directory: PathBuf,
    archive: bool,
    csv: Option<PathBuf>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current image...");
            ctrl_c_token.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let sink: Arc<dyn ProgressSink> = Arc::new(tx);
    let handle = orchestrator.spawn_directory_run(directory, archive, sink, cancel);

    let mut final_result: Option<ProcessingResult> = None;
    let mut failed = false;
    while let Some(event) = rx.recv().await {
        match event {
            ProgressEvent::Result(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                final_result = Some(*result);
            }
            ProgressEvent::Error => {
                println!("{}", event.to_line());
                failed = true;
            }
            other => println!("{}", other.to_line()),
        }
    }
    handle.await.context("Progress relay task failed")?;

    if failed {
        bail!("Pipeline run failed");
    }
    let Some(result) = final_result else {
        bail!("Pipeline finished without a result");
    };

    if let Some(csv) = csv {
        write_csv_report(&csv, &result.results)?;
        eprintln!("CSV report written to {}", csv.display());
    }

    if !result.success {
        bail!(result.error.unwrap_or_else(|| "Processing failed".to_string()));
    }
    Ok(())
}

async fn run_batch(orchestrator: &WorkflowOrchestrator, list_file: &Path) -> Result<()> {
    let list = std::fs::read_to_string(list_file)
        .with_context(|| format!("Failed to read image list {}", list_file.display()))?;

    let paths: Vec<PathBuf> = list
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();

    let total = paths.len();
    let (mut succeeded, mut skipped) = (0usize, 0usize);

    for (i, path) in paths.iter().enumerate() {
        if !path.is_file() {
            eprintln!("[{}/{}] Skipped, not found: {}", i + 1, total, path.display());
            skipped += 1;
            continue;
        }

        let result = orchestrator.process_single_image(path).await;
        if result.success {
            succeeded += 1;
            println!(
                "[{}/{}] OK {} (metadata written: {})",
                i + 1,
                total,
                path.display(),
                result.metadata_written
            );
        } else {
            println!(
                "[{}/{}] FAILED {}: {}",
                i + 1,
                total,
                path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("Batch complete: {} succeeded, {} skipped, {} total", succeeded, skipped, total);
    Ok(())
}

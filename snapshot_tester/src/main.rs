mod ingest;
mod sinks;
mod sources;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ingest::load_frame;
use serde_json::json;
use sinks::JsonLinesSink;
use sources::DirectorySource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use urban_vision::{
    AnalysisOptions, AnalyzerConfig, BatchAnalyzer, CameraPoller, OwnedFrame, PollerConfig, SceneAnalyzer,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs the urban_vision engine against snapshots on disk", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// JSON file overriding any subset of the default thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze image files and print one JSON result per image
    Analyze(AnalyzeArgs),
    /// Poll a directory of snapshots and append every result to a JSON-lines file
    Poll(PollArgs),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Images to analyze
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Worker count (defaults to one per logical CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    flags: AnalysisFlags,
}

#[derive(clap::Args, Debug)]
struct PollArgs {
    /// Directory of snapshots, replayed in name order
    dir: PathBuf,

    /// JSON-lines file the records are appended to
    #[arg(short, long, default_value = "analysis.jsonl")]
    output: PathBuf,

    /// Target interval between ticks
    #[arg(long, default_value_t = 2000)]
    period_ms: u64,

    /// Minimum pause between ticks
    #[arg(long, default_value_t = 200)]
    min_delay_ms: u64,

    /// Stop after this many persisted ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    #[command(flatten)]
    flags: AnalysisFlags,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct AnalysisFlags {
    /// Skip the vehicle breakdown
    #[arg(long)]
    no_vehicle: bool,

    /// Skip the crowd breakdown
    #[arg(long)]
    no_crowd: bool,

    /// Skip the air-quality estimate
    #[arg(long)]
    no_air_quality: bool,

    /// Skip the traffic estimate
    #[arg(long)]
    no_traffic: bool,

    /// Skip the lighting and weather estimate
    #[arg(long)]
    no_conditions: bool,

    /// Local hour (0-23) the snapshots were taken at
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    hour: Option<u8>,
}

impl AnalysisFlags {
    fn options(self) -> AnalysisOptions {
        AnalysisOptions {
            vehicle: !self.no_vehicle,
            crowd: !self.no_crowd,
            air_quality: !self.no_air_quality,
            traffic: !self.no_traffic,
            conditions: !self.no_conditions,
            hour_of_day: self.hour,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig> {
    match path {
        Some(path) => {
            let config = AnalyzerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            tracing::info!("Loaded threshold set {} from {}", config.version, path.display());
            Ok(config)
        }
        None => Ok(AnalyzerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Analyze(analyze) => run_analyze(config, analyze).await,
        Command::Poll(poll) => run_poll(config, poll).await,
    }
}

async fn run_analyze(config: AnalyzerConfig, args: AnalyzeArgs) -> Result<()> {
    // --- 1. Decode ---
    let mut frames: Vec<OwnedFrame> = Vec::new();
    let mut decoded: Vec<Result<usize, String>> = Vec::with_capacity(args.images.len());
    for path in &args.images {
        match load_frame(path) {
            Ok(frame) => {
                decoded.push(Ok(frames.len()));
                frames.push(frame);
            }
            Err(err) => {
                tracing::warn!("{err}");
                decoded.push(Err(err.to_string()));
            }
        }
    }

    // --- 2. Analyze ---
    let batch = match args.workers {
        Some(workers) => BatchAnalyzer::with_workers(config, workers),
        None => BatchAnalyzer::new(config),
    };
    tracing::info!("Analyzing {} image(s) on {} worker(s)", frames.len(), batch.worker_count());
    let started = Instant::now();
    let results = batch.analyze_all(frames, args.flags.options()).await;
    batch.shutdown().await;
    tracing::info!("Analysis finished in {:?}", started.elapsed());

    // --- 3. Report ---
    let mut failures = 0;
    for (path, outcome) in args.images.iter().zip(decoded) {
        let entry = match outcome.and_then(|idx| results[idx].clone().map_err(|err| err.to_string())) {
            Ok(components) => json!({ "image": path, "result": components }),
            Err(error) => {
                failures += 1;
                json!({ "image": path, "error": error })
            }
        };
        let line = if args.pretty {
            serde_json::to_string_pretty(&entry)?
        } else {
            serde_json::to_string(&entry)?
        };
        println!("{line}");
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} image(s) could not be analyzed", args.images.len());
    }
    Ok(())
}

async fn run_poll(config: AnalyzerConfig, args: PollArgs) -> Result<()> {
    let source = DirectorySource::open(&args.dir, args.flags.hour)
        .with_context(|| format!("Failed to read snapshot directory {}", args.dir.display()))?;
    anyhow::ensure!(!source.is_empty(), "No images found in {}", args.dir.display());
    tracing::info!("Replaying {} snapshot(s) from {}", source.len(), args.dir.display());

    let sink = JsonLinesSink::open(&args.output)
        .await
        .with_context(|| format!("Failed to open output file {}", args.output.display()))?;
    tracing::info!("Appending records to {}", sink.path().display());

    let poller = CameraPoller::new(
        Arc::new(source),
        Arc::new(sink),
        Arc::new(SceneAnalyzer::new(config)),
        PollerConfig {
            sample_period: Duration::from_millis(args.period_ms),
            min_delay: Duration::from_millis(args.min_delay_ms),
            options: args.flags.options(),
        },
    );

    let mut status = poller.subscribe();
    poller.start().await;

    let ticks_reached = async {
        match args.ticks {
            Some(ticks) => {
                let _ = status.wait_for(|s| s.ticks_completed >= ticks).await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ticks_reached => tracing::info!("Tick limit reached"),
        _ = deadline => tracing::info!("Time limit reached"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted");
        }
    }

    poller.stop().await;
    println!("{}", serde_json::to_string_pretty(&poller.status())?);
    Ok(())
}

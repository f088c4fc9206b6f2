//! logcast CLI entry point.
//!
//! Provides `rebuild`, `forecast`, `dashboard` and `sample` subcommands for
//! building the statistics snapshot, serving its derived views as JSON, and
//! taking a quick sampled look at the corpus.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use logcast::config::{self, Config};
use logcast::pipeline::{self, RebuildRequest};
use logcast::scanner::ScanMode;

/// logcast — syslog error statistics and failure forecasting.
#[derive(Parser)]
#[command(name = "logcast", version, about)]
struct Cli {
    /// Config file (default: ~/.logcast/config.toml; optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Scan every line of the corpus and rewrite the snapshot.
    Rebuild {
        /// Corpus root holding 01..12 month directories.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Snapshot output path.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write JSON logs with daily rotation into this directory.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Print the forecast timeline as JSON.
    Forecast {
        /// Snapshot to read.
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Number of top error types to forecast.
        #[arg(long)]
        top_n: Option<usize>,
        /// Days past now to forecast.
        #[arg(long)]
        horizon_days: Option<u32>,
        /// Maximum events per error type.
        #[arg(long)]
        max_events: Option<usize>,
        /// Hours spanned by the counted data.
        #[arg(long)]
        window_hours: Option<f64>,
    },
    /// Print monthly chart data as JSON.
    Dashboard {
        /// Snapshot to read.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Scan only the head of each file and print top types and daily counts.
    Sample {
        /// Corpus root holding 01..12 month directories.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Lines read per file.
        #[arg(long)]
        lines: Option<usize>,
        /// Number of top types to report.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Batch rebuilds may keep a JSON log file; everything else logs to stderr.
    let _logging_guard = match &cli.command {
        Command::Rebuild {
            log_dir: Some(dir), ..
        } => Some(logcast::logging::init_production(dir)?),
        _ => {
            logcast::logging::init_cli()?;
            None
        }
    };

    let config = load_cli_config(cli.config.as_deref())?;

    match cli.command {
        Command::Rebuild { root, output, .. } => handle_rebuild(&config, root, output).await,
        Command::Forecast {
            snapshot,
            top_n,
            horizon_days,
            max_events,
            window_hours,
        } => {
            let mut params = config.forecast_params();
            if let Some(n) = top_n {
                params.top_n = n;
            }
            if let Some(days) = horizon_days {
                params.horizon_days = days;
            }
            if let Some(max) = max_events {
                params.max_events_per_type = max;
            }
            if let Some(hours) = window_hours {
                anyhow::ensure!(
                    hours.is_finite() && hours > 0.0,
                    "--window-hours must be positive"
                );
                params.window_hours = hours;
            }
            let path = snapshot.unwrap_or(config.snapshot.path);
            let now = chrono::Local::now().naive_local();
            let response = pipeline::forecast_response(&path, &params, now)?;
            print_json(&response)
        }
        Command::Dashboard { snapshot } => {
            let path = snapshot.unwrap_or(config.snapshot.path);
            let view = pipeline::dashboard(&path)?;
            print_json(&view)
        }
        Command::Sample { root, lines, top } => {
            let mut config = config;
            if let Some(lines) = lines {
                anyhow::ensure!(lines >= 1, "--lines must be >= 1");
                config.scan.sample_lines = lines;
            }
            let root = root.unwrap_or_else(|| config.corpus.root_dir.clone());
            let options = config.scan_options(config.sampled_mode())?;
            let report = pipeline::sample(&root, &config.corpus.months, &options, top).await;
            print_json(&report)
        }
    }
}

/// Load the config named on the command line, or the default one if present.
///
/// An explicitly named file must exist; the default location is optional.
fn load_cli_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => config::load_config(path),
        None => config::load_or_default(&config::default_config_path()?),
    }
}

/// Rebuild the snapshot from the full corpus.
async fn handle_rebuild(
    config: &Config,
    root: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = RebuildRequest {
        root: root.unwrap_or_else(|| config.corpus.root_dir.clone()),
        output: output.unwrap_or_else(|| config.snapshot.path.clone()),
        months: config.corpus.months.clone(),
        scan: config.scan_options(ScanMode::Full)?,
        build: config.build_options()?,
    };

    let generated_at = chrono::Local::now().naive_local();
    let summary = pipeline::rebuild(&request, generated_at)
        .await
        .with_context(|| format!("failed to write snapshot to {}", request.output.display()))?;

    info!(failed_files = summary.failed_files, "rebuild finished");

    println!("Total Errors Found: {}", summary.snapshot.total_errors);
    println!("Stats saved to {}", summary.output.display());
    Ok(())
}

/// Pretty-print a value as JSON on stdout.
fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

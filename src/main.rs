//! CLI entry point for the AVL headway analyzer.
//!
//! Provides subcommands for analyzing a single AVL trace file and for
//! mapping the same analysis over every trace file in a directory with
//! a bounded worker pool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use avl_headway::report;
use avl_headway::run::{self, RunConfig};
use avl_headway::stops;
use clap::{Args, Parser, Subcommand};
use tracing::Instrument;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "avl_headway")]
#[command(about = "Headway adherence analysis over AVL traces", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AnalysisArgs {
    /// Transit line to analyze
    #[arg(long)]
    line: u32,

    /// CSV file containing the stop-reference table
    #[arg(long)]
    stops: PathBuf,

    /// Window start, hour of day (inclusive)
    #[arg(long)]
    start: u32,

    /// Window end, hour of day (exclusive, 24 = midnight)
    #[arg(long)]
    end: u32,

    /// Expected scheduled headway in seconds
    #[arg(long)]
    headway: i64,

    /// Maximum stop-matching radius in meters
    #[arg(long, default_value_t = 50.0)]
    radius: f64,

    /// Maximum gap between fixes of one stop visit, in seconds
    #[arg(long, default_value_t = 120)]
    dwell_gap: i64,

    /// Adherence tolerance as a fraction of the expected headway
    #[arg(long, default_value_t = 0.5)]
    tolerance: f64,

    /// Status marker of rows to exclude from analysis
    #[arg(long, default_value = "OUT_OF_SERVICE")]
    out_of_service: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single AVL trace file
    Analyze {
        /// CSV file containing AVL position fixes
        #[arg(long)]
        avl: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Report artifact to write (overwritten if present)
        #[arg(short, long, default_value = "report.json")]
        output: String,
    },
    /// Analyze every trace file in a directory with a worker pool
    AnalyzeDir {
        /// Directory containing AVL trace CSV files
        #[arg(long)]
        dir: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Directory to write one report artifact per trace into
        #[arg(short, long, default_value = "reports")]
        output_dir: String,

        /// Maximum number of traces analyzed concurrently
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/avl_headway.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("avl_headway.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { avl, analysis, output } => {
            let config = run_config(avl, &analysis, output);
            let report = run::analyze_trace(&config)?;

            report::log_summary(&report);
            report::write_report(&config.output, &report)?;

            info!(artifact = %config.output, "Report written");
        }
        Commands::AnalyzeDir { dir, analysis, output_dir, concurrency } => {
            analyze_dir(&dir, &analysis, &output_dir, concurrency).await?;
        }
    }

    Ok(())
}

fn run_config(avl: PathBuf, analysis: &AnalysisArgs, output: String) -> RunConfig {
    RunConfig {
        avl_path: avl,
        line: analysis.line,
        stops_path: analysis.stops.clone(),
        start_hour: analysis.start,
        end_hour: analysis.end,
        expected_headway_secs: analysis.headway,
        output,
        match_radius_m: analysis.radius,
        dwell_gap_secs: analysis.dwell_gap,
        adherence_tolerance: analysis.tolerance,
        out_of_service_marker: analysis.out_of_service.clone(),
    }
}

/// Maps the per-trace analysis over every CSV file in `dir`, bounded by
/// a semaphore. Trace files are independent units of work; the stop
/// table is loaded once and shared.
#[tracing::instrument(skip(analysis), fields(dir = %dir.display(), output_dir, concurrency))]
async fn analyze_dir(
    dir: &Path,
    analysis: &AnalysisArgs,
    output_dir: &str,
    concurrency: usize,
) -> Result<()> {
    let stop_table = Arc::new(stops::load_stops(&analysis.stops)?);

    let mut trace_paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading trace directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension() == Some(OsStr::new("csv")) {
            trace_paths.push(path);
        }
    }
    trace_paths.sort();

    if trace_paths.is_empty() {
        info!(dir = %dir.display(), "No trace files found");
        return Ok(());
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {output_dir}"))?;

    info!(traces = trace_paths.len(), concurrency, "Starting batch analysis");

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
    let mut tasks = vec![];

    for path in trace_paths {
        let sem = semaphore.clone();
        let stop_table = stop_table.clone();

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("trace")
            .to_string();
        let output = format!("{output_dir}/{stem}.json");
        let config = run_config(path.clone(), analysis, output);

        let trace_span = tracing::info_span!("process_trace", trace = %path.display());

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await.unwrap();

                match run::analyze_trace_with_stops(&config, &stop_table) {
                    Ok(report) => {
                        if let Err(e) = report::write_report(&config.output, &report) {
                            error!(error = %e, "Failed to write report");
                            return false;
                        }
                        info!(
                            artifact = %config.output,
                            passes = report.total_passes,
                            "Trace processed successfully"
                        );
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "Trace analysis failed");
                        false
                    }
                }
            }
            .instrument(trace_span),
        );

        tasks.push(task);
    }

    let mut failures = 0usize;
    for task in tasks {
        if !task.await.unwrap_or(false) {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} trace file(s) failed");
    }

    info!(output_dir, "Finished processing all traces");
    Ok(())
}

//! Single-trace analysis pipeline.
//!
//! `analyze_trace` runs the full Loader → Matcher → Pass Extractor →
//! Window Filter → Headway Analyzer sequence for one trace file and
//! returns the report. The pipeline is synchronous; concurrency lives
//! in the batch driver, which maps this function over many files.

use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::analysis::headway::analyze_headways;
use crate::analysis::passes::PassExtractor;
use crate::analysis::window::{Window, filter_passes};
use crate::matcher::nearest_stop;
use crate::report::RunReport;
use crate::stops::{self, Stop};
use crate::trace::TraceReader;

/// Explicit, immutable configuration of one analysis run. Nothing in
/// the pipeline reads ambient environment state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub avl_path: PathBuf,
    pub line: u32,
    pub stops_path: PathBuf,
    /// Window start, hour of day, inclusive.
    pub start_hour: u32,
    /// Window end, hour of day, exclusive.
    pub end_hour: u32,
    pub expected_headway_secs: i64,
    /// Output artifact path; doubles as the report label.
    pub output: String,
    pub match_radius_m: f64,
    pub dwell_gap_secs: i64,
    pub adherence_tolerance: f64,
    /// Rows whose status equals this marker are excluded from analysis.
    pub out_of_service_marker: String,
}

/// Loads the stop table and analyzes one trace file.
pub fn analyze_trace(config: &RunConfig) -> Result<RunReport> {
    let stops = stops::load_stops(&config.stops_path)?;
    analyze_trace_with_stops(config, &stops)
}

/// Analyzes one trace file against an already-loaded stop table.
///
/// The batch driver uses this entry point to share one immutable stop
/// table across concurrent runs of the same line.
#[tracing::instrument(skip(config, stops), fields(trace = %config.avl_path.display()))]
pub fn analyze_trace_with_stops(config: &RunConfig, stops: &[Stop]) -> Result<RunReport> {
    validate(config)?;

    let mut reader = TraceReader::open(&config.avl_path)?;

    let mut records = Vec::new();
    let mut out_of_service = 0usize;
    let mut trace_date = None;

    for record in reader.by_ref() {
        if trace_date.is_none() {
            trace_date = Some(record.timestamp.date());
        }
        if record.status.as_deref() == Some(config.out_of_service_marker.as_str()) {
            out_of_service += 1;
            continue;
        }
        records.push(record);
    }
    let skipped = reader.skipped();
    let total_records = records.len() + out_of_service + skipped;

    debug!(
        total_records,
        skipped,
        out_of_service,
        "Trace loaded"
    );

    let mut extractor = PassExtractor::new(config.dwell_gap_secs);
    for record in &records {
        if let Some(stop) = nearest_stop(stops, record.lat, record.lon, config.match_radius_m) {
            extractor.push(record, stop);
        }
    }
    let outcome = extractor.finish();

    // The window resolves against the trace's embedded date; a trace
    // with no well-formed rows has no date and yields an empty report.
    let window = match trace_date {
        Some(date) => Some(Window::from_hours(date, config.start_hour, config.end_hour)?),
        None => None,
    };

    let retained = match &window {
        Some(w) => filter_passes(outcome.events, config.line, w),
        None => Vec::new(),
    };
    let total_passes = retained.len();

    let aggregates = analyze_headways(
        retained,
        config.expected_headway_secs,
        config.adherence_tolerance,
    );

    info!(
        total_passes,
        stops = aggregates.len(),
        skipped,
        "Trace analyzed"
    );

    Ok(RunReport {
        schema_version: 1,
        label: config.output.clone(),
        line: config.line,
        start_hour: config.start_hour,
        end_hour: config.end_hour,
        window_start: window.map(|w| w.start),
        window_end: window.map(|w| w.end),
        expected_headway_secs: config.expected_headway_secs,
        adherence_tolerance: config.adherence_tolerance,
        total_records,
        skipped_records: skipped,
        out_of_service_records: out_of_service,
        out_of_order_vehicles: outcome.out_of_order_vehicles,
        total_passes,
        stops: aggregates,
    })
}

fn validate(config: &RunConfig) -> Result<()> {
    if config.expected_headway_secs <= 0 {
        bail!("expected headway must be positive, got {}", config.expected_headway_secs);
    }
    if config.match_radius_m <= 0.0 {
        bail!("matching radius must be positive, got {}", config.match_radius_m);
    }
    if config.dwell_gap_secs < 0 {
        bail!("dwell gap must not be negative, got {}", config.dwell_gap_secs);
    }
    if config.adherence_tolerance < 0.0 {
        bail!("adherence tolerance must not be negative, got {}", config.adherence_tolerance);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_invalid_headway_is_rejected() {
        let mut config = sample_config();
        config.expected_headway_secs = 0;

        let stops = vec![Stop { id: 1, seq: 1, lat: 0.0, lon: 0.0 }];
        assert!(analyze_trace_with_stops(&config, &stops).is_err());
    }

    #[test]
    fn test_missing_trace_file_is_fatal() {
        let stops = vec![Stop { id: 1, seq: 1, lat: 0.0, lon: 0.0 }];
        assert!(analyze_trace_with_stops(&sample_config(), &stops).is_err());
    }

    fn sample_config() -> RunConfig {
        RunConfig {
            avl_path: Path::new("/nonexistent/trace.csv").to_path_buf(),
            line: 263,
            stops_path: Path::new("/nonexistent/stops.csv").to_path_buf(),
            start_hour: 12,
            end_hour: 14,
            expected_headway_secs: 420,
            output: "report.json".to_string(),
            match_radius_m: 50.0,
            dwell_gap_secs: 120,
            adherence_tolerance: 0.5,
            out_of_service_marker: "OUT_OF_SERVICE".to_string(),
        }
    }
}

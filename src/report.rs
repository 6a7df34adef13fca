//! Report artifact construction and persistence.
//!
//! One analysis run produces one JSON artifact named by the run's
//! output label. The artifact is fully determined by the inputs (no
//! wall-clock fields), so re-running over the same data reproduces it
//! byte for byte.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::types::{StopAggregate, StopStatus};

/// Complete result of one analysis run: metadata plus per-stop
/// aggregates, sorted by (stop id, direction).
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub schema_version: u8,
    pub label: String,
    pub line: u32,
    pub start_hour: u32,
    pub end_hour: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<NaiveDateTime>,
    pub expected_headway_secs: i64,
    pub adherence_tolerance: f64,
    pub total_records: usize,
    pub skipped_records: usize,
    pub out_of_service_records: usize,
    pub out_of_order_vehicles: usize,
    pub total_passes: usize,
    pub stops: Vec<StopAggregate>,
}

/// Writes the report as pretty-printed JSON to `path`, replacing any
/// existing artifact under that label (last-run-wins).
pub fn write_report(path: &str, report: &RunReport) -> Result<()> {
    debug!(path, stops = report.stops.len(), "Writing report artifact");

    let file =
        File::create(path).with_context(|| format!("creating report artifact {path}"))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(())
}

/// Logs a per-stop summary of the report.
pub fn log_summary(report: &RunReport) {
    info!(
        line = report.line,
        total_records = report.total_records,
        skipped_records = report.skipped_records,
        out_of_service_records = report.out_of_service_records,
        out_of_order_vehicles = report.out_of_order_vehicles,
        total_passes = report.total_passes,
        "Run summary"
    );

    for stop in &report.stops {
        match (&stop.status, &stop.headway) {
            (StopStatus::Ok, Some(stats)) => {
                info!(
                    stop_id = stop.stop_id,
                    direction = stop.direction,
                    passes = stop.passes,
                    observations = stats.observations,
                    mean_gap_secs = stats.mean_gap_secs,
                    stddev_secs = stats.stddev_secs,
                    min_gap_secs = stats.min_gap_secs,
                    max_gap_secs = stats.max_gap_secs,
                    adherence_ratio = stats.adherence_ratio,
                    "Stop headway"
                );
            }
            _ => {
                info!(
                    stop_id = stop.stop_id,
                    direction = stop.direction,
                    passes = stop.passes,
                    "Stop has insufficient data"
                );
            }
        }
    }
}

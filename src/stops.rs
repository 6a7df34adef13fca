//! Stop-reference table loading.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

/// A bus stop along the analyzed line, with its order along the route.
#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub id: u32,
    pub seq: u32,
    pub lat: f64,
    pub lon: f64,
}

/// Loads the stop table from a CSV file, sorted by sequence order.
///
/// The table is read once per run and treated as immutable afterwards.
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable, if any row
/// fails to parse, or if the table ends up empty. All of these are
/// fatal: without a usable stop table no analysis is possible.
pub fn load_stops(path: &Path) -> Result<Vec<Stop>> {
    let file =
        File::open(path).with_context(|| format!("opening stop table {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut stops = Vec::new();
    for row in reader.deserialize() {
        let stop: Stop =
            row.with_context(|| format!("parsing stop table {}", path.display()))?;
        stops.push(stop);
    }

    if stops.is_empty() {
        bail!("stop table {} contains no stops", path.display());
    }

    stops.sort_by_key(|s| s.seq);
    debug!(stops = stops.len(), path = %path.display(), "Stop table loaded");

    Ok(stops)
}

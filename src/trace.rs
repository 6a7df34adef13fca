//! CSV loader for AVL vehicle-position traces.
//!
//! A trace file holds one position fix per row, in file order (not
//! guaranteed time-sorted). Malformed rows are skipped and counted
//! rather than aborting the run.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::warn;

/// Timestamp format used by AVL trace files (naive local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One raw vehicle-position fix as read from a trace file.
///
/// `line`, `direction`, and `status` are optional in the source data;
/// a missing direction defaults to 0.
#[derive(Debug, Clone, Deserialize)]
pub struct AvlRecord {
    pub vehicle_id: u32,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub direction: u8,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub status: Option<String>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
}

/// Lazily yields well-formed [`AvlRecord`]s from a trace file,
/// counting rows that fail to parse.
pub struct TraceReader {
    rows: csv::DeserializeRecordsIntoIter<File, AvlRecord>,
    skipped: usize,
}

impl TraceReader {
    /// Opens a trace file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened. Row-level parse
    /// failures are not errors; they are counted in [`Self::skipped`].
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening AVL trace {}", path.display()))?;
        let reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        Ok(TraceReader {
            rows: reader.into_deserialize(),
            skipped: 0,
        })
    }

    /// Number of malformed rows skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for TraceReader {
    type Item = AvlRecord;

    fn next(&mut self) -> Option<AvlRecord> {
        loop {
            match self.rows.next()? {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, "Skipping malformed trace row");
                }
            }
        }
    }
}

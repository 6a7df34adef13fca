//! Data types shared across the analysis pipeline.

use chrono::NaiveDateTime;
use serde::Serialize;

/// A discrete stop visit, collapsed from contiguous position fixes of
/// one vehicle at one stop.
///
/// For a fixed vehicle and stop, timestamps strictly increase across
/// successive passes; a re-visit produces a separate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopPassEvent {
    pub vehicle_id: u32,
    pub stop_id: u32,
    pub direction: u8,
    pub line: Option<u32>,
    pub timestamp: NaiveDateTime,
}

/// The gap between two temporally adjacent passes at the same stop and
/// direction. `timestamp` is the later pass; `gap_secs` is never
/// negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadwayObservation {
    pub stop_id: u32,
    pub direction: u8,
    pub timestamp: NaiveDateTime,
    pub gap_secs: i64,
}

/// Analysis status for one stop/direction group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Ok,
    /// Fewer than two passes in the window; no headway arithmetic done.
    InsufficientData,
}

/// Headway statistics for a stop/direction with at least two passes.
#[derive(Debug, Clone, Serialize)]
pub struct HeadwayStats {
    pub observations: usize,
    pub mean_gap_secs: f64,
    pub stddev_secs: f64,
    pub min_gap_secs: i64,
    pub max_gap_secs: i64,
    /// Fraction of gaps within the tolerance band around the expected
    /// headway.
    pub adherence_ratio: f64,
    /// Headway regularity coefficient: stddev over expected headway.
    pub regularity: f64,
}

/// Aggregated result for one (stop, direction) group.
#[derive(Debug, Clone, Serialize)]
pub struct StopAggregate {
    pub stop_id: u32,
    pub direction: u8,
    pub passes: usize,
    pub status: StopStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headway: Option<HeadwayStats>,
}

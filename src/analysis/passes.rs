//! Collapses matched position fixes into discrete stop-pass events.
//!
//! A vehicle slowing down at a stop produces several consecutive fixes
//! matching that stop; those collapse into exactly one pass. The pass
//! timestamp is the first fix of the contiguous group.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::warn;

use super::types::StopPassEvent;
use crate::stops::Stop;
use crate::trace::AvlRecord;

/// Result of a pass-extraction run.
#[derive(Debug)]
pub struct PassOutcome {
    pub events: Vec<StopPassEvent>,
    /// Vehicles whose trace regressed in time; their remaining records
    /// were dropped.
    pub out_of_order_vehicles: usize,
}

struct VehicleState {
    poisoned: bool,
    stop_id: u32,
    last_match: NaiveDateTime,
}

/// Streaming visit collapser. Feed matched (record, stop) pairs in
/// trace order via [`push`](Self::push), then call
/// [`finish`](Self::finish).
pub struct PassExtractor {
    dwell_gap_secs: i64,
    vehicles: HashMap<u32, VehicleState>,
    events: Vec<StopPassEvent>,
    out_of_order_vehicles: usize,
}

impl PassExtractor {
    pub fn new(dwell_gap_secs: i64) -> Self {
        PassExtractor {
            dwell_gap_secs,
            vehicles: HashMap::new(),
            events: Vec::new(),
            out_of_order_vehicles: 0,
        }
    }

    /// Registers one matched fix.
    ///
    /// A new visit begins when the matched stop changes or when the gap
    /// since the vehicle's previous match exceeds the dwell gap. An
    /// out-of-order timestamp poisons the vehicle: already-emitted
    /// events are kept, everything after is dropped.
    pub fn push(&mut self, record: &AvlRecord, stop: &Stop) {
        match self.vehicles.get_mut(&record.vehicle_id) {
            None => {
                self.events.push(pass_event(record, stop));
                self.vehicles.insert(
                    record.vehicle_id,
                    VehicleState {
                        poisoned: false,
                        stop_id: stop.id,
                        last_match: record.timestamp,
                    },
                );
            }
            Some(state) => {
                if state.poisoned {
                    return;
                }

                if record.timestamp < state.last_match {
                    warn!(
                        vehicle_id = record.vehicle_id,
                        "Out-of-order timestamp; dropping remainder of vehicle trace"
                    );
                    state.poisoned = true;
                    self.out_of_order_vehicles += 1;
                    return;
                }

                let gap = (record.timestamp - state.last_match).num_seconds();
                if stop.id != state.stop_id || gap > self.dwell_gap_secs {
                    self.events.push(pass_event(record, stop));
                }

                state.stop_id = stop.id;
                state.last_match = record.timestamp;
            }
        }
    }

    pub fn finish(self) -> PassOutcome {
        PassOutcome {
            events: self.events,
            out_of_order_vehicles: self.out_of_order_vehicles,
        }
    }
}

fn pass_event(record: &AvlRecord, stop: &Stop) -> StopPassEvent {
    StopPassEvent {
        vehicle_id: record.vehicle_id,
        stop_id: stop.id,
        direction: record.direction,
        line: record.line,
        timestamp: record.timestamp,
    }
}

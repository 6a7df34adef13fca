//! Time-window and line filtering of pass events.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};

use super::types::StopPassEvent;

/// Absolute half-open analysis window `[start, end)`, resolved from
/// hour-of-day bounds against the trace's embedded date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// Resolves `[start_hour, end_hour)` against `date`. An end hour of
    /// 24 means midnight of the following day.
    pub fn from_hours(date: NaiveDate, start_hour: u32, end_hour: u32) -> Result<Window> {
        if end_hour > 24 {
            bail!("window end hour {end_hour} is past 24");
        }
        if start_hour >= end_hour {
            bail!("window start hour {start_hour} is not before end hour {end_hour}");
        }

        Ok(Window {
            start: hour_on(date, start_hour)?,
            end: hour_on(date, end_hour)?,
        })
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

fn hour_on(date: NaiveDate, hour: u32) -> Result<NaiveDateTime> {
    if hour == 24 {
        let next = date.succ_opt().context("date overflow resolving end of window")?;
        return next
            .and_hms_opt(0, 0, 0)
            .context("invalid midnight on following day");
    }

    date.and_hms_opt(hour, 0, 0)
        .with_context(|| format!("invalid window hour {hour}"))
}

/// Retains events inside the window whose line matches `line`.
///
/// Events without a line identifier are dropped. An empty result is
/// valid, not an error.
pub fn filter_passes(events: Vec<StopPassEvent>, line: u32, window: &Window) -> Vec<StopPassEvent> {
    events
        .into_iter()
        .filter(|e| e.line == Some(line) && window.contains(e.timestamp))
        .collect()
}

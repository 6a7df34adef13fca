//! Headway computation and per-stop aggregation.

use std::collections::BTreeMap;

use super::types::{HeadwayObservation, HeadwayStats, StopAggregate, StopPassEvent, StopStatus};
use super::utility::{mean, stddev};

/// Pairs temporally adjacent passes of one (stop, direction) group into
/// headway observations. The group must already be sorted by timestamp,
/// which guarantees non-negative gaps.
pub fn pair_observations(sorted_group: &[StopPassEvent]) -> Vec<HeadwayObservation> {
    sorted_group
        .windows(2)
        .map(|pair| HeadwayObservation {
            stop_id: pair[1].stop_id,
            direction: pair[1].direction,
            timestamp: pair[1].timestamp,
            gap_secs: (pair[1].timestamp - pair[0].timestamp).num_seconds(),
        })
        .collect()
}

/// Aggregates pass events into per-(stop, direction) headway statistics.
///
/// Each group is sorted by timestamp before pairing, so the result does
/// not depend on input order. Groups with fewer than two passes report
/// [`StopStatus::InsufficientData`] instead of degenerate arithmetic.
/// Results come back sorted by (stop id, direction).
pub fn analyze_headways(
    events: Vec<StopPassEvent>,
    expected_headway_secs: i64,
    tolerance: f64,
) -> Vec<StopAggregate> {
    let mut groups: BTreeMap<(u32, u8), Vec<StopPassEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.stop_id, event.direction))
            .or_default()
            .push(event);
    }

    let mut aggregates = Vec::with_capacity(groups.len());

    for ((stop_id, direction), mut group) in groups {
        group.sort_by_key(|e| e.timestamp);
        let passes = group.len();

        if passes < 2 {
            aggregates.push(StopAggregate {
                stop_id,
                direction,
                passes,
                status: StopStatus::InsufficientData,
                headway: None,
            });
            continue;
        }

        let observations = pair_observations(&group);
        let gaps: Vec<f64> = observations.iter().map(|o| o.gap_secs as f64).collect();

        let mean_gap = mean(&gaps);
        let sd = stddev(&gaps, mean_gap);

        let band_lo = expected_headway_secs as f64 * (1.0 - tolerance);
        let band_hi = expected_headway_secs as f64 * (1.0 + tolerance);
        let within = observations
            .iter()
            .filter(|o| {
                let gap = o.gap_secs as f64;
                band_lo <= gap && gap <= band_hi
            })
            .count();

        let min_gap = observations.iter().map(|o| o.gap_secs).min().unwrap_or(0);
        let max_gap = observations.iter().map(|o| o.gap_secs).max().unwrap_or(0);

        aggregates.push(StopAggregate {
            stop_id,
            direction,
            passes,
            status: StopStatus::Ok,
            headway: Some(HeadwayStats {
                observations: observations.len(),
                mean_gap_secs: mean_gap,
                stddev_secs: sd,
                min_gap_secs: min_gap,
                max_gap_secs: max_gap,
                adherence_ratio: within as f64 / observations.len() as f64,
                regularity: sd / expected_headway_secs as f64,
            }),
        });
    }

    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    #[test]
    fn test_single_pass_is_insufficient_data() {
        let aggregates = analyze_headways(vec![event(10, 1, 0)], 420, 0.5);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].status, StopStatus::InsufficientData);
        assert_eq!(aggregates[0].passes, 1);
        assert!(aggregates[0].headway.is_none());
    }

    #[test]
    fn test_two_passes_yield_one_observation() {
        let aggregates = analyze_headways(vec![event(10, 1, 0), event(11, 1, 430)], 420, 0.5);

        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].status, StopStatus::Ok);
        let stats = aggregates[0].headway.as_ref().unwrap();
        assert_eq!(stats.observations, 1);
        assert_eq!(stats.mean_gap_secs, 430.0);
        assert_eq!(stats.min_gap_secs, 430);
        assert_eq!(stats.max_gap_secs, 430);
    }

    #[test]
    fn test_adherence_within_tolerance_band() {
        // Expected 420s, tolerance ±50% → band [210, 630]; gap 430 is inside
        let aggregates = analyze_headways(vec![event(10, 1, 0), event(11, 1, 430)], 420, 0.5);

        let stats = aggregates[0].headway.as_ref().unwrap();
        assert_eq!(stats.adherence_ratio, 1.0);
    }

    #[test]
    fn test_adherence_counts_band_violations() {
        // Gaps: 430 (inside [210, 630]) and 700 (outside)
        let aggregates = analyze_headways(
            vec![event(10, 1, 0), event(11, 1, 430), event(12, 1, 1130)],
            420,
            0.5,
        );

        let stats = aggregates[0].headway.as_ref().unwrap();
        assert_eq!(stats.observations, 2);
        assert_eq!(stats.adherence_ratio, 0.5);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let mut shuffled = vec![
            event(12, 1, 900),
            event(10, 1, 0),
            event(13, 2, 100),
            event(11, 1, 430),
            event(14, 2, 0),
        ];
        let sorted_input = {
            let mut v = shuffled.clone();
            v.sort_by_key(|e| (e.stop_id, e.timestamp));
            v
        };
        shuffled.reverse();

        let a = analyze_headways(sorted_input, 420, 0.5);
        let b = analyze_headways(shuffled, 420, 0.5);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.stop_id, y.stop_id);
            assert_eq!(x.passes, y.passes);
            let (xs, ys) = (x.headway.as_ref(), y.headway.as_ref());
            assert_eq!(xs.map(|s| s.mean_gap_secs), ys.map(|s| s.mean_gap_secs));
            assert_eq!(xs.map(|s| s.stddev_secs), ys.map(|s| s.stddev_secs));
            assert_eq!(xs.map(|s| s.adherence_ratio), ys.map(|s| s.adherence_ratio));
        }
    }

    #[test]
    fn test_directions_aggregate_separately() {
        let mut outbound = event(10, 1, 0);
        outbound.direction = 1;
        let aggregates = analyze_headways(vec![event(10, 1, 0), outbound], 420, 0.5);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].direction, 0);
        assert_eq!(aggregates[1].direction, 1);
        assert!(aggregates.iter().all(|a| a.status == StopStatus::InsufficientData));
    }

    #[test]
    fn test_regularity_is_stddev_over_expected() {
        // Gaps 300 and 500: mean 400, population stddev 100
        let aggregates = analyze_headways(
            vec![event(10, 1, 0), event(11, 1, 300), event(12, 1, 800)],
            400,
            0.5,
        );

        let stats = aggregates[0].headway.as_ref().unwrap();
        assert_eq!(stats.stddev_secs, 100.0);
        assert_eq!(stats.regularity, 0.25);
    }

    #[test]
    fn test_pair_observations_gap_values() {
        let group = vec![event(10, 1, 0), event(11, 1, 430), event(12, 1, 900)];
        let observations = pair_observations(&group);

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].gap_secs, 430);
        assert_eq!(observations[1].gap_secs, 470);
        assert!(observations.iter().all(|o| o.gap_secs >= 0));
    }

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 2, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn event(vehicle_id: u32, stop_id: u32, offset_secs: i64) -> StopPassEvent {
        StopPassEvent {
            vehicle_id,
            stop_id,
            direction: 0,
            line: Some(263),
            timestamp: base() + chrono::Duration::seconds(offset_secs),
        }
    }
}

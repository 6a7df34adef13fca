//! Nearest-stop matching for raw position fixes.
//!
//! A fix matches the closest stop by great-circle distance, but only
//! within a maximum matching radius; fixes between stops match nothing
//! and are dropped by the caller. The stop set for one line is small
//! (tens of stops), so a linear scan is sufficient.

use crate::stops::Stop;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_meters(a_lat: f64, a_lon: f64, b_lat: f64, b_lon: f64) -> f64 {
    let phi_a = a_lat.to_radians();
    let phi_b = b_lat.to_radians();
    let d_phi = (b_lat - a_lat).to_radians();
    let d_lambda = (b_lon - a_lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Finds the nearest stop within `radius_m` of the given position.
///
/// `stops` must be sorted by sequence order; on a distance tie the stop
/// with the lower sequence index wins. Returns `None` when no stop is
/// within the radius.
pub fn nearest_stop<'a>(stops: &'a [Stop], lat: f64, lon: f64, radius_m: f64) -> Option<&'a Stop> {
    let mut best: Option<(&Stop, f64)> = None;

    for stop in stops {
        let distance = haversine_meters(lat, lon, stop.lat, stop.lon);
        if distance > radius_m {
            continue;
        }

        let closer = match best {
            None => true,
            Some((_, best_distance)) => distance < best_distance,
        };
        if closer {
            best = Some((stop, distance));
        }
    }

    best.map(|(stop, _)| stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_for_identical_points() {
        assert_eq!(haversine_meters(-16.6790, -49.2550, -16.6790, -49.2550), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is roughly 111.2 km
        let d = haversine_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_matches_nearest_stop_within_radius() {
        let stops = sample_stops();

        // ~11 meters north of stop 2
        let matched = nearest_stop(&stops, -16.6849, -49.2600, 50.0).unwrap();
        assert_eq!(matched.id, 2);
    }

    #[test]
    fn test_no_match_outside_radius() {
        let stops = sample_stops();

        // Between stops 1 and 2, hundreds of meters from both
        assert!(nearest_stop(&stops, -16.6820, -49.2575, 50.0).is_none());
    }

    #[test]
    fn test_tie_breaks_on_lower_sequence() {
        // Two stops at the same coordinate; the lower seq must win
        let stops = vec![
            Stop { id: 7, seq: 1, lat: -16.6790, lon: -49.2550 },
            Stop { id: 8, seq: 2, lat: -16.6790, lon: -49.2550 },
        ];

        let matched = nearest_stop(&stops, -16.6790, -49.2550, 50.0).unwrap();
        assert_eq!(matched.id, 7);
    }

    fn sample_stops() -> Vec<Stop> {
        vec![
            Stop { id: 1, seq: 1, lat: -16.6790, lon: -49.2550 },
            Stop { id: 2, seq: 2, lat: -16.6850, lon: -49.2600 },
            Stop { id: 3, seq: 3, lat: -16.6910, lon: -49.2650 },
        ]
    }
}

//! Route progression tracking.
//!
//! Projects a vehicle position onto a direction's shape polyline and
//! derives which stops it has already served and which comes next.
//!
//! The projection of each stop onto the shape is precomputed once per
//! (route, direction) via [`stop_shape_positions`]; per vehicle tick
//! only the vehicle itself is projected, turning an
//! O(stops x shape points) search into O(shape points).

use std::collections::BTreeSet;

use crate::geo::{haversine_distance, nearest_point_index};
use crate::providers::gtfs::{ShapePoint, Stop};

/// The outcome of one progression update.
///
/// `passed_stops` is always the exact index prefix below
/// `next_stop_index`; when `next_stop_index` is `None` the vehicle is at
/// or past the final stop and every stop counts as passed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Progression {
    pub passed_stops: BTreeSet<usize>,
    pub next_stop_index: Option<usize>,
}

impl Progression {
    fn from_last_passed(last_passed: Option<usize>, stop_count: usize) -> Self {
        match last_passed {
            None => Progression {
                passed_stops: BTreeSet::new(),
                next_stop_index: if stop_count > 0 { Some(0) } else { None },
            },
            Some(last) => {
                let passed_stops = (0..=last).collect();
                let next = last + 1;
                Progression {
                    passed_stops,
                    next_stop_index: if next < stop_count { Some(next) } else { None },
                }
            }
        }
    }
}

/// Project each stop onto the shape: index of the closest shape point
/// per stop, in stop order. Computed once per (route, direction).
pub fn stop_shape_positions(stops: &[Stop], shape: &[ShapePoint]) -> Vec<usize> {
    stops
        .iter()
        .filter_map(|stop| {
            nearest_point_index(shape.iter().map(|p| (p.lat, p.lon)), stop.lat, stop.lon)
        })
        .collect()
}

/// Compute passed stops and the next stop for a vehicle at (lat, lon).
///
/// `positions` is the precomputed [`stop_shape_positions`] table for
/// this direction. Falls back to straight-line nearest-stop distance
/// when the shape or the precomputed table is unavailable.
pub fn track_progression(
    lat: f64,
    lon: f64,
    stops: &[Stop],
    shape: &[ShapePoint],
    positions: &[usize],
) -> Progression {
    if stops.is_empty() {
        return Progression::default();
    }
    if shape.is_empty() || positions.len() != stops.len() {
        return nearest_stop_fallback(lat, lon, stops);
    }

    let Some(vehicle_shape_index) =
        nearest_point_index(shape.iter().map(|p| (p.lat, p.lon)), lat, lon)
    else {
        return nearest_stop_fallback(lat, lon, stops);
    };

    // The last stop whose shape projection lies at or before the
    // vehicle's projection has been passed; everything before it too.
    let mut last_passed = None;
    for (stop_index, &shape_index) in positions.iter().enumerate() {
        if shape_index <= vehicle_shape_index {
            last_passed = Some(stop_index);
        } else {
            break;
        }
    }

    Progression::from_last_passed(last_passed, stops.len())
}

/// Shape-less fallback: the nearest stop becomes the passed/next
/// boundary. Less accurate near loops and backtracking segments, but
/// always available.
fn nearest_stop_fallback(lat: f64, lon: f64, stops: &[Stop]) -> Progression {
    let mut nearest_index = 0;
    let mut min_distance = f64::INFINITY;
    for (index, stop) in stops.iter().enumerate() {
        let distance = haversine_distance(lat, lon, stop.lat, stop.lon);
        if distance < min_distance {
            min_distance = distance;
            nearest_index = index;
        }
    }

    if nearest_index + 1 >= stops.len() {
        // At or past the final stop: everything is passed.
        return Progression {
            passed_stops: (0..stops.len()).collect(),
            next_stop_index: None,
        };
    }

    Progression {
        passed_stops: (0..nearest_index).collect(),
        next_stop_index: Some(nearest_index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: id.to_string(),
            name: id.to_string(),
            lat,
            lon,
        }
    }

    /// A 31-point straight shape with four stops projected at indices
    /// 0, 10, 20 and 30.
    fn fixture() -> (Vec<Stop>, Vec<ShapePoint>) {
        let shape: Vec<ShapePoint> = (0..=30)
            .map(|i| ShapePoint {
                lat: 41.0 + i as f64 * 0.001,
                lon: -8.6,
                sequence: i as u32,
            })
            .collect();
        let stops = vec![
            stop("a", 41.000, -8.6),
            stop("b", 41.010, -8.6),
            stop("c", 41.020, -8.6),
            stop("d", 41.030, -8.6),
        ];
        (stops, shape)
    }

    #[test]
    fn stop_positions_project_onto_shape() {
        let (stops, shape) = fixture();
        assert_eq!(stop_shape_positions(&stops, &shape), vec![0, 10, 20, 30]);
    }

    #[test]
    fn vehicle_between_second_and_third_stop() {
        let (stops, shape) = fixture();
        let positions = stop_shape_positions(&stops, &shape);
        // Nearest shape index 15: stops a and b passed, c is next.
        let progression = track_progression(41.015, -8.6, &stops, &shape, &positions);
        assert_eq!(
            progression.passed_stops,
            [0usize, 1].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(progression.next_stop_index, Some(2));
    }

    #[test]
    fn vehicle_before_first_stop() {
        let (stops, shape) = fixture();
        let positions = stop_shape_positions(&stops, &shape);
        // South of the route start projects to shape index 0, which is
        // stop a's own projection, so a counts as passed.
        let progression = track_progression(40.9995, -8.6, &stops, &shape, &positions);
        assert_eq!(progression.next_stop_index, Some(1));

        // With stop a projected later than index 0, nothing is passed
        // and the next stop is stop 0.
        let shifted = vec![2usize, 10, 20, 30];
        let progression = track_progression(40.9995, -8.6, &stops, &shape, &shifted);
        assert!(progression.passed_stops.is_empty());
        assert_eq!(progression.next_stop_index, Some(0));
    }

    #[test]
    fn vehicle_at_final_stop() {
        let (stops, shape) = fixture();
        let positions = stop_shape_positions(&stops, &shape);
        let progression = track_progression(41.030, -8.6, &stops, &shape, &positions);
        assert_eq!(progression.next_stop_index, None);
        assert_eq!(progression.passed_stops.len(), stops.len());
    }

    #[test]
    fn passed_stops_prefix_invariant() {
        let (stops, shape) = fixture();
        let positions = stop_shape_positions(&stops, &shape);
        for i in 0..=30 {
            let lat = 41.0 + i as f64 * 0.001;
            let progression = track_progression(lat, -8.6, &stops, &shape, &positions);
            match progression.next_stop_index {
                Some(next) => {
                    assert_eq!(
                        progression.passed_stops,
                        (0..next).collect::<BTreeSet<_>>(),
                        "at shape index {i}"
                    );
                }
                None => {
                    assert_eq!(
                        progression.passed_stops,
                        (0..stops.len()).collect::<BTreeSet<_>>(),
                        "at shape index {i}"
                    );
                }
            }
        }
    }

    #[test]
    fn forward_motion_is_monotonic() {
        let (stops, shape) = fixture();
        let positions = stop_shape_positions(&stops, &shape);
        let mut previous_next = Some(0usize);
        for i in 0..=30 {
            let lat = 41.0 + i as f64 * 0.001;
            let progression = track_progression(lat, -8.6, &stops, &shape, &positions);
            // None means "past the end", which never regresses.
            if let (Some(prev), Some(current)) = (previous_next, progression.next_stop_index) {
                assert!(current >= prev, "regressed at shape index {i}");
            }
            if progression.next_stop_index.is_some() {
                assert!(previous_next.is_some(), "came back from the terminus at {i}");
            }
            previous_next = progression.next_stop_index;
        }
    }

    #[test]
    fn fallback_without_shape_uses_nearest_stop() {
        let (stops, _) = fixture();
        // Between b and c but closer to c.
        let progression = track_progression(41.017, -8.6, &stops, &[], &[]);
        assert_eq!(progression.next_stop_index, Some(2));
        assert_eq!(
            progression.passed_stops,
            (0..2).collect::<BTreeSet<_>>()
        );

        // At the terminus everything is passed.
        let progression = track_progression(41.030, -8.6, &stops, &[], &[]);
        assert_eq!(progression.next_stop_index, None);
        assert_eq!(progression.passed_stops.len(), stops.len());
    }

    #[test]
    fn mismatched_positions_table_falls_back() {
        let (stops, shape) = fixture();
        // A stale positions table for a different stop list must not be
        // trusted.
        let progression = track_progression(41.015, -8.6, &stops, &shape, &[0, 10]);
        assert_eq!(progression.next_stop_index, Some(2));
    }

    #[test]
    fn empty_stop_list() {
        let (_, shape) = fixture();
        let progression = track_progression(41.0, -8.6, &[], &shape, &[]);
        assert!(progression.passed_stops.is_empty());
        assert_eq!(progression.next_stop_index, None);
    }
}

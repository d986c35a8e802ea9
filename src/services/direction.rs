//! Direction classification.
//!
//! Given a vehicle position (and optional compass bearing) and the two
//! directional stop sequences of a route, decide which direction the
//! vehicle is serving. Pure and deterministic: identical inputs always
//! produce the same answer, so re-evaluating every refresh tick cannot
//! flicker.

use crate::geo::{haversine_distance, initial_bearing};
use crate::models::Direction;
use crate::providers::gtfs::Stop;

/// Half-angle of the bearing agreement cone, in degrees. A vehicle is
/// considered aligned with a direction when the bearing towards the
/// next stop differs from its reported bearing by less than this (or
/// more than 360 minus this, for the 0/360 wrap).
pub const ALIGNMENT_CONE_DEGREES: f64 = 60.0;

struct NearestStop {
    index: usize,
    distance: f64,
}

fn find_nearest(stops: &[Stop], lat: f64, lon: f64) -> Option<NearestStop> {
    let mut best: Option<NearestStop> = None;
    for (index, stop) in stops.iter().enumerate() {
        let distance = haversine_distance(lat, lon, stop.lat, stop.lon);
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(NearestStop { index, distance });
        }
    }
    best
}

/// Whether the vehicle's bearing agrees with travel from the nearest
/// stop towards its successor. The last stop has no successor, so a
/// vehicle nearest to it can never be aligned.
fn is_aligned(stops: &[Stop], nearest_index: usize, lat: f64, lon: f64, bearing: f64) -> bool {
    if nearest_index + 1 >= stops.len() {
        return false;
    }
    let next = &stops[nearest_index + 1];
    let bearing_to_next = initial_bearing(lat, lon, next.lat, next.lon);
    let diff = (bearing_to_next - bearing).abs();
    diff < ALIGNMENT_CONE_DEGREES || diff > 360.0 - ALIGNMENT_CONE_DEGREES
}

/// Classify which direction a vehicle at (lat, lon) is serving.
///
/// Degenerate cases: an empty stop sequence concedes to the other
/// direction; both empty defaults to outbound. With a bearing, exactly
/// one aligned direction wins; both or neither aligned falls back to
/// the smaller nearest-stop distance, ties favoring outbound.
pub fn classify_direction(
    lat: f64,
    lon: f64,
    bearing: Option<f64>,
    dir0: &[Stop],
    dir1: &[Stop],
) -> Direction {
    if dir1.is_empty() {
        return Direction::Outbound;
    }
    if dir0.is_empty() {
        return Direction::Inbound;
    }

    // Both non-empty, so both nearest lookups succeed.
    let Some(nearest0) = find_nearest(dir0, lat, lon) else {
        return Direction::Inbound;
    };
    let Some(nearest1) = find_nearest(dir1, lat, lon) else {
        return Direction::Outbound;
    };

    if let Some(bearing) = bearing {
        let aligned0 = is_aligned(dir0, nearest0.index, lat, lon, bearing);
        let aligned1 = is_aligned(dir1, nearest1.index, lat, lon, bearing);
        if aligned1 && !aligned0 {
            return Direction::Inbound;
        }
        if aligned0 && !aligned1 {
            return Direction::Outbound;
        }
        // Both or neither aligned: ambiguous, fall through.
    }

    if nearest1.distance < nearest0.distance {
        Direction::Inbound
    } else {
        Direction::Outbound
    }
}

//! Representative trip selection.
//!
//! A route has dozens of trip variants per direction (one per scheduled
//! departure, plus short-turn and branch variants with different stop
//! subsets). All classification and progression work needs one stable
//! reference stop sequence and shape per direction, so we pick a single
//! canonical trip per direction for the whole session.

use std::collections::HashMap;

use crate::models::Direction;
use crate::providers::gtfs::{Route, StopTime, Trip};

/// Score bonus for a headsign that textually matches one of the route's
/// long-name terminals. Dominates stop-count differences, anchoring the
/// choice on the authoritative route label rather than on feed
/// headsigns, which are inconsistent.
const TERMINAL_MATCH_BONUS: usize = 1000;

/// The canonical trip per direction. `None` only when the route has no
/// trips at all in that direction.
#[derive(Debug, Clone, Default)]
pub struct RepresentativeTrips {
    pub direction0: Option<Trip>,
    pub direction1: Option<Trip>,
}

impl RepresentativeTrips {
    pub fn for_direction(&self, direction: Direction) -> Option<&Trip> {
        match direction {
            Direction::Outbound => self.direction0.as_ref(),
            Direction::Inbound => self.direction1.as_ref(),
        }
    }
}

/// Terminal names from a route long name like "Bolhao - Castelo do
/// Queijo". Split on " - "; single-segment names yield one candidate.
fn terminals(long_name: &str) -> Vec<String> {
    long_name
        .split(" - ")
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn headsign_matches_terminal(headsign: &str, terminals: &[String]) -> bool {
    let headsign = headsign.trim().to_lowercase();
    if headsign.is_empty() {
        return false;
    }
    terminals
        .iter()
        .any(|t| headsign.contains(t.as_str()) || t.contains(headsign.as_str()))
}

fn score(trip: &Trip, stop_times_by_trip: &HashMap<String, Vec<StopTime>>, terminals: &[String]) -> usize {
    let stop_count = stop_times_by_trip
        .get(&trip.trip_id)
        .map(|visits| visits.len())
        .unwrap_or(0);
    let bonus = if headsign_matches_terminal(&trip.headsign, terminals) {
        TERMINAL_MATCH_BONUS
    } else {
        0
    };
    stop_count + bonus
}

/// Pick the canonical trip for each direction of `route`.
///
/// Score = stop-time row count, plus a large bonus when the headsign
/// matches a long-name terminal. Equal scores break towards the smaller
/// trip_id so the choice is stable across table orderings.
pub fn representative_trips(
    route: &Route,
    trips: &[Trip],
    stop_times_by_trip: &HashMap<String, Vec<StopTime>>,
) -> RepresentativeTrips {
    let terminals = terminals(&route.long_name);

    let pick = |direction: Direction| -> Option<Trip> {
        trips
            .iter()
            .filter(|t| t.direction == direction)
            .map(|t| (score(t, stop_times_by_trip, &terminals), t))
            .max_by(|(score_a, trip_a), (score_b, trip_b)| {
                score_a
                    .cmp(score_b)
                    // max_by keeps the later of equal elements, so order the
                    // smaller trip_id as the greater one.
                    .then_with(|| trip_b.trip_id.cmp(&trip_a.trip_id))
            })
            .map(|(_, t)| t.clone())
    };

    RepresentativeTrips {
        direction0: pick(Direction::Outbound),
        direction1: pick(Direction::Inbound),
    }
}

//! Schedule matching and delay calculation.
//!
//! Identifies which scheduled trip instance a live vehicle most
//! plausibly corresponds to, then compares scheduled vs. actual arrival
//! at the vehicle's next stop. Schedule times are minutes since
//! midnight of the service day; raw differences above 720 minutes wrap
//! around the 1440-minute day.

use std::collections::HashMap;

use chrono::Timelike;
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::Direction;
use crate::providers::gtfs::{parse_gtfs_time, StopTime, Trip};

const HALF_DAY_MINUTES: f64 = 720.0;
const DAY_MINUTES: f64 = 1440.0;

/// Current wall-clock time in the schedule's timezone, as fractional
/// minutes since midnight.
pub fn current_time_minutes(tz: Tz) -> f64 {
    let now = chrono::Utc::now().with_timezone(&tz);
    now.hour() as f64 * 60.0 + now.minute() as f64 + now.second() as f64 / 60.0
}

/// Format minutes-since-midnight as "HH:MM", wrapping post-midnight
/// hours back into a calendar day.
pub fn format_time(minutes: f64) -> String {
    let total = minutes.max(0.0);
    let h = (total / 60.0).floor() as u64 % 24;
    let m = total.rem_euclid(60.0).floor() as u64;
    format!("{h:02}:{m:02}")
}

/// Absolute schedule-time distance, normalized across the service-day
/// boundary: a raw gap above 12 hours really is the complement.
fn wrapped_diff(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if diff > HALF_DAY_MINUTES {
        DAY_MINUTES - diff
    } else {
        diff
    }
}

/// Find the scheduled trip instance whose timing best matches `now`.
///
/// With a known next stop, trips are scored by the wrapped distance
/// between now and their scheduled arrival at that stop. Without one,
/// trips are scored by how far `now` falls outside their first-to-last
/// stop span; trips currently in-span score by distance to the span
/// midpoint scaled down by 1000, which keeps every in-span trip ahead
/// of out-of-span ones while making the choice deterministic.
/// Midnight-spanning trips (first > last) treat "inside" as
/// `now >= first || now <= last`.
pub fn find_active_trip<'a>(
    trips: &'a [Trip],
    stop_times_by_trip: &HashMap<String, Vec<StopTime>>,
    direction: Direction,
    now_minutes: f64,
    next_stop_id: Option<&str>,
) -> Option<&'a Trip> {
    let mut best: Option<(&Trip, f64)> = None;

    for trip in trips.iter().filter(|t| t.direction == direction) {
        let Some(visits) = stop_times_by_trip.get(&trip.trip_id) else {
            continue;
        };
        if visits.is_empty() {
            continue;
        }

        let score = if let Some(stop_id) = next_stop_id {
            let Some(scheduled) = visits
                .iter()
                .find(|st| st.stop_id == stop_id)
                .and_then(|st| parse_gtfs_time(&st.arrival_time))
            else {
                continue;
            };
            wrapped_diff(now_minutes, scheduled)
        } else {
            let first = parse_gtfs_time(&visits[0].arrival_time);
            let last = parse_gtfs_time(&visits[visits.len() - 1].arrival_time);
            let (Some(first), Some(last)) = (first, last) else {
                continue;
            };
            span_score(now_minutes, first, last)
        };

        if best.map_or(true, |(_, s)| score < s) {
            best = Some((trip, score));
        }
    }

    best.map(|(trip, _)| trip)
}

fn span_score(now: f64, first: f64, last: f64) -> f64 {
    if first <= last {
        if now >= first && now <= last {
            let mid = (first + last) / 2.0;
            (now - mid).abs() / 1000.0
        } else if now < first {
            first - now
        } else {
            now - last
        }
    } else {
        // Span crosses midnight.
        if now >= first || now <= last {
            0.0
        } else {
            wrapped_diff(first, now).min(wrapped_diff(now, last))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Punctuality {
    OnTime,
    Late,
}

/// Schedule-adherence verdict for a vehicle approaching one stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayStatus {
    pub status: Punctuality,
    /// Whole minutes behind schedule; 0 when on time.
    pub delay_minutes: i64,
    /// Scheduled arrival at the next stop, "HH:MM".
    pub scheduled_time: String,
    /// Estimated arrival, never earlier than the schedule, "HH:MM".
    pub estimated_time: String,
}

/// Compare scheduled vs. actual arrival at `next_stop_id` for
/// `active_trip`. Returns `None` when the trip or the stop-time row is
/// missing — "insufficient data", not an error.
pub fn calculate_delay_status(
    next_stop_id: &str,
    active_trip: Option<&Trip>,
    stop_times_by_trip: &HashMap<String, Vec<StopTime>>,
    now_minutes: f64,
) -> Option<DelayStatus> {
    let trip = active_trip?;
    let visits = stop_times_by_trip.get(&trip.trip_id)?;
    let scheduled = visits
        .iter()
        .find(|st| st.stop_id == next_stop_id)
        .and_then(|st| parse_gtfs_time(&st.arrival_time))?;

    let mut delay = now_minutes - scheduled;
    if delay > HALF_DAY_MINUTES {
        delay -= DAY_MINUTES;
    } else if delay < -HALF_DAY_MINUTES {
        delay += DAY_MINUTES;
    }

    let status = if delay <= 0.0 {
        Punctuality::OnTime
    } else {
        Punctuality::Late
    };
    let delay_minutes = match status {
        Punctuality::OnTime => 0,
        Punctuality::Late => delay.round() as i64,
    };
    let estimated = scheduled + delay.max(0.0);

    Some(DelayStatus {
        status,
        delay_minutes,
        scheduled_time: format_time(scheduled),
        estimated_time: format_time(estimated),
    })
}

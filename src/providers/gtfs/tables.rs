//! Record types for the five static GTFS tables and their CSV parsers.
//!
//! Parsing is header-driven: column positions are looked up by name once
//! per table, so feeds with reordered or extra columns parse fine.
//! Malformed optional fields degrade to defaults rather than failing the
//! row; only a missing mandatory id skips a record.

use std::collections::HashMap;

use tracing::warn;

use crate::models::Direction;

use super::error::GtfsError;

/// Placeholder headsign for trips.txt rows without a `trip_headsign`.
pub const UNKNOWN_HEADSIGN: &str = "Unknown Destination";

/// A stop (from stops.txt). Identity is `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// A route (from routes.txt). `short_name` is the public line code
/// (e.g. "200", "900M", "Z4").
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: String,
    pub short_name: String,
    pub long_name: String,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub desc: Option<String>,
    pub url: Option<String>,
}

/// A trip (from trips.txt).
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub route_id: String,
    pub trip_id: String,
    pub headsign: String,
    pub direction: Direction,
    pub shape_id: String,
}

/// A scheduled stop visit (from stop_times.txt).
///
/// Times stay as schedule-local "HH:MM:SS" strings; hours may exceed 23
/// for post-midnight trips. Use [`parse_gtfs_time`] to get minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTime {
    pub trip_id: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

/// A point of a trip's physical polyline (from shapes.txt).
#[derive(Debug, Clone, PartialEq)]
pub struct ShapePoint {
    pub lat: f64,
    pub lon: f64,
    pub sequence: u32,
}

/// Parse a GTFS "HH:MM:SS" time into fractional minutes since midnight
/// of the service day. Hours >= 24 are not wrapped ("25:30:00" -> 1530).
pub fn parse_gtfs_time(time_str: &str) -> Option<f64> {
    let mut parts = time_str.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 60.0 + minutes + seconds / 60.0)
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_column(
    headers: &csv::StringRecord,
    table: &str,
    name: &str,
) -> Result<usize, GtfsError> {
    header_index(headers, name)
        .ok_or_else(|| GtfsError::ParseError(format!("{table} missing {name}")))
}

fn optional_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let value = idx.and_then(|i| record.get(i)).unwrap_or("").trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn parse_routes(text: &str) -> Result<Vec<Route>, GtfsError> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_id = require_column(&headers, "routes.txt", "route_id")?;
    let idx_short = header_index(&headers, "route_short_name");
    let idx_long = header_index(&headers, "route_long_name");
    let idx_color = header_index(&headers, "route_color");
    let idx_text_color = header_index(&headers, "route_text_color");
    let idx_desc = header_index(&headers, "route_desc");
    let idx_url = header_index(&headers, "route_url");

    let mut routes = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let id = record.get(idx_id).unwrap_or("").trim().to_string();
        if id.is_empty() {
            skipped += 1;
            continue;
        }
        routes.push(Route {
            id,
            short_name: optional_field(&record, idx_short).unwrap_or_default(),
            long_name: optional_field(&record, idx_long).unwrap_or_default(),
            color: optional_field(&record, idx_color),
            text_color: optional_field(&record, idx_text_color),
            desc: optional_field(&record, idx_desc),
            url: optional_field(&record, idx_url),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped routes.txt records with empty route_id");
    }
    Ok(routes)
}

pub fn parse_trips(text: &str) -> Result<Vec<Trip>, GtfsError> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_trip = require_column(&headers, "trips.txt", "trip_id")?;
    let idx_route = require_column(&headers, "trips.txt", "route_id")?;
    let idx_headsign = header_index(&headers, "trip_headsign");
    let idx_dir = header_index(&headers, "direction_id");
    let idx_shape = header_index(&headers, "shape_id");

    let mut trips = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("").trim().to_string();
        if trip_id.is_empty() {
            skipped += 1;
            continue;
        }
        trips.push(Trip {
            route_id: record.get(idx_route).unwrap_or("").trim().to_string(),
            trip_id,
            headsign: optional_field(&record, idx_headsign)
                .unwrap_or_else(|| UNKNOWN_HEADSIGN.to_string()),
            direction: Direction::from_gtfs(
                idx_dir.and_then(|i| record.get(i)).unwrap_or(""),
            ),
            shape_id: optional_field(&record, idx_shape).unwrap_or_default(),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped trips.txt records with empty trip_id");
    }
    Ok(trips)
}

pub fn parse_stops(text: &str) -> Result<Vec<Stop>, GtfsError> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_id = require_column(&headers, "stops.txt", "stop_id")?;
    let idx_name = header_index(&headers, "stop_name");
    let idx_lat = header_index(&headers, "stop_lat");
    let idx_lon = header_index(&headers, "stop_lon");

    let mut stops = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let id = record.get(idx_id).unwrap_or("").trim().to_string();
        let lat = idx_lat
            .and_then(|i| record.get(i))
            .and_then(|s| s.trim().parse::<f64>().ok());
        let lon = idx_lon
            .and_then(|i| record.get(i))
            .and_then(|s| s.trim().parse::<f64>().ok());
        let (Some(lat), Some(lon)) = (lat, lon) else {
            skipped += 1;
            continue;
        };
        if id.is_empty() {
            skipped += 1;
            continue;
        }
        stops.push(Stop {
            id,
            name: optional_field(&record, idx_name).unwrap_or_default(),
            lat,
            lon,
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped stops.txt records without id or coordinates");
    }
    Ok(stops)
}

pub fn parse_stop_times(text: &str) -> Result<Vec<StopTime>, GtfsError> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_trip = require_column(&headers, "stop_times.txt", "trip_id")?;
    let idx_stop = require_column(&headers, "stop_times.txt", "stop_id")?;
    let idx_seq = require_column(&headers, "stop_times.txt", "stop_sequence")?;
    let idx_arr = header_index(&headers, "arrival_time");
    let idx_dep = header_index(&headers, "departure_time");

    let mut stop_times = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("").trim().to_string();
        if trip_id.is_empty() {
            skipped += 1;
            continue;
        }
        stop_times.push(StopTime {
            trip_id,
            arrival_time: optional_field(&record, idx_arr).unwrap_or_default(),
            departure_time: optional_field(&record, idx_dep).unwrap_or_default(),
            stop_id: record.get(idx_stop).unwrap_or("").trim().to_string(),
            stop_sequence: record
                .get(idx_seq)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped stop_times.txt records with empty trip_id");
    }
    Ok(stop_times)
}

/// Parse shapes.txt into a `shape_id -> points` index. Each shape's
/// points are sorted ascending by `shape_pt_sequence` before return.
pub fn parse_shapes(text: &str) -> Result<HashMap<String, Vec<ShapePoint>>, GtfsError> {
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();

    let idx_id = require_column(&headers, "shapes.txt", "shape_id")?;
    let idx_lat = require_column(&headers, "shapes.txt", "shape_pt_lat")?;
    let idx_lon = require_column(&headers, "shapes.txt", "shape_pt_lon")?;
    let idx_seq = header_index(&headers, "shape_pt_sequence");

    let mut shapes: HashMap<String, Vec<ShapePoint>> = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let shape_id = record.get(idx_id).unwrap_or("").trim().to_string();
        if shape_id.is_empty() {
            skipped += 1;
            continue;
        }
        let lat = record.get(idx_lat).and_then(|s| s.trim().parse().ok());
        let lon = record.get(idx_lon).and_then(|s| s.trim().parse().ok());
        let (Some(lat), Some(lon)) = (lat, lon) else {
            skipped += 1;
            continue;
        };
        shapes.entry(shape_id).or_default().push(ShapePoint {
            lat,
            lon,
            sequence: idx_seq
                .and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped shapes.txt records without id or coordinates");
    }

    for points in shapes.values_mut() {
        points.sort_by_key(|p| p.sequence);
    }

    Ok(shapes)
}

/// Group stop times by trip and sort each trip's visits by
/// `stop_sequence` ascending.
pub fn stop_times_by_trip(stop_times: &[StopTime]) -> HashMap<String, Vec<StopTime>> {
    let mut by_trip: HashMap<String, Vec<StopTime>> = HashMap::new();
    for st in stop_times {
        by_trip.entry(st.trip_id.clone()).or_default().push(st.clone());
    }
    for visits in by_trip.values_mut() {
        visits.sort_by_key(|st| st.stop_sequence);
    }
    by_trip
}

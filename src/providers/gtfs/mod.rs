//! Static GTFS schedule provider.
//!
//! Parses the five tabular text tables (routes, trips, stops,
//! stop_times, shapes) from a directory, zip archive, HTTP base URL or
//! in-memory fixture, and serves typed records from a memoized store
//! with request de-duplication.

pub mod error;
pub mod store;
pub mod tables;

pub use error::GtfsError;
pub use store::{GtfsStore, ScheduleSource};
pub use tables::{
    parse_gtfs_time, stop_times_by_trip, Route, ShapePoint, Stop, StopTime, Trip,
    UNKNOWN_HEADSIGN,
};

//! External data providers: the static GTFS schedule and the live
//! vehicle position feed.

pub mod gtfs;
pub mod vehicles;

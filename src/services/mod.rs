//! Correlation and schedule-matching services.
//!
//! Pure functions over the typed GTFS records: direction
//! classification, representative trip selection, route progression,
//! schedule matching and route ordering. The [`crate::sync::Tracker`]
//! composes these per vehicle tick.

pub mod direction;
pub mod progression;
pub mod representative;
pub mod route_order;
pub mod schedule;

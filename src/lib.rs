//! Correlates live transit vehicle positions against a static GTFS
//! schedule: direction classification, route progression and schedule
//! adherence, driven by a background polling loop.

pub mod compute;
pub mod config;
pub mod geo;
pub mod models;
pub mod providers;
pub mod services;
pub mod sync;

pub use compute::Compute;
pub use config::Config;
pub use models::{Direction, VehiclePosition};
pub use providers::gtfs::{GtfsStore, ScheduleSource};
pub use providers::vehicles::VehicleFeed;
pub use sync::{Tracker, TrackerUpdate, VehicleStatus};

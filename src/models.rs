//! Shared data types used across the engine.

use serde::{Deserialize, Serialize};

/// GTFS binary `direction_id`: the two traversal directions of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Parse a GTFS `direction_id` field. Missing or unparseable values
    /// default to `Outbound`, per the feed conventions we consume.
    pub fn from_gtfs(raw: &str) -> Self {
        match raw.trim().parse::<u8>() {
            Ok(1) => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

/// A live vehicle position as supplied by the external feed.
///
/// Ephemeral: the whole set is replaced on each refresh tick, no history
/// is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePosition {
    /// Stable vehicle identifier from the feed.
    pub id: String,
    /// Route short name ("line number") this vehicle is serving.
    pub line: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Compass bearing in degrees, if the feed reports one.
    pub bearing: Option<f64>,
    /// Speed as reported by the feed (unit is feed-defined).
    pub speed: Option<f64>,
    /// Observation timestamp as reported by the feed.
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_gtfs_values() {
        assert_eq!(Direction::from_gtfs("0"), Direction::Outbound);
        assert_eq!(Direction::from_gtfs("1"), Direction::Inbound);
        assert_eq!(Direction::from_gtfs(""), Direction::Outbound);
        assert_eq!(Direction::from_gtfs("garbage"), Direction::Outbound);
        assert_eq!(Direction::from_gtfs("2"), Direction::Outbound);
        assert_eq!(Direction::from_gtfs(" 1 "), Direction::Inbound);
    }

    #[test]
    fn direction_opposite() {
        assert_eq!(Direction::Outbound.opposite(), Direction::Inbound);
        assert_eq!(Direction::Inbound.opposite(), Direction::Outbound);
    }
}

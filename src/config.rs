use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::providers::gtfs::ScheduleSource;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where the static GTFS tables come from.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub schedule: ScheduleConfig,
    /// Live vehicle position feed endpoint (JSON).
    pub feed_url: String,
    /// Tracker loop configuration
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Static schedule location. Exactly one variant per config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleConfig {
    /// Directory holding routes.txt, trips.txt, stops.txt,
    /// stop_times.txt and shapes.txt.
    Dir(PathBuf),
    /// A GTFS zip archive.
    Zip(PathBuf),
    /// HTTP base URL serving the raw table files.
    Url(String),
}

impl ScheduleConfig {
    pub fn to_source(&self, client: reqwest::Client) -> ScheduleSource {
        match self {
            ScheduleConfig::Dir(path) => ScheduleSource::Dir(path.clone()),
            ScheduleConfig::Zip(path) => ScheduleSource::Zip(path.clone()),
            ScheduleConfig::Url(base_url) => ScheduleSource::Http {
                client,
                base_url: base_url.clone(),
            },
        }
    }
}

/// Configuration for the background tracking loop
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Interval in seconds between feed polls (default: 15)
    #[serde(default = "TrackerConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// IANA timezone the schedule is published in (default: UTC)
    #[serde(default = "TrackerConfig::default_timezone")]
    pub timezone: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::default_poll_interval_secs(),
            timezone: Self::default_timezone(),
        }
    }
}

impl TrackerConfig {
    fn default_poll_interval_secs() -> u64 {
        15
    }
    fn default_timezone() -> String {
        "UTC".to_string()
    }

    /// Parse the configured timezone, falling back to UTC with a
    /// warning when the name is unknown.
    pub fn parsed_timezone(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "Unknown timezone, falling back to UTC");
            chrono_tz::Tz::UTC
        })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
schedule:
  zip: ./gtfs.zip
feed_url: https://example.org/api/vehicles
tracker:
  poll_interval_secs: 30
  timezone: Europe/Lisbon
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.schedule, ScheduleConfig::Zip(_)));
        assert_eq!(config.tracker.poll_interval_secs, 30);
        assert_eq!(
            config.tracker.parsed_timezone(),
            chrono_tz::Europe::Lisbon
        );
    }

    #[test]
    fn tracker_section_defaults() {
        let yaml = r#"
schedule:
  dir: ./gtfs
feed_url: https://example.org/api/vehicles
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.schedule, ScheduleConfig::Dir(_)));
        assert_eq!(config.tracker.poll_interval_secs, 15);
        assert_eq!(config.tracker.parsed_timezone(), chrono_tz::Tz::UTC);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let tracker = TrackerConfig {
            poll_interval_secs: 15,
            timezone: "Mars/Olympus_Mons".to_string(),
        };
        assert_eq!(tracker.parsed_timezone(), chrono_tz::Tz::UTC);
    }
}

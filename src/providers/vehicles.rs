//! Live vehicle position feed.
//!
//! Polls a JSON endpoint (CKAN datastore layout: records under
//! `result.records`) and maps each record into a [`VehiclePosition`].
//! Field names vary between deployments, so lookups tolerate the common
//! aliases and records missing coordinates are dropped. Errors are
//! logged and degrade to an empty list; a later tick simply retries.

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::VehiclePosition;

pub struct VehicleFeed {
    client: reqwest::Client,
    url: String,
}

impl VehicleFeed {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    /// Fetch the latest position of every vehicle on the network.
    pub async fn fetch_positions(&self) -> Vec<VehiclePosition> {
        match self.try_fetch().await {
            Ok(positions) => {
                debug!(count = positions.len(), "Fetched live vehicle positions");
                positions
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch live vehicle positions");
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self) -> Result<Vec<VehiclePosition>, reqwest::Error> {
        let response = self
            .client
            .get(&self.url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Ok(extract_positions(&body))
    }
}

/// Map a feed response body into vehicle positions. Pure, so the
/// tolerant field handling is testable without a network.
pub fn extract_positions(body: &Value) -> Vec<VehiclePosition> {
    let records = body
        .pointer("/result/records")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut positions = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        match extract_record(record) {
            Some(position) => positions.push(position),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "Skipped vehicle records without id, line or coordinates");
    }
    positions
}

fn extract_record(record: &Value) -> Option<VehiclePosition> {
    let id = string_field(record, &["vehicle_id", "id"])?;
    let line = string_field(record, &["line_id", "route_id", "line"])?;
    let latitude = number_field(record, &["lat", "latitude"])?;
    let longitude = number_field(record, &["lon", "longitude"])?;

    Some(VehiclePosition {
        id,
        line,
        latitude,
        longitude,
        bearing: number_field(record, &["bearing"]),
        speed: number_field(record, &["speed"]),
        timestamp: string_field(record, &["timestamp"]),
    })
}

/// First non-empty value among the aliased keys, as a string. Numeric
/// ids are accepted and stringified.
fn string_field(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First parseable numeric value among the aliased keys. Feeds deliver
/// these as either JSON numbers or numeric strings.
fn number_field(record: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match record.get(key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<f64>() {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_records_with_aliased_fields() {
        let body = json!({
            "result": {
                "records": [
                    {
                        "vehicle_id": "3012",
                        "line_id": "200",
                        "lat": "41.1496",
                        "lon": "-8.6109",
                        "bearing": 135.0,
                        "speed": 22.5,
                        "timestamp": "2026-08-29T10:15:00Z"
                    },
                    {
                        "id": 4471,
                        "route_id": "901",
                        "latitude": 41.16,
                        "longitude": -8.63
                    }
                ]
            }
        });

        let positions = extract_positions(&body);
        assert_eq!(positions.len(), 2);

        assert_eq!(positions[0].id, "3012");
        assert_eq!(positions[0].line, "200");
        assert!((positions[0].latitude - 41.1496).abs() < 1e-9);
        assert_eq!(positions[0].bearing, Some(135.0));
        assert_eq!(positions[0].speed, Some(22.5));
        assert_eq!(
            positions[0].timestamp.as_deref(),
            Some("2026-08-29T10:15:00Z")
        );

        assert_eq!(positions[1].id, "4471");
        assert_eq!(positions[1].line, "901");
        assert_eq!(positions[1].bearing, None);
    }

    #[test]
    fn drops_records_missing_mandatory_fields() {
        let body = json!({
            "result": {
                "records": [
                    { "vehicle_id": "1", "line_id": "200", "lat": 41.0, "lon": -8.6 },
                    { "vehicle_id": "2", "line_id": "200", "lat": "not-a-number", "lon": -8.6 },
                    { "vehicle_id": "3", "lat": 41.0, "lon": -8.6 },
                    { "line_id": "200", "lat": 41.0, "lon": -8.6 }
                ]
            }
        });

        let positions = extract_positions(&body);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].id, "1");
    }

    #[test]
    fn tolerates_unexpected_body_shape() {
        assert!(extract_positions(&json!({})).is_empty());
        assert!(extract_positions(&json!({"result": {}})).is_empty());
        assert!(extract_positions(&json!({"result": {"records": "nope"}})).is_empty());
        assert!(extract_positions(&json!([1, 2, 3])).is_empty());
    }
}

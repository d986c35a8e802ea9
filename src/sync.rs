//! Background tracking of live vehicles against the static schedule.
//!
//! The [`Tracker`] owns the GTFS store and the live feed. On a fixed
//! interval it replaces the latest position set wholesale, derives the
//! per-route context it has not seen yet, and broadcasts a tick
//! notification. Per-vehicle analysis (direction, progression, active
//! trip, delay) is computed on demand from the cached context.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Direction, VehiclePosition};
use crate::providers::gtfs::{
    stop_times_by_trip, GtfsStore, Route, ShapePoint, Stop, StopTime, Trip,
};
use crate::providers::vehicles::VehicleFeed;
use crate::services::direction::classify_direction;
use crate::services::progression::{stop_shape_positions, track_progression, Progression};
use crate::services::representative::{representative_trips, RepresentativeTrips};
use crate::services::schedule::{
    calculate_delay_status, current_time_minutes, find_active_trip, DelayStatus,
};

/// Broadcast on every completed poll cycle.
#[derive(Debug, Clone)]
pub struct TrackerUpdate {
    pub timestamp: String,
    pub vehicle_count: usize,
}

pub type TrackerUpdateSender = broadcast::Sender<TrackerUpdate>;

/// Stop sequences of the two directions of one route, in travel order.
#[derive(Debug, Clone, Default)]
pub struct DirectionStops {
    pub direction0: Vec<Stop>,
    pub direction1: Vec<Stop>,
}

impl DirectionStops {
    pub fn for_direction(&self, direction: Direction) -> &[Stop] {
        match direction {
            Direction::Outbound => &self.direction0,
            Direction::Inbound => &self.direction1,
        }
    }
}

/// Everything derived once per route: representative trips, their stop
/// sequences and shapes, the stop-to-shape projection tables and the
/// per-trip stop times used for schedule matching.
pub struct RouteContext {
    pub route: Route,
    pub trips: Vec<Trip>,
    pub stops: DirectionStops,
    pub shape0: Vec<ShapePoint>,
    pub shape1: Vec<ShapePoint>,
    pub positions0: Vec<usize>,
    pub positions1: Vec<usize>,
    pub representative: RepresentativeTrips,
    pub stop_times_by_trip: HashMap<String, Vec<StopTime>>,
}

impl RouteContext {
    fn shape_for(&self, direction: Direction) -> (&[ShapePoint], &[usize]) {
        match direction {
            Direction::Outbound => (&self.shape0, &self.positions0),
            Direction::Inbound => (&self.shape1, &self.positions1),
        }
    }
}

/// The full analysis of one vehicle at one instant.
#[derive(Debug, Clone)]
pub struct VehicleStatus {
    pub vehicle: VehiclePosition,
    pub direction: Direction,
    pub progression: Progression,
    pub active_trip_id: Option<String>,
    pub delay: Option<DelayStatus>,
}

pub struct Tracker {
    store: GtfsStore,
    feed: VehicleFeed,
    timezone: chrono_tz::Tz,
    poll_interval_secs: u64,
    positions: RwLock<Vec<VehiclePosition>>,
    contexts: RwLock<HashMap<String, Arc<RouteContext>>>,
    updates_tx: TrackerUpdateSender,
}

impl Tracker {
    pub fn new(store: GtfsStore, feed: VehicleFeed, config: &Config) -> Self {
        // Capacity 16: slow receivers only miss intermediate ticks and
        // the latest state supersedes them anyway.
        let (updates_tx, _) = broadcast::channel(16);
        Self {
            store,
            feed,
            timezone: config.tracker.parsed_timezone(),
            poll_interval_secs: config.tracker.poll_interval_secs,
            positions: RwLock::new(Vec::new()),
            contexts: RwLock::new(HashMap::new()),
            updates_tx,
        }
    }

    /// Sender for tick notifications.
    pub fn updates_sender(&self) -> TrackerUpdateSender {
        self.updates_tx.clone()
    }

    /// The latest position set, replaced wholesale each poll.
    pub async fn latest_positions(&self) -> Vec<VehiclePosition> {
        self.positions.read().await.clone()
    }

    /// Run the polling loop forever.
    pub async fn start(self: Arc<Self>) {
        info!(
            interval_secs = self.poll_interval_secs,
            timezone = %self.timezone,
            "Starting tracker loop"
        );
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(self.poll_interval_secs));
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One poll cycle: refresh positions, warm the route contexts for
    /// every line seen, notify listeners.
    pub async fn tick(&self) {
        let positions = self.feed.fetch_positions().await;
        let vehicle_count = positions.len();

        let mut lines: Vec<String> = positions.iter().map(|p| p.line.clone()).collect();
        lines.sort();
        lines.dedup();

        {
            let mut latest = self.positions.write().await;
            *latest = positions;
        }

        // Build contexts for lines we have not seen yet, concurrently.
        let missing: Vec<String> = {
            let contexts = self.contexts.read().await;
            lines
                .iter()
                .filter(|l| !contexts.contains_key(l.as_str()))
                .cloned()
                .collect()
        };
        if !missing.is_empty() {
            let builds = missing.iter().map(|line| self.build_route_context(line));
            let built = futures::future::join_all(builds).await;
            let mut contexts = self.contexts.write().await;
            for (line, context) in missing.into_iter().zip(built) {
                if let Some(context) = context {
                    contexts.insert(line, context);
                }
            }
        }

        let update = TrackerUpdate {
            timestamp: chrono::Utc::now().to_rfc3339(),
            vehicle_count,
        };
        // Send errors just mean no one is listening.
        let _ = self.updates_tx.send(update);

        info!(vehicles = vehicle_count, lines = lines.len(), "Completed tracker tick");
    }

    /// Cached derived data for a public line code, building it on first
    /// request. `None` when the line is not in the schedule.
    pub async fn route_context(&self, line: &str) -> Option<Arc<RouteContext>> {
        if let Some(context) = self.contexts.read().await.get(line) {
            return Some(context.clone());
        }
        let context = self.build_route_context(line).await?;
        self.contexts
            .write()
            .await
            .insert(line.to_string(), context.clone());
        Some(context)
    }

    async fn build_route_context(&self, line: &str) -> Option<Arc<RouteContext>> {
        let routes = self.store.fetch_routes().await;
        let route = routes.iter().find(|r| r.short_name == line)?.clone();

        let trips = self.store.fetch_trips(&route.id).await;
        let trip_ids: std::collections::HashSet<&str> =
            trips.iter().map(|t| t.trip_id.as_str()).collect();

        let all_stop_times = self.store.fetch_stop_times().await;
        let route_stop_times: Vec<StopTime> = all_stop_times
            .iter()
            .filter(|st| trip_ids.contains(st.trip_id.as_str()))
            .cloned()
            .collect();
        let by_trip = stop_times_by_trip(&route_stop_times);

        let representative = representative_trips(&route, &trips, &by_trip);

        let all_stops = self.store.fetch_stops().await;
        let stop_index: HashMap<&str, &Stop> =
            all_stops.iter().map(|s| (s.id.as_str(), s)).collect();

        let stops_of = |trip: Option<&Trip>| -> Vec<Stop> {
            let Some(trip) = trip else { return Vec::new() };
            by_trip
                .get(&trip.trip_id)
                .map(|visits| {
                    visits
                        .iter()
                        .filter_map(|v| stop_index.get(v.stop_id.as_str()).copied().cloned())
                        .collect()
                })
                .unwrap_or_default()
        };
        let stops = DirectionStops {
            direction0: stops_of(representative.direction0.as_ref()),
            direction1: stops_of(representative.direction1.as_ref()),
        };

        let shape0 = match representative.direction0.as_ref() {
            Some(t) => self.store.fetch_shape(&t.shape_id).await,
            None => Vec::new(),
        };
        let shape1 = match representative.direction1.as_ref() {
            Some(t) => self.store.fetch_shape(&t.shape_id).await,
            None => Vec::new(),
        };

        let positions0 = stop_shape_positions(&stops.direction0, &shape0);
        let positions1 = stop_shape_positions(&stops.direction1, &shape1);

        debug!(
            line,
            route_id = %route.id,
            trips = trips.len(),
            dir0_stops = stops.direction0.len(),
            dir1_stops = stops.direction1.len(),
            "Built route context"
        );

        Some(Arc::new(RouteContext {
            route,
            trips,
            stops,
            shape0,
            shape1,
            positions0,
            positions1,
            representative,
            stop_times_by_trip: by_trip,
        }))
    }

    /// Full analysis of one vehicle against the schedule clock.
    pub async fn vehicle_status(&self, vehicle: &VehiclePosition) -> Option<VehicleStatus> {
        let now_minutes = current_time_minutes(self.timezone);
        self.vehicle_status_at(vehicle, now_minutes).await
    }

    /// As [`Self::vehicle_status`] at an explicit schedule clock.
    pub async fn vehicle_status_at(
        &self,
        vehicle: &VehiclePosition,
        now_minutes: f64,
    ) -> Option<VehicleStatus> {
        let context = self.route_context(&vehicle.line).await?;

        let direction = classify_direction(
            vehicle.latitude,
            vehicle.longitude,
            vehicle.bearing,
            &context.stops.direction0,
            &context.stops.direction1,
        );

        let stops = context.stops.for_direction(direction);
        let (shape, positions) = context.shape_for(direction);
        let progression = track_progression(
            vehicle.latitude,
            vehicle.longitude,
            stops,
            shape,
            positions,
        );

        let next_stop_id = progression
            .next_stop_index
            .and_then(|i| stops.get(i))
            .map(|s| s.id.clone());

        let active_trip = find_active_trip(
            &context.trips,
            &context.stop_times_by_trip,
            direction,
            now_minutes,
            next_stop_id.as_deref(),
        );
        let delay = next_stop_id.as_deref().and_then(|stop_id| {
            calculate_delay_status(
                stop_id,
                active_trip,
                &context.stop_times_by_trip,
                now_minutes,
            )
        });

        Some(VehicleStatus {
            vehicle: vehicle.clone(),
            direction,
            progression,
            active_trip_id: active_trip.map(|t| t.trip_id.clone()),
            delay,
        })
    }

    /// Bucket a line's vehicles by classified direction.
    pub async fn split_by_direction(
        &self,
        line: &str,
        positions: &[VehiclePosition],
    ) -> (Vec<VehiclePosition>, Vec<VehiclePosition>) {
        let Some(context) = self.route_context(line).await else {
            return (positions.to_vec(), Vec::new());
        };

        let mut outbound = Vec::new();
        let mut inbound = Vec::new();
        for vehicle in positions.iter().filter(|p| p.line == line) {
            let direction = classify_direction(
                vehicle.latitude,
                vehicle.longitude,
                vehicle.bearing,
                &context.stops.direction0,
                &context.stops.direction1,
            );
            match direction {
                Direction::Outbound => outbound.push(vehicle.clone()),
                Direction::Inbound => inbound.push(vehicle.clone()),
            }
        }
        (outbound, inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Compute;
    use crate::config::{ScheduleConfig, TrackerConfig};
    use crate::providers::gtfs::ScheduleSource;
    use crate::services::schedule::Punctuality;

    /// Route 200 running due north: four stops at 41.00..41.03, one
    /// outbound and one inbound trip, shapes tracing the stops.
    fn memory_source() -> ScheduleSource {
        let mut tables = HashMap::new();
        tables.insert(
            "routes.txt".to_string(),
            "route_id,route_short_name,route_long_name\n\
             r1,200,Bolhao - Castelo do Queijo\n"
                .to_string(),
        );
        tables.insert(
            "trips.txt".to_string(),
            "route_id,trip_id,trip_headsign,direction_id,shape_id\n\
             r1,t1,Castelo do Queijo,0,shape0\n\
             r1,t2,Bolhao,1,shape1\n"
                .to_string(),
        );
        tables.insert(
            "stops.txt".to_string(),
            "stop_id,stop_name,stop_lat,stop_lon\n\
             s1,Bolhao,41.000,-8.6\n\
             s2,Santa Catarina,41.010,-8.6\n\
             s3,Marques,41.020,-8.6\n\
             s4,Castelo do Queijo,41.030,-8.6\n"
                .to_string(),
        );
        tables.insert(
            "stop_times.txt".to_string(),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
             t1,08:00:00,08:00:00,s1,1\n\
             t1,08:05:00,08:05:00,s2,2\n\
             t1,08:10:00,08:10:00,s3,3\n\
             t1,08:15:00,08:15:00,s4,4\n\
             t2,09:00:00,09:00:00,s4,1\n\
             t2,09:05:00,09:05:00,s3,2\n\
             t2,09:10:00,09:10:00,s2,3\n\
             t2,09:15:00,09:15:00,s1,4\n"
                .to_string(),
        );
        tables.insert(
            "shapes.txt".to_string(),
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             shape0,41.000,-8.6,1\n\
             shape0,41.010,-8.6,2\n\
             shape0,41.020,-8.6,3\n\
             shape0,41.030,-8.6,4\n\
             shape1,41.030,-8.6,1\n\
             shape1,41.020,-8.6,2\n\
             shape1,41.010,-8.6,3\n\
             shape1,41.000,-8.6,4\n"
                .to_string(),
        );
        ScheduleSource::Memory(tables)
    }

    fn test_tracker() -> Tracker {
        let store = GtfsStore::with_compute(memory_source(), Compute::Inline);
        let feed = VehicleFeed::new(
            reqwest::Client::new(),
            "http://localhost/unused".to_string(),
        );
        let config = Config {
            schedule: ScheduleConfig::Dir("unused".into()),
            feed_url: "http://localhost/unused".to_string(),
            tracker: TrackerConfig::default(),
        };
        Tracker::new(store, feed, &config)
    }

    fn vehicle(id: &str, lat: f64, bearing: Option<f64>) -> VehiclePosition {
        VehiclePosition {
            id: id.to_string(),
            line: "200".to_string(),
            latitude: lat,
            longitude: -8.6,
            bearing,
            speed: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn route_context_is_built_once_and_cached() {
        let tracker = test_tracker();
        let first = tracker.route_context("200").await.unwrap();
        let second = tracker.route_context("200").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(first.stops.direction0.len(), 4);
        assert_eq!(first.stops.direction1.len(), 4);
        assert_eq!(first.stops.direction0[0].id, "s1");
        assert_eq!(first.stops.direction1[0].id, "s4");
        assert_eq!(first.positions0, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn unknown_line_has_no_context() {
        let tracker = test_tracker();
        assert!(tracker.route_context("999").await.is_none());
    }

    #[tokio::test]
    async fn vehicle_status_derives_full_analysis() {
        let tracker = test_tracker();
        // Northbound between s2 and s3, slightly closer to s3, during
        // the outbound trip (08:05 schedule clock).
        let vehicle = vehicle("v1", 41.016, Some(0.0));
        let status = tracker.vehicle_status_at(&vehicle, 485.0).await.unwrap();

        assert_eq!(status.direction, Direction::Outbound);
        assert_eq!(status.active_trip_id.as_deref(), Some("t1"));
        // Projects onto shape index 2, so s1..s3 are passed and s4 next.
        assert_eq!(status.progression.next_stop_index, Some(3));

        let delay = status.delay.unwrap();
        assert_eq!(delay.status, Punctuality::OnTime);
        assert_eq!(delay.delay_minutes, 0);
        assert_eq!(delay.scheduled_time, "08:15");
    }

    #[tokio::test]
    async fn southbound_vehicle_classified_inbound() {
        let tracker = test_tracker();
        let vehicle = vehicle("v2", 41.016, Some(180.0));
        let status = tracker.vehicle_status_at(&vehicle, 545.0).await.unwrap();
        assert_eq!(status.direction, Direction::Inbound);
        assert_eq!(status.active_trip_id.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn splits_vehicles_by_direction() {
        let tracker = test_tracker();
        let positions = vec![
            vehicle("north-1", 41.005, Some(0.0)),
            vehicle("south-1", 41.016, Some(180.0)),
            vehicle("north-2", 41.025, Some(5.0)),
        ];
        let (outbound, inbound) = tracker.split_by_direction("200", &positions).await;
        assert_eq!(outbound.len(), 2);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].id, "south-1");
    }

    #[tokio::test]
    async fn latest_positions_replaced_wholesale() {
        let tracker = test_tracker();
        {
            let mut latest = tracker.positions.write().await;
            *latest = vec![vehicle("stale", 41.0, None)];
        }
        {
            let mut latest = tracker.positions.write().await;
            *latest = vec![vehicle("fresh-1", 41.0, None), vehicle("fresh-2", 41.01, None)];
        }
        let latest = tracker.latest_positions().await;
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|p| p.id.starts_with("fresh")));
    }
}

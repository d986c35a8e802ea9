//! In-memory GTFS store.
//!
//! Each table is parsed at most once per store lifetime and cached.
//! Concurrent callers racing for a not-yet-cached table collapse into a
//! single load: the per-table slot is guarded by an async mutex held
//! across the load, so the first caller parses and everyone else finds
//! the cache filled. A failed load leaves the slot empty (logged, empty
//! data served) and the next call retries.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::compute::Compute;

use super::error::GtfsError;
use super::tables::{
    self, Route, ShapePoint, Stop, StopTime, Trip,
};

/// Where the five static tables come from.
pub enum ScheduleSource {
    /// A directory containing routes.txt, trips.txt, stops.txt,
    /// stop_times.txt and shapes.txt.
    Dir(PathBuf),
    /// A GTFS zip archive containing the same files.
    Zip(PathBuf),
    /// An HTTP base URL serving the raw table files.
    Http {
        client: reqwest::Client,
        base_url: String,
    },
    /// In-memory fixtures, keyed by table file name. Used by tests.
    Memory(HashMap<String, String>),
}

impl ScheduleSource {
    async fn read_table(&self, name: &str, compute: Compute) -> Result<String, GtfsError> {
        match self {
            ScheduleSource::Dir(dir) => {
                Ok(tokio::fs::read_to_string(dir.join(name)).await?)
            }
            ScheduleSource::Zip(path) => {
                let path = path.clone();
                let name = name.to_string();
                compute
                    .run(move || read_zip_entry(&path, &name))
                    .await?
            }
            ScheduleSource::Http { client, base_url } => {
                let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
                let response = client
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(120))
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(GtfsError::NetworkMessage(format!(
                        "GTFS table {} HTTP {}",
                        name,
                        response.status()
                    )));
                }
                Ok(response.text().await?)
            }
            ScheduleSource::Memory(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| GtfsError::TableNotFound(name.to_string())),
        }
    }
}

fn read_zip_entry(path: &std::path::Path, name: &str) -> Result<String, GtfsError> {
    use std::io::Read;

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive
        .by_name(name)
        .map_err(|_| GtfsError::TableNotFound(name.to_string()))?;
    let mut text = String::with_capacity(entry.size() as usize);
    entry.read_to_string(&mut text)?;
    Ok(text)
}

/// A memoized table slot. The mutex is held across the load so that
/// concurrent first calls de-duplicate into one parse.
struct Slot<T> {
    value: Mutex<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    async fn get_or_load<F, Fut>(&self, table: &'static str, load: F) -> Option<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GtfsError>>,
    {
        let mut guard = self.value.lock().await;
        if let Some(cached) = guard.as_ref() {
            return Some(cached.clone());
        }
        match load().await {
            Ok(value) => {
                let value = Arc::new(value);
                *guard = Some(value.clone());
                Some(value)
            }
            Err(e) => {
                warn!(table, error = %e, "Failed to load GTFS table, serving empty data");
                None
            }
        }
    }

    async fn clear(&self) {
        *self.value.lock().await = None;
    }
}

/// Trips table plus its `route_id -> trips` index, built together.
struct TripTables {
    all: Vec<Trip>,
    by_route: HashMap<String, Vec<Trip>>,
}

pub struct GtfsStore {
    source: ScheduleSource,
    compute: Compute,
    routes: Slot<Vec<Route>>,
    trips: Slot<TripTables>,
    stops: Slot<Vec<Stop>>,
    stop_times: Slot<Vec<StopTime>>,
    shapes: Slot<HashMap<String, Vec<ShapePoint>>>,
}

impl GtfsStore {
    pub fn new(source: ScheduleSource) -> Self {
        Self::with_compute(source, Compute::default())
    }

    pub fn with_compute(source: ScheduleSource, compute: Compute) -> Self {
        Self {
            source,
            compute,
            routes: Slot::new(),
            trips: Slot::new(),
            stops: Slot::new(),
            stop_times: Slot::new(),
            shapes: Slot::new(),
        }
    }

    /// All routes, parsed once and memoized.
    pub async fn fetch_routes(&self) -> Arc<Vec<Route>> {
        self.routes
            .get_or_load("routes.txt", || async {
                let text = self.source.read_table("routes.txt", self.compute).await?;
                let routes = self.compute.run(move || tables::parse_routes(&text)).await??;
                info!(count = routes.len(), "Parsed GTFS routes");
                Ok(routes)
            })
            .await
            .unwrap_or_default()
    }

    /// All trips. Builds and caches the `route_id -> trips` index
    /// alongside the full table.
    pub async fn fetch_all_trips(&self) -> Vec<Trip> {
        match self.trip_tables().await {
            Some(tables) => tables.all.clone(),
            None => Vec::new(),
        }
    }

    /// Trips of one route, served from the cached index. Triggers the
    /// full trips load on first call.
    pub async fn fetch_trips(&self, route_id: &str) -> Vec<Trip> {
        match self.trip_tables().await {
            Some(tables) => tables.by_route.get(route_id).cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// The full stops table, memoized and unfiltered.
    pub async fn fetch_stops(&self) -> Arc<Vec<Stop>> {
        self.stops
            .get_or_load("stops.txt", || async {
                let text = self.source.read_table("stops.txt", self.compute).await?;
                let stops = self.compute.run(move || tables::parse_stops(&text)).await??;
                info!(count = stops.len(), "Parsed GTFS stops");
                Ok(stops)
            })
            .await
            .unwrap_or_default()
    }

    /// The full stop_times table, memoized and unfiltered. Callers slice
    /// as needed.
    pub async fn fetch_stop_times(&self) -> Arc<Vec<StopTime>> {
        self.stop_times
            .get_or_load("stop_times.txt", || async {
                let text = self
                    .source
                    .read_table("stop_times.txt", self.compute)
                    .await?;
                let stop_times = self
                    .compute
                    .run(move || tables::parse_stop_times(&text))
                    .await??;
                info!(count = stop_times.len(), "Parsed GTFS stop_times");
                Ok(stop_times)
            })
            .await
            .unwrap_or_default()
    }

    /// One shape's points, sorted by sequence. Loads and indexes the
    /// whole shapes table on first call.
    pub async fn fetch_shape(&self, shape_id: &str) -> Vec<ShapePoint> {
        let shapes = self
            .shapes
            .get_or_load("shapes.txt", || async {
                let text = self.source.read_table("shapes.txt", self.compute).await?;
                let shapes = self.compute.run(move || tables::parse_shapes(&text)).await??;
                info!(shapes = shapes.len(), "Parsed GTFS shapes");
                Ok(shapes)
            })
            .await;
        match shapes {
            Some(shapes) => shapes.get(shape_id).cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Drop all cached tables. The next fetch reloads from the source.
    pub async fn invalidate(&self) {
        tokio::join!(
            self.routes.clear(),
            self.trips.clear(),
            self.stops.clear(),
            self.stop_times.clear(),
            self.shapes.clear(),
        );
        info!("Invalidated GTFS store caches");
    }

    async fn trip_tables(&self) -> Option<Arc<TripTables>> {
        self.trips
            .get_or_load("trips.txt", || async {
                let text = self.source.read_table("trips.txt", self.compute).await?;
                let all = self.compute.run(move || tables::parse_trips(&text)).await??;
                let mut by_route: HashMap<String, Vec<Trip>> = HashMap::new();
                for trip in &all {
                    by_route
                        .entry(trip.route_id.clone())
                        .or_default()
                        .push(trip.clone());
                }
                info!(trips = all.len(), routes = by_route.len(), "Parsed GTFS trips");
                Ok(TripTables { all, by_route })
            })
            .await
    }
}

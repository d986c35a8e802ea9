use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buswatch::{Config, GtfsStore, Tracker, VehicleFeed};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    tracing::info!(
        feed_url = %config.feed_url,
        poll_interval_secs = config.tracker.poll_interval_secs,
        timezone = %config.tracker.timezone,
        "Loaded configuration"
    );

    let client = reqwest::Client::new();
    let store = GtfsStore::new(config.schedule.to_source(client.clone()));
    let feed = VehicleFeed::new(client, config.feed_url.clone());

    let tracker = Arc::new(Tracker::new(store, feed, &config));

    // Log a per-tick summary from the broadcast channel.
    let mut updates = tracker.updates_sender().subscribe();
    tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            tracing::debug!(
                timestamp = %update.timestamp,
                vehicles = update.vehicle_count,
                "Tracker update"
            );
        }
    });

    tracker.start().await;
}

//! eventmap-watch - follow a marker server from the terminal.
//!
//! Loads the layer catalog, bootstraps from the server and then logs every
//! change the long-poll loop merges. Searching is available by passing a
//! name prefix as the only argument, which prints matching points once the
//! initial state is loaded.

use eventmap_engine::{
    Canvas, ClientConfig, HttpTransport, LatLng, LayerCatalog, PolylineType, SyncLoop, SyncState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Canvas that reports drawing-surface changes as log events.
struct LogCanvas;

impl Canvas for LogCanvas {
    fn attached(&mut self, layer: &str, id: &str) {
        tracing::info!(layer, id, "shown");
    }

    fn detached(&mut self, layer: &str, id: &str) {
        tracing::info!(layer, id, "hidden");
    }

    fn repositioned(&mut self, id: &str, position: LatLng) {
        tracing::info!(id, lat = position.lat, lng = position.lng, "moved");
    }

    fn reshaped(&mut self, id: &str, points: &[LatLng]) {
        tracing::debug!(id, points = points.len(), "redrawn");
    }

    fn restyled(&mut self, id: &str, line_type: PolylineType) {
        tracing::info!(id, %line_type, "restyled");
    }

    fn relabeled(&mut self, old: &str, new: &str) {
        tracing::info!(old, new, "renamed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventmap_engine=info,eventmap_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env()?;
    let catalog = LayerCatalog::load(&config.layers_path)?;
    tracing::info!(
        server = %config.server_url,
        layers = catalog.len(),
        "starting event map watcher"
    );

    let state = SyncState::with_canvas(catalog, Box::new(LogCanvas));
    let transport = HttpTransport::new(config.server_url.clone());
    let (mut sync, handle) = SyncLoop::new(state, transport, config.sync);

    sync.bootstrap().await?;

    if let Some(prefix) = std::env::args().nth(1) {
        for hit in sync.state().search(&prefix) {
            println!(
                "{}\t{}\t{:.6},{:.6}",
                hit.title, hit.layer, hit.position.lat, hit.position.lng
            );
        }
        return Ok(());
    }

    let running = tokio::spawn(sync.run());
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    drop(handle);
    running.abort();

    Ok(())
}

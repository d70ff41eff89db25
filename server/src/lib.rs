//! Event Map Server - long-poll hub for the collaborative event map.
//!
//! Holds a single marker document in memory. Clients fetch it, long-poll for
//! a version different from the one they hold, and post their full state
//! back. See [`eventmap_engine`] for the client side of the protocol.

pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
mod routes;

use crate::config::Config;
use crate::hub::MarkerHub;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<MarkerHub>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State with an empty document.
    pub fn new(config: Config) -> error::Result<Self> {
        Ok(Self {
            hub: Arc::new(MarkerHub::new()?),
            config: Arc::new(config),
        })
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

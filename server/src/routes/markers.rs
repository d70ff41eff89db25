//! Marker document endpoints.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use eventmap_engine::SnapshotDoc;

use crate::error::Result;
use crate::handlers::{handle_get, handle_poll, handle_publish, PublishResponse};
use crate::AppState;

/// Create marker routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/markers/get", get(get_handler))
        .route("/api/markers/poll/{version}", get(poll_handler))
        .route("/api/markers/post", post(post_handler))
}

/// GET /api/markers/get - Current document.
async fn get_handler(State(state): State<AppState>) -> Json<SnapshotDoc> {
    Json(handle_get(&state.hub))
}

/// GET /api/markers/poll/{version} - Long-poll for a newer document.
async fn poll_handler(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Json<SnapshotDoc> {
    Json(handle_poll(&state.hub, &version, state.config.poll_hold).await)
}

/// POST /api/markers/post - Replace the document with a client's state.
async fn post_handler(State(state): State<AppState>, body: String) -> Result<Json<PublishResponse>> {
    let response = handle_publish(&state.hub, &body)?;
    Ok(Json(response))
}

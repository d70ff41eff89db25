//! Publish handler - replaces the document with a client's full state.

use crate::error::{AppError, Result};
use crate::hub::MarkerHub;
use eventmap_engine::{EntityInfo, SnapshotDoc, SyncVersion};
use serde::Serialize;

/// Response for a post.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// Version of the document after the post
    #[serde(rename = "sync-id")]
    pub sync_id: SyncVersion,
}

/// Process a full-state post from a client.
///
/// The client's `sync-id` is compared with the current version only for
/// logging; the last post always wins.
pub fn handle_publish(hub: &MarkerHub, body: &str) -> Result<PublishResponse> {
    let doc = SnapshotDoc::from_json(body)?;

    for (id, info) in &doc.markers {
        if let EntityInfo::Polyline { points, .. } = info {
            if points.len() < 2 {
                return Err(AppError::BadRequest(format!(
                    "polyline '{id}' needs at least 2 points"
                )));
            }
        }
    }

    let current = hub.sync_id();
    match doc.sync_id.as_deref() {
        Some(seen) if seen == current => {}
        seen => tracing::warn!(
            seen = ?seen,
            current = %current,
            "post based on a stale version, overwriting"
        ),
    }

    let published = hub.publish(doc.markers)?;
    if !published.changed {
        tracing::debug!(version = %published.sync_id, "post did not change the document");
    }

    Ok(PublishResponse {
        sync_id: published.sync_id,
    })
}

//! Fetch and poll handlers - serve the current document.

use crate::hub::MarkerHub;
use eventmap_engine::SnapshotDoc;
use std::time::Duration;

/// Serve the current document immediately.
pub fn handle_get(hub: &MarkerHub) -> SnapshotDoc {
    SnapshotDoc::clone(&hub.current())
}

/// Serve the document once its version differs from `current`, or the
/// unchanged document once `hold` has elapsed.
pub async fn handle_poll(hub: &MarkerHub, current: &str, hold: Duration) -> SnapshotDoc {
    tracing::debug!(version = %current, "poll waiting for change");
    let doc = hub.wait_for_change(current, hold).await;
    if doc.sync_id.as_deref() == Some(current) {
        tracing::debug!(version = %current, "poll hold expired");
    }
    SnapshotDoc::clone(&doc)
}

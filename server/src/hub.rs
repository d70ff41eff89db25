//! The shared marker document and its change notifications.
//!
//! The hub holds exactly one [`SnapshotDoc`]. Its `sync-id` is the SHA-256 of
//! the serialized markers, so posting identical content never produces a new
//! version and never wakes pollers.

use crate::error::{AppError, Result};
use eventmap_engine::{EntityId, EntityInfo, SnapshotDoc, SyncVersion};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::sync::watch;

pub type Markers = BTreeMap<EntityId, EntityInfo>;

/// Outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub sync_id: SyncVersion,
    /// Whether the content differed from the previous document
    pub changed: bool,
}

/// In-memory marker document shared by all requests.
#[derive(Debug)]
pub struct MarkerHub {
    doc: watch::Sender<Arc<SnapshotDoc>>,
}

impl MarkerHub {
    /// Create a hub with no markers.
    pub fn new() -> Result<Self> {
        Self::with_markers(Markers::new())
    }

    /// Create a hub seeded with `markers`.
    pub fn with_markers(markers: Markers) -> Result<Self> {
        let doc = stamp(markers)?;
        let (tx, _rx) = watch::channel(Arc::new(doc));
        Ok(Self { doc: tx })
    }

    /// The current document.
    pub fn current(&self) -> Arc<SnapshotDoc> {
        Arc::clone(&self.doc.borrow())
    }

    /// The current version.
    pub fn sync_id(&self) -> SyncVersion {
        self.doc.borrow().sync_id.clone().unwrap_or_default()
    }

    /// Replace the markers and wake pollers if the content changed.
    pub fn publish(&self, markers: Markers) -> Result<Published> {
        let next = stamp(markers)?;
        let sync_id = next.sync_id.clone().unwrap_or_default();

        let changed = self.doc.send_if_modified(|current| {
            if current.sync_id == next.sync_id {
                return false;
            }
            *current = Arc::new(next);
            true
        });

        if changed {
            tracing::info!(
                version = %sync_id,
                markers = self.doc.borrow().markers.len(),
                pollers = self.doc.receiver_count(),
                "published new document"
            );
        }

        Ok(Published { sync_id, changed })
    }

    /// Wait until the version differs from `current`, for at most `hold`.
    /// Returns the document at that point, which is unchanged on timeout.
    pub async fn wait_for_change(&self, current: &str, hold: Duration) -> Arc<SnapshotDoc> {
        let mut rx = self.doc.subscribe();
        let changed = tokio::time::timeout(
            hold,
            rx.wait_for(|doc| doc.sync_id.as_deref() != Some(current)),
        )
        .await;

        match changed {
            Ok(Ok(doc)) => Arc::clone(&doc),
            Ok(Err(_)) | Err(_) => self.current(),
        }
    }
}

/// Attach the content hash of `markers` as the document's sync id.
fn stamp(markers: Markers) -> Result<SnapshotDoc> {
    let json = serde_json::to_vec(&markers).map_err(|e| AppError::Internal(e.to_string()))?;
    let sync_id = hex::encode(Sha256::digest(&json));
    Ok(SnapshotDoc {
        sync_id: Some(sync_id),
        markers,
    })
}

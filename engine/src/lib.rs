//! # Event Map Engine
//!
//! Client-side core of a collaborative map: named point markers and typed
//! polylines spread over a fixed set of layers, kept in sync between many
//! clients through a server that only ever stores one whole document.
//!
//! ## Design Principles
//!
//! - **Snapshots, not deltas**: every pull returns the complete document and
//!   every push uploads the complete local state
//! - **Absence means deletion**: an entity missing from a snapshot is removed
//! - **Atomic merges**: a snapshot that fails validation changes nothing
//! - **Opaque versions**: version tokens are only ever compared for equality
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! An [`Entity`] is either a point (identified by its user-chosen name) or a
//! polyline (identified by a generated `__polyline_<layer>_<n>` id). The
//! [`NamingRegistry`] keeps every identifier unique.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] merges a [`Snapshot`] into the [`EntityStore`],
//! producing a [`MergeReport`]. [`SyncState`] bundles the store with the
//! layer catalog, names, version cursor and the edit sessions.
//!
//! ### Sync
//!
//! [`SyncLoop`] keeps one long-poll in flight against a [`Transport`],
//! retrying failures with the same version after a backoff, and serves
//! edits from [`SyncHandle`]s. Each committed edit triggers a full push.
//!
//! ## Quick Start
//!
//! ```rust
//! use eventmap_engine::{LatLng, LayerCatalog, LayerInfo, Snapshot, EntityInfo, SyncState};
//!
//! let catalog = LayerCatalog::new(vec![LayerInfo::new("ground", 3)]).unwrap();
//! let mut state = SyncState::new(catalog);
//!
//! // Merge what the server sent.
//! let snapshot = Snapshot::new("v1").with_entity(
//!     "Stage",
//!     EntityInfo::Point { lat: 52.5, lng: 13.4, layer: "ground".into() },
//! );
//! let report = state.merge(&snapshot).unwrap();
//! assert_eq!(report.added, vec!["Stage".to_string()]);
//!
//! // Edit locally; the document is what gets pushed.
//! state.create_point("Bar", "ground", LatLng::new(52.6, 13.5)).unwrap();
//! let doc = state.to_document();
//! assert_eq!(doc.sync_id.as_deref(), Some("v1"));
//! assert_eq!(doc.markers.len(), 2);
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod layer;
pub mod naming;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod store;
pub mod sync;
pub mod transport;
pub mod wire;

// Re-export main types at crate root
pub use config::{ClientConfig, ConfigError, SyncOptions};
pub use entity::{Entity, EntityKind, LatLng, PolylineType, Shape};
pub use error::{Error, Result};
pub use layer::{Canvas, LayerCatalog, LayerInfo, NullCanvas};
pub use naming::NamingRegistry;
pub use reconcile::{MergeReport, Reconciler};
pub use session::{Applied, Edit, MoveSession};
pub use state::SyncState;
pub use store::{EntityStore, SearchHit};
pub use sync::{EditReceipt, PushTicket, SyncHandle, SyncLoop};
pub use transport::{HttpTransport, Transport};
pub use wire::{EntityInfo, Snapshot, SnapshotDoc};

/// Type aliases for clarity
pub type EntityId = String;
pub type LayerName = String;
pub type SyncVersion = String;

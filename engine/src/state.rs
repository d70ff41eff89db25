//! The client's complete synchronized state.

use crate::{
    error::Result,
    layer::{Canvas, LayerCatalog},
    naming::NamingRegistry,
    reconcile::{MergeReport, Reconciler},
    session::MoveSession,
    store::{EntityStore, SearchHit},
    wire::{Snapshot, SnapshotDoc},
    SyncVersion,
};

/// Everything a client knows: the layer catalog, the entities, their names,
/// the version cursor and the in-progress move, if any.
#[derive(Debug)]
pub struct SyncState {
    pub(crate) catalog: LayerCatalog,
    pub(crate) store: EntityStore,
    pub(crate) names: NamingRegistry,
    pub(crate) version: Option<SyncVersion>,
    pub(crate) moving: Option<MoveSession>,
}

impl SyncState {
    /// Create an empty state over `catalog`.
    pub fn new(catalog: LayerCatalog) -> Self {
        Self::with_store(catalog, EntityStore::default())
    }

    /// Create an empty state whose drawing surfaces report to `canvas`.
    pub fn with_canvas(catalog: LayerCatalog, canvas: Box<dyn Canvas + Send>) -> Self {
        Self::with_store(catalog, EntityStore::new(canvas))
    }

    fn with_store(catalog: LayerCatalog, store: EntityStore) -> Self {
        Self {
            catalog,
            store,
            names: NamingRegistry::new(),
            version: None,
            moving: None,
        }
    }

    pub fn catalog(&self) -> &LayerCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn names(&self) -> &NamingRegistry {
        &self.names
    }

    /// Version of the last snapshot merged.
    pub fn version(&self) -> Option<&SyncVersion> {
        self.version.as_ref()
    }

    /// The move in progress, if any.
    pub fn moving(&self) -> Option<&MoveSession> {
        self.moving.as_ref()
    }

    /// Merge a snapshot and adopt its version.
    ///
    /// On error nothing changes, including the version cursor.
    pub fn merge(&mut self, snapshot: &Snapshot) -> Result<MergeReport> {
        let report =
            Reconciler::new(&self.catalog).merge(&mut self.store, &mut self.names, snapshot)?;
        self.version = Some(report.version.clone());

        if let Some(session) = &self.moving {
            match self.store.get(&session.id) {
                None => {
                    tracing::info!(id = %session.id, "entity being moved was deleted remotely");
                    self.moving = None;
                }
                Some(entity) if entity.position().is_none() => {
                    tracing::info!(id = %session.id, "entity being moved is no longer a point");
                    self.moving = None;
                }
                Some(_) => {}
            }
        }

        Ok(report)
    }

    /// Validate and merge a document received from the server.
    pub fn merge_document(&mut self, doc: SnapshotDoc) -> Result<MergeReport> {
        let snapshot = Snapshot::try_from(doc)?;
        self.merge(&snapshot)
    }

    /// The whole local state, tagged with the last known version.
    pub fn to_document(&self) -> SnapshotDoc {
        self.store.to_document(self.version.clone())
    }

    /// Point entities whose name starts with `prefix`.
    pub fn search(&self, prefix: &str) -> Vec<SearchHit> {
        self.store.search_points(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::LatLng;
    use crate::layer::LayerInfo;
    use crate::wire::EntityInfo;
    use crate::Error;

    fn state() -> SyncState {
        SyncState::new(LayerCatalog::new(vec![LayerInfo::new("ground", 3)]).unwrap())
    }

    #[test]
    fn merge_adopts_version() {
        let mut state = state();
        assert!(state.version().is_none());

        let doc = SnapshotDoc::from_json(r#"{"sync-id": "v1", "markers": {}}"#).unwrap();
        state.merge_document(doc).unwrap();
        assert_eq!(state.version().map(String::as_str), Some("v1"));
    }

    #[test]
    fn failed_merge_keeps_version() {
        let mut state = state();
        state.merge(&Snapshot::new("v1")).unwrap();

        let bad = Snapshot::new("v2").with_entity(
            "A",
            EntityInfo::Point {
                lat: 0.0,
                lng: 0.0,
                layer: "cellar".into(),
            },
        );
        assert_eq!(
            state.merge(&bad).unwrap_err(),
            Error::UnknownLayer("cellar".into())
        );
        assert_eq!(state.version().map(String::as_str), Some("v1"));
    }

    #[test]
    fn remote_delete_ends_move() {
        let mut state = state();
        let v1 = Snapshot::new("v1").with_entity(
            "A",
            EntityInfo::Point {
                lat: 0.0,
                lng: 0.0,
                layer: "ground".into(),
            },
        );
        state.merge(&v1).unwrap();
        state.begin_move("A").unwrap();
        state.move_to(LatLng::new(1.0, 1.0)).unwrap();

        state.merge(&Snapshot::new("v2")).unwrap();
        assert!(state.moving().is_none());
        assert!(state.store().is_empty());
    }

    #[test]
    fn remote_kind_change_ends_move() {
        let mut state = state();
        let v1 = Snapshot::new("v1").with_entity(
            "A",
            EntityInfo::Point {
                lat: 0.0,
                lng: 0.0,
                layer: "ground".into(),
            },
        );
        state.merge(&v1).unwrap();
        state.begin_move("A").unwrap();

        let v2 = Snapshot::new("v2").with_entity(
            "A",
            EntityInfo::Polyline {
                points: vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)],
                layer: "ground".into(),
                line_type: Default::default(),
            },
        );
        state.merge(&v2).unwrap();

        assert!(state.moving().is_none());
        assert_eq!(state.commit_move().unwrap_err(), Error::NoMoveInProgress);
    }

    #[test]
    fn document_is_tagged_with_cursor() {
        let mut state = state();
        state.merge(&Snapshot::new("v9")).unwrap();
        state
            .create_point("Base", "ground", LatLng::new(1.0, 2.0))
            .unwrap();

        let doc = state.to_document();
        assert_eq!(doc.sync_id.as_deref(), Some("v9"));
        assert!(doc.markers.contains_key("Base"));
    }
}

//! Reconciliation of server snapshots into local state.
//!
//! Every snapshot is a complete view of the live entities, so merging is
//! absence-based: whatever the snapshot does not mention is gone.
//!
//! # Algorithm
//!
//! 1. Check every incoming layer against the catalog; any unknown layer
//!    rejects the whole snapshot before anything is touched
//! 2. Add unknown ids, update known ones field by field
//! 3. Stamp every incoming entity with the snapshot version
//! 4. Remove every entity that did not receive the stamp

use crate::{
    entity::{Entity, LatLng, Shape},
    error::Result,
    layer::LayerCatalog,
    naming::NamingRegistry,
    store::EntityStore,
    wire::{EntityInfo, Snapshot},
    EntityId, SyncVersion,
};
use serde::{Deserialize, Serialize};

/// Outcome of merging one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Version of the merged snapshot
    pub version: SyncVersion,
    /// Entities that were not known locally
    pub added: Vec<EntityId>,
    /// Known entities whose geometry, layer or type changed
    pub updated: Vec<EntityId>,
    /// Entities missing from the snapshot
    pub removed: Vec<EntityId>,
    /// Known entities whose geometry was replaced
    pub repositioned: Vec<EntityId>,
}

impl MergeReport {
    fn new(version: SyncVersion) -> Self {
        Self {
            version,
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            repositioned: Vec::new(),
        }
    }

    /// Whether the merge changed the entity set or any entity in it.
    pub fn changed(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// Merges snapshots into an [`EntityStore`].
pub struct Reconciler<'a> {
    catalog: &'a LayerCatalog,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler validating layers against `catalog`.
    pub fn new(catalog: &'a LayerCatalog) -> Self {
        Self { catalog }
    }

    /// Merge `snapshot` into `store`, keeping `names` in step.
    ///
    /// Fails with `UnknownLayer` without touching the store if any entity
    /// references a layer missing from the catalog.
    pub fn merge(
        &self,
        store: &mut EntityStore,
        names: &mut NamingRegistry,
        snapshot: &Snapshot,
    ) -> Result<MergeReport> {
        for info in snapshot.entities.values() {
            self.catalog.require(info.layer())?;
        }

        let version = &snapshot.version;
        let mut report = MergeReport::new(version.clone());

        for (id, info) in &snapshot.entities {
            let known_kind = store.get(id).map(Entity::kind);
            match known_kind {
                None => {
                    store.insert(Entity::from_info(id.clone(), info));
                    names.claim(id);
                    tracing::debug!(id = %id, layer = %info.layer(), "added entity");
                    report.added.push(id.clone());
                }
                Some(kind) if kind != info.kind() => {
                    store.insert(Entity::from_info(id.clone(), info));
                    tracing::debug!(id = %id, "replaced entity of different kind");
                    report.updated.push(id.clone());
                    report.repositioned.push(id.clone());
                }
                Some(_) => {
                    if self.update_known(store, id, info, &mut report)? {
                        report.updated.push(id.clone());
                    }
                }
            }
            store.stamp(id, version)?;
        }

        for id in store.stale_ids(version) {
            store.remove(&id);
            names.release(&id);
            tracing::debug!(id = %id, "removed entity");
            report.removed.push(id);
        }

        Ok(report)
    }

    /// Apply field-level changes to a known entity of the same kind.
    fn update_known(
        &self,
        store: &mut EntityStore,
        id: &EntityId,
        info: &EntityInfo,
        report: &mut MergeReport,
    ) -> Result<bool> {
        let mut changed = false;

        match info {
            EntityInfo::Point { lat, lng, .. } => {
                if store.set_position(id, LatLng::new(*lat, *lng))? {
                    report.repositioned.push(id.clone());
                    changed = true;
                }
            }
            EntityInfo::Polyline {
                points, line_type, ..
            } => {
                let same_path = matches!(
                    store.get(id).map(|e| &e.shape),
                    Some(Shape::Polyline { points: current, .. }) if current == points
                );
                // Paths are always replaced, even when equal.
                store.replace_points(id, points.clone())?;
                report.repositioned.push(id.clone());
                changed |= !same_path;
                changed |= store.set_line_type(id, *line_type)?;
            }
        }

        if store.move_to_layer(id, info.layer())? {
            tracing::debug!(id = %id, layer = %info.layer(), "entity changed layer");
            changed = true;
        }

        Ok(changed)
    }
}

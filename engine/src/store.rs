//! Store - the in-memory entity container.
//!
//! The store holds every known entity and the per-layer drawing surfaces the
//! entities are attached to. Every change to a surface or to an entity's
//! geometry is reported to the [`Canvas`].

use crate::{
    entity::{Entity, LatLng, PolylineType, Shape},
    error::Result,
    layer::{Canvas, NullCanvas},
    naming::is_system_id,
    wire::SnapshotDoc,
    EntityId, Error, LayerName, SyncVersion,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A point entity matching a search prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: EntityId,
    pub position: LatLng,
    pub layer: LayerName,
}

/// All local entities plus the drawing surfaces holding them.
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    /// Ids attached to each layer's drawing surface
    surfaces: HashMap<LayerName, BTreeSet<EntityId>>,
    canvas: Box<dyn Canvas + Send>,
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.entities)
            .field("surfaces", &self.surfaces)
            .finish_non_exhaustive()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new(Box::new(NullCanvas))
    }
}

impl EntityStore {
    /// Create an empty store reporting to `canvas`.
    pub fn new(canvas: Box<dyn Canvas + Send>) -> Self {
        Self {
            entities: BTreeMap::new(),
            surfaces: HashMap::new(),
            canvas,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Get an entity or fail with `EntityNotFound`.
    pub fn require(&self, id: &str) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    // Borrows only the entity map so the canvas stays usable.
    fn lookup_mut<'a>(
        entities: &'a mut BTreeMap<EntityId, Entity>,
        id: &str,
    ) -> Result<&'a mut Entity> {
        entities
            .get_mut(id)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ids currently attached to `layer`'s drawing surface.
    pub fn surface(&self, layer: &str) -> impl Iterator<Item = &EntityId> {
        self.surfaces.get(layer).into_iter().flatten()
    }

    /// Insert an entity and attach it to its layer, replacing any entity
    /// with the same id.
    pub fn insert(&mut self, entity: Entity) {
        self.remove(&entity.id);
        self.attach(&entity.layer, &entity.id);
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Detach and remove an entity.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.detach(&entity.layer, id);
        Some(entity)
    }

    fn attach(&mut self, layer: &str, id: &str) {
        self.surfaces
            .entry(layer.to_string())
            .or_default()
            .insert(id.to_string());
        self.canvas.attached(layer, id);
    }

    fn detach(&mut self, layer: &str, id: &str) {
        if let Some(surface) = self.surfaces.get_mut(layer) {
            surface.remove(id);
            if surface.is_empty() {
                self.surfaces.remove(layer);
            }
        }
        self.canvas.detached(layer, id);
    }

    /// Move a point. Returns whether the position actually changed; equal
    /// positions leave the geometry untouched.
    pub fn set_position(&mut self, id: &str, position: LatLng) -> Result<bool> {
        let entity = Self::lookup_mut(&mut self.entities, id)?;
        match &mut entity.shape {
            Shape::Point(current) if *current == position => Ok(false),
            Shape::Point(current) => {
                *current = position;
                entity.geometry_revision += 1;
                self.canvas.repositioned(id, position);
                Ok(true)
            }
            Shape::Polyline { .. } => Err(entity.wrong_kind()),
        }
    }

    /// Replace a polyline's path.
    pub fn replace_points(&mut self, id: &str, points: Vec<LatLng>) -> Result<()> {
        let entity = Self::lookup_mut(&mut self.entities, id)?;
        match &mut entity.shape {
            Shape::Polyline { points: current, .. } => {
                *current = points;
                entity.geometry_revision += 1;
                self.canvas.reshaped(id, current);
                Ok(())
            }
            Shape::Point(_) => Err(entity.wrong_kind()),
        }
    }

    /// Change a polyline's type. Returns whether it changed.
    pub fn set_line_type(&mut self, id: &str, line_type: PolylineType) -> Result<bool> {
        let entity = Self::lookup_mut(&mut self.entities, id)?;
        match &mut entity.shape {
            Shape::Polyline {
                line_type: current, ..
            } if *current == line_type => Ok(false),
            Shape::Polyline {
                line_type: current, ..
            } => {
                *current = line_type;
                self.canvas.restyled(id, line_type);
                Ok(true)
            }
            Shape::Point(_) => Err(entity.wrong_kind()),
        }
    }

    /// Move an entity to another layer's drawing surface. Returns whether
    /// the layer changed.
    pub fn move_to_layer(&mut self, id: &str, layer: &str) -> Result<bool> {
        let entity = Self::lookup_mut(&mut self.entities, id)?;
        if entity.layer == layer {
            return Ok(false);
        }
        let old = std::mem::replace(&mut entity.layer, layer.to_string());
        self.detach(&old, id);
        self.attach(layer, id);
        Ok(true)
    }

    /// Re-key an entity. The caller is responsible for name validation.
    pub fn rename_entity(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.entities.contains_key(new) {
            return Err(Error::NameConflict(new.to_string()));
        }
        let mut entity = self
            .entities
            .remove(old)
            .ok_or_else(|| Error::EntityNotFound(old.to_string()))?;
        entity.id = new.to_string();
        if let Some(surface) = self.surfaces.get_mut(&entity.layer) {
            surface.remove(old);
            surface.insert(new.to_string());
        }
        self.entities.insert(new.to_string(), entity);
        self.canvas.relabeled(old, new);
        Ok(())
    }

    /// Mark an entity as confirmed by the snapshot with `version`.
    pub fn stamp(&mut self, id: &str, version: &SyncVersion) -> Result<()> {
        Self::lookup_mut(&mut self.entities, id)?.sync_version = Some(version.clone());
        Ok(())
    }

    /// Ids of entities not confirmed by `version`.
    pub fn stale_ids(&self, version: &SyncVersion) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.sync_version.as_ref() != Some(version))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Full document of the local state tagged with `sync_id`.
    pub fn to_document(&self, sync_id: Option<SyncVersion>) -> SnapshotDoc {
        let mut doc = SnapshotDoc::new(sync_id);
        for entity in self.entities.values() {
            doc.markers.insert(entity.id.clone(), entity.to_info());
        }
        doc
    }

    /// Point entities whose name starts with `prefix`, ignoring case,
    /// sorted by name. System ids never match.
    pub fn search_points(&self, prefix: &str) -> Vec<SearchHit> {
        let prefix = prefix.to_lowercase();
        // BTreeMap iteration is already ordered by id.
        self.entities
            .values()
            .filter(|e| !is_system_id(&e.id))
            .filter(|e| e.id.to_lowercase().starts_with(&prefix))
            .filter_map(|e| {
                e.position().map(|position| SearchHit {
                    title: e.id.clone(),
                    position,
                    layer: e.layer.clone(),
                })
            })
            .collect()
    }
}

//! Edit sessions: local mutations driven by the UI.
//!
//! Every edit is applied to local state immediately. Edits that commit a
//! change report `push: true`; the sync loop then uploads the whole state.
//! Moving a point spans several input events and is modelled as a small
//! state machine with a single, process-wide slot.

use crate::{
    entity::{Entity, LatLng, PolylineType},
    error::Result,
    naming::NamingRegistry,
    state::SyncState,
    EntityId, Error, LayerName,
};

/// A point being moved, with the position to restore on cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSession {
    pub id: EntityId,
    pub origin: LatLng,
}

/// The operations available to UI collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    CreatePoint {
        name: String,
        layer: LayerName,
        position: LatLng,
    },
    CreatePolyline {
        layer: LayerName,
        points: Vec<LatLng>,
    },
    /// Move a point in one step.
    Move { id: EntityId, position: LatLng },
    BeginMove { id: EntityId },
    /// Pointer moved while a move is in progress.
    MoveTo { position: LatLng },
    CommitMove,
    CancelMove,
    Rename { id: EntityId, name: String },
    Retype { id: EntityId, line_type: PolylineType },
    Delete { id: EntityId },
    ChangeLayer { id: EntityId, layer: LayerName },
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The entity the edit ended up affecting
    pub id: Option<EntityId>,
    /// Whether the edit committed a change that must be pushed
    pub push: bool,
}

impl Applied {
    fn committed(id: EntityId) -> Self {
        Self {
            id: Some(id),
            push: true,
        }
    }

    fn local(id: Option<EntityId>) -> Self {
        Self { id, push: false }
    }
}

impl SyncState {
    /// Apply an edit to local state.
    pub fn apply(&mut self, edit: Edit) -> Result<Applied> {
        match edit {
            Edit::CreatePoint {
                name,
                layer,
                position,
            } => self
                .create_point(&name, &layer, position)
                .map(Applied::committed),
            Edit::CreatePolyline { layer, points } => self
                .create_polyline(&layer, points)
                .map(Applied::committed),
            Edit::Move { id, position } => self.move_point(&id, position).map(Applied::committed),
            Edit::BeginMove { id } => self.begin_move(&id).map(|()| Applied::local(Some(id))),
            Edit::MoveTo { position } => self.move_to(position).map(|id| Applied::local(Some(id))),
            Edit::CommitMove => self.commit_move().map(Applied::committed),
            Edit::CancelMove => self.cancel_move().map(|id| Applied::local(Some(id))),
            Edit::Rename { id, name } => self.rename(&id, &name).map(Applied::committed),
            Edit::Retype { id, line_type } => {
                self.retype(&id, line_type).map(|()| Applied::committed(id))
            }
            Edit::Delete { id } => self.delete(&id).map(|()| Applied::committed(id)),
            Edit::ChangeLayer { id, layer } => self
                .change_layer(&id, &layer)
                .map(|()| Applied::committed(id)),
        }
    }

    /// Create a named point marker.
    pub fn create_point(&mut self, name: &str, layer: &str, position: LatLng) -> Result<EntityId> {
        self.catalog.require(layer)?;
        let id = self.names.reserve_name(name)?;
        self.store.insert(Entity::point(id.clone(), layer, position));
        tracing::info!(id = %id, layer = %layer, "created point");
        Ok(id)
    }

    /// Create a polyline with a generated id and type `Unknown`.
    pub fn create_polyline(&mut self, layer: &str, points: Vec<LatLng>) -> Result<EntityId> {
        self.catalog.require(layer)?;
        if points.len() < 2 {
            return Err(Error::InvalidGeometry(format!(
                "a polyline needs at least 2 points, got {}",
                points.len()
            )));
        }
        let id = self.names.next_polyline_id(layer);
        self.store.insert(Entity::polyline(
            id.clone(),
            layer,
            points,
            PolylineType::Unknown,
        ));
        tracing::info!(id = %id, layer = %layer, "created polyline");
        Ok(id)
    }

    /// Enter the moving state for a point.
    pub fn begin_move(&mut self, id: &str) -> Result<()> {
        if let Some(session) = &self.moving {
            return Err(Error::MoveInProgress(session.id.clone()));
        }
        let entity = self.store.require(id)?;
        let origin = entity.position().ok_or_else(|| entity.wrong_kind())?;
        self.moving = Some(MoveSession {
            id: id.to_string(),
            origin,
        });
        Ok(())
    }

    /// Follow the pointer while moving.
    pub fn move_to(&mut self, position: LatLng) -> Result<EntityId> {
        let id = self
            .moving
            .as_ref()
            .map(|session| session.id.clone())
            .ok_or(Error::NoMoveInProgress)?;
        self.store.set_position(&id, position)?;
        Ok(id)
    }

    /// Keep the current position and leave the moving state.
    pub fn commit_move(&mut self) -> Result<EntityId> {
        let session = self.moving.take().ok_or(Error::NoMoveInProgress)?;
        tracing::info!(id = %session.id, "moved point");
        Ok(session.id)
    }

    /// Restore the original position and leave the moving state.
    pub fn cancel_move(&mut self) -> Result<EntityId> {
        let session = self.moving.take().ok_or(Error::NoMoveInProgress)?;
        self.store.set_position(&session.id, session.origin)?;
        Ok(session.id)
    }

    /// Move a point in one step: begin, follow, commit.
    pub fn move_point(&mut self, id: &str, position: LatLng) -> Result<EntityId> {
        self.begin_move(id)?;
        if let Err(e) = self.move_to(position) {
            self.moving = None;
            return Err(e);
        }
        self.commit_move()
    }

    /// Give a point a new user-chosen name.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<EntityId> {
        let entity = self.store.require(id)?;
        if entity.position().is_none() {
            return Err(entity.wrong_kind());
        }
        self.names.rename(id, name)?;
        self.store.rename_entity(id, name)?;
        if let Some(session) = self.moving.as_mut().filter(|s| s.id == id) {
            session.id = name.to_string();
        }
        tracing::info!(old = %id, new = %name, "renamed point");
        Ok(name.to_string())
    }

    /// Rename interactively: ask `prompt` for a name until one is accepted
    /// or the prompt gives up by returning `None`.
    ///
    /// The prompt receives the current name and the reason the previous
    /// candidate was rejected, if any. Returns the new name, or `None` when
    /// abandoned.
    pub fn rename_with<F>(&mut self, id: &str, mut prompt: F) -> Result<Option<EntityId>>
    where
        F: FnMut(&str, Option<&Error>) -> Option<String>,
    {
        let mut rejected: Option<Error> = None;
        loop {
            let Some(candidate) = prompt(id, rejected.as_ref()) else {
                return Ok(None);
            };
            match self.rename(id, &candidate) {
                Ok(name) => return Ok(Some(name)),
                Err(e @ (Error::InvalidName(_) | Error::NameConflict(_))) => rejected = Some(e),
                Err(e) => return Err(e),
            }
        }
    }

    /// Set a polyline's type.
    pub fn retype(&mut self, id: &str, line_type: PolylineType) -> Result<()> {
        self.store.set_line_type(id, line_type)?;
        Ok(())
    }

    /// Remove an entity and free its name.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.store
            .remove(id)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))?;
        self.names.release(id);
        if self.moving.as_ref().is_some_and(|s| s.id == id) {
            self.moving = None;
        }
        tracing::info!(id = %id, "deleted entity");
        Ok(())
    }

    /// Send an entity to another layer.
    pub fn change_layer(&mut self, id: &str, layer: &str) -> Result<()> {
        self.catalog.require(layer)?;
        self.store.move_to_layer(id, layer)?;
        Ok(())
    }

    /// Check a candidate name without applying it.
    pub fn check_name(&self, id: &str, name: &str) -> Result<()> {
        NamingRegistry::validate(name)?;
        if name != id && self.names.contains(name) {
            return Err(Error::NameConflict(name.to_string()));
        }
        Ok(())
    }
}

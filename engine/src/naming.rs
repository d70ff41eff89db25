//! Naming registry: unique entity identifiers.
//!
//! User-chosen names must be non-empty, unique across the whole store and
//! must not start with the reserved prefix. Identifiers with that prefix are
//! owned by the system, e.g. generated polyline ids.

use crate::{error::Result, EntityId, Error};
use std::collections::BTreeSet;

/// Prefix of all system-owned identifiers.
pub const RESERVED_PREFIX: &str = "__";

/// Prefix of generated polyline identifiers.
pub const POLYLINE_PREFIX: &str = "__polyline_";

/// Whether `id` is system-owned.
pub fn is_system_id(id: &str) -> bool {
    id.starts_with(RESERVED_PREFIX)
}

/// Set of all identifiers in use.
#[derive(Debug, Clone, Default)]
pub struct NamingRegistry {
    names: BTreeSet<EntityId>,
}

impl NamingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `candidate` is acceptable as a user-chosen name,
    /// ignoring uniqueness.
    pub fn validate(candidate: &str) -> Result<()> {
        if candidate.is_empty() || is_system_id(candidate) {
            return Err(Error::InvalidName(candidate.to_string()));
        }
        Ok(())
    }

    /// Reserve a user-chosen name.
    pub fn reserve_name(&mut self, candidate: &str) -> Result<EntityId> {
        Self::validate(candidate)?;
        if self.names.contains(candidate) {
            return Err(Error::NameConflict(candidate.to_string()));
        }
        self.names.insert(candidate.to_string());
        Ok(candidate.to_string())
    }

    /// Register an identifier without validation. Used for ids introduced
    /// by the server, which may be system-owned.
    pub fn claim(&mut self, id: &str) {
        self.names.insert(id.to_string());
    }

    /// Free a name. Returns whether it was registered.
    pub fn release(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Rename `old` to `new`. Renaming to the same name is a no-op.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        Self::validate(new)?;
        if !self.names.contains(old) {
            return Err(Error::EntityNotFound(old.to_string()));
        }
        if old == new {
            return Ok(());
        }
        if self.names.contains(new) {
            return Err(Error::NameConflict(new.to_string()));
        }
        self.names.remove(old);
        self.names.insert(new.to_string());
        Ok(())
    }

    /// Generate and reserve the first free polyline id for `layer`.
    ///
    /// Indices are probed from zero; freed indices are reused.
    pub fn next_polyline_id(&mut self, layer: &str) -> EntityId {
        let mut index = 0u64;
        loop {
            let id = format!("{POLYLINE_PREFIX}{layer}_{index}");
            if !self.names.contains(&id) {
                self.names.insert(id.clone());
                return id;
            }
            index += 1;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

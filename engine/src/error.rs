//! Error types for the event map engine.

use crate::{EntityId, LayerName};
use thiserror::Error;

/// All possible errors from the event map engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Model errors
    #[error("don't know about layer '{0}'")]
    UnknownLayer(LayerName),

    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("operation not supported on {kind} '{id}'")]
    WrongKind { id: EntityId, kind: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid {attribute}: '{value}'")]
    InvalidAttribute { attribute: String, value: String },

    // Naming errors
    #[error("name is not unique: {0}")]
    NameConflict(String),

    #[error("name is not valid: '{0}'")]
    InvalidName(String),

    // Edit session errors
    #[error("entity '{0}' is already being moved")]
    MoveInProgress(EntityId),

    #[error("no move in progress")]
    NoMoveInProgress,

    // Load errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("invalid layer catalog: {0}")]
    Catalog(String),

    // Transport errors
    #[error("network failure: {0}")]
    Network(String),

    #[error("poll request timed out")]
    PollTimeout,

    #[error("sync loop has stopped")]
    LoopStopped,
}

impl Error {
    /// Whether this error came from the transport rather than local validation.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::PollTimeout)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

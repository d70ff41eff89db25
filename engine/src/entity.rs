//! Entity types: the unit of synchronization.
//!
//! An entity is either a point marker with a user-chosen name or a polyline
//! with a generated identifier. Both belong to exactly one layer.

use crate::{wire::EntityInfo, EntityId, Error, LayerName, SyncVersion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Classification of a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolylineType {
    #[default]
    Unknown,
    Power,
    Network,
    Wifi,
}

impl PolylineType {
    /// All polyline types, in menu order.
    pub const ALL: [PolylineType; 4] = [
        PolylineType::Power,
        PolylineType::Network,
        PolylineType::Wifi,
        PolylineType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolylineType::Unknown => "Unknown",
            PolylineType::Power => "Power",
            PolylineType::Network => "Network",
            PolylineType::Wifi => "Wifi",
        }
    }
}

impl fmt::Display for PolylineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolylineType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolylineType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidAttribute {
                attribute: "polyline type".into(),
                value: s.to_string(),
            })
    }
}

/// The two kinds of entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Point,
    Polyline,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Point => f.write_str("point"),
            EntityKind::Polyline => f.write_str("polyline"),
        }
    }
}

/// Geometry plus kind-specific attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(LatLng),
    /// Point order defines the path.
    Polyline {
        points: Vec<LatLng>,
        line_type: PolylineType,
    },
}

impl Shape {
    pub fn kind(&self) -> EntityKind {
        match self {
            Shape::Point(_) => EntityKind::Point,
            Shape::Polyline { .. } => EntityKind::Polyline,
        }
    }
}

/// A shared map entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Unique across the whole store, regardless of kind or layer
    pub id: EntityId,
    /// Layer whose drawing surface currently holds this entity
    pub layer: LayerName,
    pub shape: Shape,
    /// Token of the last snapshot that confirmed this entity. `None` for
    /// entities created locally and not yet seen in a snapshot.
    pub sync_version: Option<SyncVersion>,
    /// Bumped every time the geometry is replaced.
    pub geometry_revision: u64,
}

impl Entity {
    /// Create a point entity that has not been confirmed by the server.
    pub fn point(id: impl Into<EntityId>, layer: impl Into<LayerName>, position: LatLng) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            shape: Shape::Point(position),
            sync_version: None,
            geometry_revision: 0,
        }
    }

    /// Create a polyline entity that has not been confirmed by the server.
    pub fn polyline(
        id: impl Into<EntityId>,
        layer: impl Into<LayerName>,
        points: Vec<LatLng>,
        line_type: PolylineType,
    ) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            shape: Shape::Polyline { points, line_type },
            sync_version: None,
            geometry_revision: 0,
        }
    }

    /// Build an entity from its wire representation.
    pub fn from_info(id: impl Into<EntityId>, info: &EntityInfo) -> Self {
        match info {
            EntityInfo::Point { lat, lng, layer } => {
                Entity::point(id, layer.clone(), LatLng::new(*lat, *lng))
            }
            EntityInfo::Polyline {
                points,
                layer,
                line_type,
            } => Entity::polyline(id, layer.clone(), points.clone(), *line_type),
        }
    }

    /// Wire representation of this entity.
    pub fn to_info(&self) -> EntityInfo {
        match &self.shape {
            Shape::Point(position) => EntityInfo::Point {
                lat: position.lat,
                lng: position.lng,
                layer: self.layer.clone(),
            },
            Shape::Polyline { points, line_type } => EntityInfo::Polyline {
                points: points.clone(),
                layer: self.layer.clone(),
                line_type: *line_type,
            },
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.shape.kind()
    }

    /// Position of a point entity.
    pub fn position(&self) -> Option<LatLng> {
        match self.shape {
            Shape::Point(position) => Some(position),
            Shape::Polyline { .. } => None,
        }
    }

    /// Type of a polyline entity.
    pub fn line_type(&self) -> Option<PolylineType> {
        match self.shape {
            Shape::Polyline { line_type, .. } => Some(line_type),
            Shape::Point(_) => None,
        }
    }

    /// Error for an operation this entity's kind does not support.
    pub(crate) fn wrong_kind(&self) -> Error {
        Error::WrongKind {
            id: self.id.clone(),
            kind: self.kind().to_string(),
        }
    }
}

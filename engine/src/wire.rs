//! Wire format shared by the get, poll and post endpoints.
//!
//! Documents use `BTreeMap` so serialization order is deterministic, which
//! the server relies on when hashing a document into its sync id.

use crate::{
    entity::{EntityKind, LatLng, PolylineType},
    error::Result,
    EntityId, Error, LayerName, SyncVersion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire representation of one entity.
///
/// Serialized with an explicit `kind` tag, which decides the kind whenever it
/// is present. Documents written before the tag existed are still accepted: a
/// record carrying `points` is a polyline and one carrying `lat`/`lng` is a
/// point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", try_from = "InfoRepr")]
pub enum EntityInfo {
    Point {
        lat: f64,
        lng: f64,
        layer: LayerName,
    },
    Polyline {
        points: Vec<LatLng>,
        layer: LayerName,
        #[serde(rename = "type", default)]
        line_type: PolylineType,
    },
}

impl EntityInfo {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityInfo::Point { .. } => EntityKind::Point,
            EntityInfo::Polyline { .. } => EntityKind::Polyline,
        }
    }

    pub fn layer(&self) -> &LayerName {
        match self {
            EntityInfo::Point { layer, .. } | EntityInfo::Polyline { layer, .. } => layer,
        }
    }
}

/// Every field either form may carry. An unknown `kind` fails here.
#[derive(Deserialize)]
struct InfoRepr {
    kind: Option<EntityKind>,
    lat: Option<f64>,
    lng: Option<f64>,
    points: Option<Vec<LatLng>>,
    layer: LayerName,
    #[serde(rename = "type", default)]
    line_type: PolylineType,
}

impl TryFrom<InfoRepr> for EntityInfo {
    type Error = String;

    fn try_from(repr: InfoRepr) -> std::result::Result<Self, Self::Error> {
        let kind = match repr.kind {
            Some(kind) => kind,
            None if repr.points.is_some() => EntityKind::Polyline,
            None if repr.lat.is_some() || repr.lng.is_some() => EntityKind::Point,
            None => return Err("record is neither a point nor a polyline".into()),
        };

        match kind {
            EntityKind::Point => match (repr.lat, repr.lng) {
                (Some(lat), Some(lng)) => Ok(EntityInfo::Point {
                    lat,
                    lng,
                    layer: repr.layer,
                }),
                _ => Err("point record needs `lat` and `lng`".into()),
            },
            EntityKind::Polyline => match repr.points {
                Some(points) => Ok(EntityInfo::Polyline {
                    points,
                    layer: repr.layer,
                    line_type: repr.line_type,
                }),
                None => Err("polyline record needs `points`".into()),
            },
        }
    }
}

/// A marker document as exchanged with the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDoc {
    /// Version token; the server assigns it, clients echo the last one seen
    #[serde(rename = "sync-id", default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<SyncVersion>,
    #[serde(default)]
    pub markers: BTreeMap<EntityId, EntityInfo>,
}

impl SnapshotDoc {
    pub fn new(sync_id: Option<SyncVersion>) -> Self {
        Self {
            sync_id,
            markers: BTreeMap::new(),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

/// A validated snapshot, ready to be merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: SyncVersion,
    pub entities: BTreeMap<EntityId, EntityInfo>,
}

impl Snapshot {
    pub fn new(version: impl Into<SyncVersion>) -> Self {
        Self {
            version: version.into(),
            entities: BTreeMap::new(),
        }
    }

    pub fn with_entity(mut self, id: impl Into<EntityId>, info: EntityInfo) -> Self {
        self.entities.insert(id.into(), info);
        self
    }
}

impl TryFrom<SnapshotDoc> for Snapshot {
    type Error = Error;

    fn try_from(doc: SnapshotDoc) -> Result<Self> {
        let version = doc
            .sync_id
            .ok_or_else(|| Error::InvalidSnapshot("document has no sync-id".into()))?;
        Ok(Self {
            version,
            entities: doc.markers,
        })
    }
}

//! Layer catalog and the drawing-surface hook.
//!
//! The catalog is loaded once, before the sync loop starts, from the
//! `layers.json` document produced by the tile generator. It is read-only
//! afterwards.

use crate::entity::{LatLng, PolylineType};
use crate::{error::Result, Error, LayerName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One entry of the layer catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub name: LayerName,
    /// Deepest zoom level that has tiles
    pub max_zoom: u32,
    /// Scale correction applied to measured distances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divider: Option<f64>,
}

impl LayerInfo {
    pub fn new(name: impl Into<LayerName>, max_zoom: u32) -> Self {
        Self {
            name: name.into(),
            max_zoom,
            divider: None,
        }
    }

    pub fn with_divider(mut self, divider: f64) -> Self {
        self.divider = Some(divider);
        self
    }

    /// Convert a distance measured in map units into this layer's units.
    pub fn scale_distance(&self, distance: f64) -> f64 {
        distance / self.divider.unwrap_or(1.0)
    }
}

/// The static set of layers known to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCatalog {
    layers: Vec<LayerInfo>,
}

impl LayerCatalog {
    /// Build a catalog, rejecting empty lists, duplicate names and
    /// non-positive dividers.
    pub fn new(layers: Vec<LayerInfo>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::Catalog("no layers defined".into()));
        }

        let mut seen = HashSet::new();
        for layer in &layers {
            if !seen.insert(layer.name.as_str()) {
                return Err(Error::Catalog(format!("duplicate layer '{}'", layer.name)));
            }
            if let Some(divider) = layer.divider {
                if divider.is_nan() || divider <= 0.0 {
                    return Err(Error::Catalog(format!(
                        "layer '{}' has non-positive divider {}",
                        layer.name, divider
                    )));
                }
            }
        }

        Ok(Self { layers })
    }

    /// Parse the `layers.json` array.
    pub fn from_json(json: &str) -> Result<Self> {
        let layers: Vec<LayerInfo> =
            serde_json::from_str(json).map_err(|e| Error::Catalog(e.to_string()))?;
        Self::new(layers)
    }

    /// Read and parse a `layers.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn get(&self, name: &str) -> Option<&LayerInfo> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fail with `UnknownLayer` unless `name` is in the catalog.
    pub fn require(&self, name: &str) -> Result<&LayerInfo> {
        self.get(name)
            .ok_or_else(|| Error::UnknownLayer(name.to_string()))
    }

    /// The layer shown at startup.
    pub fn first(&self) -> &LayerInfo {
        &self.layers[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerInfo> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Presentation hook for the per-layer drawing surfaces.
///
/// The engine calls these as entities come and go; a UI renders from them.
/// Every method defaults to doing nothing.
pub trait Canvas {
    /// Entity became visible on a layer's drawing surface.
    fn attached(&mut self, _layer: &str, _id: &str) {}

    /// Entity was taken off a layer's drawing surface.
    fn detached(&mut self, _layer: &str, _id: &str) {}

    /// A point moved.
    fn repositioned(&mut self, _id: &str, _position: LatLng) {}

    /// A polyline's path was replaced.
    fn reshaped(&mut self, _id: &str, _points: &[LatLng]) {}

    /// A polyline's type changed.
    fn restyled(&mut self, _id: &str, _line_type: PolylineType) {}

    /// An entity's label changed.
    fn relabeled(&mut self, _old: &str, _new: &str) {}
}

/// Canvas that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCanvas;

impl Canvas for NullCanvas {}

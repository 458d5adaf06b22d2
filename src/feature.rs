//! Feature storage and GeoJSON ingestion
//!
//! This module provides the `Feature` struct for storing features returned by
//! the remote spatial-query service, with bounding-box computation over any
//! geometry kind and conversions from/to GeoJSON.

use crate::{CacheError, Result};
use geo::{CoordsIter, Geometry, Rect};
use geojson::JsonObject;
use std::sync::Arc;

/// A single feature returned by the spatial-query service
///
/// Features are immutable once ingested and shared between the feature store
/// and any rendered collections via `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Stable identity used for de-duplication across overlapping queries
    pub id: String,
    /// Planar lon/lat geometry
    pub geometry: Geometry<f64>,
    /// Opaque GeoJSON properties, passed through to the renderer
    pub properties: JsonObject,
}

impl Feature {
    /// Create a new feature.
    pub fn new(id: impl Into<String>, geometry: Geometry<f64>, properties: JsonObject) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties,
        }
    }

    /// Convert a GeoJSON feature into a cacheable feature.
    ///
    /// # Errors
    /// Features without an id cannot be de-duplicated and are rejected, as are
    /// features without a geometry. Numeric GeoJSON ids are rendered to
    /// strings.
    pub fn from_geojson(feature: geojson::Feature) -> Result<Arc<Self>> {
        let id = match feature.id {
            Some(geojson::feature::Id::String(s)) => s,
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => return Err(CacheError::MissingId),
        };
        let geometry = feature
            .geometry
            .ok_or_else(|| CacheError::MissingGeometry { id: id.clone() })?;
        let geometry: Geometry<f64> = geometry.try_into()?;
        Ok(Arc::new(Self {
            id,
            geometry,
            properties: feature.properties.unwrap_or_default(),
        }))
    }

    /// Convert back to a GeoJSON feature.
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: Some(geojson::feature::Id::String(self.id.clone())),
            properties: if self.properties.is_empty() {
                None
            } else {
                Some(self.properties.clone())
            },
            foreign_members: None,
        }
    }
}

/// The feature collection consumed and produced by the rendering component
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureCollection {
    /// Shared feature records, in service order
    pub features: Vec<Arc<Feature>>,
}

impl FeatureCollection {
    /// Create a collection from already-ingested features.
    pub fn new(features: Vec<Arc<Feature>>) -> Self {
        Self { features }
    }

    /// Ingest a GeoJSON feature collection.
    ///
    /// # Errors
    /// Fails on the first feature without an id or geometry; a failed ingest
    /// produces no partial collection.
    pub fn from_geojson(collection: geojson::FeatureCollection) -> Result<Self> {
        let features = collection
            .features
            .into_iter()
            .map(Feature::from_geojson)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { features })
    }

    /// Convert back to a GeoJSON feature collection.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(|f| f.to_geojson()).collect(),
            foreign_members: None,
        }
    }

    /// Number of features in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Compute the bounding box of a geometry in one min/max scan over its
/// flattened coordinates (points, lines, polygon rings, and their multi
/// variants all flatten the same way).
///
/// Returns `None` for geometry that yields no coordinates; callers treat such
/// features as degenerate and skip them rather than raising an error.
pub fn feature_bounds(geometry: &Geometry<f64>) -> Option<Rect<f64>> {
    let mut coords = geometry.coords_iter();
    let first = coords.next()?;
    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;
    for c in coords {
        min_x = min_x.min(c.x);
        min_y = min_y.min(c.y);
        max_x = max_x.max(c.x);
        max_y = max_y.max(c.y);
    }
    Some(crate::bounds::rect(min_x, min_y, max_x, max_y))
}

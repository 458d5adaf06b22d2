//! Map Feature Cache - Viewport-History Caching for Remote Spatial Queries
//!
//! This library maintains a client-side cache of geometric features fetched from a
//! remote spatial-query service, keyed by the history of viewport bounding boxes a
//! user has visited while panning and zooming a map. When the currently visible
//! region is already fully covered by previously fetched regions, the cached
//! features are served instantly instead of re-querying the backend.
//!
//! # Architecture
//!
//! - **Rectangle algebra** ([`interacts`], [`contains`], [`intersection`],
//!   [`subtract`]): pure predicates and set-difference over planar lon/lat boxes
//! - **[`covered`]**: Recursive decision "is this viewport fully covered by the
//!   union of cached viewports?"
//! - **[`FeatureStore`]**: Narrow adapter over an R-tree holding one record per
//!   cached feature
//! - **[`ViewportCache`]**: Bounded viewport history, feature de-duplication, and
//!   the insertion/eviction lifecycle
//! - **[`FeatureLayer`]**: Rendering-side lifecycle: fetch tickets, stale-response
//!   discarding, and the rendered-feature registry
//!
//! # Performance Characteristics
//!
//! - **Query**: one coverage check over at most `max_bounds_cache_size` viewports,
//!   then O(log n + k) R-tree search
//! - **Update**: O(m log n) bulk insert for m new features
//! - **Memory**: bounded by the eviction pass that retires viewports (and the
//!   features only they protect) beyond the history limit

mod bounds;
mod cache;
mod coverage;
mod feature;
mod index;
mod layer;

pub use bounds::{
    area, clamp_to_world, contains, interacts, intersection, overlaps, rect, subtract,
};
pub use cache::{CacheConfig, CacheInfo, ViewportCache};
pub use coverage::covered;
pub use feature::{Feature, FeatureCollection, feature_bounds};
pub use index::{FeatureRecord, FeatureStore};
pub use layer::{
    FeatureLayer, FeatureRegistry, FetchOutcome, FetchTicket, HighlightTarget, IconHandle,
    MoveOutcome, RenderedFeature, ShapeHandle,
};

/// Error types for cache ingestion
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("feature has no id")]
    MissingId,

    #[error("feature {id:?} has no geometry")]
    MissingGeometry { id: String },

    #[error("GeoJSON conversion error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

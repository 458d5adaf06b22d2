//! Rendering-side cache lifecycle
//!
//! Drives the [`ViewportCache`] from viewport-change events the way the host
//! rendering component does: query first, fetch on a miss, apply the response
//! only if no newer viewport change superseded it. DOM/canvas drawing and the
//! HTTP mechanics themselves stay with the host; this module only hands out
//! opaque handles and fetch tickets.

use crate::bounds::clamp_to_world;
use crate::cache::{CacheConfig, ViewportCache};
use crate::feature::{Feature, FeatureCollection};

use geo::Rect;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Identity of an issued fetch
///
/// Each cache miss issues a fresh ticket; a newer viewport change supersedes
/// all earlier tickets, and responses carrying a superseded ticket are
/// discarded without touching cache state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchTicket(u64);

/// Handle to a vector shape created by the host renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u64);

/// Handle to an icon drawn by the host renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IconHandle(pub u64);

/// A displayed feature together with its renderer handles
#[derive(Clone, Debug)]
pub struct RenderedFeature {
    /// The shared feature payload
    pub feature: Arc<Feature>,
    /// Vector shape handle, when the feature was drawn as a shape
    pub shape: Option<ShapeHandle>,
    /// Icon handle, when the feature was drawn as a marker icon
    pub icon: Option<IconHandle>,
}

/// Where a highlight style has to be applied for a feature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightTarget {
    /// Restyle the feature's vector shape
    Shape(ShapeHandle),
    /// Redraw the feature's icon
    Icon(IconHandle),
}

/// Owned table of currently displayed features, keyed by feature id
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    entries: HashMap<String, RenderedFeature>,
}

impl FeatureRegistry {
    /// Replace the registry contents with a freshly rendered collection.
    /// Handles start out unset; the host attaches them as it draws.
    pub fn rebuild(&mut self, collection: &FeatureCollection) {
        self.entries = collection
            .features
            .iter()
            .map(|feature| {
                (
                    feature.id.clone(),
                    RenderedFeature {
                        feature: Arc::clone(feature),
                        shape: None,
                        icon: None,
                    },
                )
            })
            .collect();
    }

    /// Look up a displayed feature by id.
    pub fn feature(&self, id: &str) -> Option<&Arc<Feature>> {
        self.entries.get(id).map(|entry| &entry.feature)
    }

    /// Attach the host's shape handle to a displayed feature.
    pub fn set_shape(&mut self, id: &str, handle: ShapeHandle) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.shape = Some(handle);
        }
    }

    /// Attach the host's icon handle to a displayed feature.
    pub fn set_icon(&mut self, id: &str, handle: IconHandle) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.icon = Some(handle);
        }
    }

    /// Where to apply a highlight for the feature, shapes taking precedence
    /// over icons. `None` when the feature is not displayed or has no handle
    /// attached yet.
    pub fn highlight_target(&self, id: &str) -> Option<HighlightTarget> {
        let entry = self.entries.get(id)?;
        if let Some(shape) = entry.shape {
            Some(HighlightTarget::Shape(shape))
        } else {
            entry.icon.map(HighlightTarget::Icon)
        }
    }

    /// Drop all attached handles but keep the displayed features, for a full
    /// redraw with new styling.
    pub fn reset_handles(&mut self) {
        for entry in self.entries.values_mut() {
            entry.shape = None;
            entry.icon = None;
        }
    }

    /// Number of displayed features.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is displayed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Outcome of a viewport-change event
#[derive(Clone, Debug)]
pub enum MoveOutcome {
    /// Cache hit: render this collection synchronously, no fetch needed.
    Rendered(FeatureCollection),
    /// Cache miss: fetch the viewport from the origin service under `ticket`.
    /// `interim` optionally carries a richer cached set worth displaying
    /// while the fetch is in flight.
    Fetch {
        /// Identity to present with the eventual response
        ticket: FetchTicket,
        /// Advisory partial-refresh collection, if the cache offered one
        interim: Option<FeatureCollection>,
    },
}

/// Outcome of completing a fetch
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// The response was applied to the cache; render this collection.
    Applied(FeatureCollection),
    /// A newer viewport change superseded this fetch; the response was
    /// discarded and cache state is untouched.
    Superseded,
}

/// Per-layer-instance cache driver
///
/// Owns the cache, the rendered-feature registry, and the in-flight fetch
/// identity for exactly one rendering-component instance.
#[derive(Debug, Default)]
pub struct FeatureLayer {
    cache: ViewportCache,
    registry: FeatureRegistry,
    next_ticket: u64,
    in_flight: Option<(FetchTicket, Rect<f64>)>,
}

impl FeatureLayer {
    /// Create a layer driver with the given cache configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ViewportCache::new(config),
            registry: FeatureRegistry::default(),
            next_ticket: 0,
            in_flight: None,
        }
    }

    /// Handle a viewport-change event.
    ///
    /// The viewport is clamped to the world box first. A cache hit renders
    /// synchronously and cancels any in-flight fetch; a miss supersedes any
    /// in-flight fetch with a fresh ticket.
    pub fn move_viewport(&mut self, viewport: Rect<f64>) -> MoveOutcome {
        let viewport = clamp_to_world(&viewport);
        if let Some(collection) = self.cache.query(&viewport) {
            self.in_flight = None;
            self.registry.rebuild(&collection);
            return MoveOutcome::Rendered(collection);
        }

        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        if let Some((stale, _)) = self.in_flight.replace((ticket, viewport)) {
            trace!(?stale, "superseding in-flight fetch");
        }

        let interim = self.cache.partial_refresh(&viewport);
        if let Some(collection) = &interim {
            self.registry.rebuild(collection);
        }
        MoveOutcome::Fetch { ticket, interim }
    }

    /// Apply a successful fetch response.
    ///
    /// A response whose ticket is no longer the current one belongs to a
    /// superseded viewport and is discarded without mutating the cache.
    pub fn fetch_succeeded(
        &mut self,
        ticket: FetchTicket,
        collection: FeatureCollection,
    ) -> FetchOutcome {
        match self.in_flight {
            Some((current, viewport)) if current == ticket => {
                self.in_flight = None;
                self.cache.update(viewport, &collection);
                self.registry.rebuild(&collection);
                FetchOutcome::Applied(collection)
            }
            _ => {
                debug!(?ticket, "discarding superseded fetch response");
                FetchOutcome::Superseded
            }
        }
    }

    /// Record a failed fetch. Cache state is left untouched; the failure is
    /// the caller's to report.
    pub fn fetch_failed(&mut self, ticket: FetchTicket) {
        if matches!(self.in_flight, Some((current, _)) if current == ticket) {
            self.in_flight = None;
        }
    }

    /// The feature source changed identity: drop everything cached and
    /// displayed, and forget any in-flight fetch.
    pub fn change_source(&mut self) {
        self.cache.clear();
        self.registry.clear();
        self.in_flight = None;
    }

    /// Marker styling changed: cached geometry is stale as drawn, so the
    /// cache is cleared, and displayed features keep only their payloads for
    /// the redraw.
    pub fn restyle_markers(&mut self) {
        self.cache.clear();
        self.registry.reset_handles();
    }

    /// The cache owned by this layer.
    #[inline]
    pub fn cache(&self) -> &ViewportCache {
        &self.cache
    }

    /// The rendered-feature registry.
    #[inline]
    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    /// Mutable registry access for attaching renderer handles.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut FeatureRegistry {
        &mut self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::rect;
    use geo::{Geometry, LineString};
    use geojson::JsonObject;

    fn create_test_feature(id: &str, bounds: Rect<f64>) -> Arc<Feature> {
        let line = LineString::from(vec![
            (bounds.min().x, bounds.min().y),
            (bounds.max().x, bounds.max().y),
        ]);
        Arc::new(Feature::new(
            id,
            Geometry::LineString(line),
            JsonObject::new(),
        ))
    }

    fn collection(features: Vec<Arc<Feature>>) -> FeatureCollection {
        FeatureCollection::new(features)
    }

    #[test]
    fn test_miss_then_fetch_then_hit() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let viewport = rect(0.0, 0.0, 10.0, 10.0);

        let ticket = match layer.move_viewport(viewport) {
            MoveOutcome::Fetch { ticket, interim } => {
                assert!(interim.is_none());
                ticket
            }
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };

        let response = collection(vec![create_test_feature("f1", rect(1.0, 1.0, 2.0, 2.0))]);
        match layer.fetch_succeeded(ticket, response) {
            FetchOutcome::Applied(rendered) => assert_eq!(rendered.len(), 1),
            FetchOutcome::Superseded => panic!("current ticket must apply"),
        }
        assert_eq!(layer.registry().len(), 1);

        // The same viewport is now a synchronous hit.
        match layer.move_viewport(viewport) {
            MoveOutcome::Rendered(rendered) => assert_eq!(rendered.len(), 1),
            MoveOutcome::Fetch { .. } => panic!("covered viewport must hit"),
        }
    }

    #[test]
    fn test_newer_move_supersedes_older_fetch() {
        let mut layer = FeatureLayer::new(CacheConfig::default());

        let first = match layer.move_viewport(rect(0.0, 0.0, 10.0, 10.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        let second = match layer.move_viewport(rect(100.0, 0.0, 110.0, 10.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        assert_ne!(first, second);

        // The stale response arrives late and must not touch the cache.
        let stale = collection(vec![create_test_feature("old", rect(1.0, 1.0, 2.0, 2.0))]);
        assert!(matches!(
            layer.fetch_succeeded(first, stale),
            FetchOutcome::Superseded
        ));
        assert!(layer.cache().is_empty());

        let fresh = collection(vec![create_test_feature("new", rect(101.0, 1.0, 102.0, 2.0))]);
        assert!(matches!(
            layer.fetch_succeeded(second, fresh),
            FetchOutcome::Applied(_)
        ));
        assert_eq!(layer.cache().info().feature_count, 1);
    }

    #[test]
    fn test_failed_fetch_leaves_cache_untouched() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let ticket = match layer.move_viewport(rect(0.0, 0.0, 10.0, 10.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        layer.fetch_failed(ticket);
        assert!(layer.cache().is_empty());

        // A late success for the failed ticket is likewise ignored.
        let late = collection(vec![create_test_feature("f1", rect(1.0, 1.0, 2.0, 2.0))]);
        assert!(matches!(
            layer.fetch_succeeded(ticket, late),
            FetchOutcome::Superseded
        ));
        assert!(layer.cache().is_empty());
    }

    #[test]
    fn test_hit_cancels_in_flight_fetch() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let viewport = rect(0.0, 0.0, 10.0, 10.0);

        let ticket = match layer.move_viewport(viewport) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        let response = collection(vec![create_test_feature("f1", rect(1.0, 1.0, 2.0, 2.0))]);
        layer.fetch_succeeded(ticket, response);

        // Pan away (miss, fetch issued), then back inside the cached region
        // (hit). The hit cancels the outstanding fetch.
        let away = match layer.move_viewport(rect(100.0, 0.0, 110.0, 10.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("uncached viewport cannot hit"),
        };
        assert!(matches!(
            layer.move_viewport(rect(2.0, 2.0, 8.0, 8.0)),
            MoveOutcome::Rendered(_)
        ));
        let late = collection(vec![create_test_feature("away", rect(101.0, 1.0, 102.0, 2.0))]);
        assert!(matches!(
            layer.fetch_succeeded(away, late),
            FetchOutcome::Superseded
        ));
    }

    #[test]
    fn test_viewport_is_clamped_to_world() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let ticket = match layer.move_viewport(rect(-200.0, -95.0, 200.0, 95.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        let response = collection(vec![create_test_feature("f1", rect(0.0, 0.0, 1.0, 1.0))]);
        layer.fetch_succeeded(ticket, response);
        assert_eq!(
            layer.cache().history(),
            &[rect(-180.0, -90.0, 180.0, 90.0)]
        );
    }

    #[test]
    fn test_registry_highlight_dispatch() {
        let mut registry = FeatureRegistry::default();
        registry.rebuild(&collection(vec![
            create_test_feature("shape", rect(0.0, 0.0, 1.0, 1.0)),
            create_test_feature("icon", rect(2.0, 2.0, 3.0, 3.0)),
            create_test_feature("bare", rect(4.0, 4.0, 5.0, 5.0)),
        ]));

        registry.set_shape("shape", ShapeHandle(7));
        registry.set_icon("icon", IconHandle(3));
        // Shapes take precedence when both handles are attached.
        registry.set_icon("shape", IconHandle(9));

        assert_eq!(
            registry.highlight_target("shape"),
            Some(HighlightTarget::Shape(ShapeHandle(7)))
        );
        assert_eq!(
            registry.highlight_target("icon"),
            Some(HighlightTarget::Icon(IconHandle(3)))
        );
        assert_eq!(registry.highlight_target("bare"), None);
        assert_eq!(registry.highlight_target("absent"), None);

        assert!(registry.feature("shape").is_some());
        assert!(registry.feature("absent").is_none());

        registry.reset_handles();
        assert_eq!(registry.highlight_target("shape"), None);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_change_source_clears_everything() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let viewport = rect(0.0, 0.0, 10.0, 10.0);
        let ticket = match layer.move_viewport(viewport) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        layer.fetch_succeeded(
            ticket,
            collection(vec![create_test_feature("f1", rect(1.0, 1.0, 2.0, 2.0))]),
        );
        assert!(!layer.cache().is_empty());
        assert!(!layer.registry().is_empty());

        layer.change_source();
        assert!(layer.cache().is_empty());
        assert!(layer.registry().is_empty());
        // The previously covered viewport misses again against the new source.
        assert!(matches!(
            layer.move_viewport(viewport),
            MoveOutcome::Fetch { .. }
        ));
    }

    #[test]
    fn test_restyle_markers_clears_cache_but_keeps_display() {
        let mut layer = FeatureLayer::new(CacheConfig::default());
        let ticket = match layer.move_viewport(rect(0.0, 0.0, 10.0, 10.0)) {
            MoveOutcome::Fetch { ticket, .. } => ticket,
            MoveOutcome::Rendered(_) => panic!("empty cache cannot hit"),
        };
        layer.fetch_succeeded(
            ticket,
            collection(vec![create_test_feature("f1", rect(1.0, 1.0, 2.0, 2.0))]),
        );
        layer.registry_mut().set_icon("f1", IconHandle(1));

        layer.restyle_markers();
        assert!(layer.cache().is_empty());
        assert_eq!(layer.registry().len(), 1);
        assert_eq!(layer.registry().highlight_target("f1"), None);
    }
}

//! ViewportCache - viewport history, feature de-duplication, and eviction
//!
//! This module provides the high-level cache API driven by the rendering
//! component: query on every viewport change, update after a successful fetch,
//! and clear when the feature source changes identity.

use crate::bounds::{interacts, intersection};
use crate::coverage::covered;
use crate::feature::{Feature, FeatureCollection, feature_bounds};
use crate::index::{FeatureRecord, FeatureStore};

use geo::Rect;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Smallest permitted viewport-history bound.
const MIN_BOUNDS_CACHE_SIZE: usize = 2;

/// Eviction trims the history to this many entries below the configured bound,
/// leaving room for the next couple of viewport pushes between passes.
const EVICTION_SLACK: usize = 2;

/// A partial refresh is worthwhile when the cache holds this many times more
/// records for the new viewport than for what is already displayed.
const PARTIAL_REFRESH_RATIO: f64 = 1.1;

/// Configuration for the viewport cache
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheConfig {
    /// Maximum number of viewport rectangles retained in the history.
    /// Values below 2 are clamped. Default: 20.
    pub max_bounds_cache_size: usize,
    /// Whether caching is enabled at all. When disabled, `query` always
    /// misses and `update` is a no-op, so callers always fetch. Default: true.
    pub enable_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bounds_cache_size: 20,
            enable_cache: true,
        }
    }
}

/// Information about the current cache contents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheInfo {
    /// Number of viewport rectangles in the history
    pub history_len: usize,
    /// Number of feature records in the store
    pub feature_count: usize,
}

/// Client-side cache of features keyed by the history of visited viewports
///
/// Owned by exactly one rendering-component instance; all operations are
/// synchronous and assume single-writer access.
#[derive(Debug, Default)]
pub struct ViewportCache {
    /// Visited viewports, most recent first
    history: Vec<Rect<f64>>,
    /// Spatial store owning the cached feature records
    store: FeatureStore,
    /// Ids currently represented in the store, for de-duplication
    ids: HashSet<String>,
    /// Configuration settings
    config: CacheConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ViewportCache {
    /// Create a new cache with the given configuration.
    pub fn new(mut config: CacheConfig) -> Self {
        if config.max_bounds_cache_size < MIN_BOUNDS_CACHE_SIZE {
            warn!(
                "max_bounds_cache_size {} below minimum, clamping to {}",
                config.max_bounds_cache_size, MIN_BOUNDS_CACHE_SIZE
            );
            config.max_bounds_cache_size = MIN_BOUNDS_CACHE_SIZE;
        }
        Self {
            history: Vec::new(),
            store: FeatureStore::new(),
            ids: HashSet::new(),
            config,
        }
    }

    /// Serve the viewport from the cache, if it is fully covered by
    /// previously fetched viewports.
    ///
    /// `None` means the caller must fetch from the origin service - either
    /// the cache is disabled, or coverage could not be established. Any
    /// uncertainty resolves to a miss; the cache never serves a region it has
    /// not completely seen.
    pub fn query(&self, viewport: &Rect<f64>) -> Option<FeatureCollection> {
        #[cfg(feature = "profiling")]
        profiling::scope!("cache::query");
        if !self.config.enable_cache {
            return None;
        }
        if covered(viewport, &self.history) {
            let features = self.collect(viewport);
            debug!(hits = features.len(), "viewport served from cache");
            Some(FeatureCollection::new(features))
        } else {
            debug!("viewport not covered, cache miss");
            None
        }
    }

    /// Record a successful fetch: evict stale history, insert the features
    /// that are not yet cached, and push the viewport onto the history.
    ///
    /// Features whose geometry yields no coordinates are degenerate; they are
    /// skipped with a warning and the rest of the batch proceeds.
    pub fn update(&mut self, viewport: Rect<f64>, collection: &FeatureCollection) {
        #[cfg(feature = "profiling")]
        profiling::scope!("cache::update");
        if !self.config.enable_cache {
            return;
        }

        // Trim before pushing, so the history settles at the configured bound
        // rather than below it.
        self.evict(&viewport);

        let mut records = Vec::new();
        for feature in &collection.features {
            if self.ids.contains(&feature.id) {
                continue;
            }
            let Some(bounds) = feature_bounds(&feature.geometry) else {
                warn!(id = %feature.id, "skipping feature with degenerate geometry");
                continue;
            };
            records.push(FeatureRecord::new(bounds, Arc::clone(feature)));
            self.ids.insert(feature.id.clone());
        }
        debug!(
            new = records.len(),
            total = collection.len(),
            "caching fetched features"
        );
        self.store.insert_bulk(records);
        self.history.insert(0, viewport);
    }

    /// Retire history entries beyond the size bound, together with the
    /// records only they protect.
    ///
    /// Entries are inspected oldest-first. An over-bound entry that still
    /// interacts with `current` is retained; otherwise every record
    /// overlapping it is removed from the store unless some other retained
    /// history entry still interacts with that record.
    pub fn evict(&mut self, current: &Rect<f64>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("cache::evict");
        let keep = self
            .config
            .max_bounds_cache_size
            .saturating_sub(EVICTION_SLACK);

        let mut idx = self.history.len();
        while idx > 0 {
            idx -= 1;
            if idx <= keep {
                break;
            }
            let bounds = self.history[idx];
            if interacts(&bounds, current) {
                continue;
            }
            let victims: Vec<FeatureRecord> = self
                .store
                .search(&bounds)
                .into_iter()
                .filter(|record| {
                    !self
                        .history
                        .iter()
                        .enumerate()
                        .any(|(j, other)| j != idx && interacts(&record.bounds, other))
                })
                .cloned()
                .collect();
            for victim in &victims {
                self.store.remove(victim);
                self.ids.remove(&victim.feature.id);
            }
            debug!(removed = victims.len(), ?bounds, "evicted stale viewport");
            self.history.remove(idx);
        }
    }

    /// Advisory hybrid path while a fetch for `viewport` is in flight.
    ///
    /// Compares the cached record count for `viewport` against the count for
    /// its intersection with the most recent history entry (what is currently
    /// displayed). If the cache holds significantly more - typically after a
    /// zoom-out revealing previously cached detail - the richer cached set is
    /// returned for an eager re-render without waiting for the fetch.
    pub fn partial_refresh(&self, viewport: &Rect<f64>) -> Option<FeatureCollection> {
        if !self.config.enable_cache {
            return None;
        }
        let last = self.history.first()?;
        let displayed = intersection(viewport, last)?;
        let available = self.store.search_count(viewport);
        let shown = self.store.search_count(&displayed);
        if available as f64 > shown as f64 * PARTIAL_REFRESH_RATIO {
            debug!(available, shown, "partial refresh from cache");
            Some(FeatureCollection::new(self.collect(viewport)))
        } else {
            None
        }
    }

    /// Empty the history, the store, and the id set unconditionally.
    ///
    /// Invoked when the feature-source identity changes or when a style
    /// change invalidates all previously drawn geometry.
    pub fn clear(&mut self) {
        self.history.clear();
        self.store.clear();
        self.ids.clear();
        debug!("cache cleared");
    }

    /// Current cache contents summary.
    #[inline]
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            history_len: self.history.len(),
            feature_count: self.store.len(),
        }
    }

    /// The retained viewport history, most recent first.
    #[inline]
    pub fn history(&self) -> &[Rect<f64>] {
        &self.history
    }

    /// Get a reference to the configuration.
    #[inline]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the cache holds no viewports and no features.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.store.is_empty()
    }

    fn collect(&self, viewport: &Rect<f64>) -> Vec<Arc<Feature>> {
        self.store
            .search(viewport)
            .into_iter()
            .map(|record| Arc::clone(&record.feature))
            .collect()
    }
}

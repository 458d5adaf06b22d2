//! Feature store backed by an R-tree
//!
//! Thin adapter over `rstar`'s R-tree exposing exactly the contract the cache
//! lifecycle needs: bulk insert, touch-inclusive range search, exact-record
//! removal, and clear. The tree's internal balancing is the library's concern.

use crate::feature::Feature;
use geo::Rect;
use rstar::{AABB, RTree, RTreeObject};
use std::sync::Arc;

/// One cached feature together with its precomputed bounding box
///
/// The store is the sole owner of cached features; collections returned to the
/// renderer share them via `Arc`.
#[derive(Clone, Debug)]
pub struct FeatureRecord {
    /// Bounding box of the feature geometry, in lon/lat
    pub bounds: Rect<f64>,
    /// The shared feature payload
    pub feature: Arc<Feature>,
}

impl FeatureRecord {
    /// Create a record from a feature and its precomputed bounds.
    pub fn new(bounds: Rect<f64>, feature: Arc<Feature>) -> Self {
        Self { bounds, feature }
    }
}

impl RTreeObject for FeatureRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min().x, self.bounds.min().y],
            [self.bounds.max().x, self.bounds.max().y],
        )
    }
}

// Record identity is the feature id; removal matches on it.
impl PartialEq for FeatureRecord {
    fn eq(&self, other: &Self) -> bool {
        self.feature.id == other.feature.id
    }
}

/// Spatial store of cached feature records
#[derive(Debug, Default)]
pub struct FeatureStore {
    tree: RTree<FeatureRecord>,
}

impl FeatureStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Bulk-insert a batch of records.
    ///
    /// An empty store is bulk-loaded in one pass; subsequent batches are
    /// inserted incrementally.
    pub fn insert_bulk(&mut self, records: Vec<FeatureRecord>) {
        if records.is_empty() {
            return;
        }
        if self.tree.size() == 0 {
            self.tree = RTree::bulk_load(records);
        } else {
            for record in records {
                self.tree.insert(record);
            }
        }
    }

    /// All records whose bounding box interacts with `bounds` (touching edges
    /// included).
    pub fn search(&self, bounds: &Rect<f64>) -> Vec<&FeatureRecord> {
        let envelope = AABB::from_corners(
            [bounds.min().x, bounds.min().y],
            [bounds.max().x, bounds.max().y],
        );
        self.tree.locate_in_envelope_intersecting(&envelope).collect()
    }

    /// Number of records interacting with `bounds`, without materializing them.
    pub fn search_count(&self, bounds: &Rect<f64>) -> usize {
        let envelope = AABB::from_corners(
            [bounds.min().x, bounds.min().y],
            [bounds.max().x, bounds.max().y],
        );
        self.tree.locate_in_envelope_intersecting(&envelope).count()
    }

    /// Remove one record by identity. Removing an absent record is a no-op.
    pub fn remove(&mut self, record: &FeatureRecord) -> bool {
        self.tree.remove(record).is_some()
    }

    /// Empty the store.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Total number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the store holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

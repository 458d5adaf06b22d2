//! Coverage decision over a set of cached viewport rectangles
//!
//! Answers whether a target rectangle is fully covered by the union of a set of
//! previously fetched rectangles. This is the cache-hit predicate: a covered
//! viewport can be served from the feature store without a network round-trip.

use crate::bounds::{contains, overlaps, subtract};
use geo::Rect;

/// Whether `test` is fully covered by the union of `regions`.
///
/// The check first looks for a single enclosing region (cheap exact shortcut),
/// then subdivides `test` against the first region that shares interior area
/// with it and requires every remaining piece to be covered by the *other*
/// regions. Candidate lists shrink by one region per recursion level, and each
/// level splits the target into at most four pieces, so the recursion
/// terminates. Regions are scanned in list order (most recent first); the
/// result is deterministic for a given ordering, and any single witness cover
/// suffices.
///
/// An uncoverable target resolves to `false` - the caller treats that as a
/// cache miss and fetches from the origin service.
pub fn covered(test: &Rect<f64>, regions: &[Rect<f64>]) -> bool {
    if regions.iter().any(|region| contains(test, region)) {
        return true;
    }
    for (i, region) in regions.iter().enumerate() {
        if overlaps(test, region) {
            let pieces = subtract(test, region);
            // Rebuild the candidate list without the consumed region instead of
            // mutating a shared list; recursive branches must not alias.
            let remaining: Vec<Rect<f64>> = regions[..i]
                .iter()
                .chain(&regions[i + 1..])
                .copied()
                .collect();
            return pieces.iter().all(|piece| covered(piece, &remaining));
        }
    }
    false
}

//! Rectangle algebra over planar lon/lat bounding boxes
//!
//! All functions here are pure predicates and constructions over `geo::Rect<f64>`
//! pairs. Boxes are treated as axis-aligned rectangles in longitude/latitude
//! space; geodesic correctness is explicitly out of scope.
//!
//! Two overlap notions are distinguished throughout the crate:
//! - [`interacts`]: touch or overlap, boundaries inclusive. Used to decide
//!   whether a retained region still protects a cached feature.
//! - [`overlaps`]: shared interior area, boundaries exclusive. Used for
//!   intersection and subtraction decisions.

use geo::{Coord, Rect};
use smallvec::{SmallVec, smallvec};

/// Longitude extent of the world box.
pub const WORLD_LON_MAX: f64 = 180.0;
/// Latitude extent of the world box.
pub const WORLD_LAT_MAX: f64 = 90.0;

/// The set-difference of two rectangles tiles into at most four pieces.
pub type Tiling = SmallVec<[Rect<f64>; 4]>;

/// Build a rectangle from min/max corner coordinates.
#[inline]
pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect<f64> {
    Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    )
}

/// Whether `b` touches or overlaps `a`, boundaries inclusive.
#[inline]
pub fn interacts(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    !(b.min().x > a.max().x
        || b.min().y > a.max().y
        || b.max().x < a.min().x
        || b.max().y < a.min().y)
}

/// Whether `b` shares interior area with `a`, boundaries exclusive.
#[inline]
pub fn overlaps(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    !(b.min().x >= a.max().x
        || b.min().y >= a.max().y
        || b.max().x <= a.min().x
        || b.max().y <= a.min().y)
}

/// Whether `b` fully encloses `a`, boundaries inclusive.
#[inline]
pub fn contains(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    !(b.min().x > a.min().x
        || b.min().y > a.min().y
        || b.max().x < a.max().x
        || b.max().y < a.max().y)
}

/// The overlapping rectangle of `a` and `b`, if they share interior area.
#[inline]
pub fn intersection(a: &Rect<f64>, b: &Rect<f64>) -> Option<Rect<f64>> {
    if overlaps(a, b) {
        Some(rect(
            a.min().x.max(b.min().x),
            a.min().y.max(b.min().y),
            a.max().x.min(b.max().x),
            a.max().y.min(b.max().y),
        ))
    } else {
        None
    }
}

/// Area of a rectangle. Zero for degenerate (point or line) boxes.
#[inline]
pub fn area(r: &Rect<f64>) -> f64 {
    r.width() * r.height()
}

/// Clamp a rectangle to the world box (±180 longitude, ±90 latitude).
///
/// Viewports reported by map widgets can exceed the world at low zoom; the
/// remote service only accepts world-bounded boxes.
pub fn clamp_to_world(r: &Rect<f64>) -> Rect<f64> {
    rect(
        r.min().x.max(-WORLD_LON_MAX),
        r.min().y.max(-WORLD_LAT_MAX),
        r.max().x.min(WORLD_LON_MAX),
        r.max().y.min(WORLD_LAT_MAX),
    )
}

/// The disjoint rectangles exactly tiling `a` minus `b`.
///
/// The pieces have zero pairwise overlap, and their area plus the area of
/// [`intersection`]`(a, b)` (when present) reconstructs the area of `a`.
/// Returns `[a]` unchanged when `b` does not overlap `a`, and an empty tiling
/// when `b` encloses `a`.
pub fn subtract(a: &Rect<f64>, b: &Rect<f64>) -> Tiling {
    if !overlaps(a, b) {
        return smallvec![*a];
    }
    if contains(a, b) {
        return Tiling::new();
    }
    if b.min().x <= a.min().x {
        subtract_left(a, b)
    } else if b.max().x >= a.max().x {
        subtract_right(a, b)
    } else {
        subtract_centre(a, b)
    }
}

// b reaches past a's left edge.
fn subtract_left(a: &Rect<f64>, b: &Rect<f64>) -> Tiling {
    let full_height = b.min().y <= a.min().y && b.max().y >= a.max().y;
    if b.max().x >= a.max().x {
        // b spans a's full width; only horizontal strips remain.
        return if b.min().y <= a.min().y {
            smallvec![rect(a.min().x, b.max().y, a.max().x, a.max().y)]
        } else if b.max().y >= a.max().y {
            smallvec![rect(a.min().x, a.min().y, a.max().x, b.min().y)]
        } else {
            smallvec![
                rect(a.min().x, b.max().y, a.max().x, a.max().y),
                rect(a.min().x, a.min().y, a.max().x, b.min().y),
            ]
        };
    }
    if full_height {
        return smallvec![rect(b.max().x, a.min().y, a.max().x, a.max().y)];
    }
    if b.min().y > a.min().y && b.max().y < a.max().y {
        return smallvec![
            rect(a.min().x, b.max().y, a.max().x, a.max().y),
            rect(b.max().x, b.min().y, a.max().x, b.max().y),
            rect(a.min().x, a.min().y, a.max().x, b.min().y),
        ];
    }
    if b.max().y >= a.max().y {
        return smallvec![
            rect(b.max().x, b.min().y, a.max().x, a.max().y),
            rect(a.min().x, a.min().y, a.max().x, b.min().y),
        ];
    }
    smallvec![
        rect(a.min().x, b.max().y, a.max().x, a.max().y),
        rect(b.max().x, a.min().y, a.max().x, b.max().y),
    ]
}

// b reaches past a's right edge (and not past the left one).
fn subtract_right(a: &Rect<f64>, b: &Rect<f64>) -> Tiling {
    if b.min().y <= a.min().y && b.max().y >= a.max().y {
        return smallvec![rect(a.min().x, a.min().y, b.min().x, a.max().y)];
    }
    if b.min().y > a.min().y && b.max().y < a.max().y {
        return smallvec![
            rect(a.min().x, b.max().y, a.max().x, a.max().y),
            rect(a.min().x, b.min().y, b.min().x, b.max().y),
            rect(a.min().x, a.min().y, a.max().x, b.min().y),
        ];
    }
    if b.max().y >= a.max().y {
        return smallvec![
            rect(a.min().x, b.min().y, b.min().x, a.max().y),
            rect(a.min().x, a.min().y, a.max().x, b.min().y),
        ];
    }
    smallvec![
        rect(a.min().x, b.max().y, a.max().x, a.max().y),
        rect(a.min().x, a.min().y, b.min().x, b.max().y),
    ]
}

// b is strictly interior to a along the X axis.
fn subtract_centre(a: &Rect<f64>, b: &Rect<f64>) -> Tiling {
    if b.min().y <= a.min().y && b.max().y >= a.max().y {
        return smallvec![
            rect(a.min().x, a.min().y, b.min().x, a.max().y),
            rect(b.max().x, a.min().y, a.max().x, a.max().y),
        ];
    }
    if b.max().y >= a.max().y {
        return smallvec![
            rect(a.min().x, b.min().y, b.min().x, a.max().y),
            rect(a.min().x, a.min().y, a.max().x, b.min().y),
            rect(b.max().x, b.min().y, a.max().x, a.max().y),
        ];
    }
    if b.min().y <= a.min().y {
        return smallvec![
            rect(a.min().x, b.max().y, a.max().x, a.max().y),
            rect(a.min().x, a.min().y, b.min().x, b.max().y),
            rect(b.max().x, a.min().y, a.max().x, b.max().y),
        ];
    }
    // b strictly interior on both axes: a ring of four pieces.
    smallvec![
        rect(a.min().x, b.max().y, a.max().x, a.max().y),
        rect(a.min().x, b.min().y, b.min().x, b.max().y),
        rect(b.max().x, b.min().y, a.max().x, b.max().y),
        rect(a.min().x, a.min().y, a.max().x, b.min().y),
    ]
}

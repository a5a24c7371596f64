//! Axis-aligned bounding regions and quadrant geometry.
//!
//! [`BoundingBox`] is the closed rectangle
//! `[center.x - half.x, center.x + half.x] x [center.y - half.y, center.y + half.y]`.
//!
//! # Containment vs. intersection
//!
//! `contains` is closed (boundary inclusive) while `intersects` is strict
//! (boxes sharing only an edge do not intersect). The asymmetry is
//! deliberate: closed containment guarantees every point is accepted by at
//! least one child quadrant, while strict intersection keeps sibling
//! quadrants disjoint for range queries, so a query box lying on a shared
//! edge never double-counts. Do not "fix" one to match the other.

use crate::point::Point;

/// An axis-aligned rectangle given by its center and half extents.
///
/// Both half extents must be positive; behavior for degenerate boxes is
/// unspecified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Center of the rectangle.
    pub center: Point,

    /// Half extent along each axis.
    pub half: Point,
}

/// One of the four child quadrants of a subdivided box.
///
/// `ALL` lists the quadrants in the fixed routing order. Insertion offers a
/// point to the children in this order and the first whose closed boundary
/// contains it wins; points on a shared edge therefore route
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// North-west: smaller x, smaller y.
    Nw,
    /// North-east: larger x, smaller y.
    Ne,
    /// South-west: smaller x, larger y.
    Sw,
    /// South-east: larger x, larger y.
    Se,
}

impl Quadrant {
    /// The four quadrants in routing order.
    pub const ALL: [Self; 4] = [Self::Nw, Self::Ne, Self::Sw, Self::Se];
}

impl BoundingBox {
    /// Create a box from its center and half extents.
    #[inline]
    #[must_use]
    pub const fn new(center: Point, half: Point) -> Self {
        Self { center, half }
    }

    /// Closed-interval membership test.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.center.x - self.half.x
            && p.x <= self.center.x + self.half.x
            && p.y >= self.center.y - self.half.y
            && p.y <= self.center.y + self.half.y
    }

    /// Strict overlap test: boxes that share only an edge do not intersect.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.center.x + self.half.x > other.center.x - other.half.x
            && self.center.x - self.half.x < other.center.x + other.half.x
            && self.center.y + self.half.y > other.center.y - other.half.y
            && self.center.y - self.half.y < other.center.y + other.half.y
    }

    /// The boundary of one child quadrant.
    ///
    /// Children have half extents `half / 2` and centers offset from this
    /// box's center by `half / 2` along each axis. The four children tile
    /// this box exactly and overlap only on shared edges.
    #[must_use]
    pub fn quadrant(&self, q: Quadrant) -> Self {
        let qh = Point::new(self.half.x / 2.0, self.half.y / 2.0);
        let center = match q {
            Quadrant::Nw => Point::new(self.center.x - qh.x, self.center.y - qh.y),
            Quadrant::Ne => Point::new(self.center.x + qh.x, self.center.y - qh.y),
            Quadrant::Sw => Point::new(self.center.x - qh.x, self.center.y + qh.y),
            Quadrant::Se => Point::new(self.center.x + qh.x, self.center.y + qh.y),
        };
        Self { center, half: qh }
    }
}

//! The public quadtree facade.
//!
//! [`Quadtree`] is a tagged sum over the two synchronization strategies.
//! The interface is three operations (`insert`, `query`, `boundary`) with
//! no lifecycle methods, so an enum with static dispatch covers it; both
//! variants are also exported directly for callers that want a concrete
//! type (the lock-free variant additionally offers guard-scoped batch
//! operations).

use crate::boundingbox::BoundingBox;
use crate::point::Point;

pub mod lock_free;
pub mod locked;

#[cfg(all(loom, test))]
mod loom_tests;


pub use lock_free::LockFreeQuadtree;
pub use locked::LockedQuadtree;

// ============================================================================
//  TreeStats
// ============================================================================

/// Sizes reported by a validating traversal ([`Quadtree::stats`]).
///
/// The traversal asserts the structural invariants as it walks: every
/// bucketed point inside its node's boundary, every non-leaf with exactly
/// four children whose boundaries are the quadrant partition of the
/// parent, and no node both leaf and internal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Total points held in buckets.
    pub points: usize,
    /// Leaf nodes (bucket present).
    pub leaves: usize,
    /// Internal nodes (four children, no bucket).
    pub internals: usize,
    /// Depth of the deepest node; a lone root leaf has depth 0.
    pub depth: usize,
}

// ============================================================================
//  Quadtree
// ============================================================================

/// A concurrent point-region quadtree.
///
/// Stores points of the Euclidean plane under an axis-aligned boundary
/// fixed at construction. Supports concurrent insertion from any number
/// of threads and range queries over axis-aligned boxes.
///
/// # Example
///
/// ```
/// use quadtree::{BoundingBox, Point, Quadtree};
///
/// let boundary = BoundingBox::new(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
/// let tree = Quadtree::new(boundary, 4);
///
/// assert!(tree.insert(Point::new(100.0, 100.0)));
/// assert!(!tree.insert(Point::new(500.0, 0.0))); // outside the boundary
///
/// let near = BoundingBox::new(Point::new(100.0, 100.0), Point::new(1.0, 1.0));
/// assert_eq!(tree.query(&near), vec![Point::new(100.0, 100.0)]);
/// ```
#[derive(Debug)]
pub enum Quadtree {
    /// Compare-and-swap on per-node pointer slots; never blocks.
    LockFree(LockFreeQuadtree),
    /// One reader-writer lock per node.
    Locked(LockedQuadtree),
}

impl Quadtree {
    /// Create a tree with the default (lock-free) strategy.
    #[must_use]
    pub fn new(boundary: BoundingBox, capacity: usize) -> Self {
        Self::new_lock_free(boundary, capacity)
    }

    /// Create a lock-free tree.
    #[must_use]
    pub fn new_lock_free(boundary: BoundingBox, capacity: usize) -> Self {
        Self::LockFree(LockFreeQuadtree::new(boundary, capacity))
    }

    /// Create a lock-based tree.
    #[must_use]
    pub fn new_locked(boundary: BoundingBox, capacity: usize) -> Self {
        Self::Locked(LockedQuadtree::new(boundary, capacity))
    }

    /// Insert a point.
    ///
    /// Returns `true` once the point is placed; `false` iff it lies
    /// outside the root boundary. Never blocks forever and never panics
    /// on valid input.
    pub fn insert(&self, p: Point) -> bool {
        match self {
            Self::LockFree(tree) => tree.insert(p),
            Self::Locked(tree) => tree.insert(p),
        }
    }

    /// Collect every point currently in the tree that `range` contains.
    ///
    /// The result is unordered and holds fresh copies; no point is
    /// reported twice. Concurrent inserts may or may not be reflected.
    #[must_use]
    pub fn query(&self, range: &BoundingBox) -> Vec<Point> {
        match self {
            Self::LockFree(tree) => tree.query(range),
            Self::Locked(tree) => tree.query(range),
        }
    }

    /// The root's immutable boundary.
    #[must_use]
    pub fn boundary(&self) -> BoundingBox {
        match self {
            Self::LockFree(tree) => tree.boundary(),
            Self::Locked(tree) => tree.boundary(),
        }
    }

    /// The bucket capacity every leaf is created with.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            Self::LockFree(tree) => tree.capacity(),
            Self::Locked(tree) => tree.capacity(),
        }
    }

    /// Number of successfully inserted points. O(1).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::LockFree(tree) => tree.len(),
            Self::Locked(tree) => tree.len(),
        }
    }

    /// True if no point has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the tree, assert the structural invariants, and report sizes.
    ///
    /// # Panics
    ///
    /// Panics if an invariant is violated. Quiesce mutators first; a tree
    /// mid-split legitimately fails the leaf/internal exclusivity check.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        match self {
            Self::LockFree(tree) => tree.stats(),
            Self::Locked(tree) => tree.stats(),
        }
    }
}

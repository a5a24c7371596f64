//! Lock-based quadtree.
//!
//! One reader-writer lock per node, whole-node critical sections. An
//! insert holds the node's write lock while it appends or splits; a query
//! holds the read lock while it scans. Recursion into children happens
//! after the parent's guard drops, so locks are only ever held one node
//! at a time and form a forest: no deadlock is possible.
//!
//! Children are published once, at split time, and never replaced; they
//! are handed out as cloned [`Arc`] handles so recursion can proceed
//! without borrowing through the parent's lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::boundingbox::{BoundingBox, Quadrant};
use crate::bucket::PointBucket;
use crate::point::Point;
use crate::tracing_helpers::{debug_log, warn_log};
use crate::tree::TreeStats;

// ============================================================================
//  Node
// ============================================================================

/// The four children of an internal node, in quadrant order.
///
/// Cloning clones the handles, not the nodes.
#[derive(Clone)]
struct Children {
    nw: Arc<LockedNode>,
    ne: Arc<LockedNode>,
    sw: Arc<LockedNode>,
    se: Arc<LockedNode>,
}

impl Children {
    fn new(parent: BoundingBox, capacity: usize) -> Self {
        let leaf = |q: Quadrant| Arc::new(LockedNode::new_leaf(parent.quadrant(q), capacity));
        Self {
            nw: leaf(Quadrant::Nw),
            ne: leaf(Quadrant::Ne),
            sw: leaf(Quadrant::Sw),
            se: leaf(Quadrant::Se),
        }
    }

    fn child(&self, q: Quadrant) -> &LockedNode {
        match q {
            Quadrant::Nw => &self.nw,
            Quadrant::Ne => &self.ne,
            Quadrant::Sw => &self.sw,
            Quadrant::Se => &self.se,
        }
    }
}

/// Either a leaf holding points or an internal node holding children.
/// The leaf → internal transition is one-way.
enum State {
    Leaf(PointBucket),
    Internal(Children),
}

struct LockedNode {
    boundary: BoundingBox,
    capacity: usize,
    state: RwLock<State>,
}

impl LockedNode {
    fn new_leaf(boundary: BoundingBox, capacity: usize) -> Self {
        Self {
            boundary,
            capacity,
            state: RwLock::new(State::Leaf(PointBucket::new(capacity))),
        }
    }

    fn insert(&self, p: Point) -> bool {
        // Boundaries are immutable, so the check needs no lock.
        if !self.boundary.contains(p) {
            return false;
        }

        let children: Children = {
            let mut state = self.state.write();
            match &mut *state {
                State::Leaf(bucket) if !bucket.is_full() => {
                    bucket.push(p);
                    return true;
                }
                State::Leaf(bucket) => {
                    // Full leaf: split, then fall through to child routing.
                    let children = self.subdivide(bucket);
                    *state = State::Internal(children.clone());
                    children
                }
                State::Internal(children) => children.clone(),
            }
            // Write guard drops here, before any child lock is taken.
        };

        for q in Quadrant::ALL {
            if children.child(q).insert(p) {
                return true;
            }
        }

        // Unreachable by the containment invariant: a point inside this
        // boundary is inside some closed child quadrant.
        warn_log!(point = %p, boundary = ?self.boundary, "insert refused by every child");
        false
    }

    /// Create the four quadrant leaves and disperse this bucket into
    /// them.
    ///
    /// Runs under the caller's write lock. The children are fresh and
    /// unshared, so taking their locks here cannot deadlock: locks are
    /// only ever acquired parent before child.
    fn subdivide(&self, bucket: &PointBucket) -> Children {
        let children = Children::new(self.boundary, self.capacity);
        for p in bucket {
            let moved = Quadrant::ALL.iter().any(|&q| children.child(q).insert(p));
            assert!(
                moved,
                "invariant violation: point {p} inside {:?} refused by every quadrant during disperse",
                self.boundary,
            );
        }
        debug_log!(count = bucket.len(), boundary = ?self.boundary, "dispersed bucket");
        children
    }

    fn query(&self, range: &BoundingBox, out: &mut Vec<Point>) {
        if !self.boundary.intersects(range) {
            return;
        }

        let children: Children = {
            let state = self.state.read();
            match &*state {
                State::Leaf(bucket) => {
                    for p in bucket {
                        if range.contains(p) {
                            out.push(p);
                        }
                    }
                    return;
                }
                State::Internal(children) => children.clone(),
            }
            // Read guard drops here, before recursing.
        };

        for q in Quadrant::ALL {
            children.child(q).query(range, out);
        }
    }

    /// Structural walk for [`TreeStats`]; asserts the tree invariants.
    fn stats_into(&self, depth: usize, stats: &mut TreeStats) {
        stats.depth = stats.depth.max(depth);

        let state = self.state.read();
        match &*state {
            State::Leaf(bucket) => {
                assert!(bucket.len() <= bucket.capacity());
                for p in bucket {
                    assert!(
                        self.boundary.contains(p),
                        "point {p} stored outside its node boundary {:?}",
                        self.boundary,
                    );
                }
                stats.points += bucket.len();
                stats.leaves += 1;
            }
            State::Internal(children) => {
                stats.internals += 1;
                for q in Quadrant::ALL {
                    let child = children.child(q);
                    assert_eq!(
                        child.boundary,
                        self.boundary.quadrant(q),
                        "child boundary does not match the quadrant partition",
                    );
                    child.stats_into(depth + 1, stats);
                }
            }
        }
    }
}

// ============================================================================
//  LockedQuadtree
// ============================================================================

/// A quadtree synchronized with one reader-writer lock per node.
///
/// Simpler than [`LockFreeQuadtree`](crate::LockFreeQuadtree) and a good
/// baseline under low contention; writers at the same hot node serialize.
pub struct LockedQuadtree {
    root: LockedNode,
    count: AtomicUsize,
}

impl std::fmt::Debug for LockedQuadtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedQuadtree")
            .field("boundary", &self.root.boundary)
            .field("capacity", &self.root.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl LockedQuadtree {
    /// Create an empty tree covering `boundary`, with per-leaf bucket
    /// `capacity`.
    ///
    /// `capacity` must be at least 1 and both half extents positive;
    /// behavior for degenerate arguments is unspecified.
    #[must_use]
    pub fn new(boundary: BoundingBox, capacity: usize) -> Self {
        debug_assert!(capacity >= 1, "bucket capacity must be at least 1");
        debug_assert!(boundary.half.x > 0.0 && boundary.half.y > 0.0);
        Self {
            root: LockedNode::new_leaf(boundary, capacity),
            count: AtomicUsize::new(0),
        }
    }

    /// The root's immutable boundary.
    #[inline]
    #[must_use]
    pub fn boundary(&self) -> BoundingBox {
        self.root.boundary
    }

    /// The bucket capacity every leaf is created with.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.root.capacity
    }

    /// Number of successfully inserted points. O(1).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// True if no point has been inserted.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a point. Returns `false` iff it lies outside the root
    /// boundary.
    pub fn insert(&self, p: Point) -> bool {
        let inserted = self.root.insert(p);
        if inserted {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        inserted
    }

    /// Collect every point contained by `range`. Unordered.
    #[must_use]
    pub fn query(&self, range: &BoundingBox) -> Vec<Point> {
        let mut out = Vec::new();
        self.root.query(range, &mut out);
        out
    }

    /// Walk the tree, assert the structural invariants, and report sizes.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.root.stats_into(0, &mut stats);
        stats
    }
}

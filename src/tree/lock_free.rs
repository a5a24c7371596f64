//! Lock-free quadtree (the default strategy).
//!
//! Every node carries five atomic pointer slots: one bucket slot and four
//! child slots. No mutexes anywhere; all mutation goes through
//! compare-and-swap on those slots.
//!
//! # Insert protocol
//!
//! ```text
//! 1. Boundary check (immutable, no synchronization needed)
//! 2. CAS loop: snapshot bucket, prepend copy-on-write, CAS to publish
//!    - success: retire the superseded header, return true
//!    - bucket absent or full: fall through to split + child routing
//! 3. split(): CAS each child slot from null (idempotent, losers discard)
//! 4. disperse(): CAS bucket to null, winner drains the snapshot into
//!    the children
//! 5. Route the point to the first accepting child in NW,NE,SW,SE order
//! ```
//!
//! The bucket-pointer CAS is the linearization point for a leaf insert;
//! the child-slot CAS is the linearization point for completing a split.
//!
//! # Node states
//!
//! `Leaf` (bucket present, no children) → `Splitting` (children appearing,
//! bucket still present) → `Internal` (four children, bucket absent). The
//! transition is one-way; once internal, a node never becomes a leaf
//! again. Queries tolerate the `Splitting` state: a point mid-disperse is
//! never reported twice (see the traversal order in `query`), though a
//! query overlapping the relocation may miss it until the disperse
//! completes, which the snapshot contract permits.
//!
//! # Reclamation
//!
//! Superseded bucket headers may still be traversed by readers that
//! loaded them before the CAS, so they are retired through this tree's
//! [`seize::Collector`] rather than freed in place. Child nodes are never
//! unpublished and are freed when the tree drops. List cells are
//! reference counted and die with the last header that reaches them.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use seize::{Collector, Guard, LocalGuard, reclaim};

use crate::boundingbox::{BoundingBox, Quadrant};
use crate::bucket::PointBucket;
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD};
use crate::point::Point;
use crate::tracing_helpers::{debug_log, trace_log, warn_log};
use crate::tree::TreeStats;

// ============================================================================
//  Node
// ============================================================================

/// One node of the lock-free tree.
///
/// `boundary` and `capacity` are immutable after construction; the five
/// pointer slots are the only mutable state and are only ever accessed
/// through the orderings in [`crate::ordering`].
struct Node {
    boundary: BoundingBox,
    capacity: usize,

    /// Present iff this node is (still) a leaf. Points at an immutable
    /// snapshot; growth replaces the whole header by CAS.
    bucket: AtomicPtr<PointBucket>,

    nw: AtomicPtr<Node>,
    ne: AtomicPtr<Node>,
    sw: AtomicPtr<Node>,
    se: AtomicPtr<Node>,
}

impl Node {
    /// Create a leaf node with a fresh empty bucket.
    fn new_leaf(boundary: BoundingBox, capacity: usize) -> Self {
        Self {
            boundary,
            capacity,
            bucket: AtomicPtr::new(Box::into_raw(Box::new(PointBucket::new(capacity)))),
            nw: AtomicPtr::new(ptr::null_mut()),
            ne: AtomicPtr::new(ptr::null_mut()),
            sw: AtomicPtr::new(ptr::null_mut()),
            se: AtomicPtr::new(ptr::null_mut()),
        }
    }

    const fn child_slot(&self, q: Quadrant) -> &AtomicPtr<Self> {
        match q {
            Quadrant::Nw => &self.nw,
            Quadrant::Ne => &self.ne,
            Quadrant::Sw => &self.sw,
            Quadrant::Se => &self.se,
        }
    }

    /// Acquire-load one child. `None` until a split publishes it.
    fn child(&self, q: Quadrant) -> Option<&Self> {
        let child: *mut Self = self.child_slot(q).load(READ_ORD);
        // SAFETY: a published child is never unpublished or freed while
        // the tree is alive, so the reference stays valid for `&self`'s
        // lifetime.
        (!child.is_null()).then(|| unsafe { &*child })
    }

    fn insert(&self, p: Point, guard: &LocalGuard<'_>) -> bool {
        // The boundary can't change, so the check sits outside the CAS
        // loop. If boundaries were ever made mutable this would no longer
        // be threadsafe.
        if !self.boundary.contains(p) {
            return false;
        }

        loop {
            let old: *mut PointBucket = self.bucket.load(READ_ORD);
            if old.is_null() {
                // A racing disperse emptied this node; route to children.
                break;
            }

            // SAFETY: non-null bucket pointers stay valid until retired,
            // and the guard holds retirement back for the whole call.
            let snapshot: &PointBucket = unsafe { &*old };
            if snapshot.is_full() {
                break;
            }

            let grown: *mut PointBucket = Box::into_raw(Box::new(snapshot.with_point(p)));
            match self
                .bucket
                .compare_exchange(old, grown, CAS_SUCCESS, CAS_FAILURE)
            {
                Ok(_prev) => {
                    // Readers that loaded `old` before our CAS may still
                    // be traversing it; reclaim once they quiesce.
                    // SAFETY: `old` came from Box::into_raw and is now
                    // unreachable for new readers.
                    unsafe { guard.defer_retire(old, reclaim::boxed) };
                    return true;
                }
                Err(_current) => {
                    trace_log!(len = snapshot.len(), "bucket CAS lost, retrying");
                    // SAFETY: `grown` was never published; we still own it.
                    drop(unsafe { Box::from_raw(grown) });
                }
            }
        }

        // The bucket is at capacity, or a concurrent split already
        // drained it. Make sure this node is subdivided, then route the
        // point to a child.
        if !self.bucket.load(READ_ORD).is_null() {
            self.split(guard);
        }

        for q in Quadrant::ALL {
            if let Some(child) = self.child(q) {
                if child.insert(p, guard) {
                    return true;
                }
            }
        }

        // Unreachable by the containment invariant: a point inside this
        // boundary is inside some closed child quadrant.
        warn_log!(point = %p, boundary = ?self.boundary, "insert refused by every child");
        false
    }

    /// Subdivide this node. Idempotent: any number of threads may run it
    /// concurrently; each child slot is CASed from null exactly once and
    /// losers discard their candidate, which is equivalent to the winner's.
    fn split(&self, guard: &LocalGuard<'_>) {
        for q in Quadrant::ALL {
            let slot: &AtomicPtr<Self> = self.child_slot(q);
            if !slot.load(READ_ORD).is_null() {
                continue;
            }

            let candidate: *mut Self = Box::into_raw(Box::new(Self::new_leaf(
                self.boundary.quadrant(q),
                self.capacity,
            )));
            if slot
                .compare_exchange(ptr::null_mut(), candidate, CAS_SUCCESS, CAS_FAILURE)
                .is_err()
            {
                // SAFETY: the candidate lost the CAS and was never
                // published; we still own it.
                drop(unsafe { Box::from_raw(candidate) });
            }
        }

        self.disperse(guard);
    }

    /// Drain-then-clear disperse: a single CAS swaps the bucket slot to
    /// null, and the winner moves every drained point into the children.
    ///
    /// The only competing writers on a full bucket are other disperses
    /// (insert CASes stop at capacity), so losing the swap means another
    /// thread owns the same snapshot and will finish the job.
    fn disperse(&self, guard: &LocalGuard<'_>) {
        let old: *mut PointBucket = self.bucket.load(READ_ORD);
        if old.is_null() {
            return;
        }
        if self
            .bucket
            .compare_exchange(old, ptr::null_mut(), CAS_SUCCESS, CAS_FAILURE)
            .is_err()
        {
            return;
        }

        // SAFETY: we won the swap, so the snapshot is ours to drain; the
        // guard keeps it alive for readers that loaded it before the swap.
        let snapshot: &PointBucket = unsafe { &*old };
        for p in snapshot {
            let moved = Quadrant::ALL
                .iter()
                .any(|&q| self.child(q).is_some_and(|child| child.insert(p, guard)));
            assert!(
                moved,
                "invariant violation: point {p} inside {:?} refused by every quadrant during disperse",
                self.boundary,
            );
        }
        debug_log!(count = snapshot.len(), boundary = ?self.boundary, "dispersed bucket");

        // SAFETY: the snapshot is unreachable for new readers after the
        // swap to null.
        unsafe { guard.defer_retire(old, reclaim::boxed) };
    }

    /// The guard is unused directly but witnesses that the caller holds a
    /// protected region: any snapshot loaded below survives until it drops.
    fn query(&self, range: &BoundingBox, out: &mut Vec<Point>, _guard: &LocalGuard<'_>) {
        if !self.boundary.intersects(range) {
            return;
        }

        // Children before bucket. A disperse publishes a point into a
        // child only after clearing the bucket slot, so a reader that
        // finds the point in a child is guaranteed a null bucket here;
        // scanning the bucket first would let the same point be reported
        // from both sides of an in-flight relocation.
        for q in Quadrant::ALL {
            if let Some(child) = self.child(q) {
                child.query(range, out, _guard);
            }
        }

        // One acquire load; the snapshot list is immutable, so the scan
        // needs no further atomics.
        let bucket: *mut PointBucket = self.bucket.load(READ_ORD);
        if !bucket.is_null() {
            // SAFETY: the guard keeps the snapshot alive even if a
            // concurrent insert or disperse retires it under us.
            let snapshot: &PointBucket = unsafe { &*bucket };
            for p in snapshot {
                if range.contains(p) {
                    out.push(p);
                }
            }
        }
    }

    /// Structural walk for [`TreeStats`]; asserts the tree invariants.
    /// Only meaningful when no mutators are running.
    fn stats_into(&self, depth: usize, stats: &mut TreeStats) {
        stats.depth = stats.depth.max(depth);

        let bucket: *mut PointBucket = self.bucket.load(READ_ORD);
        let children: usize = Quadrant::ALL
            .iter()
            .filter(|&&q| self.child(q).is_some())
            .count();

        if bucket.is_null() {
            assert_eq!(
                children, 4,
                "internal node at {:?} is missing children",
                self.boundary
            );
        } else {
            assert_eq!(children, 0, "leaf at {:?} has children", self.boundary);
            // SAFETY: quiescent tree; the header is live.
            let snapshot: &PointBucket = unsafe { &*bucket };
            assert!(snapshot.len() <= snapshot.capacity());
            for p in snapshot {
                assert!(
                    self.boundary.contains(p),
                    "point {p} stored outside its node boundary {:?}",
                    self.boundary,
                );
            }
            stats.points += snapshot.len();
            stats.leaves += 1;
            return;
        }

        stats.internals += 1;
        for q in Quadrant::ALL {
            if let Some(child) = self.child(q) {
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

impl Drop for Node {
    fn drop(&mut self) {
        // `&mut self` proves exclusive access; plain loads suffice.
        let bucket: *mut PointBucket = *self.bucket.get_mut();
        if !bucket.is_null() {
            // SAFETY: the live header is owned by this node; superseded
            // headers were handed to the collector instead.
            drop(unsafe { Box::from_raw(bucket) });
        }
        for slot in [&mut self.nw, &mut self.ne, &mut self.sw, &mut self.se] {
            let child: *mut Self = *slot.get_mut();
            if !child.is_null() {
                // SAFETY: a published child is exclusively owned by its
                // parent; nothing else frees it.
                drop(unsafe { Box::from_raw(child) });
            }
        }
    }
}

// ============================================================================
//  LockFreeQuadtree
// ============================================================================

/// A quadtree whose operations never block on another thread.
///
/// Inserts make progress in a bounded number of own steps per tree level,
/// modulo CAS retries bounded by the number of competing writers at the
/// same node. Queries never perform a CAS and never wait.
///
/// All operations run inside a [`seize`] protected region. The plain
/// [`insert`](Self::insert) and [`query`](Self::query) enter one per
/// call; batch callers can amortize that with [`guard`](Self::guard) and
/// the `*_with_guard` variants.
pub struct LockFreeQuadtree {
    root: Box<Node>,
    collector: Collector,
    count: AtomicUsize,
}

impl std::fmt::Debug for LockFreeQuadtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFreeQuadtree")
            .field("boundary", &self.root.boundary)
            .field("capacity", &self.root.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl LockFreeQuadtree {
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
            root: Box::new(Node::new_leaf(boundary, capacity)),
            collector: Collector::new(),
            count: AtomicUsize::new(0),
        }
    }

    /// Enter a protected region and return a guard.
    ///
    /// The guard keeps any bucket snapshot loaded during its lifetime
    /// from being reclaimed.
    #[must_use]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
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
        let guard = self.guard();
        self.insert_with_guard(p, &guard)
    }

    /// [`insert`](Self::insert) with a caller-provided guard.
    pub fn insert_with_guard(&self, p: Point, guard: &LocalGuard<'_>) -> bool {
        let inserted = self.root.insert(p, guard);
        if inserted {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        inserted
    }

    /// Collect every point contained by `range`.
    ///
    /// The result is unordered. Concurrent inserts may or may not be
    /// reflected; each node contributes one consistent bucket snapshot.
    #[must_use]
    pub fn query(&self, range: &BoundingBox) -> Vec<Point> {
        let guard = self.guard();
        self.query_with_guard(range, &guard)
    }

    /// [`query`](Self::query) with a caller-provided guard.
    #[must_use]
    pub fn query_with_guard(&self, range: &BoundingBox, guard: &LocalGuard<'_>) -> Vec<Point> {
        let mut out = Vec::new();
        self.root.query(range, &mut out, guard);
        out
    }

    /// Walk the tree, assert the structural invariants, and report sizes.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated. Call only while no mutators
    /// are running; a tree mid-split legitimately fails the leaf/internal
    /// exclusivity this checks.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.root.stats_into(0, &mut stats);
        stats
    }
}

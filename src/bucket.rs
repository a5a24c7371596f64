//! Capacity-bounded, persistent point storage for leaf nodes.
//!
//! A [`PointBucket`] is a small header (capacity + cached length) over a
//! persistent singly-linked list of points. Prepending produces a new head
//! cell whose tail is shared with every predecessor snapshot, so the
//! lock-free tree can publish a grown bucket with a single pointer CAS
//! while concurrent readers keep traversing their own snapshot.
//!
//! Two mutation styles, one per synchronization strategy:
//!
//! - [`push`](PointBucket::push) grows the list in place and is used by
//!   the locked tree, which holds the node's write lock.
//! - [`with_point`](PointBucket::with_point) is copy-on-write: it builds a
//!   new header that shares the old tail, for publication by CAS.
//!
//! Cells are reference counted. A superseded header keeps its cells alive
//! for readers still traversing it; the cells die with the last header
//! that reaches them.

use std::sync::Arc;

use crate::point::Point;

/// One cell of the persistent point list.
#[derive(Debug)]
struct PointCell {
    point: Point,
    next: Option<Arc<PointCell>>,
}

/// A bounded, append-only collection of points.
///
/// The capacity is fixed at construction and propagates to every bucket
/// the tree ever creates. Insertion order is not observable through
/// queries; iteration yields most-recently-added first as an artifact of
/// prepending.
#[derive(Debug)]
pub struct PointBucket {
    capacity: usize,
    len: usize,
    head: Option<Arc<PointCell>>,
}

impl PointBucket {
    /// Create an empty bucket. `capacity` must be at least 1.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            len: 0,
            head: None,
        }
    }

    /// Number of points currently held.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if no points are held.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The fixed capacity set at construction.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the bucket has reached capacity.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Prepend a point in place.
    ///
    /// Callers must hold exclusive access (the locked tree's write lock)
    /// and must have checked [`is_full`](Self::is_full) first.
    pub fn push(&mut self, p: Point) {
        debug_assert!(!self.is_full(), "push on a full bucket");
        self.head = Some(Arc::new(PointCell {
            point: p,
            next: self.head.take(),
        }));
        self.len += 1;
    }

    /// Copy-on-write prepend: a new header sharing this bucket's tail.
    ///
    /// The receiver is unchanged; readers traversing it are unaffected.
    #[must_use]
    pub fn with_point(&self, p: Point) -> Self {
        Self {
            capacity: self.capacity,
            len: self.len + 1,
            head: Some(Arc::new(PointCell {
                point: p,
                next: self.head.clone(),
            })),
        }
    }

    /// Iterate the points in this snapshot.
    ///
    /// The list cells are immutable once published, so the iterator needs
    /// no synchronization beyond the single load that produced `self`.
    #[must_use]
    pub fn iter(&self) -> Points<'_> {
        Points {
            next: self.head.as_deref(),
        }
    }
}

impl Drop for PointBucket {
    fn drop(&mut self) {
        // Unlink iteratively while this header holds the last reference.
        // A naive recursive drop of a long uniquely-owned chain would
        // exhaust the stack; a shared tail stops the walk early because
        // some other snapshot still owns it.
        let mut head = self.head.take();
        while let Some(cell) = head {
            match Arc::try_unwrap(cell) {
                Ok(mut cell) => head = cell.next.take(),
                Err(_shared) => break,
            }
        }
    }
}

/// Iterator over the points of one bucket snapshot.
#[derive(Debug)]
pub struct Points<'a> {
    next: Option<&'a PointCell>,
}

impl Iterator for Points<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        let cell = self.next?;
        self.next = cell.next.as_deref();
        Some(cell.point)
    }
}

impl<'a> IntoIterator for &'a PointBucket {
    type Item = Point;
    type IntoIter = Points<'a>;

    fn into_iter(self) -> Points<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_grows_in_place() {
        let mut bucket = PointBucket::new(4);
        assert!(bucket.is_empty());
        bucket.push(Point::new(1.0, 2.0));
        bucket.push(Point::new(3.0, 4.0));
        assert_eq!(bucket.len(), 2);
        assert!(!bucket.is_full());

        let points: Vec<Point> = bucket.iter().collect();
        assert_eq!(points, vec![Point::new(3.0, 4.0), Point::new(1.0, 2.0)]);
    }

    #[test]
    fn with_point_leaves_snapshot_intact() {
        let mut base = PointBucket::new(2);
        base.push(Point::new(1.0, 1.0));

        let grown = base.with_point(Point::new(2.0, 2.0));
        assert_eq!(base.len(), 1);
        assert_eq!(grown.len(), 2);
        assert!(grown.is_full());

        // The tail cell is shared, not copied.
        let base_points: Vec<Point> = base.iter().collect();
        let grown_points: Vec<Point> = grown.iter().collect();
        assert_eq!(base_points, vec![Point::new(1.0, 1.0)]);
        assert_eq!(
            grown_points,
            vec![Point::new(2.0, 2.0), Point::new(1.0, 1.0)]
        );
    }

    #[test]
    fn dropping_a_snapshot_keeps_shared_tail_alive() {
        let mut base = PointBucket::new(8);
        for i in 0..4 {
            base.push(Point::new(f64::from(i), 0.0));
        }
        let grown = base.with_point(Point::new(99.0, 0.0));
        drop(base);

        let points: Vec<Point> = grown.iter().collect();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], Point::new(99.0, 0.0));
    }

    #[test]
    fn deep_unique_chain_drops_without_recursion() {
        let mut bucket = PointBucket::new(200_000);
        for i in 0..200_000 {
            bucket.push(Point::new(f64::from(i), 0.0));
        }
        drop(bucket);
    }
}

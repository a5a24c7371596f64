//! Property-based tests for the quadtree.
//!
//! These verify the invariants that must hold for all inputs: the
//! round-trip multiset law, query containment, idempotence, agreement
//! between the two strategies, and agreement with a linear-scan oracle.

#![allow(clippy::pedantic)]

use proptest::prelude::*;
use quadtree::{BoundingBox, Point, Quadtree};

// ============================================================================
//  Strategies
// ============================================================================

fn root() -> BoundingBox {
    BoundingBox::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0))
}

/// A point inside (or on the edge of) the root boundary.
fn in_bounds_point() -> impl Strategy<Value = Point> {
    (-100.0f64..=100.0, -100.0f64..=100.0).prop_map(|(x, y)| Point::new(x, y))
}

fn point_vec(max: usize) -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(in_bounds_point(), 0..=max)
}

/// An arbitrary query box, not necessarily inside the root boundary.
fn query_box() -> impl Strategy<Value = BoundingBox> {
    (
        -150.0f64..=150.0,
        -150.0f64..=150.0,
        0.5f64..=120.0,
        0.5f64..=120.0,
    )
        .prop_map(|(cx, cy, hx, hy)| BoundingBox::new(Point::new(cx, cy), Point::new(hx, hy)))
}

fn bucket_capacity() -> impl Strategy<Value = usize> {
    1usize..=8
}

fn build(lock_free: bool, capacity: usize) -> Quadtree {
    if lock_free {
        Quadtree::new_lock_free(root(), capacity)
    } else {
        Quadtree::new_locked(root(), capacity)
    }
}

/// Canonical order so multisets can be compared with `assert_eq`.
fn sorted(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points
}

// ============================================================================
//  Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Inserting any multiset of in-bounds points and querying the root
    /// boundary returns exactly that multiset.
    #[test]
    fn round_trip_preserves_multiset(
        points in point_vec(64),
        capacity in bucket_capacity(),
        lock_free: bool,
    ) {
        let tree = build(lock_free, capacity);
        for &p in &points {
            prop_assert!(tree.insert(p), "in-bounds insert of {p} failed");
        }

        prop_assert_eq!(tree.len(), points.len());
        prop_assert_eq!(
            sorted(tree.query(&tree.boundary())),
            sorted(points.clone())
        );

        let stats = tree.stats();
        prop_assert_eq!(stats.points, points.len());
    }

    /// Every queried point is contained by the query box.
    #[test]
    fn query_results_are_contained(
        points in point_vec(48),
        range in query_box(),
        capacity in bucket_capacity(),
        lock_free: bool,
    ) {
        let tree = build(lock_free, capacity);
        for &p in &points {
            tree.insert(p);
        }
        for p in tree.query(&range) {
            prop_assert!(range.contains(p), "{p} outside query box {range:?}");
        }
    }

    /// The tree agrees with a linear scan over the same points.
    #[test]
    fn query_matches_linear_scan(
        points in point_vec(48),
        range in query_box(),
        capacity in bucket_capacity(),
        lock_free: bool,
    ) {
        let tree = build(lock_free, capacity);
        for &p in &points {
            tree.insert(p);
        }

        let expected: Vec<Point> = points
            .iter()
            .copied()
            .filter(|&p| range.contains(p))
            .collect();
        prop_assert_eq!(sorted(tree.query(&range)), sorted(expected));
    }

    /// Repeated queries with no intervening insert return identical
    /// multisets.
    #[test]
    fn repeated_queries_are_idempotent(
        points in point_vec(32),
        range in query_box(),
        capacity in bucket_capacity(),
        lock_free: bool,
    ) {
        let tree = build(lock_free, capacity);
        for &p in &points {
            tree.insert(p);
        }
        prop_assert_eq!(
            sorted(tree.query(&range)),
            sorted(tree.query(&range))
        );
    }

    /// Both strategies are observationally equivalent on sequential
    /// workloads, including the edge tie-break.
    #[test]
    fn strategies_agree(
        points in point_vec(48),
        range in query_box(),
        capacity in bucket_capacity(),
    ) {
        let lock_free = build(true, capacity);
        let locked = build(false, capacity);
        for &p in &points {
            prop_assert_eq!(lock_free.insert(p), locked.insert(p));
        }
        prop_assert_eq!(
            sorted(lock_free.query(&range)),
            sorted(locked.query(&range))
        );

        let lf_stats = lock_free.stats();
        let lk_stats = locked.stats();
        prop_assert_eq!(lf_stats.points, lk_stats.points);
    }

    /// Out-of-bounds points are refused by both strategies and never
    /// surface in queries.
    #[test]
    fn out_of_bounds_points_are_refused(
        x in 100.0f64..=500.0,
        y in prop::num::f64::NORMAL.prop_map(f64::abs),
        lock_free: bool,
    ) {
        let p = Point::new(x + 0.001, y);
        let tree = build(lock_free, 4);
        prop_assert!(!tree.insert(p));
        prop_assert_eq!(tree.len(), 0);
        prop_assert!(tree.query(&tree.boundary()).is_empty());
    }
}

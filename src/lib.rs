//! # Quadtree
//!
//! A concurrent point-region quadtree: an in-memory spatial index over
//! points in the plane, built for many producer threads inserting while
//! readers issue range queries.
//!
//! Two interchangeable synchronization strategies implement the same
//! three-operation surface (`insert`, `query`, `boundary`):
//!
//! - **Lock-free** (default): five atomic pointer slots per node (bucket
//!   plus four quadrant children) updated by compare-and-swap. Leaf
//!   buckets are immutable snapshots over a persistent point list; growth
//!   is copy-on-write of a small header, and superseded headers are
//!   reclaimed through [`seize`].
//! - **Locked**: one `parking_lot` reader-writer lock per node with
//!   whole-node critical sections; no lock is ever held across a
//!   parent-child recursion, so locks form a forest and cannot deadlock.
//!
//! ## Semantics
//!
//! - `insert` returns `false` only for points outside the root boundary.
//! - Leaves hold up to `capacity` points; overflow splits the node into
//!   the four quadrants NW, NE, SW, SE and disperses the bucket. A point
//!   on a shared edge routes to the first quadrant, in that fixed order,
//!   whose closed boundary contains it.
//! - `query` is unordered and duplicate-free. It is consistent per node
//!   (one atomic snapshot of each bucket) but not globally atomic: an
//!   insert racing a split is seen either in the old leaf or in a child.
//! - No deletion, no payloads, no rebalancing, no duplicate suppression:
//!   inserting equal coordinates twice yields two entries. Equal
//!   coordinates can never be separated by subdivision, so keep the
//!   bucket capacity at or above the largest duplicate multiplicity you
//!   expect; a clump larger than one bucket has nowhere to come to rest.
//!
//! ## Example
//!
//! ```
//! use quadtree::{BoundingBox, Point, Quadtree};
//!
//! let boundary = BoundingBox::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
//! let tree = Quadtree::new(boundary, 4);
//!
//! tree.insert(Point::new(10.0, -25.0));
//! tree.insert(Point::new(-60.0, 40.0));
//!
//! let west = BoundingBox::new(Point::new(-50.0, 0.0), Point::new(50.0, 100.0));
//! assert_eq!(tree.query(&west), vec![Point::new(-60.0, 40.0)]);
//! ```

pub mod boundingbox;
pub mod bucket;
pub mod ordering;
pub mod point;
pub(crate) mod tracing_helpers;
pub mod tree;

pub use boundingbox::{BoundingBox, Quadrant};
pub use bucket::PointBucket;
pub use point::Point;
pub use tree::{LockFreeQuadtree, LockedQuadtree, Quadtree, TreeStats};

//! Insert throughput driver.
//!
//! Inserts a scatter of in-bounds points from several threads, reports
//! wall-clock throughput, then verifies the count with a full-boundary
//! query.
//!
//! ```bash
//! cargo run --release --bin insert_throughput -- [POINTS] [THREADS] [lock-free|locked]
//! ```

#![allow(clippy::cast_precision_loss)]

use std::env;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use quadtree::{BoundingBox, Point, Quadtree};

const DEFAULT_POINTS: usize = 1_000_000;
const DEFAULT_THREADS: usize = 4;
const CAPACITY: usize = 4;

/// Deterministic low-discrepancy scatter over `[50, 150] x [50, 150]`,
/// so runs are comparable without threading an RNG through the workers.
fn scatter(i: usize) -> Point {
    let n = i as f64;
    Point::new(
        50.0 + (n * 0.754_877_666_2).fract() * 100.0,
        50.0 + (n * 0.569_840_290_9).fract() * 100.0,
    )
}

fn usage() -> ! {
    eprintln!("usage: insert_throughput [POINTS] [THREADS] [lock-free|locked]");
    process::exit(2);
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let points: usize = match args.first() {
        Some(arg) => arg.parse().unwrap_or_else(|_| usage()),
        None => DEFAULT_POINTS,
    };
    let threads: usize = match args.get(1) {
        Some(arg) => arg.parse().unwrap_or_else(|_| usage()),
        None => DEFAULT_THREADS,
    };
    if points == 0 || threads == 0 {
        usage();
    }

    let boundary = BoundingBox::new(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
    let tree = match args.get(2).map(String::as_str) {
        Some("lock-free") | None => Quadtree::new_lock_free(boundary, CAPACITY),
        Some("locked") => Quadtree::new_locked(boundary, CAPACITY),
        Some(_) => usage(),
    };
    let tree = Arc::new(tree);

    let strategy = match &*tree {
        Quadtree::LockFree(_) => "lock-free",
        Quadtree::Locked(_) => "locked",
    };
    println!("inserting {points} points on {threads} threads ({strategy})");

    let per_thread = points / threads;
    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for i in t * per_thread..(t + 1) * per_thread {
                    if !tree.insert(scatter(i)) {
                        eprintln!("insert failed for in-bounds point {}", scatter(i));
                        process::exit(1);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            eprintln!("worker thread panicked");
            process::exit(1);
        }
    }
    let elapsed = start.elapsed();

    let inserted = per_thread * threads;
    let rate = inserted as f64 / elapsed.as_secs_f64();
    println!("inserted {inserted} points in {elapsed:.2?} ({rate:.0} points/s)");

    let start = Instant::now();
    let queried = tree.query(&tree.boundary()).len();
    println!("full-boundary query found {queried} points in {:.2?}", start.elapsed());

    if queried != inserted {
        eprintln!("COUNT MISMATCH: inserted {inserted}, queried {queried}");
        process::exit(1);
    }
}

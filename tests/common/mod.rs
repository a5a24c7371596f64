//! Common test utilities: one-shot tracing setup.
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ...
//! }
//! ```
//!
//! Filter with `RUST_LOG`, e.g. `RUST_LOG=quadtree=trace` while running a
//! split-heavy test with `--features tracing`.

#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Ensures the subscriber is only installed once across all tests.
static INIT: Once = Once::new();

/// Initialize a console tracing subscriber.
///
/// Safe to call from every test; only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .with_test_writer()
            .try_init();
    });
}

//! Standard memory orderings for the lock-free tree's pointer slots.
//!
//! These constants keep ordering usage consistent across the codebase and
//! make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for reading a mutable pointer slot (bucket or child).
/// Pairs with a writer's Release publication.
pub const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for a plain publishing store.
/// Pairs with readers' Acquire loads.
pub const WRITE_ORD: Ordering = Ordering::Release;

/// Ordering for CAS success on bucket and child slots.
pub const CAS_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for CAS failure.
/// Only needs to observe the current value for the retry.
pub const CAS_FAILURE: Ordering = Ordering::Acquire;

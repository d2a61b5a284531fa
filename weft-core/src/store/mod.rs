//! Reactive containers.
//!
//! This module implements the container kinds of the engine and the
//! machinery they share.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An [`Atom`] is the minimal mutable container: a value plus a listener
//! set. Setting an equal value is a complete no-op; setting a different
//! value notifies every listener with `(new, previous)`.
//!
//! ## Computeds
//!
//! A [`Computed`] derives a value from an explicit, ordered set of source
//! containers. It is read-only, lazy while nobody listens, and live (source
//! subscriptions held, changes pushed) exactly while it has listeners.
//!
//! ## Lifecycle hooks
//!
//! Every container accepts mount/start/stop/pre-mutation/post-notify hooks
//! through the [`Store`] trait; the subscriber hub dispatches them around
//! the 0 -> 1 and 1 -> 0 listener transitions and around mutations.
//!
//! The structured containers ([`MapStore`](crate::structured::MapStore),
//! [`DeepMapStore`](crate::structured::DeepMapStore)) live in
//! [`crate::structured`] and are atoms underneath.

mod atom;
mod computed;
mod hub;
mod sources;
mod subscription;
mod traits;

pub use atom::Atom;
pub use computed::Computed;
pub use hub::MountCleanup;
pub use sources::Sources;
pub use subscription::Subscription;
pub use traits::Store;

pub(crate) use hub::Hub;
pub(crate) use traits::StoreCore;

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter behind per-container ids.
static STORE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique container id. Used for transaction first-touch
/// bookkeeping and diagnostics.
pub(crate) fn next_store_id() -> u64 {
    STORE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

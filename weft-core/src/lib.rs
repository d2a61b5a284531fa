//! Weft Core
//!
//! This crate provides a small reactive state engine: mutable and derived
//! containers with subscriptions, lifecycle hooks, transactional batching,
//! and structured (keyed and nested) state.
//!
//! - Reactive primitives ([`Atom`], [`Computed`])
//! - Transactional batching with first-touch notification coalescing
//! - Lifecycle hooks (mount, start, stop, pre-set, post-notify)
//! - Structured stores ([`MapStore`], [`DeepMapStore`]) with key- and
//!   path-scoped listeners
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `store`: Containers, the [`Store`] trait, and the lifecycle hub
//! - `batch`: Thread-local transaction machinery
//! - `structured`: Keyed and nested stores over a shared [`Value`] tree
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use weft_core::{Atom, Computed, Store};
//!
//! // Create a mutable container
//! let count = Atom::new(0);
//!
//! // Create a derived value
//! let doubled = Computed::new(count.clone(), |n| n * 2);
//!
//! // Subscribe: fires immediately, then on every change
//! let sub = doubled.subscribe(|value, _old| {
//!     println!("doubled: {value}");
//! });
//!
//! // Update the source; the derived value recomputes and notifies
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//! drop(sub);
//! ```

pub mod batch;
pub mod error;
pub mod store;
pub mod structured;

pub use batch::{batch, in_transaction};
pub use error::StoreError;
pub use store::{Atom, Computed, MountCleanup, Sources, Store, Subscription};
pub use structured::{diff_paths, get_deep, DeepMapStore, MapStore, Path, Segment, Value};

//! Atom: the minimal mutable container.
//!
//! An atom holds a value and a listener set. It is the only primitive with
//! an external write path; everything else in the engine (derived values,
//! structured stores) is built on top of it or mirrors its protocol.
//!
//! # Change detection
//!
//! `set` compares the incoming value with `PartialEq` and does nothing when
//! they are equal: no assignment, no hooks, no notification. `force_set`
//! bypasses the comparison. Equality here plays the role identity
//! comparison plays in dynamic-language stores.
//!
//! # Transactions
//!
//! Inside a [`batch`](crate::batch::batch) scope the assignment happens
//! immediately, pre-mutation hooks are suppressed, and the notification is
//! deferred: the atom queues itself once per outermost transaction with the
//! value it held at first touch, and flushes `(final, first_touch)` when
//! the transaction commits.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::hub::Hub;
use super::next_store_id;
use super::traits::StoreCore;
use crate::batch;

/// A mutable reactive container.
///
/// Clones share state: cloning an atom hands out another handle to the same
/// value and listener set.
///
/// # Example
///
/// ```rust
/// use weft_core::{Atom, Store};
///
/// let count = Atom::new(0);
/// let _sub = count.subscribe(|value, previous| {
///     println!("count: {value} (was {previous:?})");
/// });
///
/// count.set(5); // listener receives (5, Some(0))
/// count.set(5); // equal value: no notification
/// ```
pub struct Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<AtomInner<T>>,
}

struct AtomInner<T> {
    id: u64,
    value: RwLock<T>,
    hub: Hub<T>,
}

impl<T> Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new atom holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                id: next_store_id(),
                value: RwLock::new(initial),
                hub: Hub::new(),
            }),
        }
    }

    /// Stable identifier for this atom (shared by clones).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Assign a new value and notify listeners, unless it equals the
    /// current one, in which case nothing happens at all.
    pub fn set(&self, value: T) {
        if *self.inner.value.read() == value {
            trace!(target: "weft_core", id = self.inner.id, "set skipped, value unchanged");
            return;
        }
        self.write(value);
    }

    /// Assign a new value and notify listeners even if it equals the
    /// current one.
    pub fn force_set(&self, value: T) {
        self.write(value);
    }

    /// Read-modify-write convenience: `set(f(&current))`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    fn write(&self, value: T) {
        if batch::in_transaction() {
            let inner = Arc::clone(&self.inner);
            batch::enqueue_first_touch(inner.id, move || {
                let first_touch = inner.value.read().clone();
                Box::new(move || {
                    let current = inner.value.read().clone();
                    if current != first_touch {
                        trace!(target: "weft_core", id = inner.id, "flushing deferred notification");
                        inner.hub.notify(&current, Some(&first_touch));
                    }
                })
            });
            // Pre-mutation hooks are suppressed for transactional writes.
            *self.inner.value.write() = value;
            trace!(target: "weft_core", id = self.inner.id, "value updated inside transaction");
        } else {
            self.inner.hub.run_pre_set(&value);
            let previous = std::mem::replace(&mut *self.inner.value.write(), value.clone());
            trace!(target: "weft_core", id = self.inner.id, "value updated");
            self.inner.hub.notify(&value, Some(&previous));
        }
    }
}

impl<T> StoreCore for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn hub(&self) -> &Hub<T> {
        &self.inner.hub
    }

    fn current(&self) -> T {
        self.get()
    }

    fn writable(&self) -> bool {
        true
    }
}

impl<T> Clone for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("value", &self.get())
            .field("listener_count", &self.inner.hub.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

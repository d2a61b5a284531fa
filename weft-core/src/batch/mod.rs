//! Transaction controller.
//!
//! A transaction (batch) is a dynamic scope during which value changes are
//! applied immediately but their notifications are deferred until the
//! outermost scope exits. Scopes nest: only the outermost exit flushes.
//!
//! # Protocol
//!
//! 1. [`batch`] increments a per-thread depth counter and runs the body.
//!
//! 2. A container whose value actually changes while the depth is non-zero
//!    enqueues itself once per outermost transaction, recording the value it
//!    held at first touch.
//!
//! 3. When the depth returns to zero the pending queue is taken and cleared
//!    first, then each entry flushes in first-touch order: it compares the
//!    container's current value against the first-touch value and notifies
//!    `(current, first_touch)` only if they differ.
//!
//! 4. If the body panics the queue is cleared without flushing; applied
//!    values are not rolled back and nothing is notified. The panic
//!    propagates.
//!
//! # Threading
//!
//! The controller state is thread-local, matching the rest of the engine's
//! single-threaded cooperative model: a transaction is a per-thread scope.
//! A `set` performed on another thread while this thread holds a
//! transaction open notifies immediately on that other thread.

use std::cell::RefCell;
use std::collections::HashSet;

use tracing::debug;

thread_local! {
    static CONTEXT: RefCell<TransactionContext> = RefCell::new(TransactionContext::new());
}

/// Per-thread transaction state: nesting depth plus the pending queue.
struct TransactionContext {
    depth: usize,
    /// Ids of containers already queued in the current outermost
    /// transaction. First touch wins; later touches only update the value.
    seen: HashSet<u64>,
    /// Deferred notifications in first-touch order.
    queue: Vec<Box<dyn FnOnce()>>,
}

impl TransactionContext {
    fn new() -> Self {
        Self {
            depth: 0,
            seen: HashSet::new(),
            queue: Vec::new(),
        }
    }
}

/// True while any transaction is open on this thread.
pub fn in_transaction() -> bool {
    CONTEXT.with(|ctx| ctx.borrow().depth > 0)
}

/// Run `body` inside a transaction, deferring notifications until the
/// outermost transaction exits.
///
/// Nested calls only move the depth counter. A container changed in both an
/// outer and an inner scope notifies once, with its final value against the
/// value it held before the outer scope began.
///
/// If `body` panics, already-applied changes stay applied but none of them
/// is announced; the panic propagates to the caller.
///
/// # Example
///
/// ```rust
/// use weft_core::{batch, Atom, Store};
///
/// let a = Atom::new(1);
/// let _sub = a.listen(|value, previous| {
///     assert_eq!((*value, previous.copied()), (3, Some(1)));
/// });
///
/// batch(|| {
///     a.set(2);
///     a.set(3); // one notification, (3, Some(1)), after the batch ends
/// });
/// ```
pub fn batch<R>(body: impl FnOnce() -> R) -> R {
    CONTEXT.with(|ctx| ctx.borrow_mut().depth += 1);
    let mut guard = BatchGuard { committed: false };
    let result = body();
    guard.committed = true;
    drop(guard);
    result
}

struct BatchGuard {
    committed: bool,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let pending = CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            ctx.depth -= 1;
            if ctx.depth == 0 {
                ctx.seen.clear();
                Some(std::mem::take(&mut ctx.queue))
            } else {
                None
            }
        });

        let Some(queue) = pending else { return };

        if self.committed {
            debug!(target: "weft_core", pending = queue.len(), "transaction committed");
            // The queue is already cleared; flushes run outside any
            // bookkeeping so listeners may open fresh transactions.
            for flush in queue {
                flush();
            }
        } else {
            debug!(
                target: "weft_core",
                discarded = queue.len(),
                "transaction aborted, changes kept but not announced"
            );
        }
    }
}

/// Record a container's first touch in the current transaction.
///
/// `make_flush` runs only on the first touch; it captures the container's
/// pre-transaction value and returns the deferred notification closure.
pub(crate) fn enqueue_first_touch<F>(store_id: u64, make_flush: F)
where
    F: FnOnce() -> Box<dyn FnOnce()>,
{
    let first = CONTEXT.with(|ctx| ctx.borrow_mut().seen.insert(store_id));
    if first {
        let flush = make_flush();
        CONTEXT.with(|ctx| ctx.borrow_mut().queue.push(flush));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Atom, Store};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn depth_tracks_nesting() {
        assert!(!in_transaction());
        batch(|| {
            assert!(in_transaction());
            batch(|| assert!(in_transaction()));
            assert!(in_transaction());
        });
        assert!(!in_transaction());
    }

    #[test]
    fn notifications_follow_first_touch_order() {
        let a = Atom::new(0);
        let b = Atom::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        let _sub_a = a.listen(move |_, _| order_clone.lock().push("a"));
        let order_clone = order.clone();
        let _sub_b = b.listen(move |_, _| order_clone.lock().push("b"));

        batch(|| {
            b.set(1);
            a.set(1);
            b.set(2);
        });

        assert_eq!(*order.lock(), vec!["b", "a"]);
    }

    #[test]
    fn panicking_body_discards_notifications_but_keeps_values() {
        let a = Atom::new(0);
        let calls = Arc::new(Mutex::new(0));

        let calls_clone = calls.clone();
        let _sub = a.listen(move |_, _| *calls_clone.lock() += 1);

        let a_clone = a.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch(|| {
                a_clone.set(7);
                panic!("abort");
            })
        }));

        assert!(result.is_err());
        assert!(!in_transaction());
        assert_eq!(a.get(), 7);
        assert_eq!(*calls.lock(), 0);

        // The controller is reusable after an abort.
        a.set(8);
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn set_during_flush_notifies_immediately() {
        let a = Atom::new(0);
        let b = Atom::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let b_clone = b.clone();
        let _sub_a = a.listen(move |value, _| b_clone.set(*value * 10));
        let seen_clone = seen.clone();
        let _sub_b = b.listen(move |value, _| seen_clone.lock().push(*value));

        batch(|| a.set(2));

        assert_eq!(*seen.lock(), vec![20]);
    }
}

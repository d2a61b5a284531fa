//! Subscription handles.
//!
//! Every listener or lifecycle-hook registration returns a [`Subscription`].
//! Dropping the subscription removes the registration, so holding the handle
//! is what keeps a listener attached. This mirrors how the rest of the crate
//! manages resources: no explicit teardown calls, ownership does the work.

use std::fmt;

/// Handle to a registered listener or lifecycle hook.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes the registration. Call [`detach`](Self::detach) to leave the
/// listener attached for the remaining lifetime of its container.
///
/// # Example
///
/// ```rust
/// use weft_core::{Atom, Store};
///
/// let count = Atom::new(0);
/// let sub = count.listen(|value, _previous| {
///     println!("count is now {value}");
/// });
///
/// count.set(1); // listener runs
/// drop(sub);
/// count.set(2); // listener no longer attached
/// ```
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the registration now.
    ///
    /// Equivalent to dropping the handle; provided for call sites where an
    /// explicit verb reads better.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    /// Consume the handle without removing the registration.
    ///
    /// The listener stays attached until its container is dropped.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn drop_runs_cancel() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_clone = cancelled.clone();

        let sub = Subscription::new(move || {
            cancelled_clone.store(true, Ordering::SeqCst);
        });

        assert!(!cancelled.load(Ordering::SeqCst));
        drop(sub);
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn detach_skips_cancel() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_clone = cancelled.clone();

        let sub = Subscription::new(move || {
            cancelled_clone.store(true, Ordering::SeqCst);
        });

        sub.detach();
        assert!(!cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn unsubscribe_runs_cancel_once() {
        let count = Arc::new(std::sync::atomic::AtomicI32::new(0));
        let count_clone = count.clone();

        let sub = Subscription::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

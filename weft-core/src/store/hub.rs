//! Subscriber hub: listener sets and lifecycle hooks.
//!
//! Every container owns a [`Hub`]. It holds the value-listener set and the
//! five lifecycle hook sets (mount, start, stop, pre-mutation, post-notify),
//! and implements the activation protocol:
//!
//! 1. When the listener count goes 0 -> 1, mount hooks run (each may return
//!    a cleanup), then start hooks.
//!
//! 2. When the count returns to 0, pending mount cleanups run, then stop
//!    hooks.
//!
//! A container is "active" purely by virtue of having at least one listener;
//! the hub is where that definition lives.
//!
//! # Isolation
//!
//! Listeners and hooks run under `catch_unwind`. A panicking callback is
//! logged via `tracing` and skipped; it never aborts the rest of a
//! notification pass and never reaches the mutator. The listener set is
//! snapshotted before a pass, so a listener that unsubscribes itself (or
//! adds new listeners) mid-pass cannot disturb the iteration.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::error;

/// A value listener: receives the new value and the previous one.
///
/// The previous value is `None` only for the immediate invocation performed
/// by `subscribe`.
pub(crate) type ValueListener<T> = Arc<dyn Fn(&T, Option<&T>) + Send + Sync>;

/// Cleanup returned by a mount hook; runs when the container deactivates.
pub type MountCleanup = Box<dyn FnOnce() + Send>;

type MountHook = Arc<dyn Fn() -> Option<MountCleanup> + Send + Sync>;
type VoidHook = Arc<dyn Fn() + Send + Sync>;
type ValueHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Listener sets and lifecycle hooks for one container.
pub(crate) struct Hub<T> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, ValueListener<T>)>>,
    mount: RwLock<Vec<(u64, MountHook)>>,
    start: RwLock<Vec<(u64, VoidHook)>>,
    stop: RwLock<Vec<(u64, VoidHook)>>,
    pre_set: RwLock<Vec<(u64, ValueHook<T>)>>,
    post_notify: RwLock<Vec<(u64, ValueHook<T>)>>,
    cleanups: Mutex<Vec<MountCleanup>>,
}

impl<T> Hub<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
            mount: RwLock::new(Vec::new()),
            start: RwLock::new(Vec::new()),
            stop: RwLock::new(Vec::new()),
            pre_set: RwLock::new(Vec::new()),
            post_notify: RwLock::new(Vec::new()),
            cleanups: Mutex::new(Vec::new()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Add a value listener. Activates the container on the 0 -> 1
    /// transition, after the listener is already in the set.
    pub(crate) fn add_listener(&self, listener: ValueListener<T>) -> u64 {
        let id = self.next_id();
        let count = {
            let mut listeners = self.listeners.write();
            listeners.push((id, listener));
            listeners.len()
        };
        if count == 1 {
            self.activate();
        }
        id
    }

    pub(crate) fn remove_listener(&self, id: u64) {
        let emptied = {
            let mut listeners = self.listeners.write();
            let before = listeners.len();
            listeners.retain(|(lid, _)| *lid != id);
            before > 0 && listeners.is_empty()
        };
        if emptied {
            self.deactivate();
        }
    }

    /// Notify all value listeners, then the post-notify hooks.
    pub(crate) fn notify(&self, value: &T, previous: Option<&T>) {
        let snapshot: Vec<ValueListener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            isolated("value listener", || listener(value, previous));
        }

        let hooks: Vec<ValueHook<T>> = self
            .post_notify
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            isolated("notify hook", || hook(value));
        }
    }

    /// Run pre-mutation hooks with the incoming value.
    ///
    /// Callers skip this entirely while a transaction is open.
    pub(crate) fn run_pre_set(&self, value: &T) {
        let hooks: Vec<ValueHook<T>> = self
            .pre_set
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            isolated("pre-mutation hook", || hook(value));
        }
    }

    /// Register a mount hook.
    ///
    /// If the container is already active the hook runs immediately and its
    /// cleanup joins the pending set.
    pub(crate) fn add_mount(&self, hook: MountHook) -> u64 {
        let id = self.next_id();
        self.mount.write().push((id, Arc::clone(&hook)));
        if self.listener_count() > 0 {
            if let Some(cleanup) = run_mount(&hook) {
                self.cleanups.lock().push(cleanup);
            }
        }
        id
    }

    pub(crate) fn add_start(&self, hook: VoidHook) -> u64 {
        let id = self.next_id();
        self.start.write().push((id, hook));
        id
    }

    pub(crate) fn add_stop(&self, hook: VoidHook) -> u64 {
        let id = self.next_id();
        self.stop.write().push((id, hook));
        id
    }

    pub(crate) fn add_pre_set(&self, hook: ValueHook<T>) -> u64 {
        let id = self.next_id();
        self.pre_set.write().push((id, hook));
        id
    }

    pub(crate) fn add_post_notify(&self, hook: ValueHook<T>) -> u64 {
        let id = self.next_id();
        self.post_notify.write().push((id, hook));
        id
    }

    pub(crate) fn remove_mount(&self, id: u64) {
        self.mount.write().retain(|(hid, _)| *hid != id);
    }

    pub(crate) fn remove_start(&self, id: u64) {
        self.start.write().retain(|(hid, _)| *hid != id);
    }

    pub(crate) fn remove_stop(&self, id: u64) {
        self.stop.write().retain(|(hid, _)| *hid != id);
    }

    pub(crate) fn remove_pre_set(&self, id: u64) {
        self.pre_set.write().retain(|(hid, _)| *hid != id);
    }

    pub(crate) fn remove_post_notify(&self, id: u64) {
        self.post_notify.write().retain(|(hid, _)| *hid != id);
    }

    /// 0 -> 1 transition: mount hooks (collecting cleanups), then start.
    fn activate(&self) {
        let mounts: Vec<MountHook> = self
            .mount
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in mounts {
            if let Some(cleanup) = run_mount(&hook) {
                self.cleanups.lock().push(cleanup);
            }
        }

        let starts: Vec<VoidHook> = self
            .start
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in starts {
            isolated("start hook", || hook());
        }
    }

    /// 1 -> 0 transition: pending mount cleanups, then stop hooks.
    fn deactivate(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.lock());
        for cleanup in cleanups {
            isolated("mount cleanup", cleanup);
        }

        let stops: Vec<VoidHook> = self
            .stop
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in stops {
            isolated("stop hook", || hook());
        }
    }
}

fn run_mount(hook: &MountHook) -> Option<MountCleanup> {
    match catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(cleanup) => cleanup,
        Err(_) => {
            error!(target: "weft_core", "mount hook panicked; continuing");
            None
        }
    }
}

/// Run a callback, logging and swallowing a panic instead of letting it
/// reach the mutator.
pub(crate) fn isolated<F: FnOnce()>(what: &str, f: F) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(target: "weft_core", "{what} panicked; continuing notification pass");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn activation_fires_mount_then_start() {
        let hub: Hub<i32> = Hub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        hub.add_mount(Arc::new(move || {
            order_clone.lock().push("mount");
            None
        }));
        let order_clone = order.clone();
        hub.add_start(Arc::new(move || {
            order_clone.lock().push("start");
        }));

        let id = hub.add_listener(Arc::new(|_, _| {}));
        assert_eq!(*order.lock(), vec!["mount", "start"]);

        // A second listener does not re-run hooks.
        let id2 = hub.add_listener(Arc::new(|_, _| {}));
        assert_eq!(order.lock().len(), 2);

        hub.remove_listener(id);
        hub.remove_listener(id2);
    }

    #[test]
    fn deactivation_runs_cleanup_then_stop() {
        let hub: Hub<i32> = Hub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        hub.add_mount(Arc::new(move || {
            let order = order_clone.clone();
            Some(Box::new(move || {
                order.lock().push("cleanup");
            }) as MountCleanup)
        }));
        let order_clone = order.clone();
        hub.add_stop(Arc::new(move || {
            order_clone.lock().push("stop");
        }));

        let id = hub.add_listener(Arc::new(|_, _| {}));
        hub.remove_listener(id);

        assert_eq!(*order.lock(), vec!["cleanup", "stop"]);
    }

    #[test]
    fn mount_on_active_hub_runs_immediately() {
        let hub: Hub<i32> = Hub::new();
        let _id = hub.add_listener(Arc::new(|_, _| {}));

        let ran = Arc::new(AtomicI32::new(0));
        let ran_clone = ran.clone();
        hub.add_mount(Arc::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            None
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_pass() {
        let hub: Hub<i32> = Hub::new();
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = calls.clone();
        hub.add_listener(Arc::new(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        hub.add_listener(Arc::new(|_, _| panic!("boom")));
        let calls_clone = calls.clone();
        hub.add_listener(Arc::new(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        hub.notify(&1, Some(&0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_hooks_do_not_fire() {
        let hub: Hub<i32> = Hub::new();
        let ran = Arc::new(AtomicI32::new(0));

        let ran_clone = ran.clone();
        let id = hub.add_start(Arc::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));
        hub.remove_start(id);

        let lid = hub.add_listener(Arc::new(|_, _| {}));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        hub.remove_listener(lid);
    }
}

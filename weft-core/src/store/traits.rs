//! The public `Store` trait.
//!
//! All four container kinds (`Atom`, `Computed`, `MapStore`, `DeepMapStore`)
//! expose the same read/subscribe/lifecycle surface. The shared behavior is
//! implemented once, in a blanket impl over the crate-internal [`StoreCore`]
//! trait; each container only supplies its hub, its current value, and
//! whether it is writable.

use std::sync::Arc;

use super::hub::{isolated, Hub, MountCleanup};
use super::subscription::Subscription;
use crate::error::StoreError;

/// Capability set backing the blanket [`Store`] impl.
///
/// Sealed: the trait is `pub` so the blanket impl may name its associated
/// type publicly, but the module is private, so nothing outside the crate
/// can reach it.
pub trait StoreCore: Clone + Send + Sync + Sized + 'static {
    type Value: Clone + Send + Sync + 'static;

    fn hub(&self) -> &Hub<Self::Value>;

    /// Current value, forcing recomputation where the container is derived.
    fn current(&self) -> Self::Value;

    /// Whether the container has an external write path.
    fn writable(&self) -> bool;
}

/// Common surface of every reactive container.
///
/// Containers are cheap to clone (clones share state) and thread-safe.
/// Listeners receive `(value, previous)`; `previous` is `None` only for the
/// immediate invocation performed by [`subscribe`](Self::subscribe).
pub trait Store: Clone + Send + Sync + Sized + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Current value. No dependency is recorded; reading is side-effect
    /// free apart from lazy recomputation in derived containers.
    fn get(&self) -> Self::Value;

    /// Number of attached value listeners. A container with zero listeners
    /// performs no reactive work beyond what `get` forces.
    fn listener_count(&self) -> usize;

    /// Attach a listener without an immediate invocation.
    fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Self::Value, Option<&Self::Value>) + Send + Sync + 'static;

    /// Attach a listener and invoke it once, synchronously, with the
    /// current value and `None` as the previous value.
    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Self::Value, Option<&Self::Value>) + Send + Sync + 'static;

    /// Register a mount hook: runs when the listener count goes 0 -> 1 and
    /// may return a cleanup that runs when it returns to 0. If the
    /// container is already active the hook runs immediately.
    fn on_mount<F>(&self, hook: F) -> Subscription
    where
        F: Fn() -> Option<MountCleanup> + Send + Sync + 'static;

    /// Register a start hook: runs after mount hooks on the 0 -> 1
    /// transition.
    fn on_start<F>(&self, hook: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static;

    /// Register a stop hook: runs after mount cleanups on the 1 -> 0
    /// transition.
    fn on_stop<F>(&self, hook: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static;

    /// Register a pre-mutation hook: runs synchronously with the incoming
    /// value right before an assignment takes effect. Suppressed entirely
    /// while a transaction is open.
    ///
    /// Returns [`StoreError::ReadOnly`] on derived containers, which have
    /// no external write path.
    fn on_set<F>(&self, hook: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;

    /// Register a post-notify hook: runs synchronously with the new value
    /// right after value listeners were notified.
    fn on_notify<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;
}

impl<S: StoreCore> Store for S {
    type Value = <S as StoreCore>::Value;

    fn get(&self) -> Self::Value {
        self.current()
    }

    fn listener_count(&self) -> usize {
        self.hub().listener_count()
    }

    fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Self::Value, Option<&Self::Value>) + Send + Sync + 'static,
    {
        let id = self.hub().add_listener(Arc::new(listener));
        let this = self.clone();
        Subscription::new(move || this.hub().remove_listener(id))
    }

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Self::Value, Option<&Self::Value>) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let sub = self.listen({
            let listener = Arc::clone(&listener);
            move |value, previous| listener(value, previous)
        });
        // The mount transition has already run; read after it so a derived
        // container hands out a fresh value. Same isolation as a
        // notification pass: a panicking listener stays registered and the
        // caller is unaffected.
        let current = self.get();
        isolated("value listener", || listener(&current, None));
        sub
    }

    fn on_mount<F>(&self, hook: F) -> Subscription
    where
        F: Fn() -> Option<MountCleanup> + Send + Sync + 'static,
    {
        let id = self.hub().add_mount(Arc::new(hook));
        let this = self.clone();
        Subscription::new(move || this.hub().remove_mount(id))
    }

    fn on_start<F>(&self, hook: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.hub().add_start(Arc::new(hook));
        let this = self.clone();
        Subscription::new(move || this.hub().remove_start(id))
    }

    fn on_stop<F>(&self, hook: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.hub().add_stop(Arc::new(hook));
        let this = self.clone();
        Subscription::new(move || this.hub().remove_stop(id))
    }

    fn on_set<F>(&self, hook: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&Self::Value) + Send + Sync + 'static,
    {
        if !self.writable() {
            return Err(StoreError::ReadOnly);
        }
        let id = self.hub().add_pre_set(Arc::new(hook));
        let this = self.clone();
        Ok(Subscription::new(move || this.hub().remove_pre_set(id)))
    }

    fn on_notify<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static,
    {
        let id = self.hub().add_post_notify(Arc::new(hook));
        let this = self.clone();
        Subscription::new(move || this.hub().remove_post_notify(id))
    }
}

//! Computed: a read-only derived container.
//!
//! A computed holds a value that is a pure function of one or more source
//! containers. It tracks staleness with a dirty flag and does the least
//! work its listener count allows:
//!
//! - **Idle** (zero listeners): no source subscriptions exist, so nothing
//!   can invalidate the cache; `get` recomputes from the current source
//!   values on every read.
//!
//! - **Live** (one or more listeners): the computed subscribes to every
//!   source. A source notification marks it dirty and recomputes
//!   immediately, reading the *current* value of every source; its own
//!   listeners are notified only when the equality function reports a
//!   change.
//!
//! The idle/live transitions ride the container's own mount machinery: the
//! constructor registers a mount hook whose cleanup tears the source
//! subscriptions down again, so "live" is exactly "has listeners".
//!
//! Under a transaction, source notifications only arrive at commit. When
//! one commit reaches the same computed through several changed sources,
//! the recomputations after the first observe unchanged inputs and the
//! equality check suppresses duplicate notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::hub::Hub;
use super::next_store_id;
use super::sources::Sources;
use super::subscription::Subscription;
use super::traits::StoreCore;

/// A read-only container whose value derives from other containers.
///
/// Clones share state. A computed is itself a valid source for another
/// computed; chains follow the identical protocol.
///
/// # Example
///
/// ```rust
/// use weft_core::{Atom, Computed, Store};
///
/// let celsius = Atom::new(20.0_f64);
/// let fahrenheit = Computed::new(celsius.clone(), |c| c * 9.0 / 5.0 + 32.0);
///
/// assert_eq!(fahrenheit.get(), 68.0);
/// celsius.set(25.0);
/// assert_eq!(fahrenheit.get(), 77.0);
/// ```
pub struct Computed<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<V>>,
}

struct ComputedInner<V> {
    id: u64,
    hub: Hub<V>,
    value: RwLock<Option<V>>,
    dirty: AtomicBool,
    bundle: Box<dyn SourceBundle<V>>,
    equals: Box<dyn Fn(&V, &V) -> bool + Send + Sync>,
    /// Source subscriptions; non-empty exactly while live.
    source_subs: Mutex<Vec<Subscription>>,
}

/// Erases the source set and calculation behind one vtable so `Computed<V>`
/// carries no source-type parameters.
trait SourceBundle<V>: Send + Sync {
    fn compute(&self) -> V;
    fn watch(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription>;
}

struct CalcBundle<S, F> {
    sources: S,
    calc: F,
}

impl<V, S, F> SourceBundle<V> for CalcBundle<S, F>
where
    S: Sources,
    F: Fn(S::Values) -> V + Send + Sync,
{
    fn compute(&self) -> V {
        (self.calc)(self.sources.read())
    }

    fn watch(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription> {
        self.sources.watch(&on_change)
    }
}

impl<V> Computed<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a computed deriving its value from `sources` via `calc`,
    /// using `PartialEq` to decide whether a recomputation changed
    /// anything.
    ///
    /// `sources` is a single store or a tuple of up to six stores; `calc`
    /// receives their current values in order.
    pub fn new<S, F>(sources: S, calc: F) -> Self
    where
        S: Sources,
        F: Fn(S::Values) -> V + Send + Sync + 'static,
    {
        Self::with_equality(sources, calc, |a, b| a == b)
    }
}

impl<V> Computed<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Like [`Computed::new`] but with a caller-supplied equality
    /// function, for value types without `PartialEq` or with a cheaper
    /// notion of sameness.
    pub fn with_equality<S, F, E>(sources: S, calc: F, equals: E) -> Self
    where
        S: Sources,
        F: Fn(S::Values) -> V + Send + Sync + 'static,
        E: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        let inner = Arc::new(ComputedInner {
            id: next_store_id(),
            hub: Hub::new(),
            value: RwLock::new(None),
            dirty: AtomicBool::new(true),
            bundle: Box::new(CalcBundle { sources, calc }),
            equals: Box::new(equals),
            source_subs: Mutex::new(Vec::new()),
        });

        // Going live is the mount transition of this container's own hub;
        // the cleanup drops the source subscriptions again.
        let weak = Arc::downgrade(&inner);
        inner.hub.add_mount(Arc::new(move || {
            let strong = weak.upgrade()?;
            ComputedInner::go_live(&strong);
            let weak = Weak::clone(&weak);
            Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.go_idle();
                }
            }) as Box<dyn FnOnce() + Send>)
        }));

        Self { inner }
    }

    /// Stable identifier for this computed (shared by clones).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current value, recomputing first if the cache cannot be trusted.
    ///
    /// While live the cache is authoritative between source notifications.
    /// While idle there are no source subscriptions to invalidate it, so
    /// every read recomputes from the current source values.
    pub fn get(&self) -> V {
        let idle = self.inner.hub.listener_count() == 0;
        if idle || self.inner.dirty.load(Ordering::SeqCst) {
            self.inner.recompute(false);
        }
        self.inner
            .value
            .read()
            .clone()
            .expect("computed holds a value after recomputation")
    }

    /// Whether the cached value may be stale relative to the sources.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }
}

impl<V> ComputedInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn go_live(inner: &Arc<Self>) {
        let weak = Arc::downgrade(inner);
        let on_change: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.source_changed();
            }
        });
        let subs = inner.bundle.watch(on_change);
        *inner.source_subs.lock() = subs;
        trace!(target: "weft_core", id = inner.id, "computed went live");

        // Source changes while idle go unseen, so the cache may be stale
        // regardless of the dirty flag; recompute unconditionally.
        inner.recompute(false);
    }

    fn go_idle(&self) {
        self.source_subs.lock().clear();
        self.dirty.store(true, Ordering::SeqCst);
        trace!(target: "weft_core", id = self.id, "computed went idle");
    }

    fn source_changed(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        if self.hub.listener_count() > 0 {
            self.recompute(true);
        }
    }

    /// Recompute from the current source values and mark clean. Notifies
    /// listeners only when `notify` is set and the equality function
    /// reports a change.
    fn recompute(&self, notify: bool) {
        let new = self.bundle.compute();
        let previous = self.value.read().clone();
        let changed = match &previous {
            Some(old) => !(self.equals)(old, &new),
            None => true,
        };
        *self.value.write() = Some(new.clone());
        self.dirty.store(false, Ordering::SeqCst);

        if notify && changed {
            trace!(target: "weft_core", id = self.id, "derived value changed");
            self.hub.notify(&new, previous.as_ref());
        }
    }
}

impl<V> StoreCore for Computed<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    fn hub(&self) -> &Hub<V> {
        &self.inner.hub
    }

    fn current(&self) -> V {
        self.get()
    }

    fn writable(&self) -> bool {
        false
    }
}

impl<V> Clone for Computed<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for Computed<V>
where
    V: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.read())
            .field("listener_count", &self.inner.hub.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

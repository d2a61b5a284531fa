//! Source sets for derived containers.
//!
//! A [`Computed`](super::Computed) derives its value from an explicit,
//! ordered set of source containers. [`Sources`] abstracts over that set: a
//! single store, or a tuple of up to six stores with heterogeneous value
//! types. Reading a source set yields the current value of every source in
//! order; watching it attaches one change listener per source.

use std::sync::Arc;

use indexmap::IndexMap;

use super::atom::Atom;
use super::computed::Computed;
use super::subscription::Subscription;
use super::traits::Store;
use crate::structured::{DeepMapStore, MapStore, Value};

/// An ordered set of source containers for a derived value.
pub trait Sources: Send + Sync + 'static {
    /// The tuple of source values, in source order. For a single
    /// (non-tuple) source this is the bare value.
    type Values;

    /// Read the current value of every source, in order.
    fn read(&self) -> Self::Values;

    /// Attach `on_change` to every source. The returned subscriptions are
    /// the only thing keeping the watches alive.
    fn watch(&self, on_change: &Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription>;
}

// A blanket impl over `Store` would collide with the tuple impls below
// (coherence treats `(A,)` as a possible future `Store`), so each container
// gets its own single-source impl.
macro_rules! impl_sources_for_store {
    () => {
        fn read(&self) -> Self::Values {
            self.get()
        }

        fn watch(&self, on_change: &Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription> {
            let on_change = Arc::clone(on_change);
            vec![self.listen(move |_, _| on_change())]
        }
    };
}

impl<T> Sources for Atom<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Values = T;
    impl_sources_for_store!();
}

impl<V> Sources for Computed<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Values = V;
    impl_sources_for_store!();
}

impl<V> Sources for MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    type Values = IndexMap<String, V>;
    impl_sources_for_store!();
}

impl Sources for DeepMapStore {
    type Values = Value;
    impl_sources_for_store!();
}

macro_rules! impl_sources_for_tuple {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Store),+> Sources for ($($name,)+) {
            type Values = ($($name::Value,)+);

            fn read(&self) -> Self::Values {
                ($(self.$index.get(),)+)
            }

            fn watch(&self, on_change: &Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription> {
                vec![$(
                    {
                        let on_change = Arc::clone(on_change);
                        self.$index.listen(move |_, _| on_change())
                    },
                )+]
            }
        }
    };
}

impl_sources_for_tuple!(A: 0);
impl_sources_for_tuple!(A: 0, B: 1);
impl_sources_for_tuple!(A: 0, B: 1, C: 2);
impl_sources_for_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_sources_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_sources_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

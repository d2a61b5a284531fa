//! Shallow keyed store.
//!
//! A [`MapStore`] holds a flat string-keyed map and offers per-key
//! mutation: `set_key` rebuilds the top-level map with one entry replaced,
//! so listeners always see a fresh map value while unchanged entries are
//! moved over untouched. Underneath it is a plain [`Atom`] holding an
//! `IndexMap`, which is what gives it transaction and lifecycle behavior
//! for free.

use indexmap::IndexMap;

use crate::store::{Atom, Hub, Store, StoreCore, Subscription};

/// A mutable container holding a flat string-keyed map.
///
/// # Example
///
/// ```rust
/// use weft_core::{MapStore, Store};
/// use indexmap::IndexMap;
///
/// let profile = MapStore::new(IndexMap::from([
///     ("name".to_string(), "ada".to_string()),
/// ]));
///
/// profile.set_key("role", "engineer".to_string());
/// assert_eq!(profile.get_key("role").as_deref(), Some("engineer"));
/// ```
pub struct MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    atom: Atom<IndexMap<String, V>>,
}

impl<V> MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a map store holding `initial`.
    pub fn new(initial: IndexMap<String, V>) -> Self {
        Self {
            atom: Atom::new(initial),
        }
    }

    /// Value stored under `key`, if any.
    pub fn get_key(&self, key: &str) -> Option<V> {
        self.atom.get().get(key).cloned()
    }

    /// Replace the entry under `key`.
    ///
    /// A value equal to the stored one is a complete no-op: the map keeps
    /// its identity and nothing is notified. Otherwise the whole top-level
    /// map is rebuilt with the one entry replaced and the change goes
    /// through the ordinary atom `set` path (so batching applies).
    pub fn set_key(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut next = self.atom.get();
        if next.get(&key) == Some(&value) {
            return;
        }
        next.insert(key, value);
        self.atom.set(next);
    }

    /// Remove the entry under `key`, preserving the order of the rest.
    pub fn del_key(&self, key: &str) {
        let mut next = self.atom.get();
        if next.shift_remove(key).is_none() {
            return;
        }
        self.atom.set(next);
    }

    /// Replace the whole map.
    pub fn set(&self, map: IndexMap<String, V>) {
        self.atom.set(map);
    }

    /// Attach a listener scoped to `keys`.
    ///
    /// The listener fires at most once per notification pass, when at
    /// least one watched key's value differs between the old and new maps,
    /// receiving `(new, old, changed_watched_keys)`. With batching this
    /// means once per transaction, against the pre-transaction map.
    pub fn listen_keys<K, I, F>(&self, keys: I, listener: F) -> Subscription
    where
        K: Into<String>,
        I: IntoIterator<Item = K>,
        F: Fn(&IndexMap<String, V>, &IndexMap<String, V>, &[String]) + Send + Sync + 'static,
    {
        let watched: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.atom.listen(move |new, old| {
            let Some(old) = old else { return };
            let changed: Vec<String> = watched
                .iter()
                .filter(|key| new.get(*key) != old.get(*key))
                .cloned()
                .collect();
            if !changed.is_empty() {
                listener(new, old, &changed);
            }
        })
    }
}

impl<V> StoreCore for MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = IndexMap<String, V>;

    fn hub(&self) -> &Hub<Self::Value> {
        self.atom.hub()
    }

    fn current(&self) -> Self::Value {
        self.atom.get()
    }

    fn writable(&self) -> bool {
        true
    }
}

impl<V> Clone for MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
        }
    }
}

impl<V> Default for MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(IndexMap::new())
    }
}

impl<V> std::fmt::Debug for MapStore<V>
where
    V: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapStore")
            .field("value", &self.atom.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

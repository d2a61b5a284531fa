//! Deep keyed store: path mutation with structural sharing.
//!
//! A [`DeepMapStore`] holds an arbitrarily nested [`Value`] and mutates it
//! by path. A path update clones exactly the nodes from the root down to
//! the changed leaf; untouched siblings, and the untouched subtree below
//! the leaf, keep their `Arc`s. The root's identity therefore changes if
//! and only if something below it changed.
//!
//! Path-scoped listeners are diff-based: every notification compares the
//! old and new trees ([`diff_paths`]), which means they keep working even
//! when the whole value is replaced through plain `set`, and a transaction
//! collapses to one diff of the pre- and post-transaction trees.

use tracing::trace;

use super::path::{Path, Segment};
use super::value::Value;
use crate::store::{Atom, Hub, Store, StoreCore, Subscription};

use indexmap::IndexMap;
use std::sync::Arc;

/// A mutable container holding a nested [`Value`], mutated by path.
///
/// # Example
///
/// ```rust
/// use weft_core::{DeepMapStore, Value};
///
/// let state = DeepMapStore::new(Value::object([(
///     "user",
///     Value::object([("name", "ada")]),
/// )]));
///
/// state.set_path("user.address.city", "london");
/// assert_eq!(
///     state.get_path("user.address.city").and_then(|v| v.as_str().map(String::from)),
///     Some("london".to_string()),
/// );
/// ```
pub struct DeepMapStore {
    atom: Atom<Value>,
}

impl DeepMapStore {
    /// Create a deep store holding `initial`.
    pub fn new(initial: impl Into<Value>) -> Self {
        Self {
            atom: Atom::new(initial.into()),
        }
    }

    /// Replace the whole tree.
    ///
    /// Path listeners still fire correctly: matching is computed by
    /// diffing the old and new trees.
    pub fn set(&self, value: impl Into<Value>) {
        self.atom.set(value.into());
    }

    /// Value at `path`, if the path resolves.
    pub fn get_path(&self, path: impl Into<Path>) -> Option<Value> {
        let path = path.into();
        get_deep(&self.atom.get(), &path).cloned()
    }

    /// Set the value at `path`, rebuilding only the nodes along it.
    ///
    /// Missing or wrong-shape intermediates are created: an object for a
    /// key segment, a null-padded array for an index segment. Setting a
    /// leaf to a value equal to the existing one is a complete no-op (the
    /// root keeps its identity and nothing is notified). An empty path is
    /// a no-op.
    pub fn set_path(&self, path: impl Into<Path>, value: impl Into<Value>) {
        let path = path.into();
        if path.is_empty() {
            return;
        }
        let root = self.atom.get();
        if let Some(next) = patch(&root, path.segments(), &value.into()) {
            trace!(target: "weft_core", path = %path, "deep path updated");
            // `patch` already established the tree changed.
            self.atom.force_set(next);
        }
    }

    /// Remove the object key or array element at `path`, with the same
    /// clone-along-the-path discipline as [`set_path`](Self::set_path).
    /// Missing targets and the empty path are no-ops.
    pub fn del_path(&self, path: impl Into<Path>) {
        let path = path.into();
        if path.is_empty() {
            return;
        }
        let root = self.atom.get();
        if let Some(next) = remove(&root, path.segments()) {
            trace!(target: "weft_core", path = %path, "deep path removed");
            self.atom.force_set(next);
        }
    }

    /// Attach a listener scoped to `paths`.
    ///
    /// The listener fires at most once per notification pass, when any
    /// changed path intersects any registered path (ancestor, descendant,
    /// or equal, see [`Path::intersects`]), receiving
    /// `(new, old, matched_changed_paths)`. With batching this means once
    /// per transaction, against the pre-transaction tree.
    pub fn listen_paths<P, I, F>(&self, paths: I, listener: F) -> Subscription
    where
        P: Into<Path>,
        I: IntoIterator<Item = P>,
        F: Fn(&Value, &Value, &[Path]) + Send + Sync + 'static,
    {
        let watched: Vec<Path> = paths.into_iter().map(Into::into).collect();
        self.atom.listen(move |new, old| {
            let Some(old) = old else { return };
            let matched: Vec<Path> = diff_paths(old, new)
                .into_iter()
                .filter(|changed| watched.iter().any(|w| w.intersects(changed)))
                .collect();
            if !matched.is_empty() {
                listener(new, old, &matched);
            }
        })
    }
}

/// Resolve `path` inside `value`.
pub fn get_deep<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut node = value;
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => node.get(key)?,
            Segment::Index(index) => node.at(*index)?,
        };
    }
    Some(node)
}

/// Paths whose values differ between `old` and `new`.
///
/// Recursive identity comparison: nodes that are [`Value::ptr_eq`]
/// contribute nothing; objects and arrays recurse per key/index (keys
/// present on only one side count as changed at their path); differing
/// scalars or differing shapes contribute the path at that point.
pub fn diff_paths(old: &Value, new: &Value) -> Vec<Path> {
    let mut changed = Vec::new();
    diff_into(old, new, &Path::root(), &mut changed);
    changed
}

fn diff_into(old: &Value, new: &Value, at: &Path, out: &mut Vec<Path>) {
    if Value::ptr_eq(old, new) {
        return;
    }
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_child) in old_map.iter() {
                match new_map.get(key) {
                    Some(new_child) => {
                        diff_into(old_child, new_child, &at.join(key.as_str()), out)
                    }
                    None => out.push(at.join(key.as_str())),
                }
            }
            for key in new_map.keys() {
                if !old_map.contains_key(key) {
                    out.push(at.join(key.as_str()));
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let longest = old_items.len().max(new_items.len());
            for index in 0..longest {
                match (old_items.get(index), new_items.get(index)) {
                    (Some(old_child), Some(new_child)) => {
                        diff_into(old_child, new_child, &at.join(index), out)
                    }
                    _ => out.push(at.join(index)),
                }
            }
        }
        _ => {
            if old != new {
                out.push(at.clone());
            }
        }
    }
}

/// Rebuild `node` with `leaf` written at `segments`.
///
/// Returns `None` when nothing changes (the existing value already equals
/// `leaf`). Every node along a changed path is rebuilt; everything else is
/// moved over by `Arc` clone.
fn patch(node: &Value, segments: &[Segment], leaf: &Value) -> Option<Value> {
    let Some((segment, rest)) = segments.split_first() else {
        return if Value::ptr_eq(node, leaf) || node == leaf {
            None
        } else {
            Some(leaf.clone())
        };
    };

    match segment {
        Segment::Key(key) => match node {
            Value::Object(map) => {
                let new_child = match map.get(key) {
                    Some(child) => patch(child, rest, leaf)?,
                    None => build_fresh(rest, leaf),
                };
                let mut next = map.as_ref().clone();
                next.insert(key.clone(), new_child);
                Some(Value::Object(Arc::new(next)))
            }
            _ => {
                // Wrong shape: a fresh object replaces the node.
                let mut next = IndexMap::new();
                next.insert(key.clone(), build_fresh(rest, leaf));
                Some(Value::Object(Arc::new(next)))
            }
        },
        Segment::Index(index) => match node {
            Value::Array(items) => {
                if *index < items.len() {
                    let new_child = patch(&items[*index], rest, leaf)?;
                    let mut next = items.as_ref().clone();
                    next[*index] = new_child;
                    Some(Value::Array(Arc::new(next)))
                } else {
                    let mut next = items.as_ref().clone();
                    next.resize(*index, Value::Null);
                    next.push(build_fresh(rest, leaf));
                    Some(Value::Array(Arc::new(next)))
                }
            }
            _ => {
                let mut next = vec![Value::Null; *index];
                next.push(build_fresh(rest, leaf));
                Some(Value::Array(Arc::new(next)))
            }
        },
    }
}

/// Build the chain of containers for a path that does not exist yet.
fn build_fresh(segments: &[Segment], leaf: &Value) -> Value {
    match segments.split_first() {
        None => leaf.clone(),
        Some((Segment::Key(key), rest)) => {
            let mut map = IndexMap::new();
            map.insert(key.clone(), build_fresh(rest, leaf));
            Value::Object(Arc::new(map))
        }
        Some((Segment::Index(index), rest)) => {
            let mut items = vec![Value::Null; *index];
            items.push(build_fresh(rest, leaf));
            Value::Array(Arc::new(items))
        }
    }
}

/// Rebuild `node` with the entry at `segments` removed. Returns `None`
/// when the target does not exist.
fn remove(node: &Value, segments: &[Segment]) -> Option<Value> {
    let (segment, rest) = segments.split_first()?;

    match segment {
        Segment::Key(key) => {
            let Value::Object(map) = node else { return None };
            if rest.is_empty() {
                if !map.contains_key(key) {
                    return None;
                }
                let mut next = map.as_ref().clone();
                next.shift_remove(key);
                Some(Value::Object(Arc::new(next)))
            } else {
                let new_child = remove(map.get(key)?, rest)?;
                let mut next = map.as_ref().clone();
                next.insert(key.clone(), new_child);
                Some(Value::Object(Arc::new(next)))
            }
        }
        Segment::Index(index) => {
            let Value::Array(items) = node else { return None };
            if rest.is_empty() {
                if *index >= items.len() {
                    return None;
                }
                let mut next = items.as_ref().clone();
                next.remove(*index);
                Some(Value::Array(Arc::new(next)))
            } else {
                let new_child = remove(items.get(*index)?, rest)?;
                let mut next = items.as_ref().clone();
                next[*index] = new_child;
                Some(Value::Array(Arc::new(next)))
            }
        }
    }
}

impl StoreCore for DeepMapStore {
    type Value = Value;

    fn hub(&self) -> &Hub<Value> {
        self.atom.hub()
    }

    fn current(&self) -> Value {
        self.atom.get()
    }

    fn writable(&self) -> bool {
        true
    }
}

impl Clone for DeepMapStore {
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
        }
    }
}

impl std::fmt::Debug for DeepMapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepMapStore")
            .field("value", &self.atom.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch;
    use parking_lot::Mutex;

    fn fixture() -> Value {
        Value::object([
            (
                "user",
                Value::object([
                    ("name", Value::from("ada")),
                    ("address", Value::object([("city", Value::from("london"))])),
                ]),
            ),
            ("settings", Value::object([("theme", Value::from("dark"))])),
        ])
    }

    #[test]
    fn set_path_round_trips() {
        let store = DeepMapStore::new(fixture());

        store.set_path("user.address.zip", "N1");
        assert_eq!(
            store.get_path("user.address.zip"),
            Some(Value::from("N1"))
        );
    }

    #[test]
    fn set_path_preserves_sibling_identity() {
        let store = DeepMapStore::new(fixture());
        let before = store.get();

        store.set_path("user.address.city", "paris");
        let after = store.get();

        // Root and the nodes along the path were rebuilt.
        assert!(!Value::ptr_eq(&before, &after));
        assert!(!Value::ptr_eq(
            before.get("user").unwrap(),
            after.get("user").unwrap()
        ));

        // The untouched sibling branch kept its identity.
        assert!(Value::ptr_eq(
            before.get("settings").unwrap(),
            after.get("settings").unwrap()
        ));
    }

    #[test]
    fn equal_leaf_is_a_complete_noop() {
        let store = DeepMapStore::new(fixture());
        let calls = Arc::new(Mutex::new(0));

        let calls_clone = calls.clone();
        let _sub = store.listen(move |_, _| *calls_clone.lock() += 1);
        let before = store.get();

        store.set_path("user.address.city", "london");

        assert!(Value::ptr_eq(&before, &store.get()));
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn empty_path_is_a_noop() {
        let store = DeepMapStore::new(fixture());
        let before = store.get();

        store.set_path("", "anything");
        assert!(Value::ptr_eq(&before, &store.get()));
    }

    #[test]
    fn intermediates_are_created_with_the_right_shape() {
        let store = DeepMapStore::new(Value::object::<&str, Value, _>([]));

        store.set_path("lists.todo[2]", "third");

        let items = store.get_path("lists.todo").unwrap();
        assert_eq!(items.at(0), Some(&Value::Null));
        assert_eq!(items.at(1), Some(&Value::Null));
        assert_eq!(items.at(2), Some(&Value::from("third")));
    }

    #[test]
    fn wrong_shape_intermediate_is_replaced() {
        let store = DeepMapStore::new(Value::object([("user", Value::from(42))]));

        store.set_path("user.name", "ada");
        assert_eq!(
            store.get_path("user.name"),
            Some(Value::from("ada"))
        );
    }

    #[test]
    fn del_path_removes_and_preserves_siblings() {
        let store = DeepMapStore::new(fixture());
        let before = store.get();

        store.del_path("user.address.city");

        assert_eq!(store.get_path("user.address.city"), None);
        assert_eq!(store.get_path("user.name"), Some(Value::from("ada")));
        assert!(Value::ptr_eq(
            before.get("settings").unwrap(),
            store.get().get("settings").unwrap()
        ));

        // Removing a missing target changes nothing.
        let current = store.get();
        store.del_path("user.address.city");
        assert!(Value::ptr_eq(&current, &store.get()));
    }

    #[test]
    fn diff_reports_leaf_level_changes() {
        let old = fixture();
        let store = DeepMapStore::new(old.clone());
        store.set_path("user.address.city", "paris");
        let new = store.get();

        let changed = diff_paths(&old, &new);
        assert_eq!(changed, vec![Path::parse("user.address.city")]);
    }

    #[test]
    fn diff_reports_added_and_removed_keys() {
        let old = Value::object([("a", 1), ("b", 2)]);
        let new = Value::object([("b", 2), ("c", 3)]);

        let mut changed = diff_paths(&old, &new);
        changed.sort_by_key(|p| p.to_string());
        assert_eq!(changed, vec![Path::parse("a"), Path::parse("c")]);
    }

    #[test]
    fn diff_reports_shape_change_at_its_path() {
        let old = Value::object([("user", Value::object([("name", "ada")]))]);
        let new = Value::object([("user", Value::from(1))]);

        assert_eq!(diff_paths(&old, &new), vec![Path::parse("user")]);
    }

    #[test]
    fn listen_paths_matches_descendants_and_ancestors() {
        let store = DeepMapStore::new(fixture());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = store.listen_paths(["user.address"], move |_, _, matched| {
            seen_clone.lock().push(matched.to_vec());
        });

        // Descendant of the listened path.
        store.set_path("user.address.zip", "N1");
        assert_eq!(seen.lock().len(), 1);

        // Unrelated path never fires.
        store.set_path("settings.theme", "light");
        assert_eq!(seen.lock().len(), 1);

        // Whole-tree replace with a differing address: ancestor-level
        // change still matches through the diff.
        store.set(Value::object([(
            "user",
            Value::object([("address", Value::object([("city", "rome")]))]),
        )]));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn listen_paths_coalesces_inside_transaction() {
        let store = DeepMapStore::new(fixture());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = store.listen_paths(["user"], move |_, old, matched| {
            seen_clone.lock().push((old.clone(), matched.to_vec()));
        });

        let before = store.get();
        batch(|| {
            store.set_path("user.name", "grace");
            store.set_path("user.address.city", "oslo");
        });

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        let (old, matched) = &calls[0];
        assert!(Value::ptr_eq(old, &before));
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn transaction_that_restores_original_value_notifies_nobody() {
        let store = DeepMapStore::new(fixture());
        let calls = Arc::new(Mutex::new(0));

        let calls_clone = calls.clone();
        let _sub = store.listen(move |_, _| *calls_clone.lock() += 1);
        let before = store.get();

        batch(|| {
            store.set_path("user.name", "grace");
            store.set(before.clone());
        });

        // The flush compares against the value at first touch; a
        // transaction that lands back where it started is silent.
        assert_eq!(*calls.lock(), 0);
    }
}

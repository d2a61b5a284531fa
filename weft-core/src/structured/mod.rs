//! Structured stores: keyed and nested state with scoped subscriptions.
//!
//! Two containers build on [`Atom`](crate::Atom) for state that is a
//! collection rather than a single value:
//!
//! - [`MapStore`]: a flat string-keyed map with per-key mutation and
//!   key-scoped listeners.
//! - [`DeepMapStore`]: an arbitrarily nested [`Value`] tree mutated by
//!   [`Path`], with structural sharing and path-scoped listeners.
//!
//! Both ride the ordinary listener channel underneath, so transactions,
//! lifecycle hooks, and listener isolation all apply unchanged; the scoped
//! listeners are diffs computed at notification time.

mod deep;
mod map;
mod path;
mod value;

pub use deep::{diff_paths, get_deep, DeepMapStore};
pub use map::MapStore;
pub use path::{Path, Segment};
pub use value::Value;

//! Hash collections used throughout the crate.
//!
//! Window and group ids are small integers or slotmap keys, so the fast
//! non-cryptographic hasher is used everywhere.

pub use std::collections::hash_map;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
pub type BTreeMap<K, V> = std::collections::BTreeMap<K, V>;

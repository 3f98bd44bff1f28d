//! This module provides a deterministic hasher and `HashMap` and `HashSet` variants that use
//! it. The hashing data structures in the standard library are not deterministic:
//!
//! > By default, HashMap uses a hashing algorithm selected to provide
//! > resistance against HashDoS attacks. The algorithm is randomly seeded, and a
//! > reasonable best-effort is made to generate this seed from a high quality,
//! > secure source of randomness provided by the host without blocking the program.
//!
//! A simulation run must be reproducible from its seed, so nothing in this crate iterates a
//! randomly seeded map. Use `HashMap::default()` to create a new map; the `HashMapExt` trait
//! provides `new()` and `with_capacity()` if you need to keep the standard API.
//!
//! The `hash_str` free function derives per-stream seed offsets in `crate::random`.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Provides `new()` and `with_capacity()` for the `FxHasher`-backed `HashMap`.
pub trait HashMapExt {
    fn new() -> Self;
    fn with_capacity(capacity: usize) -> Self;
}

impl<K, V> HashMapExt for HashMap<K, V> {
    fn new() -> Self {
        HashMap::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
    }
}

/// Provides `new()` and `with_capacity()` for the `FxHasher`-backed `HashSet`.
pub trait HashSetExt {
    fn new() -> Self;
    fn with_capacity(capacity: usize) -> Self;
}

impl<T> HashSetExt for HashSet<T> {
    fn new() -> Self {
        HashSet::default()
    }

    fn with_capacity(capacity: usize) -> Self {
        HashSet::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
    }
}

/// A convenience method to compute the hash of a `&str`. The result is stable across
/// platforms and releases.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

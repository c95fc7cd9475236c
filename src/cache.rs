//! Typed caches for the similarity engine
//!
//! Three independent stores, all keyed by [`CacheKey`]:
//! - compressed size of a single buffer, partitioned by backend
//! - `(score, status)` of a buffer pair, partitioned by backend
//! - `(entropy, status)` of a single buffer, shared by every backend
//!
//! Entries are written once (first writer wins) and never evicted; only
//! [`SimilarityCaches::clear_sizes`] drops anything.

use crate::checksum::CacheKey;
use crate::codec::CompressionBackend;
use crate::oracle::Status;
use serde::Serialize;
use std::collections::HashMap;

/// Write-once map from checksum key to value.
#[derive(Clone, Debug)]
pub struct ChecksumCache<V> {
    entries: HashMap<CacheKey, V>,
}

impl<V> Default for ChecksumCache<V> {
    fn default() -> Self {
        ChecksumCache {
            entries: HashMap::new(),
        }
    }
}

impl<V: Copy> ChecksumCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries.get(key).copied()
    }

    /// Store `value` unless `key` is already present. Returns whether it
    /// was stored.
    pub fn insert_if_absent(&mut self, key: CacheKey, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One [`ChecksumCache`] per compression backend.
///
/// Switching backends never invalidates another backend's partition.
#[derive(Clone, Debug)]
pub struct BackendPartitioned<V> {
    partitions: HashMap<CompressionBackend, ChecksumCache<V>>,
}

impl<V> Default for BackendPartitioned<V> {
    fn default() -> Self {
        BackendPartitioned {
            partitions: HashMap::new(),
        }
    }
}

impl<V: Copy> BackendPartitioned<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(&self, backend: CompressionBackend) -> Option<&ChecksumCache<V>> {
        self.partitions.get(&backend)
    }

    pub fn partition_mut(&mut self, backend: CompressionBackend) -> &mut ChecksumCache<V> {
        self.partitions.entry(backend).or_default()
    }

    pub fn get(&self, backend: CompressionBackend, key: &CacheKey) -> Option<V> {
        self.partition(backend).and_then(|p| p.get(key))
    }

    pub fn insert_if_absent(&mut self, backend: CompressionBackend, key: CacheKey, value: V) -> bool {
        self.partition_mut(backend).insert_if_absent(key, value)
    }

    /// Entry count summed over every partition.
    pub fn len(&self) -> usize {
        self.partitions.values().map(ChecksumCache::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for partition in self.partitions.values_mut() {
            partition.clear();
        }
    }
}

/// A cached `(score, status)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CachedScore {
    pub score: f64,
    pub status: Status,
}

/// Entry counts, summed over every backend partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub sizes: usize,
    pub results: usize,
    pub entropy: usize,
}

/// The engine's complete cache state.
#[derive(Clone, Debug, Default)]
pub struct SimilarityCaches {
    sizes: BackendPartitioned<u64>,
    results: BackendPartitioned<CachedScore>,
    entropy: ChecksumCache<CachedScore>,
}

impl SimilarityCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self, backend: CompressionBackend, buf: &[u8]) -> Option<u64> {
        self.sizes.get(backend, &CacheKey::of(buf))
    }

    pub fn store_size(&mut self, backend: CompressionBackend, buf: &[u8], size: u64) -> bool {
        self.sizes.insert_if_absent(backend, CacheKey::of(buf), size)
    }

    /// Pair lookup trying `a ++ b` first, then `b ++ a`.
    pub fn result(&self, backend: CompressionBackend, a: &[u8], b: &[u8]) -> Option<CachedScore> {
        let partition = self.results.partition(backend)?;
        partition
            .get(&CacheKey::of_pair(a, b))
            .or_else(|| partition.get(&CacheKey::of_pair(b, a)))
    }

    /// Store under the `a ++ b` key unless the pair is already known in
    /// either order.
    pub fn store_result(
        &mut self,
        backend: CompressionBackend,
        a: &[u8],
        b: &[u8],
        value: CachedScore,
    ) -> bool {
        if self.result(backend, a, b).is_some() {
            return false;
        }
        self.results.insert_if_absent(backend, CacheKey::of_pair(a, b), value)
    }

    pub fn entropy(&self, buf: &[u8]) -> Option<CachedScore> {
        self.entropy.get(&CacheKey::of(buf))
    }

    pub fn store_entropy(&mut self, buf: &[u8], value: CachedScore) -> bool {
        self.entropy.insert_if_absent(CacheKey::of(buf), value)
    }

    /// Drop every compressed-size entry, across all backends. Pair results
    /// and entropy values are kept.
    pub fn clear_sizes(&mut self) {
        self.sizes.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            sizes: self.sizes.len(),
            results: self.results.len(),
            entropy: self.entropy.len(),
        }
    }
}

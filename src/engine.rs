//! Similarity engine
//!
//! Orchestrates oracle calls through [`SimilarityCaches`]. One engine is one
//! comparison session: caches live exactly as long as the value and are not
//! shared with any other engine. Nothing here is synchronized; callers that
//! share an engine across threads must serialize access themselves.
//!
//! # Cached two-buffer protocol (NCD / NCS / CMID)
//!
//! 1. Look up the pair result under the active backend, in both
//!    concatenation orders. A hit returns without touching the oracle.
//! 2. Otherwise fetch whatever individual compressed sizes are cached and
//!    pass them as hints.
//! 3. Call the oracle.
//! 4. Record the individual sizes and the pair result (first writer wins).
//!
//! An all-pairs workload over `n` buffers therefore compresses each buffer
//! alone once, plus one concatenation per unordered pair.

use crate::cache::{CacheStats, CachedScore, SimilarityCaches};
use crate::codec::{CompressionBackend, MAX_LEVEL};
use crate::oracle::{CodecOracle, CompressionOracle, MetricKind, Status};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Engine settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Compression effort, 0..=9
    pub level: u32,
    /// Backend active when the engine is built
    pub backend: CompressionBackend,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            level: MAX_LEVEL,
            backend: CompressionBackend::default(),
        }
    }
}

impl EngineConfig {
    /// Cheapest compression; useful for large all-pairs sweeps
    pub fn fast() -> Self {
        EngineConfig {
            level: 1,
            ..Self::default()
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    ///
    /// Every backend name parses regardless of enabled cargo features; a
    /// backend that was not compiled in fails at its first compression with
    /// [`io::ErrorKind::Unsupported`].
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(file)?;
        Ok(config)
    }
}

/// A score and the oracle status it came with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Measurement<T = f64> {
    pub value: T,
    pub status: Status,
}

impl<T> Measurement<T> {
    pub fn ok(value: T) -> Self {
        Measurement {
            value,
            status: Status::OK,
        }
    }
}

impl From<CachedScore> for Measurement {
    fn from(cached: CachedScore) -> Self {
        Measurement {
            value: cached.score,
            status: cached.status,
        }
    }
}

/// Compression-distance engine with per-backend caches.
///
/// # Examples
///
/// ```
/// use compsim::SimilarityEngine;
///
/// let mut engine = SimilarityEngine::default();
/// let a = b"the quick brown fox jumps over the lazy dog".repeat(4);
/// let b = b"the quick brown fox jumps over the lazy cat".repeat(4);
///
/// let first = engine.ncd(&a, &b);
/// let again = engine.ncd(&b, &a);
/// assert!(first.status.is_ok());
/// assert_eq!(first, again);
/// assert_eq!(engine.cache_stats().results, 1);
/// ```
pub struct SimilarityEngine<O = CodecOracle> {
    oracle: O,
    level: u32,
    backend: CompressionBackend,
    caches: SimilarityCaches,
}

impl Default for SimilarityEngine<CodecOracle> {
    fn default() -> Self {
        Self::with_config(CodecOracle::default(), EngineConfig::default())
    }
}

impl<O: CompressionOracle> SimilarityEngine<O> {
    /// Engine with the default configuration (level 9, zlib).
    pub fn new(oracle: O) -> Self {
        Self::with_config(oracle, EngineConfig::default())
    }

    pub fn with_config(mut oracle: O, config: EngineConfig) -> Self {
        oracle.set_backend(config.backend);
        SimilarityEngine {
            oracle,
            level: config.level,
            backend: config.backend,
            caches: SimilarityCaches::new(),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Effort level for every subsequent oracle call.
    ///
    /// Cached sizes and results are not keyed by level; entries computed at
    /// a previous level stay visible.
    pub fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    pub fn backend(&self) -> CompressionBackend {
        self.backend
    }

    /// Switch compressor. Caches populated under other backends are kept
    /// and become visible again when switching back.
    pub fn set_backend(&mut self, backend: CompressionBackend) {
        if backend != self.backend {
            info!(from = %self.backend, to = %backend, "switching compression backend");
        }
        self.backend = backend;
        self.oracle.set_backend(backend);
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Compressed size of `buf`. Always calls the oracle.
    pub fn compress(&mut self, buf: &[u8]) -> io::Result<u64> {
        self.oracle.compress(self.level, buf)
    }

    /// Normalized Compression Distance.
    pub fn ncd(&mut self, a: &[u8], b: &[u8]) -> Measurement {
        self.cached_metric(MetricKind::Ncd, a, b)
    }

    /// Normalized Compression Similarity.
    pub fn ncs(&mut self, a: &[u8], b: &[u8]) -> Measurement {
        self.cached_metric(MetricKind::Ncs, a, b)
    }

    /// Compression mutual information.
    pub fn cmid(&mut self, a: &[u8], b: &[u8]) -> Measurement {
        self.cached_metric(MetricKind::Cmid, a, b)
    }

    /// Dispatch on a runtime-selected metric.
    pub fn metric(&mut self, kind: MetricKind, a: &[u8], b: &[u8]) -> Measurement {
        self.cached_metric(kind, a, b)
    }

    pub fn kolmogorov(&mut self, buf: &[u8]) -> io::Result<Measurement<u64>> {
        Ok(Measurement::ok(self.oracle.kolmogorov(self.level, buf)?))
    }

    pub fn bennett(&mut self, buf: &[u8]) -> io::Result<Measurement> {
        Ok(Measurement::ok(self.oracle.bennett(self.level, buf)?))
    }

    /// Shannon entropy, cached independently of the backend.
    pub fn entropy(&mut self, buf: &[u8]) -> Measurement {
        if let Some(hit) = self.caches.entropy(buf) {
            debug!(len = buf.len(), "entropy cache hit");
            return hit.into();
        }

        let value = self.oracle.entropy(buf);
        self.caches.store_entropy(
            buf,
            CachedScore {
                score: value,
                status: Status::OK,
            },
        );
        Measurement::ok(value)
    }

    pub fn levenshtein(&mut self, a: &[u8], b: &[u8]) -> Measurement<u64> {
        Measurement::ok(self.oracle.levenshtein(a, b))
    }

    /// Forget every cached compressed size, for every backend. Pair results
    /// and entropy values survive.
    pub fn clear_caches(&mut self) {
        self.caches.clear_sizes();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats()
    }

    /// The pair result cache is shared by NCD, NCS and CMID: whichever of
    /// them computes a pair first decides what later calls on that pair
    /// return under the same backend.
    fn cached_metric(&mut self, kind: MetricKind, a: &[u8], b: &[u8]) -> Measurement {
        let backend = self.backend;

        if let Some(hit) = self.caches.result(backend, a, b) {
            debug!(%kind, %backend, "pair result cache hit");
            return hit.into();
        }

        let size_a = self.caches.size(backend, a);
        let size_b = self.caches.size(backend, b);
        debug!(
            %kind,
            %backend,
            size_a_cached = size_a.is_some(),
            size_b_cached = size_b.is_some(),
            "pair result cache miss"
        );

        let outcome = self.oracle.metric(kind, self.level, a, size_a, b, size_b);
        if !outcome.status.is_ok() {
            warn!(%kind, %backend, status = %outcome.status, "oracle reported failure");
        }

        if let Some(size) = outcome.size_a {
            self.caches.store_size(backend, a, size);
        }
        if let Some(size) = outcome.size_b {
            self.caches.store_size(backend, b, size);
        }

        let scored = CachedScore {
            score: outcome.score,
            status: outcome.status,
        };
        self.caches.store_result(backend, a, b, scored);
        scored.into()
    }
}

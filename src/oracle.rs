//! Compression oracle boundary
//!
//! The engine never compresses anything itself. It asks a
//! [`CompressionOracle`] for compressed sizes and metric scores, and caches
//! what comes back. [`CodecOracle`] is the in-process implementation built
//! on [`crate::codec`] and [`crate::metrics`]; anything else (an external
//! process, a native library with extra backends) can implement the trait.

use crate::codec::CompressionBackend;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Instant;
use tracing::{trace, warn};

/// Status code reported next to every score.
///
/// Zero means success. Any other value is oracle-specific and is passed
/// through (and cached) untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    /// The in-process oracle could not compress one of its inputs.
    pub const COMPRESSION_FAILED: Status = Status(1);

    pub fn is_ok(self) -> bool {
        self == Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-buffer metrics that share the cached protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Ncd,
    Ncs,
    Cmid,
}

impl MetricKind {
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Ncd => "ncd",
            MetricKind::Ncs => "ncs",
            MetricKind::Cmid => "cmid",
        }
    }

    /// Score from the three compressed sizes.
    pub fn score(self, size_a: u64, size_b: u64, size_ab: u64) -> f64 {
        match self {
            MetricKind::Ncd => metrics::ncd(size_a, size_b, size_ab),
            MetricKind::Ncs => metrics::ncs(size_a, size_b, size_ab),
            MetricKind::Cmid => metrics::cmid(size_a, size_b, size_ab),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMetricError {
    pub name: String,
}

impl fmt::Display for ParseMetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric '{}' (expected ncd, ncs or cmid)", self.name)
    }
}

impl std::error::Error for ParseMetricError {}

impl FromStr for MetricKind {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ncd" => Ok(MetricKind::Ncd),
            "ncs" => Ok(MetricKind::Ncs),
            "cmid" => Ok(MetricKind::Cmid),
            _ => Err(ParseMetricError { name: s.to_string() }),
        }
    }
}

/// What a metric call hands back.
///
/// `size_a` / `size_b` are the individual compressed sizes the oracle ended
/// up using: the caller's hint when one was given, otherwise whatever it
/// computed. `None` means the size is unknown (e.g. compression failed).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricOutcome {
    pub score: f64,
    pub status: Status,
    pub size_a: Option<u64>,
    pub size_b: Option<u64>,
}

/// Capability the similarity engine calls into on cache misses.
///
/// Calls are synchronous and run to completion. Implementations may keep
/// state (the active backend at least), hence `&mut self`.
pub trait CompressionOracle {
    /// Select the compressor used by every subsequent call.
    fn set_backend(&mut self, backend: CompressionBackend);

    /// Compressed size of `data`.
    fn compress(&mut self, level: u32, data: &[u8]) -> io::Result<u64>;

    /// Score `a` against `b`. Size hints, when present, must be trusted
    /// instead of recompressing the corresponding buffer.
    fn metric(
        &mut self,
        kind: MetricKind,
        level: u32,
        a: &[u8],
        size_a_hint: Option<u64>,
        b: &[u8],
        size_b_hint: Option<u64>,
    ) -> MetricOutcome;

    /// Kolmogorov complexity estimate.
    fn kolmogorov(&mut self, level: u32, data: &[u8]) -> io::Result<u64>;

    /// Bennett logical depth estimate.
    fn bennett(&mut self, level: u32, data: &[u8]) -> io::Result<f64>;

    fn entropy(&mut self, data: &[u8]) -> f64;

    fn levenshtein(&mut self, a: &[u8], b: &[u8]) -> u64;
}

/// In-process oracle driving the compiled-in codecs.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodecOracle {
    backend: CompressionBackend,
}

impl CodecOracle {
    pub fn new(backend: CompressionBackend) -> Self {
        CodecOracle { backend }
    }

    pub fn backend(&self) -> CompressionBackend {
        self.backend
    }

    fn compressed_len(&self, level: u32, data: &[u8]) -> io::Result<u64> {
        Ok(self.backend.compress(level, data)?.len() as u64)
    }

    fn sizes(
        &self,
        level: u32,
        a: &[u8],
        size_a_hint: Option<u64>,
        b: &[u8],
        size_b_hint: Option<u64>,
    ) -> io::Result<(u64, u64, u64)> {
        let size_a = match size_a_hint {
            Some(size) => size,
            None => self.compressed_len(level, a)?,
        };
        let size_b = match size_b_hint {
            Some(size) => size,
            None => self.compressed_len(level, b)?,
        };

        let mut joined = Vec::with_capacity(a.len() + b.len());
        joined.extend_from_slice(a);
        joined.extend_from_slice(b);
        let size_ab = self.compressed_len(level, &joined)?;

        Ok((size_a, size_b, size_ab))
    }
}

impl CompressionOracle for CodecOracle {
    fn set_backend(&mut self, backend: CompressionBackend) {
        self.backend = backend;
    }

    fn compress(&mut self, level: u32, data: &[u8]) -> io::Result<u64> {
        self.compressed_len(level, data)
    }

    fn metric(
        &mut self,
        kind: MetricKind,
        level: u32,
        a: &[u8],
        size_a_hint: Option<u64>,
        b: &[u8],
        size_b_hint: Option<u64>,
    ) -> MetricOutcome {
        match self.sizes(level, a, size_a_hint, b, size_b_hint) {
            Ok((size_a, size_b, size_ab)) => {
                trace!(%kind, backend = %self.backend, size_a, size_b, size_ab, "metric sizes");
                MetricOutcome {
                    score: kind.score(size_a, size_b, size_ab),
                    status: Status::OK,
                    size_a: Some(size_a),
                    size_b: Some(size_b),
                }
            }
            Err(err) => {
                warn!(%kind, backend = %self.backend, error = %err, "compression failed");
                MetricOutcome {
                    score: 0.0,
                    status: Status::COMPRESSION_FAILED,
                    size_a: size_a_hint,
                    size_b: size_b_hint,
                }
            }
        }
    }

    fn kolmogorov(&mut self, level: u32, data: &[u8]) -> io::Result<u64> {
        self.compressed_len(level, data)
    }

    fn bennett(&mut self, level: u32, data: &[u8]) -> io::Result<f64> {
        let compressed = self.backend.compress(level, data)?;
        let started = Instant::now();
        let restored = self.backend.decompress(&compressed)?;
        let depth = started.elapsed().as_secs_f64();
        if restored.len() != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{} round trip changed length: {} -> {}",
                    self.backend,
                    data.len(),
                    restored.len()
                ),
            ));
        }
        Ok(depth)
    }

    fn entropy(&mut self, data: &[u8]) -> f64 {
        metrics::entropy(data)
    }

    fn levenshtein(&mut self, a: &[u8], b: &[u8]) -> u64 {
        metrics::levenshtein(a, b)
    }
}

//! Compsim - Compression-Based Similarity
//!
//! Copyright (c) 2025 Compsim Contributors
//! Licensed under MIT License
//!
//! Estimates similarity between arbitrary byte sequences with
//! compression-distance metrics (NCD, NCS, CMID, ...) and stores sets of
//! signature elements in a fuzzy-match database.
//!
//! # Overview
//!
//! - [`SimilarityEngine`] calls a [`CompressionOracle`] only on cache misses:
//!   individual compressed sizes and pair results are cached per backend,
//!   entropy values once per buffer.
//! - [`SignatureDb`] persists `name -> sub_name -> [element]` as JSON and
//!   answers approximate "is this set already known" queries.
//!
//! # Quick Start
//!
//! ```no_run
//! use compsim::{SignatureDb, SimilarityEngine};
//!
//! let mut engine = SimilarityEngine::default();
//! let distance = engine.ncd(b"first buffer", b"second buffer");
//! println!("ncd = {:.4} (status {})", distance.value, distance.status);
//!
//! let mut db: SignatureDb = SignatureDb::open("signatures.json")?;
//! db.add_element("com.example.app", "Lcom/example/Foo;->bar()V", 4242i64.into());
//! db.save()?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod cache;
pub mod checksum;
pub mod cli;
pub mod codec;
pub mod engine;
pub mod metrics;
pub mod oracle;
pub mod signature_db;

// Re-export main types for convenience
pub use cache::{CacheStats, SimilarityCaches};
pub use checksum::CacheKey;
pub use codec::CompressionBackend;
pub use engine::{EngineConfig, Measurement, SimilarityEngine};
pub use oracle::{CodecOracle, CompressionOracle, MetricKind, MetricOutcome, Status};
pub use signature_db::{SignatureDb, SignatureElement, SubSignatureMatch};

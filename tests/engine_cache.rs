//! Cache protocol tests for the similarity engine, driven by a mock oracle
//! that counts every call it receives.

use compsim::{
    CompressionBackend, CompressionOracle, EngineConfig, MetricKind, MetricOutcome,
    SimilarityEngine, Status,
};
use std::collections::HashMap;
use std::io;

#[derive(Default)]
struct CountingOracle {
    backend: Option<CompressionBackend>,
    /// How often each buffer was compressed on its own
    solo: HashMap<Vec<u8>, usize>,
    metric_calls: usize,
    compress_calls: usize,
    entropy_calls: usize,
    kolmogorov_calls: usize,
    levenshtein_calls: usize,
    /// Buffer whose metric calls report a failure status
    failing: Option<Vec<u8>>,
}

impl CountingOracle {
    fn size_of(&mut self, data: &[u8], hint: Option<u64>) -> u64 {
        match hint {
            Some(size) => size,
            None => {
                *self.solo.entry(data.to_vec()).or_default() += 1;
                data.len() as u64 / 2 + 1
            }
        }
    }

    fn solo_count(&self, data: &[u8]) -> usize {
        self.solo.get(data).copied().unwrap_or(0)
    }
}

impl CompressionOracle for CountingOracle {
    fn set_backend(&mut self, backend: CompressionBackend) {
        self.backend = Some(backend);
    }

    fn compress(&mut self, _level: u32, data: &[u8]) -> io::Result<u64> {
        self.compress_calls += 1;
        Ok(data.len() as u64 / 2 + 1)
    }

    fn metric(
        &mut self,
        kind: MetricKind,
        _level: u32,
        a: &[u8],
        size_a_hint: Option<u64>,
        b: &[u8],
        size_b_hint: Option<u64>,
    ) -> MetricOutcome {
        self.metric_calls += 1;
        let size_a = self.size_of(a, size_a_hint);
        let size_b = self.size_of(b, size_b_hint);
        let size_ab = (a.len() + b.len()) as u64 / 2 + 1;

        let failed = self.failing.as_deref().is_some_and(|f| f == a || f == b);
        let mut score = kind.score(size_a, size_b, size_ab);
        if self.backend != Some(CompressionBackend::Zlib) {
            score += 100.0;
        }

        MetricOutcome {
            score,
            status: if failed { Status(7) } else { Status::OK },
            size_a: Some(size_a),
            size_b: Some(size_b),
        }
    }

    fn kolmogorov(&mut self, _level: u32, data: &[u8]) -> io::Result<u64> {
        self.kolmogorov_calls += 1;
        Ok(data.len() as u64)
    }

    fn bennett(&mut self, _level: u32, _data: &[u8]) -> io::Result<f64> {
        Ok(0.25)
    }

    fn entropy(&mut self, data: &[u8]) -> f64 {
        self.entropy_calls += 1;
        data.len() as f64
    }

    fn levenshtein(&mut self, a: &[u8], b: &[u8]) -> u64 {
        self.levenshtein_calls += 1;
        a.len().abs_diff(b.len()) as u64
    }
}

fn engine() -> SimilarityEngine<CountingOracle> {
    SimilarityEngine::new(CountingOracle::default())
}

#[test]
fn reversed_pair_hits_the_cache() {
    let mut engine = engine();
    let a = b"invoke-virtual; move-result; return".to_vec();
    let b = b"const/4; if-eqz; goto; return-void".to_vec();

    let forward = engine.ncd(&a, &b);
    let backward = engine.ncd(&b, &a);

    assert_eq!(forward, backward);
    assert_eq!(engine.oracle().metric_calls, 1);
    assert_eq!(engine.cache_stats().results, 1);
}

#[test]
fn repeated_calls_issue_one_oracle_call() {
    let mut engine = engine();
    let a = b"aaaa-block".to_vec();
    let b = b"bbbbbbbb-block".to_vec();

    let first = engine.ncs(&a, &b);
    let second = engine.ncs(&a, &b);

    assert_eq!(first, second);
    assert_eq!(engine.oracle().metric_calls, 1);
}

#[test]
fn pair_results_are_shared_across_metrics() {
    let mut engine = engine();
    let a = b"first".to_vec();
    let b = b"second-buffer".to_vec();

    let ncd = engine.ncd(&a, &b);
    let cmid = engine.cmid(&a, &b);

    assert_eq!(ncd, cmid);
    assert_eq!(engine.oracle().metric_calls, 1);
}

#[test]
fn individual_sizes_are_reused_across_pairs() {
    let mut engine = engine();
    let a = b"shared left operand".to_vec();
    let others: Vec<Vec<u8>> = (0..5).map(|i| format!("other buffer #{i}").into_bytes()).collect();

    for other in &others {
        engine.ncd(&a, other);
    }

    assert_eq!(engine.oracle().solo_count(&a), 1);
    for other in &others {
        assert_eq!(engine.oracle().solo_count(other), 1);
    }
    assert_eq!(engine.oracle().metric_calls, others.len());
    assert_eq!(engine.cache_stats().sizes, others.len() + 1);
}

#[test]
fn all_pairs_compress_each_buffer_alone_once() {
    let mut engine = engine();
    let buffers: Vec<Vec<u8>> = (0..6).map(|i| vec![i as u8; 10 + i]).collect();

    for i in 0..buffers.len() {
        for j in 0..buffers.len() {
            if i != j {
                engine.ncd(&buffers[i], &buffers[j]);
            }
        }
    }

    let n = buffers.len();
    assert_eq!(engine.oracle().metric_calls, n * (n - 1) / 2);
    for buf in &buffers {
        assert_eq!(engine.oracle().solo_count(buf), 1);
    }
}

#[test]
fn clear_caches_drops_sizes_only() {
    let mut engine = engine();
    let a = b"alpha block".to_vec();
    let b = b"beta block".to_vec();
    let c = b"gamma block".to_vec();

    engine.ncd(&a, &b);
    engine.entropy(&a);
    engine.clear_caches();

    let stats = engine.cache_stats();
    assert_eq!(stats.sizes, 0);
    assert_eq!(stats.results, 1);
    assert_eq!(stats.entropy, 1);

    // Pair result survives; no new oracle call.
    engine.ncd(&b, &a);
    assert_eq!(engine.oracle().metric_calls, 1);

    // Size of `a` is gone and gets recomputed.
    engine.ncd(&a, &c);
    assert_eq!(engine.oracle().solo_count(&a), 2);
}

#[test]
fn failure_status_is_cached_verbatim() {
    let mut engine = SimilarityEngine::new(CountingOracle {
        failing: Some(b"broken".to_vec()),
        ..Default::default()
    });

    let first = engine.ncd(b"broken", b"fine");
    let second = engine.ncd(b"fine", b"broken");

    assert_eq!(first.status, Status(7));
    assert_eq!(first, second);
    assert_eq!(engine.oracle().metric_calls, 1);
}

#[test]
fn entropy_is_cached_and_backend_independent() {
    let mut engine = engine();
    let data = b"entropy input".to_vec();

    let first = engine.entropy(&data);
    engine.set_backend(CompressionBackend::Zstd);
    let second = engine.entropy(&data);

    assert_eq!(first, second);
    assert!(first.status.is_ok());
    assert_eq!(engine.oracle().entropy_calls, 1);
}

#[test]
fn uncached_operations_always_reach_the_oracle() {
    let mut engine = engine();
    let data = b"not cached".to_vec();

    engine.compress(&data).unwrap();
    engine.compress(&data).unwrap();
    let k1 = engine.kolmogorov(&data).unwrap();
    let k2 = engine.kolmogorov(&data).unwrap();
    engine.levenshtein(&data, b"other");
    engine.levenshtein(&data, b"other");

    assert_eq!(k1, k2);
    assert_eq!(k1.status, Status::OK);
    assert_eq!(engine.bennett(&data).unwrap().status, Status::OK);

    let oracle = engine.oracle();
    assert_eq!(oracle.compress_calls, 2);
    assert_eq!(oracle.kolmogorov_calls, 2);
    assert_eq!(oracle.levenshtein_calls, 2);
    assert_eq!(engine.cache_stats().sizes, 0);
}

#[test]
fn construction_selects_configured_backend_on_oracle() {
    let engine = SimilarityEngine::with_config(
        CountingOracle::default(),
        EngineConfig {
            level: 3,
            backend: CompressionBackend::Zlib,
        },
    );
    assert_eq!(engine.oracle().backend, Some(CompressionBackend::Zlib));
    assert_eq!(engine.level(), 3);
}

#[test]
fn results_are_isolated_per_backend() {
    let mut engine = engine();
    let a = b"same bytes".to_vec();
    let b = b"other bytes".to_vec();

    let under_zlib = engine.ncd(&a, &b);
    engine.set_backend(CompressionBackend::Zstd);
    assert_eq!(engine.oracle().backend, Some(CompressionBackend::Zstd));
    let under_zstd = engine.ncd(&a, &b);

    assert_ne!(under_zlib, under_zstd);
    assert_eq!(engine.oracle().metric_calls, 2);
    // Sizes are partitioned too: both buffers compressed again under zstd.
    assert_eq!(engine.oracle().solo_count(&a), 2);

    // Switching back finds the zlib partition intact.
    engine.set_backend(CompressionBackend::Zlib);
    assert_eq!(engine.ncd(&b, &a), under_zlib);
    assert_eq!(engine.oracle().metric_calls, 2);
}

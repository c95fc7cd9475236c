use compsim::{metrics, CodecOracle, EngineConfig, SimilarityEngine};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn buffers(count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|seed| {
            (0..len)
                .map(|i| (seed as u8).wrapping_mul(17).wrapping_add((i % 29) as u8))
                .collect()
        })
        .collect()
}

fn all_pairs(engine: &mut SimilarityEngine, bufs: &[Vec<u8>]) -> f64 {
    let mut total = 0.0;
    for i in 0..bufs.len() {
        for j in (i + 1)..bufs.len() {
            total += engine.ncd(&bufs[i], &bufs[j]).value;
        }
    }
    total
}

fn bench_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_ncd");

    for count in [8usize, 16] {
        let bufs = buffers(count, 2048);

        // Fresh engine every iteration: one solo compression per buffer.
        group.bench_with_input(BenchmarkId::new("cold", count), &bufs, |bencher, bufs| {
            bencher.iter(|| {
                let mut engine = SimilarityEngine::with_config(CodecOracle::default(), EngineConfig::fast());
                black_box(all_pairs(&mut engine, bufs))
            })
        });

        // Warm engine: every pair is a result-cache hit.
        let mut warm = SimilarityEngine::with_config(CodecOracle::default(), EngineConfig::fast());
        all_pairs(&mut warm, &bufs);
        group.bench_with_input(BenchmarkId::new("warm", count), &bufs, |bencher, bufs| {
            bencher.iter(|| black_box(all_pairs(&mut warm, bufs)))
        });
    }

    group.finish();
}

fn bench_measures(c: &mut Criterion) {
    let mut group = c.benchmark_group("measures");
    let data = buffers(2, 4096);

    group.bench_function("entropy", |bencher| {
        bencher.iter(|| metrics::entropy(black_box(&data[0])))
    });

    group.bench_function("levenshtein_512", |bencher| {
        bencher.iter(|| metrics::levenshtein(black_box(&data[0][..512]), black_box(&data[1][..512])))
    });

    group.finish();
}

criterion_group!(benches, bench_pairwise, bench_measures);
criterion_main!(benches);

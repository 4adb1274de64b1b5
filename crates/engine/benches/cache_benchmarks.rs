//! Search Result Cache Benchmarks
//!
//! - append: batch of 50 ids, ephemeral and durable (fsync per batch)
//! - fetch_range: 20-id page from a 10K-result search
//! - fetch_all: 10K-result search

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use searchcache_core::{ResourceId, SearchId, SearchSummary};
use searchcache_engine::{ephemeral_cache, open_cache, CacheStore, SearchResultCache};
use tempfile::TempDir;

const PAGE: usize = 20;
const STORED: usize = 10_000;
const BATCH: usize = 50;

fn filled_cache() -> (SearchResultCache<CacheStore>, SearchSummary) {
    let cache = ephemeral_cache();
    let search = SearchSummary::with_totals(SearchId::new(), STORED as u64, 0);
    for start in (0..STORED).step_by(BATCH) {
        let ids: Vec<ResourceId> = (start..start + BATCH).map(|i| ResourceId(i as u64)).collect();
        cache.append(&search, start, &ids).unwrap();
    }
    (cache, search)
}

fn bench_append(c: &mut Criterion) {
    let ids: Vec<ResourceId> = (0..BATCH as u64).map(ResourceId).collect();

    let mut group = c.benchmark_group("append");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("ephemeral", |b| {
        let cache = ephemeral_cache();
        let search = SearchSummary::new(SearchId::new());
        let mut stored = 0;
        b.iter(|| {
            cache.append(&search, stored, &ids).unwrap();
            stored += BATCH;
        });
    });

    group.bench_function("durable", |b| {
        let temp_dir = TempDir::new().unwrap();
        let cache = open_cache(temp_dir.path()).unwrap();
        let search = SearchSummary::new(SearchId::new());
        b.iter(|| {
            cache.append_next(&search, &ids).unwrap();
        });
    });

    group.finish();
}

fn bench_fetch_range(c: &mut Criterion) {
    let (cache, search) = filled_cache();

    let mut group = c.benchmark_group("fetch_range");
    group.throughput(Throughput::Elements(PAGE as u64));
    for from in [0usize, STORED / 2, STORED - PAGE] {
        group.bench_with_input(BenchmarkId::from_parameter(from), &from, |b, &from| {
            b.iter(|| cache.fetch_range(&search, from, from + PAGE).unwrap());
        });
    }
    group.finish();
}

fn bench_fetch_all(c: &mut Criterion) {
    let (cache, search) = filled_cache();

    let mut group = c.benchmark_group("fetch_all");
    group.throughput(Throughput::Elements(STORED as u64));
    group.bench_function("10k", |b| {
        b.iter(|| cache.fetch_all(&search).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_append, bench_fetch_range, bench_fetch_all);
criterion_main!(benches);

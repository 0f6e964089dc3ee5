//! Throughput of `shorten` and `shorten_batch` on each storage backend.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shorturl_core::{BatchItem, Shortener};
use shorturl_generator::SeqGenerator;
use shorturl_shortener::ShortenerService;
use shorturl_storage::{open_storage, AnyStorage, StorageConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const BASE_URL: &str = "http://localhost:8080";
const BATCH_SIZE: usize = 100;

type Service = ShortenerService<AnyStorage, SeqGenerator>;

fn boot(rt: &Runtime, config: StorageConfig) -> Service {
    rt.block_on(async {
        let opened = open_storage(&config).await.unwrap();
        ShortenerService::new(
            opened.storage,
            SeqGenerator::resume_after(opened.recovered_max),
            BASE_URL,
        )
    })
}

/// Backends under test. The temp dir must outlive the journal and database.
fn backends(dir: &TempDir) -> Vec<(&'static str, StorageConfig)> {
    let sqlite = format!("sqlite://{}?mode=rwc", dir.path().join("bench.db").display());
    vec![
        ("memory", StorageConfig::builder().build()),
        (
            "journal",
            StorageConfig::builder()
                .storage_path(dir.path().join("bench.json"))
                .build(),
        ),
        ("sqlite", StorageConfig::builder().database_dsn(sqlite).build()),
    ]
}

/// Relational backends reject repeated URLs, so every call gets a fresh one.
fn next_url(counter: &AtomicU64) -> String {
    format!("https://example.com/{}", counter.fetch_add(1, Ordering::Relaxed))
}

fn bench_shorten(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let counter = AtomicU64::new(0);
    let mut group = c.benchmark_group("shorten");
    group.throughput(Throughput::Elements(1));

    for (name, config) in backends(&dir) {
        let service = boot(&rt, config);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.to_async(&rt).iter(|| async {
                service.shorten(&next_url(&counter)).await.unwrap();
            });
        });
        rt.block_on(service.shutdown()).unwrap();
    }

    group.finish();
}

fn bench_shorten_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let counter = AtomicU64::new(0);
    let mut group = c.benchmark_group("shorten_batch");
    group.throughput(Throughput::Elements(BATCH_SIZE as u64));

    for (name, config) in backends(&dir) {
        let service = boot(&rt, config);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.to_async(&rt).iter(|| async {
                let items = (0..BATCH_SIZE)
                    .map(|i| BatchItem {
                        correlation_id: i.to_string(),
                        original_url: next_url(&counter),
                    })
                    .collect();
                service.shorten_batch(items).await.unwrap();
            });
        });
        rt.block_on(service.shutdown()).unwrap();
    }

    group.finish();
}

criterion_group!(benches, bench_shorten, bench_shorten_batch);
criterion_main!(benches);

//! Benchmarks for URL deduplication.

use autokuro::dedup::{Denylist, UrlDedupStore};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn crawl_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 4 {
            0 => format!("https://www.example.com/page/{}", i / 2),
            1 => format!("https://api.example.com/v1/items?id={}", i % 500),
            2 => format!("https://cdn.example.com/img/{i}.png"),
            _ => format!("https://www.example.com/search?q={}", i % 97),
        })
        .collect()
}

fn dedup_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_insert_drain");
    for count in [10_000_usize, 100_000] {
        let lines = crawl_lines(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &lines, |b, lines| {
            b.iter(|| {
                let store = UrlDedupStore::new();
                store.insert_many(lines.iter().map(String::as_str), "bench");
                black_box(store.drain())
            });
        });
    }
    group.finish();
}

fn denylist_benchmark(c: &mut Criterion) {
    let denylist = Denylist::default();
    let lines = crawl_lines(10_000);
    c.bench_function("denylist_10k", |b| {
        b.iter(|| lines.iter().filter(|l| denylist.is_denied(black_box(l))).count());
    });
}

criterion_group!(benches, dedup_benchmark, denylist_benchmark);
criterion_main!(benches);

use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use hbi::{Filter, Host, HostStore, InMemoryHostStore};

const BLOCK_SIZE: usize = 1_000;

fn node(i: usize) -> Host {
    let name = format!("node{i}");
    Host::new()
        .display_name(name.clone())
        .fact("demo", "hostname", name.clone())
        .canonical_fact("insights_uuid", name)
        .account_number("1")
}

/// Adds `count` hosts in blocks, all under the same account.
fn add_hosts(store: &InMemoryHostStore, count: usize) {
    let mut remaining = count;
    while remaining > 0 {
        let block = remaining.min(BLOCK_SIZE);
        let hosts = (remaining - block..remaining).map(node).collect();
        store.create_or_update(hosts).unwrap();
        remaining -= block;
    }
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory/upsert");
    for count in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("create", count), &count, |b, &count| {
            b.iter_custom(|iters| {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    // Fresh store per iteration so creates never turn into merges.
                    let store = InMemoryHostStore::new();
                    let start = Instant::now();
                    add_hosts(&store, count);
                    total += start.elapsed();
                }
                total
            });
        });

        group.bench_with_input(BenchmarkId::new("merge", count), &count, |b, &count| {
            let store = InMemoryHostStore::new();
            add_hosts(&store, count);
            b.iter(|| add_hosts(&store, black_box(count)));
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let store = InMemoryHostStore::new();
    add_hosts(&store, 10_000);

    let mut group = c.benchmark_group("inventory/get");
    group.bench_function("all", |b| b.iter(|| store.get(&[]).unwrap()));
    group.bench_function("account", |b| {
        let filters = [Filter::new().account_number("1")];
        b.iter(|| store.get(black_box(&filters)).unwrap());
    });
    group.bench_function("account_and_fact", |b| {
        let filters = [
            Filter::new().account_number("1"),
            Filter::new().fact("demo", "hostname", "node42"),
        ];
        b.iter(|| store.get(black_box(&filters)).unwrap());
    });
    group.bench_function("empty_account_short_circuit", |b| {
        let filters = [
            Filter::new().account_number("missing"),
            Filter::new().fact("demo", "hostname", "node42"),
        ];
        b.iter(|| store.get(black_box(&filters)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_upsert, bench_query);
criterion_main!(benches);

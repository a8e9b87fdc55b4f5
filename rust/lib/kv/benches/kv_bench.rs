use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use feed_kv::{KVStore, MemoryStore, RedbStore, ZEntry};

fn bench_redb_incr(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    c.bench_function("redb_incr", |b| {
        b.iter(|| {
            store.incr(black_box("tweet:counter")).unwrap();
        });
    });
}

fn bench_redb_zadd(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    c.bench_function("redb_zadd", |b| {
        let mut i = 0i64;
        b.iter(|| {
            let member = format!("{:020}", i);
            store.zadd(black_box("timeline:1"), &member, i).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_zadd_batch_1000(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    c.bench_function("redb_zadd_batch_1000", |b| {
        let mut i = 0i64;
        b.iter(|| {
            let member = format!("{:020}", i);
            let entries: Vec<ZEntry> = (0..1000)
                .map(|u| ZEntry::new(format!("timeline:{u}"), member.clone(), i))
                .collect();
            store.zadd_batch(black_box(&entries)).unwrap();
            i += 1;
        });
    });
}

fn bench_redb_zrevrange_10(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    let entries: Vec<ZEntry> = (0..10_000)
        .map(|i| ZEntry::new("timeline:1", format!("{:020}", i), i))
        .collect();
    store.zadd_batch(&entries).unwrap();

    c.bench_function("redb_zrevrange_10", |b| {
        b.iter(|| {
            let top = store.zrevrange(black_box("timeline:1"), Some(10)).unwrap();
            assert_eq!(top.len(), 10);
        });
    });
}

fn bench_memory_zrevrange_10(c: &mut Criterion) {
    let store = MemoryStore::new();

    let entries: Vec<ZEntry> = (0..10_000)
        .map(|i| ZEntry::new("timeline:1", format!("{:020}", i), i))
        .collect();
    store.zadd_batch(&entries).unwrap();

    c.bench_function("memory_zrevrange_10", |b| {
        b.iter(|| {
            let top = store.zrevrange(black_box("timeline:1"), Some(10)).unwrap();
            assert_eq!(top.len(), 10);
        });
    });
}

fn bench_redb_smembers_1000(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = RedbStore::open(&tmp.path().join("bench.redb")).unwrap();

    for i in 0..1000 {
        store.sadd("followers:1", &i.to_string()).unwrap();
    }

    c.bench_function("redb_smembers_1000", |b| {
        b.iter(|| {
            let members = store.smembers(black_box("followers:1")).unwrap();
            assert_eq!(members.len(), 1000);
        });
    });
}

criterion_group!(
    benches,
    bench_redb_incr,
    bench_redb_zadd,
    bench_redb_zadd_batch_1000,
    bench_redb_zrevrange_10,
    bench_memory_zrevrange_10,
    bench_redb_smembers_1000,
);
criterion_main!(benches);

//! Criterion micro-benchmarks for owning and soft handle operations.

use criterion::{criterion_group, criterion_main, Criterion};
use safemem_bench::{checked_heap, populate, throughput_heap};
use safemem_core::{Safe, Unchecked};
use safemem_heap::{OwningPtr, SoftPtr};

/// Benchmark: allocate and destroy one owner, checked vs. throughput heap.
fn bench_owner_lifecycle(c: &mut Criterion) {
    let checked = checked_heap();
    c.bench_function("owner_lifecycle_checked", |b| {
        b.iter(|| {
            let owner: OwningPtr<u64> = OwningPtr::new_in(&checked, 7);
            std::hint::black_box(&owner);
        });
        checked.kill_all_zombies();
    });

    let fast = throughput_heap();
    c.bench_function("owner_lifecycle_unchecked", |b| {
        b.iter(|| {
            let owner: OwningPtr<u64, Unchecked> = OwningPtr::new_in(&fast, 7);
            std::hint::black_box(&owner);
        });
    });
}

/// Benchmark: register and deregister a soft handle on a live owner.
fn bench_soft_attach_detach(c: &mut Criterion) {
    let heap = checked_heap();
    let owner: OwningPtr<u64> = OwningPtr::new_in(&heap, 1);
    c.bench_function("soft_attach_detach", |b| {
        b.iter(|| {
            let soft: SoftPtr<u64> = owner.soft();
            std::hint::black_box(&soft);
        });
    });
}

/// Benchmark: checked dereference through a soft handle.
fn bench_soft_deref(c: &mut Criterion) {
    let heap = checked_heap();
    let owner: OwningPtr<u64> = OwningPtr::new_in(&heap, 42);
    let soft = owner.soft();
    c.bench_function("soft_deref", |b| {
        b.iter(|| std::hint::black_box(*soft.get()));
    });
}

/// Benchmark: destroy 1K owners each watched by 16 soft handles, so every
/// teardown walks an overflowed control block.
fn bench_mass_invalidation(c: &mut Criterion) {
    let heap = checked_heap();
    c.bench_function("mass_invalidation_1k_x16", |b| {
        b.iter(|| {
            let (owners, softs) = populate::<Safe>(&heap, 1_000, 16);
            drop(owners);
            std::hint::black_box(softs.iter().filter(|s| s.is_valid()).count());
            heap.kill_all_zombies();
        });
    });
}

criterion_group!(
    benches,
    bench_owner_lifecycle,
    bench_soft_attach_detach,
    bench_soft_deref,
    bench_mass_invalidation
);
criterion_main!(benches);

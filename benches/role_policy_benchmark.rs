use criterion::{criterion_group, criterion_main, Criterion};
use event_hub::models::{LoginIdentity, Role};
use event_hub::services::RolePolicy;
use std::hint::black_box;

fn benchmark_role_resolution(c: &mut Criterion) {
    // Large allowlist to make membership cost visible
    let policy = RolePolicy::new(0..100_000u64);

    let allowlisted = LoginIdentity::new(99_999, "Admin");
    let stranger = LoginIdentity::new(1_000_000, "Guest");
    let asserted = LoginIdentity::new(5, "Bot").asserting(Role::User);

    let mut group = c.benchmark_group("role_resolution");

    group.bench_function("allowlist_hit", |b| {
        b.iter(|| policy.resolve(black_box(Some(&allowlisted)), black_box(None)))
    });

    group.bench_function("allowlist_miss", |b| {
        b.iter(|| policy.resolve(black_box(Some(&stranger)), black_box(None)))
    });

    group.bench_function("stored_role", |b| {
        b.iter(|| policy.resolve(black_box(Some(&stranger)), black_box(Some(Role::Admin))))
    });

    group.bench_function("asserted_role", |b| {
        b.iter(|| policy.resolve(black_box(Some(&asserted)), black_box(Some(Role::Admin))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_role_resolution);
criterion_main!(benches);

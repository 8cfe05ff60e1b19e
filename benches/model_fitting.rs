//! Model fitting and selection benchmark
//!
//! Fitting runs once per uid per profile on every check, so its cost bounds
//! how fast a version history can be scanned.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench model_fitting
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use perfdelta::check::{CheckConfig, Checker};
use perfdelta::fitting::{fit, fit_all, select_best, ModelFamily};
use perfdelta::profile::{Configuration, Observation, Profile};
use perfdelta::store::{MemoryHistory, MemoryStore, VersionId};

/// Slightly noisy quadratic growth
fn observations(n: usize) -> Vec<Observation> {
    (1..=n)
        .map(|i| {
            let x = i as f64;
            let noise = if i % 2 == 0 { 0.5 } else { -0.5 };
            Observation::new(x, 3.0 * x * x + 10.0 + noise)
        })
        .collect()
}

/// Benchmark: single family fit for growing observation counts
fn bench_fit_single_family(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_quadratic");

    for size in [16, 256, 4096] {
        let data = observations(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| fit(black_box(data), ModelFamily::Quadratic));
        });
    }

    group.finish();
}

/// Benchmark: full catalogue fit plus selection (one uid of one profile)
fn bench_fit_all_and_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_all_select");

    for size in [16, 256, 4096] {
        let data = observations(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| select_best(&fit_all(black_box(data))));
        });
    }

    group.finish();
}

/// Benchmark: batch check of a linear history with one profile per version
fn bench_check_versions(c: &mut Criterion) {
    let config = Configuration::new("time", "./bench", "", "", vec![]);
    let mut history = MemoryHistory::new();
    let mut store = MemoryStore::new();
    let mut versions = Vec::new();

    for i in 0..64 {
        let id = format!("v{}", i);
        if i == 0 {
            history.add_version(id.as_str(), Vec::<&str>::new());
        } else {
            let parent = format!("v{}", i - 1);
            history.add_version(id.as_str(), [parent.as_str()]);
        }
        let profile = Profile::new(config.clone(), "time")
            .with_resource("main", observations(64 + i))
            .with_resource("helper", observations(32));
        store.insert(id.as_str(), profile).unwrap();
        versions.push(VersionId::new(id));
    }

    let checker = Checker::new(CheckConfig::default_strategies().unwrap());

    c.bench_function("check_versions_64", |b| {
        b.iter(|| checker.check_versions(black_box(&versions), &history, &store, 4));
    });
}

criterion_group!(
    benches,
    bench_fit_single_family,
    bench_fit_all_and_select,
    bench_check_versions
);
criterion_main!(benches);

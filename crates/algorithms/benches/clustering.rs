//! Benchmarks for the clustering estimators

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array2, Array3, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spdkit_algorithms::clustering::{Kmeans, KmeansParams, Potato, PotatoParams};
use spdkit_core::Estimator;

fn create_trials(n_trials: usize, n: usize) -> Array3<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut out = Array3::zeros((n_trials, n, n));
    for mut m in out.axis_iter_mut(Axis(0)) {
        let a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0));
        m.assign(&(a.dot(&a.t()) + Array2::<f64>::eye(n)));
    }
    out
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");
    group.sample_size(10);

    for n in [4, 8, 16].iter() {
        let trials = create_trials(60, *n);

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                let mut km = Kmeans::new(KmeansParams {
                    n_clusters: 3,
                    n_init: 2,
                    seed: Some(0),
                    ..Default::default()
                });
                km.fit(black_box(trials.view()), None).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_potato(c: &mut Criterion) {
    let mut group = c.benchmark_group("potato");
    group.sample_size(10);

    for n in [4, 8, 16].iter() {
        let trials = create_trials(100, *n);

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                let mut potato = Potato::new(PotatoParams::default());
                potato.fit(black_box(trials.view()), None).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kmeans, bench_potato);
criterion_main!(benches);

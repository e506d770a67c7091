//! End-to-end properties of the estimators on synthetic SPD trial sets.
//!
//! Every trial set is generated from a seeded `ChaCha8Rng`, so failures are
//! reproducible.

use ndarray::{s, Array2, Array3, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spdkit_algorithms::prelude::*;

/// `n_trials` random SPD matrices `A Aᵀ / n + scale · I`.
fn random_spd(n_trials: usize, n: usize, scale: f64, rng: &mut ChaCha8Rng) -> Array3<f64> {
    let mut out = Array3::zeros((n_trials, n, n));
    for mut m in out.axis_iter_mut(Axis(0)) {
        let a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0));
        let spd = a.dot(&a.t()) / n as f64 + Array2::<f64>::eye(n) * scale;
        m.assign(&spd);
    }
    out
}

/// Near-identity matrices: identity plus a small random symmetric perturbation.
fn near_identity(n_trials: usize, n: usize, rng: &mut ChaCha8Rng) -> Array3<f64> {
    let mut out = Array3::zeros((n_trials, n, n));
    for mut m in out.axis_iter_mut(Axis(0)) {
        let a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-0.05..0.05));
        m.assign(&(Array2::<f64>::eye(n) + (&a + &a.t()) / 2.0));
    }
    out
}

/// Two classes whose covariance differs only on `channels`.
fn two_classes(
    n: usize,
    channels: &[usize],
    rng: &mut ChaCha8Rng,
) -> (Array3<f64>, Vec<ClassLabel>) {
    let mut trials = random_spd(20, n, 1.0, rng);
    let mut labels = Vec::new();
    for i in 0..20 {
        if i >= 10 {
            for &c in channels {
                trials[[i, c, c]] *= 8.0;
            }
        }
        labels.push(if i < 10 { 0 } else { 1 });
    }
    (trials, labels)
}

// ---------------------------------------------------------------------------
// Electrode selection
// ---------------------------------------------------------------------------

#[test]
fn selection_near_identity_end_to_end() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let trials = near_identity(10, 4, &mut rng);
    let labels: Vec<ClassLabel> = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];

    let mut sel = ElectrodeSelection::new(ElectrodeSelectionParams {
        n_electrodes: 2,
        ..Default::default()
    });
    let reduced = sel.fit_transform(trials.view(), Some(&labels[..])).unwrap();

    let subset = sel.subset().unwrap().to_vec();
    assert_eq!(subset.len(), 2);
    assert_ne!(subset[0], subset[1]);
    assert!(subset.iter().all(|&c| c < 4));
    assert_eq!(sel.distance_log().len(), 2);
    assert_eq!(reduced.dim(), (10, 2, 2));

    for t in 0..10 {
        for (a, &ra) in subset.iter().enumerate() {
            for (b, &rb) in subset.iter().enumerate() {
                assert_eq!(reduced[[t, a, b]], trials[[t, ra, rb]]);
            }
        }
    }
}

#[test]
fn selection_finds_discriminative_channels() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let (trials, labels) = two_classes(6, &[2, 4], &mut rng);

    let mut sel = ElectrodeSelection::new(ElectrodeSelectionParams {
        n_electrodes: 2,
        ..Default::default()
    });
    sel.fit(trials.view(), Some(&labels[..])).unwrap();

    let mut subset = sel.subset().unwrap().to_vec();
    subset.sort_unstable();
    assert_eq!(subset, vec![2, 4]);
    assert_eq!(sel.distance_log().len(), 4);
}

#[test]
fn selection_target_equals_n_is_identity() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let (trials, labels) = two_classes(3, &[0], &mut rng);

    let mut sel = ElectrodeSelection::new(ElectrodeSelectionParams {
        n_electrodes: 3,
        ..Default::default()
    });
    sel.fit(trials.view(), Some(&labels[..])).unwrap();

    assert_eq!(sel.subset().unwrap(), &[0, 1, 2]);
    assert!(sel.distance_log().is_empty());
}

// ---------------------------------------------------------------------------
// K-means
// ---------------------------------------------------------------------------

#[test]
fn kmeans_chosen_run_has_lowest_inertia() {
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let trials = random_spd(15, 3, 0.5, &mut rng);

    let mut km = Kmeans::new(KmeansParams {
        n_clusters: 3,
        n_init: 5,
        seed: Some(5),
        ..Default::default()
    });
    let labels = km.fit_predict(trials.view()).unwrap();

    assert_eq!(labels.len(), 15);
    assert!(labels.iter().all(|&l| (0..3).contains(&l)));
    assert_eq!(km.restart_inertias().len(), 5);
    let inertia = km.inertia().unwrap();
    assert!(km.restart_inertias().iter().all(|&r| inertia <= r));
}

#[test]
fn kmeans_same_seed_same_result() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let trials = random_spd(12, 3, 0.5, &mut rng);
    let params = KmeansParams {
        n_clusters: 2,
        n_init: 4,
        seed: Some(99),
        ..Default::default()
    };

    let mut a = Kmeans::new(params.clone());
    let mut b = Kmeans::new(params);
    a.fit(trials.view(), None).unwrap();
    b.fit(trials.view(), None).unwrap();

    assert_eq!(a.labels().unwrap(), b.labels().unwrap());
    assert_eq!(a.inertia().unwrap(), b.inertia().unwrap());
}

#[test]
fn kmeans_parallel_matches_sequential() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let trials = random_spd(12, 3, 0.5, &mut rng);
    let params = KmeansParams {
        n_clusters: 2,
        n_init: 4,
        seed: Some(1),
        ..Default::default()
    };

    let mut seq = Kmeans::new(params.clone());
    let mut par = Kmeans::new(KmeansParams {
        mode: ProcessingMode::ParallelWith(2),
        ..params
    });
    seq.fit(trials.view(), None).unwrap();
    par.fit(trials.view(), None).unwrap();

    assert_eq!(seq.labels().unwrap(), par.labels().unwrap());
    assert_eq!(seq.restart_inertias(), par.restart_inertias());
}

#[test]
fn kmeans_plus_plus_separates_groups() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let low = random_spd(6, 2, 0.5, &mut rng);
    let high = random_spd(6, 2, 0.5, &mut rng) * 50.0;
    let trials = ndarray::concatenate(Axis(0), &[low.view(), high.view()]).unwrap();

    let mut km = Kmeans::new(KmeansParams {
        init: KmeansInit::KMeansPlusPlus,
        seed: Some(0),
        ..Default::default()
    });
    let labels = km.fit_predict(trials.view()).unwrap();

    assert!(labels[..6].iter().all(|&l| l == labels[0]));
    assert!(labels[6..].iter().all(|&l| l == labels[6]));
    assert_ne!(labels[0], labels[6]);
}

#[test]
fn per_class_features_feed_mdm_shapes() {
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let (trials, labels) = two_classes(4, &[1], &mut rng);

    let mut t = KmeansPerClassTransform::new(KmeansParams {
        n_clusters: 3,
        n_init: 2,
        seed: Some(6),
        ..Default::default()
    });
    let features = t.fit_transform(trials.view(), Some(&labels[..])).unwrap();
    assert_eq!(features.dim(), (20, 6));

    let test = trials.slice(s![..5, .., ..]);
    assert_eq!(t.transform(test).unwrap().dim(), (5, 6));
}

// ---------------------------------------------------------------------------
// Potato
// ---------------------------------------------------------------------------

#[test]
fn potato_masks_have_trial_length_and_never_recover() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut trials = random_spd(30, 3, 1.0, &mut rng);
    for i in [4, 19] {
        let mut m = trials.index_axis_mut(Axis(0), i);
        m *= 1e4;
    }

    let mut potato = Potato::new(PotatoParams {
        threshold: 2.0,
        ..Default::default()
    });
    potato.fit(trials.view(), None).unwrap();

    let history = potato.mask_history().unwrap();
    assert!(history.len() >= 2);
    for w in history.windows(2) {
        assert_eq!(w[1].len(), 30);
        assert!(w[0].iter().zip(&w[1]).all(|(&before, &after)| before || !after));
    }

    let clean = potato.predict(trials.view()).unwrap();
    assert!(!clean[4]);
    assert!(!clean[19]);
}

#[test]
fn potato_split_metric() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let trials = random_spd(10, 2, 1.0, &mut rng);

    let mut potato = Potato::new(PotatoParams {
        metric: MetricSpec::split(Metric::LogEuclid, Metric::Riemann),
        threshold: 1e6,
        ..Default::default()
    });
    potato.fit(trials.view(), None).unwrap();

    assert!(potato.mask().unwrap().iter().all(|&a| a));
    assert_eq!(potato.centroid().unwrap().dim(), (2, 2));
    assert!(potato.std().unwrap() >= 0.0);
}

//! Centroid seeding for k-means

use ndarray::{Array3, ArrayView3, Axis};
use rand::seq::index::sample;
use rand::Rng;

/// `k` distinct trials chosen uniformly at random.
pub(crate) fn random_centroids<R: Rng + ?Sized>(
    trials: ArrayView3<'_, f64>,
    k: usize,
    rng: &mut R,
) -> Array3<f64> {
    let n_trials = trials.len_of(Axis(0));
    let picked = sample(rng, n_trials, k).into_vec();
    trials.select(Axis(0), &picked)
}

/// k-means++ seeding on the flattened matrices.
///
/// Distances are squared Frobenius distances computed from precomputed
/// squared norms, a Euclidean stand-in for the Riemannian geometry used by
/// the rest of the algorithm. Each new centre is the best of
/// `2 + ⌊ln k⌋` candidates drawn proportionally to the current potential.
pub(crate) fn kmeans_plus_plus<R: Rng + ?Sized>(
    trials: ArrayView3<'_, f64>,
    k: usize,
    rng: &mut R,
) -> Array3<f64> {
    let n_trials = trials.len_of(Axis(0));
    let flat: Vec<Vec<f64>> = trials
        .axis_iter(Axis(0))
        .map(|m| m.iter().copied().collect())
        .collect();
    let squared_norms: Vec<f64> = flat.iter().map(|x| x.iter().map(|v| v * v).sum()).collect();

    let sq_dist = |a: usize, b: usize| -> f64 {
        let dot: f64 = flat[a].iter().zip(&flat[b]).map(|(x, y)| x * y).sum();
        (squared_norms[a] + squared_norms[b] - 2.0 * dot).max(0.0)
    };

    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    let first = rng.gen_range(0..n_trials);
    let mut centers = vec![first];
    let mut closest: Vec<f64> = (0..n_trials).map(|i| sq_dist(first, i)).collect();
    let mut potential: f64 = closest.iter().sum();

    for _ in 1..k {
        let cumulative: Vec<f64> = closest
            .iter()
            .scan(0.0, |acc, &d| {
                *acc += d;
                Some(*acc)
            })
            .collect();

        let mut best_candidate = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_closest = Vec::new();

        for _ in 0..n_local_trials {
            let target = rng.gen::<f64>() * potential;
            let candidate = cumulative
                .partition_point(|&c| c < target)
                .min(n_trials - 1);

            let updated: Vec<f64> = closest
                .iter()
                .enumerate()
                .map(|(i, &d)| d.min(sq_dist(candidate, i)))
                .collect();
            let pot: f64 = updated.iter().sum();

            if pot < best_potential {
                best_potential = pot;
                best_candidate = candidate;
                best_closest = updated;
            }
        }

        centers.push(best_candidate);
        closest = best_closest;
        potential = best_potential;
    }

    trials.select(Axis(0), &centers)
}

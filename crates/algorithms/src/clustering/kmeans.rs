//! K-means clustering with a Riemannian metric
//!
//! Lloyd iterations on the SPD manifold: assign every trial to its nearest
//! centroid, re-estimate each centroid as the geometric mean of its members,
//! repeat. Random seeding is restarted `n_init` times and the run with the
//! lowest inertia is kept.

use ndarray::{Array2, Array3, ArrayView3, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::init::{kmeans_plus_plus, random_centroids};
use crate::classification::{argmin_rows, Mdm};
use spdkit_core::{ClassLabel, Error, Estimator, MetricSpec, Predictor, Result, Transformer};
use spdkit_parallel::{ParallelStrategy, ProcessingMode};

/// Initialization method for k-means
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmeansInit {
    /// `k` distinct trials picked at random (default)
    #[default]
    Random,
    /// k-means++ seeding on the flattened matrices
    #[serde(rename = "kmeans++")]
    KMeansPlusPlus,
    /// User-provided initial centroids, shape `(n_clusters, n, n)`
    Centroids(Array3<f64>),
}

/// Parameters for k-means clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmeansParams {
    /// Number of clusters (default: 2)
    pub n_clusters: usize,
    /// Maximum iterations per run (default: 100)
    pub max_iter: usize,
    /// Metric for centroids and distances (default: riemann)
    pub metric: MetricSpec,
    /// Seed for initialization and restart seeds; `None` draws from entropy
    pub seed: Option<u64>,
    /// Initialization method (default: random)
    pub init: KmeansInit,
    /// Number of restarts with random seeding (default: 10)
    pub n_init: usize,
    /// Stop once more than `1 - tol` of the labels are unchanged (default: 1e-4)
    pub tol: f64,
    /// How restarts are scheduled
    pub mode: ProcessingMode,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            max_iter: 100,
            metric: MetricSpec::default(),
            seed: None,
            init: KmeansInit::Random,
            n_init: 10,
            tol: 1e-4,
            mode: ProcessingMode::Sequential,
        }
    }
}

/// Outcome of one k-means run
#[derive(Debug, Clone)]
pub struct KmeansRun {
    /// Cluster of each trial, in `0..n_clusters`
    pub labels: Vec<ClassLabel>,
    /// Sum of distances of the trials to their centroid
    pub inertia: f64,
    /// Lloyd iterations performed
    pub n_iter: usize,
    /// Centroids with cluster labels `0..n_clusters`
    pub mdm: Mdm,
}

/// Riemannian k-means
#[derive(Debug, Clone, Default)]
pub struct Kmeans {
    params: KmeansParams,
    fitted: Option<KmeansRun>,
    restart_inertias: Vec<f64>,
}

impl Kmeans {
    /// Create an unfitted estimator
    pub fn new(params: KmeansParams) -> Self {
        Self {
            params,
            fitted: None,
            restart_inertias: Vec::new(),
        }
    }

    /// Parameters of this estimator
    pub fn params(&self) -> &KmeansParams {
        &self.params
    }

    fn run(&self) -> Result<&KmeansRun> {
        self.fitted.as_ref().ok_or(Error::NotFitted("Kmeans"))
    }

    /// Cluster labels of the training trials
    pub fn labels(&self) -> Result<&[ClassLabel]> {
        Ok(&self.run()?.labels)
    }

    /// Inertia of the kept run
    pub fn inertia(&self) -> Result<f64> {
        Ok(self.run()?.inertia)
    }

    /// Iterations of the kept run
    pub fn n_iter(&self) -> Result<usize> {
        Ok(self.run()?.n_iter)
    }

    /// Cluster centroids, indexed by cluster label
    pub fn centroids(&self) -> Result<&[Array2<f64>]> {
        Ok(self.run()?.mdm.centroids())
    }

    /// Inertia of every restart of the last fit, in restart order
    pub fn restart_inertias(&self) -> &[f64] {
        &self.restart_inertias
    }

    /// Fit and return the training labels
    pub fn fit_predict(&mut self, trials: ArrayView3<'_, f64>) -> Result<Vec<ClassLabel>> {
        self.fit(trials, None)?;
        Ok(self.labels()?.to_vec())
    }

    fn validate(&self, trials: &ArrayView3<'_, f64>) -> Result<()> {
        let p = &self.params;
        let (n_trials, rows, cols) = trials.dim();

        if rows != cols {
            return Err(Error::shape_mismatch(
                "trials",
                &[n_trials, rows, rows],
                &[n_trials, rows, cols],
            ));
        }
        if p.n_clusters == 0 {
            return Err(Error::invalid("n_clusters", p.n_clusters, "must be at least 1"));
        }
        if p.n_clusters > n_trials {
            return Err(Error::invalid(
                "n_clusters",
                p.n_clusters,
                format!("cannot exceed the number of trials ({})", n_trials),
            ));
        }
        if p.n_init == 0 {
            return Err(Error::invalid("n_init", p.n_init, "must be at least 1"));
        }
        if !p.tol.is_finite() || p.tol < 0.0 {
            return Err(Error::invalid("tol", p.tol, "must be finite and non-negative"));
        }
        if let KmeansInit::Centroids(c) = &p.init {
            let expected = [p.n_clusters, rows, rows];
            if c.shape() != expected {
                return Err(Error::shape_mismatch("init", &expected, c.shape()));
            }
        }
        Ok(())
    }
}

/// Restart seeds derived from a top-level seed
fn restart_seeds(seed: Option<u64>, n_init: usize) -> Vec<u64> {
    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    (0..n_init).map(|_| rng.gen::<u32>() as u64).collect()
}

/// One k-means run from a given seed.
///
/// The loop stops after `max_iter + 1` iterations or as soon as the share of
/// labels unchanged since the previous iteration exceeds `1 - tol`. This is
/// label stability, not a fixed point of the centroids. An empty cluster
/// keeps its previous centroid.
pub fn fit_single(
    trials: ArrayView3<'_, f64>,
    params: &KmeansParams,
    seed: u64,
) -> Result<KmeansRun> {
    let n_trials = trials.len_of(Axis(0));
    let k = params.n_clusters;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let init = match &params.init {
        KmeansInit::Random => random_centroids(trials, k, &mut rng),
        KmeansInit::KMeansPlusPlus => kmeans_plus_plus(trials, k, &mut rng),
        KmeansInit::Centroids(c) => c.clone(),
    };

    let classes: Vec<ClassLabel> = (0..k as ClassLabel).collect();
    let mut centroids: Vec<Array2<f64>> = init.axis_iter(Axis(0)).map(|c| c.to_owned()).collect();
    let mut mdm = Mdm::from_centroids(params.metric, centroids.clone(), classes.clone())?;
    let pair = *mdm.metric_pair();

    let mut labels = mdm.predict(trials)?;
    let mut n_iter = 0;

    let distances = loop {
        let old_labels = labels.clone();

        centroids = (0..k)
            .map(|j| {
                let members: Vec<usize> = (0..n_trials)
                    .filter(|&i| old_labels[i] == j as ClassLabel)
                    .collect();
                if members.is_empty() {
                    Ok(centroids[j].clone())
                } else {
                    pair.mean(trials.select(Axis(0), &members).view(), None)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        mdm = Mdm::from_centroids(params.metric, centroids.clone(), classes.clone())?;

        let distances = mdm.distances(trials)?;
        labels = argmin_rows(&distances)
            .into_iter()
            .map(|j| j as ClassLabel)
            .collect();
        n_iter += 1;

        let unchanged = labels
            .iter()
            .zip(&old_labels)
            .filter(|(a, b)| a == b)
            .count() as f64
            / n_trials as f64;
        debug!(iteration = n_iter, unchanged, "k-means iteration");

        if n_iter > params.max_iter || unchanged > 1.0 - params.tol {
            break distances;
        }
    };

    let inertia = labels
        .iter()
        .enumerate()
        .map(|(i, &l)| distances[[i, l as usize]])
        .sum();

    Ok(KmeansRun {
        labels,
        inertia,
        n_iter,
        mdm,
    })
}

impl Estimator for Kmeans {
    fn name(&self) -> &'static str {
        "Kmeans"
    }

    /// Cluster the trials. Labels are ignored.
    fn fit(&mut self, trials: ArrayView3<'_, f64>, _labels: Option<&[ClassLabel]>) -> Result<()> {
        self.validate(&trials)?;
        let params = &self.params;

        let runs: Vec<KmeansRun> =
            if matches!(params.init, KmeansInit::Random) && params.n_init > 1 {
                let seeds = restart_seeds(params.seed, params.n_init);
                params
                    .mode
                    .par_map(0..seeds.len(), |i| fit_single(trials, params, seeds[i]))
                    .into_iter()
                    .collect::<Result<Vec<_>>>()?
            } else {
                let seed = restart_seeds(params.seed, 1)[0];
                vec![fit_single(trials, params, seed)?]
            };

        // Lowest inertia, earliest restart on ties
        let mut best = 0;
        for (i, run) in runs.iter().enumerate() {
            if run.inertia < runs[best].inertia {
                best = i;
            }
        }

        self.restart_inertias = runs.iter().map(|r| r.inertia).collect();
        let chosen = runs.into_iter().nth(best);
        if let Some(run) = &chosen {
            info!(
                restart = best,
                inertia = run.inertia,
                iterations = run.n_iter,
                "k-means finished"
            );
        }
        self.fitted = chosen;
        Ok(())
    }
}

impl Transformer for Kmeans {
    type Output = Array2<f64>;

    /// Distance of each trial to every centroid, shape `(n_trials, n_clusters)`
    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        self.run()?.mdm.distances(trials)
    }
}

impl Predictor for Kmeans {
    type Prediction = ClassLabel;

    /// Nearest centroid of each trial
    fn predict(&self, trials: ArrayView3<'_, f64>) -> Result<Vec<ClassLabel>> {
        self.run()?.mdm.predict(trials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use spdkit_core::Metric;

    /// Two well-separated groups of diagonal SPD matrices
    fn two_groups() -> Array3<f64> {
        let mut out = Array3::zeros((8, 2, 2));
        for i in 0..8 {
            let eps = 0.02 * i as f64;
            let m = if i < 4 {
                array![[1.0 + eps, 0.0], [0.0, 1.0 - eps]]
            } else {
                array![[20.0 + eps, 0.0], [0.0, 0.1 + eps]]
            };
            out.index_axis_mut(Axis(0), i).assign(&m);
        }
        out
    }

    #[test]
    fn test_kmeans_basic() {
        let trials = two_groups();
        let mut km = Kmeans::new(KmeansParams {
            seed: Some(42),
            ..Default::default()
        });
        let labels = km.fit_predict(trials.view()).unwrap();

        assert_eq!(labels.len(), 8);
        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4], "groups should get different clusters");
        assert_eq!(km.centroids().unwrap().len(), 2);
        assert_eq!(km.predict(trials.view()).unwrap(), labels);
        assert_eq!(km.transform(trials.view()).unwrap().dim(), (8, 2));
    }

    #[test]
    fn test_kmeans_k_too_large() {
        let trials = two_groups();
        let mut km = Kmeans::new(KmeansParams {
            n_clusters: 9,
            ..Default::default()
        });
        assert!(matches!(
            km.fit(trials.view(), None),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_kmeans_k_zero() {
        let trials = two_groups();
        let mut km = Kmeans::new(KmeansParams {
            n_clusters: 0,
            ..Default::default()
        });
        assert!(km.fit(trials.view(), None).is_err(), "k=0 should error");
    }

    #[test]
    fn test_explicit_centroids_shape_checked() {
        let trials = two_groups();
        let mut km = Kmeans::new(KmeansParams {
            init: KmeansInit::Centroids(Array3::zeros((3, 2, 2))),
            ..Default::default()
        });
        assert!(matches!(
            km.fit(trials.view(), None),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_explicit_centroids_run_once() {
        let trials = two_groups();
        let init = trials.select(Axis(0), &[0, 7]);
        let mut km = Kmeans::new(KmeansParams {
            init: KmeansInit::Centroids(init),
            metric: Metric::LogEuclid.into(),
            ..Default::default()
        });
        km.fit(trials.view(), None).unwrap();
        assert_eq!(km.restart_inertias().len(), 1);
        assert_eq!(km.labels().unwrap(), &[0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_not_fitted() {
        let km = Kmeans::default();
        assert!(matches!(km.labels(), Err(Error::NotFitted(_))));
        assert!(km.predict(two_groups().view()).is_err());
    }

    #[test]
    fn test_max_iter_zero_still_returns() {
        let trials = two_groups();
        let mut km = Kmeans::new(KmeansParams {
            max_iter: 0,
            n_init: 1,
            seed: Some(1),
            ..Default::default()
        });
        km.fit(trials.view(), None).unwrap();
        assert_eq!(km.n_iter().unwrap(), 1);
        assert!(km.inertia().unwrap() >= 0.0);
    }

    #[test]
    fn test_restart_seeds_deterministic() {
        assert_eq!(restart_seeds(Some(3), 5), restart_seeds(Some(3), 5));
        assert_ne!(restart_seeds(Some(3), 5), restart_seeds(Some(4), 5));
    }
}

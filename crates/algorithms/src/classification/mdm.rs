//! Minimum Distance to Mean (MDM) classifier
//!
//! One centroid per class under a Riemannian metric; a trial belongs to the
//! class whose centroid is nearest. The channel selector, the k-means engine
//! and the Potato all build on it.

use ndarray::{Array2, ArrayView3, Axis};
use tracing::debug;

use spdkit_core::{
    unique_labels, ClassLabel, Error, Estimator, MetricPair, MetricSpec, Predictor, Result,
    Transformer,
};
use spdkit_parallel::{ParallelStrategy, ProcessingMode};

/// Minimum Distance to Mean classifier
#[derive(Debug, Clone)]
pub struct Mdm {
    metric: MetricSpec,
    pair: MetricPair,
    mode: ProcessingMode,
    centroids: Vec<Array2<f64>>,
    classes: Vec<ClassLabel>,
}

impl Mdm {
    /// Unfitted classifier using `metric` for both means and distances
    /// (or the split pair of a [`MetricSpec::Split`])
    pub fn new(metric: impl Into<MetricSpec>) -> Self {
        let metric = metric.into();
        Self {
            metric,
            pair: metric.resolve(),
            mode: ProcessingMode::Sequential,
            centroids: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Compute class centroids and distances with the given processing mode
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Classifier seeded with explicit centroids instead of fitted ones.
    pub fn from_centroids(
        metric: impl Into<MetricSpec>,
        centroids: Vec<Array2<f64>>,
        classes: Vec<ClassLabel>,
    ) -> Result<Self> {
        if centroids.is_empty() {
            return Err(Error::invalid("centroids", 0, "at least one centroid is required"));
        }
        if centroids.len() != classes.len() {
            return Err(Error::invalid(
                "classes",
                classes.len(),
                format!("expected one class per centroid ({})", centroids.len()),
            ));
        }
        let dim = centroids[0].dim();
        if dim.0 != dim.1 {
            return Err(Error::shape_mismatch("centroids", &[dim.0, dim.0], &[dim.0, dim.1]));
        }
        if let Some(bad) = centroids.iter().find(|c| c.dim() != dim) {
            return Err(Error::shape_mismatch(
                "centroids",
                &[dim.0, dim.1],
                &[bad.nrows(), bad.ncols()],
            ));
        }

        let mut mdm = Mdm::new(metric);
        mdm.centroids = centroids;
        mdm.classes = classes;
        Ok(mdm)
    }

    /// Metric specification this classifier was built with
    pub fn metric(&self) -> MetricSpec {
        self.metric
    }

    /// Resolved mean / distance functions
    pub fn metric_pair(&self) -> &MetricPair {
        &self.pair
    }

    /// Class centroids, aligned with [`Mdm::classes`]
    pub fn centroids(&self) -> &[Array2<f64>] {
        &self.centroids
    }

    /// Class labels in ascending order
    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    /// Whether centroids are available
    pub fn is_fitted(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Estimate one centroid per distinct label, optionally weighting trials.
    pub fn fit_weighted(
        &mut self,
        trials: ArrayView3<'_, f64>,
        labels: &[ClassLabel],
        sample_weight: Option<&[f64]>,
    ) -> Result<()> {
        let n_trials = trials.len_of(Axis(0));
        if n_trials == 0 {
            return Err(Error::DegenerateInput("MDM needs at least one trial".into()));
        }
        if labels.len() != n_trials {
            return Err(Error::invalid(
                "labels",
                labels.len(),
                format!("expected one label per trial ({})", n_trials),
            ));
        }
        if let Some(w) = sample_weight {
            if w.len() != n_trials {
                return Err(Error::invalid(
                    "sample_weight",
                    w.len(),
                    format!("expected one weight per trial ({})", n_trials),
                ));
            }
        }

        let classes = unique_labels(labels);
        let pair = self.pair;

        let centroids = self
            .mode
            .par_map(0..classes.len(), |ci| {
                let members: Vec<usize> = labels
                    .iter()
                    .enumerate()
                    .filter(|(_, &l)| l == classes[ci])
                    .map(|(i, _)| i)
                    .collect();
                let subset = trials.select(Axis(0), &members);
                let weights: Option<Vec<f64>> =
                    sample_weight.map(|w| members.iter().map(|&i| w[i]).collect());
                pair.mean(subset.view(), weights.as_deref())
            })
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        debug!(classes = classes.len(), metric = %pair.mean_metric(), "MDM centroids estimated");

        self.centroids = centroids;
        self.classes = classes;
        Ok(())
    }

    /// Distance of every trial to every centroid, shape `(n_trials, n_classes)`.
    pub fn distances(&self, trials: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(Error::NotFitted("MDM"));
        }
        let (n_trials, rows, cols) = trials.dim();
        let (n, _) = self.centroids[0].dim();
        if rows != n || cols != n {
            return Err(Error::shape_mismatch("trials", &[n_trials, n, n], &[n_trials, rows, cols]));
        }

        let k = self.centroids.len();
        let rows: Vec<Vec<f64>> = self
            .mode
            .par_map(0..n_trials, |i| {
                let x = trials.index_axis(Axis(0), i);
                self.centroids
                    .iter()
                    .map(|c| self.pair.distance(x, c.view()))
                    .collect::<Result<Vec<f64>>>()
            })
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((n_trials, k), flat)
            .map_err(|e| Error::invalid("distances", n_trials, e.to_string()))
    }

    /// Class of the nearest centroid for each row of a distance matrix
    pub fn nearest(&self, distances: &Array2<f64>) -> Vec<ClassLabel> {
        argmin_rows(distances)
            .into_iter()
            .map(|j| self.classes[j])
            .collect()
    }
}

/// Column index of the smallest value of each row, first one on ties.
pub(crate) fn argmin_rows(distances: &Array2<f64>) -> Vec<usize> {
    distances
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, &d) in row.iter().enumerate() {
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            best
        })
        .collect()
}

impl Estimator for Mdm {
    fn name(&self) -> &'static str {
        "MDM"
    }

    fn fit(&mut self, trials: ArrayView3<'_, f64>, labels: Option<&[ClassLabel]>) -> Result<()> {
        let labels = labels.ok_or_else(|| {
            Error::invalid("labels", "None", "MDM is supervised and needs labels")
        })?;
        self.fit_weighted(trials, labels, None)
    }
}

impl Transformer for Mdm {
    type Output = Array2<f64>;

    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        self.distances(trials)
    }
}

impl Predictor for Mdm {
    type Prediction = ClassLabel;

    fn predict(&self, trials: ArrayView3<'_, f64>) -> Result<Vec<ClassLabel>> {
        let distances = self.distances(trials)?;
        Ok(self.nearest(&distances))
    }
}

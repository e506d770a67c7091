//! Electrode selection by backward elimination
//!
//! One centroid is estimated per class; channels are then dropped one at a
//! time, each time removing the channel whose absence leaves the largest sum
//! of pairwise centroid distances (Barachant & Bonnet, NER 2011).

use ndarray::{Array2, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classification::Mdm;
use spdkit_core::spd::restrict;
use spdkit_core::{ClassLabel, Error, Estimator, MetricPair, MetricSpec, Result, Transformer};
use spdkit_parallel::{ParallelStrategy, ProcessingMode};

/// Parameters for electrode selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectrodeSelectionParams {
    /// Number of electrodes to keep (default: 16)
    pub n_electrodes: usize,
    /// Metric for class centroids and their distances (default: riemann)
    pub metric: MetricSpec,
    /// How candidate subsets and class centroids are computed
    pub mode: ProcessingMode,
}

impl Default for ElectrodeSelectionParams {
    fn default() -> Self {
        Self {
            n_electrodes: 16,
            metric: MetricSpec::default(),
            mode: ProcessingMode::Sequential,
        }
    }
}

/// Greedy backward electrode selection.
///
/// Cost is dominated by distance evaluations:
/// `(n − n_electrodes) · n · k(k−1)/2` for `n` channels and `k` classes,
/// each one an eigen-decomposition of a sub-matrix.
#[derive(Debug, Clone, Default)]
pub struct ElectrodeSelection {
    params: ElectrodeSelectionParams,
    centroids: Vec<Array2<f64>>,
    subset: Option<Vec<usize>>,
    distance_log: Vec<f64>,
}

impl ElectrodeSelection {
    /// Create an unfitted selector
    pub fn new(params: ElectrodeSelectionParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Parameters of this selector
    pub fn params(&self) -> &ElectrodeSelectionParams {
        &self.params
    }

    /// Selected channel indices, ascending. `None` before fit.
    pub fn subset(&self) -> Option<&[usize]> {
        self.subset.as_deref()
    }

    /// Maximized separation recorded at each elimination step
    pub fn distance_log(&self) -> &[f64] {
        &self.distance_log
    }

    /// Class centroids over all channels
    pub fn centroids(&self) -> &[Array2<f64>] {
        &self.centroids
    }

    /// Find the subset of `n_electrodes` channels that keeps the class
    /// centroids furthest apart.
    pub fn fit_weighted(
        &mut self,
        trials: ArrayView3<'_, f64>,
        labels: &[ClassLabel],
        sample_weight: Option<&[f64]>,
    ) -> Result<()> {
        let target = self.params.n_electrodes;
        if target == 0 {
            return Err(Error::invalid("n_electrodes", target, "must keep at least one electrode"));
        }

        let mut mdm = Mdm::new(self.params.metric).with_mode(self.params.mode);
        mdm.fit_weighted(trials, labels, sample_weight)?;
        if mdm.classes().len() < 2 {
            return Err(Error::invalid(
                "labels",
                mdm.classes().len(),
                "electrode selection needs at least two classes",
            ));
        }

        let pair = *mdm.metric_pair();
        let centroids = mdm.centroids();
        let n = centroids[0].nrows();

        let mut subset: Vec<usize> = (0..n).collect();
        let mut distance_log = Vec::with_capacity(n.saturating_sub(target));

        while subset.len() > target {
            let scores = self
                .params
                .mode
                .par_map(0..subset.len(), |pos| {
                    let mut candidate = subset.clone();
                    candidate.remove(pos);
                    separation(centroids, &candidate, &pair)
                })
                .into_iter()
                .collect::<Result<Vec<f64>>>()?;

            // First maximum wins on ties
            let mut best_pos = 0;
            let mut best = f64::NEG_INFINITY;
            for (pos, &score) in scores.iter().enumerate() {
                if score > best {
                    best = score;
                    best_pos = pos;
                }
            }

            debug!(
                removed = subset[best_pos],
                separation = best,
                remaining = subset.len() - 1,
                "electrode eliminated"
            );
            distance_log.push(best);
            subset.remove(best_pos);
        }

        info!(kept = subset.len(), of = n, "electrode selection finished");

        self.centroids = mdm.centroids().to_vec();
        self.subset = Some(subset);
        self.distance_log = distance_log;
        Ok(())
    }
}

/// Sum of pairwise distances between centroids restricted to `channels`
fn separation(centroids: &[Array2<f64>], channels: &[usize], pair: &MetricPair) -> Result<f64> {
    let restricted: Vec<Array2<f64>> = centroids
        .iter()
        .map(|c| restrict(c.view(), channels))
        .collect();

    let mut total = 0.0;
    for i in 0..restricted.len() {
        for j in (i + 1)..restricted.len() {
            total += pair.distance(restricted[i].view(), restricted[j].view())?;
        }
    }
    Ok(total)
}

impl Estimator for ElectrodeSelection {
    fn name(&self) -> &'static str {
        "ElectrodeSelection"
    }

    fn fit(&mut self, trials: ArrayView3<'_, f64>, labels: Option<&[ClassLabel]>) -> Result<()> {
        let labels = labels.ok_or_else(|| {
            Error::invalid("labels", "None", "electrode selection needs class labels")
        })?;
        self.fit_weighted(trials, labels, None)
    }
}

impl Transformer for ElectrodeSelection {
    type Output = Array3<f64>;

    /// Reduce every trial to the selected rows and columns.
    ///
    /// Before fit the identity subset of the input's width is used, so an
    /// unfitted selector passes trials through unchanged.
    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Array3<f64>> {
        let (n_trials, rows, cols) = trials.dim();
        if rows != cols {
            return Err(Error::shape_mismatch(
                "trials",
                &[n_trials, rows, rows],
                &[n_trials, rows, cols],
            ));
        }

        let identity: Vec<usize>;
        let subset = match self.subset.as_deref() {
            Some(s) => s,
            None => {
                identity = (0..rows).collect();
                &identity
            }
        };

        if let Some(&max) = subset.iter().max() {
            if max >= rows {
                return Err(Error::invalid(
                    "trials",
                    rows,
                    format!("selected channel {} is out of range", max),
                ));
            }
        }

        Ok(trials.select(Axis(1), subset).select(Axis(2), subset))
    }
}

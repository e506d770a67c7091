//! Potato: iterative artifact rejection on SPD trials
//!
//! A reference centroid is estimated from the accepted trials, each trial is
//! scored by the z-score of its log-distance to that centroid, and trials
//! scoring at or above the threshold are rejected. The loop repeats on the
//! surviving trials until the accepted set stops changing.

use ndarray::{Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classification::Mdm;
use spdkit_core::{ClassLabel, Error, Estimator, MetricSpec, Predictor, Result, Transformer};

/// Floor applied to distances before taking their log
const MIN_DISTANCE: f64 = 1e-12;

/// Parameters for Potato artifact rejection
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PotatoParams {
    /// Metric for the centroid and distances (default: riemann)
    pub metric: MetricSpec,
    /// z-score at or above which a trial is rejected (default: 3.0)
    pub threshold: f64,
    /// Maximum number of rejection rounds (default: 100)
    pub n_iter_max: usize,
}

impl Default for PotatoParams {
    fn default() -> Self {
        Self {
            metric: MetricSpec::default(),
            threshold: 3.0,
            n_iter_max: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct PotatoState {
    mdm: Mdm,
    mean: f64,
    std: f64,
    mask: Vec<bool>,
    mask_history: Vec<Vec<bool>>,
}

/// Potato artifact detector
#[derive(Debug, Clone, Default)]
pub struct Potato {
    params: PotatoParams,
    state: Option<PotatoState>,
}

impl Potato {
    /// Create an unfitted detector
    pub fn new(params: PotatoParams) -> Self {
        Self { params, state: None }
    }

    /// Parameters of this detector
    pub fn params(&self) -> &PotatoParams {
        &self.params
    }

    fn state(&self) -> Result<&PotatoState> {
        self.state.as_ref().ok_or(Error::NotFitted("Potato"))
    }

    /// Reference centroid of the clean trials
    pub fn centroid(&self) -> Result<&Array2<f64>> {
        let state = self.state()?;
        state
            .mdm
            .centroids()
            .first()
            .ok_or(Error::NotFitted("Potato"))
    }

    /// Mean of the log-distances of the accepted trials
    pub fn mean(&self) -> Result<f64> {
        Ok(self.state()?.mean)
    }

    /// Population standard deviation of the log-distances of the accepted trials
    pub fn std(&self) -> Result<f64> {
        Ok(self.state()?.std)
    }

    /// Final acceptance mask of the training trials
    pub fn mask(&self) -> Result<&[bool]> {
        Ok(&self.state()?.mask)
    }

    /// Acceptance mask after every round, starting with the initial one
    pub fn mask_history(&self) -> Result<&[Vec<bool>]> {
        Ok(&self.state()?.mask_history)
    }

    /// Number of rejection rounds performed
    pub fn n_iter(&self) -> Result<usize> {
        Ok(self.state()?.mask_history.len() - 1)
    }

    /// Fit starting from an explicit acceptance mask (`None` accepts every trial).
    pub fn fit_with_mask(
        &mut self,
        trials: ArrayView3<'_, f64>,
        initial_acceptance: Option<&[bool]>,
    ) -> Result<()> {
        let p = self.params;
        if !p.threshold.is_finite() {
            return Err(Error::invalid("threshold", p.threshold, "must be finite"));
        }
        if p.n_iter_max == 0 {
            return Err(Error::invalid("n_iter_max", p.n_iter_max, "must be at least 1"));
        }

        let n_trials = trials.len_of(Axis(0));
        let mut mask = match initial_acceptance {
            Some(m) if m.len() != n_trials => {
                return Err(Error::invalid(
                    "initial_acceptance",
                    m.len(),
                    format!("expected one flag per trial ({})", n_trials),
                ))
            }
            Some(m) => m.to_vec(),
            None => vec![true; n_trials],
        };
        let mut history = vec![mask.clone()];

        let mut fitted = None;
        for round in 1..=p.n_iter_max {
            let accepted: Vec<usize> = (0..n_trials).filter(|&i| mask[i]).collect();
            if accepted.is_empty() {
                return Err(Error::DegenerateInput(
                    "Potato has no accepted trials to estimate a reference from".into(),
                ));
            }

            let subset = trials.select(Axis(0), &accepted);
            let mut mdm = Mdm::new(p.metric);
            mdm.fit_weighted(subset.view(), &vec![0; accepted.len()], None)?;

            let log_dist = log_distances(&mdm, subset.view())?;
            let (mean, std) = mean_std(&log_dist);

            let mut next = mask.clone();
            for (&i, &ld) in accepted.iter().zip(&log_dist) {
                if z_score(ld, mean, std) >= p.threshold {
                    next[i] = false;
                }
            }

            let changed = next != mask;
            debug!(
                round,
                accepted = accepted.len(),
                rejected = accepted.len() - next.iter().filter(|&&a| a).count(),
                "Potato round"
            );
            mask = next;
            history.push(mask.clone());
            fitted = Some((mdm, mean, std));
            if !changed {
                break;
            }
        }

        let (mdm, mean, std) = fitted.ok_or(Error::NotFitted("Potato"))?;
        info!(
            rounds = history.len() - 1,
            accepted = mask.iter().filter(|&&a| a).count(),
            total = n_trials,
            "Potato fitted"
        );
        self.state = Some(PotatoState {
            mdm,
            mean,
            std,
            mask,
            mask_history: history,
        });
        Ok(())
    }
}

fn log_distances(mdm: &Mdm, trials: ArrayView3<'_, f64>) -> Result<Vec<f64>> {
    let distances = mdm.distances(trials)?;
    Ok(distances
        .column(0)
        .iter()
        .map(|&d| d.max(MIN_DISTANCE).ln())
        .collect())
}

/// Mean and population standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    let scale = if std > f64::EPSILON { std } else { 1.0 };
    (value - mean) / scale
}

impl Estimator for Potato {
    fn name(&self) -> &'static str {
        "Potato"
    }

    /// Fit with every trial initially accepted. Labels are ignored.
    fn fit(&mut self, trials: ArrayView3<'_, f64>, _labels: Option<&[ClassLabel]>) -> Result<()> {
        self.fit_with_mask(trials, None)
    }
}

impl Transformer for Potato {
    type Output = Vec<f64>;

    /// z-score of each trial against the fitted reference
    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Vec<f64>> {
        let state = self.state()?;
        Ok(log_distances(&state.mdm, trials)?
            .into_iter()
            .map(|ld| z_score(ld, state.mean, state.std))
            .collect())
    }
}

impl Predictor for Potato {
    type Prediction = bool;

    /// `true` for clean trials
    fn predict(&self, trials: ArrayView3<'_, f64>) -> Result<Vec<bool>> {
        let threshold = self.params.threshold;
        Ok(self
            .transform(trials)?
            .into_iter()
            .map(|z| z < threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn with_outlier() -> Array3<f64> {
        let mut out = Array3::zeros((12, 2, 2));
        for i in 0..11 {
            let eps = 0.01 * (i as f64 - 5.0);
            out.index_axis_mut(Axis(0), i)
                .assign(&array![[1.0 + eps, 0.1 * eps], [0.1 * eps, 1.0 - eps]]);
        }
        out.index_axis_mut(Axis(0), 11)
            .assign(&array![[500.0, 0.0], [0.0, 0.002]]);
        out
    }

    #[test]
    fn test_outlier_rejected() {
        let trials = with_outlier();
        let mut potato = Potato::new(PotatoParams {
            threshold: 2.0,
            ..Default::default()
        });
        potato.fit(trials.view(), None).unwrap();

        let mask = potato.mask().unwrap();
        assert!(!mask[11], "outlier should be rejected");
        assert!(!potato.predict(trials.view()).unwrap()[11]);
        assert_eq!(potato.transform(trials.view()).unwrap().len(), 12);
    }

    #[test]
    fn test_huge_threshold_accepts_all() {
        let trials = with_outlier();
        let mut potato = Potato::new(PotatoParams {
            threshold: 1e6,
            ..Default::default()
        });
        potato.fit(trials.view(), None).unwrap();
        assert!(potato.mask().unwrap().iter().all(|&a| a));
        assert_eq!(potato.n_iter().unwrap(), 1);
    }

    #[test]
    fn test_identical_trials() {
        let mut trials = Array3::zeros((5, 3, 3));
        for mut m in trials.axis_iter_mut(Axis(0)) {
            m.assign(&Array2::<f64>::eye(3));
        }
        let mut potato = Potato::default();
        potato.fit(trials.view(), None).unwrap();

        assert_eq!(potato.n_iter().unwrap(), 1);
        assert!(potato.mask().unwrap().iter().all(|&a| a));
        for z in potato.transform(trials.view()).unwrap() {
            assert!(z.abs() < 1e-9, "z = {}", z);
        }
    }

    #[test]
    fn test_rejection_is_permanent() {
        let trials = with_outlier();
        let mut initial = vec![true; 12];
        initial[3] = false;
        let mut potato = Potato::new(PotatoParams {
            threshold: 1.5,
            ..Default::default()
        });
        potato.fit_with_mask(trials.view(), Some(&initial[..])).unwrap();

        let history = potato.mask_history().unwrap();
        assert_eq!(history[0], initial);
        for pair in history.windows(2) {
            assert_eq!(pair[1].len(), 12);
            for (before, after) in pair[0].iter().zip(&pair[1]) {
                assert!(*before || !*after, "rejected trial came back");
            }
        }
    }

    #[test]
    fn test_stops_at_n_iter_max() {
        let trials = with_outlier();
        let mut potato = Potato::new(PotatoParams {
            threshold: 0.5,
            n_iter_max: 1,
            ..Default::default()
        });
        potato.fit(trials.view(), None).unwrap();

        assert_eq!(potato.n_iter().unwrap(), 1);
        let history = potato.mask_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0], history[1], "round one should still be rejecting");

        // Normalization is the one computed on all trials in the single round
        let mut reference = Mdm::new(MetricSpec::default());
        reference.fit_weighted(trials.view(), &[0; 12], None).unwrap();
        let (mean, std) = mean_std(&log_distances(&reference, trials.view()).unwrap());
        assert!((potato.mean().unwrap() - mean).abs() < 1e-12);
        assert!((potato.std().unwrap() - std).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let trials = with_outlier();
        let mut potato = Potato::new(PotatoParams {
            n_iter_max: 0,
            ..Default::default()
        });
        assert!(potato.fit(trials.view(), None).is_err());

        let mut potato = Potato::default();
        assert!(potato
            .fit_with_mask(trials.view(), Some(&[true; 3][..]))
            .is_err());
        assert!(potato
            .fit_with_mask(trials.view(), Some(&[false; 12][..]))
            .is_err());
    }

    #[test]
    fn test_not_fitted() {
        let potato = Potato::default();
        assert!(matches!(potato.mask(), Err(Error::NotFitted(_))));
        assert!(potato.transform(with_outlier().view()).is_err());
    }
}

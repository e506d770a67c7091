//! Metric selection and resolution

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use super::distance::{distance_euclid, distance_logdet, distance_logeuclid, distance_riemann};
use super::mean::{mean_euclid, mean_logdet, mean_logeuclid, mean_riemann};
use crate::error::{Error, Result};

/// A named metric on the SPD cone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Affine-invariant Riemannian metric
    #[default]
    Riemann,
    /// Log-Euclidean metric
    LogEuclid,
    /// Euclidean (Frobenius) metric
    Euclid,
    /// Log-determinant (Stein) divergence
    LogDet,
}

impl Metric {
    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Riemann => "riemann",
            Metric::LogEuclid => "logeuclid",
            Metric::Euclid => "euclid",
            Metric::LogDet => "logdet",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "riemann" => Ok(Metric::Riemann),
            "logeuclid" | "log-euclid" => Ok(Metric::LogEuclid),
            "euclid" | "euclidean" => Ok(Metric::Euclid),
            "logdet" | "log-det" => Ok(Metric::LogDet),
            other => Err(Error::invalid(
                "metric",
                other,
                "use riemann, logeuclid, euclid or logdet",
            )),
        }
    }
}

/// Which metric to use for centroids and which for distances.
///
/// A typical split pairs a cheap `logeuclid` mean with the more sensitive
/// `riemann` distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricSpec {
    /// One metric for both roles
    Named(Metric),
    /// Separate metrics for the mean and the distance
    Split { mean: Metric, distance: Metric },
}

impl Default for MetricSpec {
    fn default() -> Self {
        MetricSpec::Named(Metric::Riemann)
    }
}

impl From<Metric> for MetricSpec {
    fn from(metric: Metric) -> Self {
        MetricSpec::Named(metric)
    }
}

impl MetricSpec {
    /// Split specification
    pub fn split(mean: Metric, distance: Metric) -> Self {
        MetricSpec::Split { mean, distance }
    }

    /// Metric used for centroid estimation
    pub fn mean_metric(&self) -> Metric {
        match *self {
            MetricSpec::Named(m) => m,
            MetricSpec::Split { mean, .. } => mean,
        }
    }

    /// Metric used for distances
    pub fn distance_metric(&self) -> Metric {
        match *self {
            MetricSpec::Named(m) => m,
            MetricSpec::Split { distance, .. } => distance,
        }
    }

    /// Resolve into concrete mean / distance functions.
    pub fn resolve(&self) -> MetricPair {
        MetricPair::new(self.mean_metric(), self.distance_metric())
    }
}

impl FromStr for MetricSpec {
    type Err = Error;

    /// Parses `"riemann"` or `"mean=logeuclid,distance=riemann"`.
    fn from_str(s: &str) -> Result<Self> {
        if !s.contains('=') {
            return Ok(MetricSpec::Named(s.parse()?));
        }

        let mut mean_metric = None;
        let mut distance_metric = None;
        for part in s.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                Error::invalid("metric", part, "expected key=value")
            })?;
            match key.trim() {
                "mean" => mean_metric = Some(value.parse()?),
                "distance" => distance_metric = Some(value.parse()?),
                other => {
                    return Err(Error::invalid("metric", other, "keys are mean and distance"))
                }
            }
        }
        match (mean_metric, distance_metric) {
            (Some(mean), Some(distance)) => Ok(MetricSpec::Split { mean, distance }),
            _ => Err(Error::invalid("metric", s, "both mean and distance are required")),
        }
    }
}

type DistanceFn = fn(ArrayView2<'_, f64>, ArrayView2<'_, f64>) -> Result<f64>;
type MeanFn = fn(ArrayView3<'_, f64>, Option<&[f64]>) -> Result<Array2<f64>>;

/// A resolved [`MetricSpec`]: function handles for the mean and the distance.
#[derive(Clone, Copy)]
pub struct MetricPair {
    mean_metric: Metric,
    distance_metric: Metric,
    mean_fn: MeanFn,
    distance_fn: DistanceFn,
}

impl MetricPair {
    /// Resolve a mean metric and a distance metric
    pub fn new(mean_metric: Metric, distance_metric: Metric) -> Self {
        let mean_fn: MeanFn = match mean_metric {
            Metric::Riemann => mean_riemann,
            Metric::LogEuclid => mean_logeuclid,
            Metric::Euclid => mean_euclid,
            Metric::LogDet => mean_logdet,
        };
        let distance_fn: DistanceFn = match distance_metric {
            Metric::Riemann => distance_riemann,
            Metric::LogEuclid => distance_logeuclid,
            Metric::Euclid => distance_euclid,
            Metric::LogDet => distance_logdet,
        };
        Self {
            mean_metric,
            distance_metric,
            mean_fn,
            distance_fn,
        }
    }

    /// Metric behind [`MetricPair::mean`]
    pub fn mean_metric(&self) -> Metric {
        self.mean_metric
    }

    /// Metric behind [`MetricPair::distance`]
    pub fn distance_metric(&self) -> Metric {
        self.distance_metric
    }

    /// Distance between two SPD matrices
    pub fn distance(&self, a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<f64> {
        (self.distance_fn)(a, b)
    }

    /// Centroid of a trial set, uniform weights when `weights` is `None`
    pub fn mean(
        &self,
        trials: ArrayView3<'_, f64>,
        weights: Option<&[f64]>,
    ) -> Result<Array2<f64>> {
        (self.mean_fn)(trials, weights)
    }
}

impl fmt::Debug for MetricPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricPair")
            .field("mean", &self.mean_metric)
            .field("distance", &self.distance_metric)
            .finish()
    }
}

impl From<MetricSpec> for MetricPair {
    fn from(spec: MetricSpec) -> Self {
        spec.resolve()
    }
}

//! # spdkit Core
//!
//! Core types, traits and numerics for the spdkit library.
//!
//! This crate provides:
//! - `Error` / `Result`: the error taxonomy shared by every spdkit crate
//! - `spd`: SPD linear algebra and the Riemannian metric provider
//!   (distances and geometric means)
//! - Estimator traits for a consistent fit / transform / predict API
//! - I/O for JSON trial-set files

pub mod error;
pub mod io;
pub mod labels;
pub mod spd;

pub use error::{Error, Result};
pub use labels::{unique_labels, ClassLabel};
pub use spd::{Metric, MetricPair, MetricSpec};

use ndarray::ArrayView3;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::labels::{unique_labels, ClassLabel};
    pub use crate::spd::{Metric, MetricPair, MetricSpec};
    pub use crate::{Estimator, Predictor, Transformer};
}

/// Core trait for every estimator in spdkit.
///
/// Estimators learn state from a trial set of shape `(n_trials, n, n)` and an
/// optional label vector aligned with it.
pub trait Estimator {
    /// Returns the estimator name
    fn name(&self) -> &'static str;

    /// Fit the estimator. Unsupervised estimators ignore `labels`.
    fn fit(&mut self, trials: ArrayView3<'_, f64>, labels: Option<&[ClassLabel]>) -> Result<()>;
}

/// Estimators that map trials to a new representation.
pub trait Transformer: Estimator {
    /// Output of the transform
    type Output;

    /// Transform a trial set with the fitted state
    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Self::Output>;

    /// Fit, then transform the same trials
    fn fit_transform(
        &mut self,
        trials: ArrayView3<'_, f64>,
        labels: Option<&[ClassLabel]>,
    ) -> Result<Self::Output> {
        self.fit(trials, labels)?;
        self.transform(trials)
    }
}

/// Estimators that emit one prediction per trial.
pub trait Predictor: Estimator {
    /// Per-trial prediction type
    type Prediction;

    /// Predict every trial with the fitted state
    fn predict(&self, trials: ArrayView3<'_, f64>) -> Result<Vec<Self::Prediction>>;
}

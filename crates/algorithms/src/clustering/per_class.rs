//! Per-class k-means features
//!
//! Each class is clustered on its own; the union of all class centroids then
//! serves as a bank of references, and every trial is described by its
//! distance to each of them.

use ndarray::{Array2, ArrayView3, Axis};
use tracing::info;

use super::kmeans::{Kmeans, KmeansParams};
use crate::classification::Mdm;
use spdkit_core::{unique_labels, ClassLabel, Error, Estimator, Result, Transformer};

/// Distances to per-class k-means centroids
#[derive(Debug, Clone, Default)]
pub struct KmeansPerClassTransform {
    params: KmeansParams,
    mdm: Option<Mdm>,
    origins: Vec<(ClassLabel, usize)>,
}

impl KmeansPerClassTransform {
    /// The same k-means parameters are used for every class.
    pub fn new(params: KmeansParams) -> Self {
        Self {
            params,
            mdm: None,
            origins: Vec::new(),
        }
    }

    /// Parameters shared by the per-class k-means runs
    pub fn params(&self) -> &KmeansParams {
        &self.params
    }

    /// All centroids, grouped by ascending class
    pub fn centroids(&self) -> Result<&[Array2<f64>]> {
        Ok(self.fitted()?.centroids())
    }

    /// `(class, cluster)` each centroid came from
    pub fn origins(&self) -> &[(ClassLabel, usize)] {
        &self.origins
    }

    fn fitted(&self) -> Result<&Mdm> {
        self.mdm
            .as_ref()
            .ok_or(Error::NotFitted("KmeansPerClassTransform"))
    }
}

impl Estimator for KmeansPerClassTransform {
    fn name(&self) -> &'static str {
        "KmeansPerClassTransform"
    }

    fn fit(&mut self, trials: ArrayView3<'_, f64>, labels: Option<&[ClassLabel]>) -> Result<()> {
        let labels = labels.ok_or_else(|| {
            Error::invalid("labels", "None", "per-class clustering needs labels")
        })?;
        let n_trials = trials.len_of(Axis(0));
        if labels.len() != n_trials {
            return Err(Error::invalid(
                "labels",
                labels.len(),
                format!("expected one label per trial ({})", n_trials),
            ));
        }

        let mut centroids = Vec::new();
        let mut origins = Vec::new();
        for class in unique_labels(labels) {
            let members: Vec<usize> = (0..n_trials).filter(|&i| labels[i] == class).collect();
            let subset = trials.select(Axis(0), &members);

            let mut km = Kmeans::new(self.params.clone());
            km.fit(subset.view(), None)?;
            for (j, c) in km.centroids()?.iter().enumerate() {
                centroids.push(c.clone());
                origins.push((class, j));
            }
        }

        let ids: Vec<ClassLabel> = (0..centroids.len() as ClassLabel).collect();
        let mdm = Mdm::from_centroids(self.params.metric, centroids, ids)?;
        info!(references = origins.len(), "per-class centroids fitted");

        self.mdm = Some(mdm);
        self.origins = origins;
        Ok(())
    }
}

impl Transformer for KmeansPerClassTransform {
    type Output = Array2<f64>;

    /// Shape `(n_trials, n_classes * n_clusters)`
    fn transform(&self, trials: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        self.fitted()?.distances(trials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    fn labelled() -> (Array3<f64>, Vec<ClassLabel>) {
        let mut trials = Array3::zeros((12, 2, 2));
        let mut labels = Vec::new();
        for i in 0..12 {
            let eps = 0.01 * (i % 3) as f64;
            let scale = if i % 2 == 0 { 1.0 } else { 10.0 };
            let m = if i < 6 {
                array![[scale + eps, 0.0], [0.0, 1.0]]
            } else {
                array![[1.0, 0.0], [0.0, scale + eps]]
            };
            trials.index_axis_mut(Axis(0), i).assign(&m);
            labels.push(if i < 6 { 7 } else { 3 });
        }
        (trials, labels)
    }

    #[test]
    fn test_feature_shape_and_origins() {
        let (trials, labels) = labelled();
        let mut t = KmeansPerClassTransform::new(KmeansParams {
            seed: Some(0),
            n_init: 3,
            ..Default::default()
        });
        let features = t.fit_transform(trials.view(), Some(&labels[..])).unwrap();

        assert_eq!(features.dim(), (12, 4));
        assert_eq!(t.origins(), &[(3, 0), (3, 1), (7, 0), (7, 1)]);
        assert_eq!(t.centroids().unwrap().len(), 4);
        assert!(features.iter().all(|d| *d >= 0.0));
    }

    #[test]
    fn test_needs_labels() {
        let (trials, _) = labelled();
        let mut t = KmeansPerClassTransform::default();
        assert!(t.fit(trials.view(), None).is_err());
    }

    #[test]
    fn test_class_smaller_than_k() {
        let (trials, mut labels) = labelled();
        labels[0] = 99;
        let mut t = KmeansPerClassTransform::default();
        assert!(matches!(
            t.fit(trials.view(), Some(&labels[..])),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_not_fitted() {
        let (trials, _) = labelled();
        let t = KmeansPerClassTransform::default();
        assert!(matches!(t.transform(trials.view()), Err(Error::NotFitted(_))));
    }
}

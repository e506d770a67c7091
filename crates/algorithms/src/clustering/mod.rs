//! Unsupervised estimators on SPD trials
//!
//! - `Kmeans`: Riemannian k-means with seeded restarts
//! - `KmeansPerClassTransform`: distances to per-class k-means centroids
//! - `Potato`: z-score based artifact rejection

mod init;
mod kmeans;
mod per_class;
mod potato;

pub use kmeans::{fit_single, Kmeans, KmeansInit, KmeansParams, KmeansRun};
pub use per_class::KmeansPerClassTransform;
pub use potato::{Potato, PotatoParams};

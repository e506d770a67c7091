//! SPD matrices and the Riemannian metric provider
//!
//! ```text
//!   trials (n_trials, n, n)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  linalg   │  Jacobi eigen-decomposition → sqrtm / logm / expm / powm
//!   └──────────┘
//!        │
//!        ▼
//!   ┌────────────────────┐
//!   │ distance  /  mean  │  riemann, logeuclid, euclid, logdet
//!   └────────────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  metric   │  MetricSpec → MetricPair (resolved function handles)
//!   └──────────┘
//! ```

mod distance;
pub mod linalg;
mod mean;
mod metric;

pub use distance::{
    distance, distance_euclid, distance_logdet, distance_logeuclid, distance_riemann,
};
pub use linalg::{
    check_spd, expm, invsqrtm, is_spd, logm, powm, restrict, sqrtm, symmetric_eigen,
    SymmetricEigen,
};
pub use mean::{mean, mean_euclid, mean_logdet, mean_logeuclid, mean_riemann};
pub use metric::{Metric, MetricPair, MetricSpec};

//! Classification on the SPD manifold
//!
//! - **MDM**: minimum distance to mean (nearest Riemannian centroid)

mod mdm;

pub(crate) use mdm::argmin_rows;
pub use mdm::Mdm;

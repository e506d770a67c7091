//! # spdkit Algorithms
//!
//! Estimators operating on sets of symmetric positive-definite matrices.
//!
//! ## Available Algorithm Categories
//!
//! - **classification**: Minimum Distance to Mean (MDM)
//! - **selection**: backward-elimination electrode selection
//! - **clustering**: Riemannian k-means, per-class k-means features, Potato
//!   artifact rejection

pub mod classification;
pub mod clustering;
pub mod selection;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::Mdm;
    pub use crate::clustering::{
        Kmeans, KmeansInit, KmeansParams, KmeansPerClassTransform, Potato, PotatoParams,
    };
    pub use crate::selection::{ElectrodeSelection, ElectrodeSelectionParams};
    pub use spdkit_core::prelude::*;
    pub use spdkit_parallel::ProcessingMode;
}

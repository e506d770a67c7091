//! Channel selection
//!
//! - **Electrode selection**: backward elimination maximizing the Riemannian
//!   distance between class centroids

mod electrode;

pub use electrode::{ElectrodeSelection, ElectrodeSelectionParams};

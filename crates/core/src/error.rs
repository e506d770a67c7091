//! Error types for spdkit

use thiserror::Error;

/// Main error type for spdkit operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad parameter or input shape, detected before any iteration starts.
    #[error("Invalid configuration: {name} = {value} ({reason})")]
    InvalidConfiguration {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Input the numerics cannot work with: empty sets, non-SPD matrices.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("{0} is not fitted yet, call fit() first")]
    NotFitted(&'static str),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`]
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shape mismatch between two arrays, reported as a configuration error.
    pub fn shape_mismatch(name: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Error::InvalidConfiguration {
            name,
            value: format!("{:?}", actual),
            reason: format!("expected shape {:?}", expected),
        }
    }
}

/// Result type alias for spdkit operations
pub type Result<T> = std::result::Result<T, Error>;

//! JSON trial-set files
//!
//! ```json
//! { "trials": [[[1.0, 0.0], [0.0, 1.0]], ...], "labels": [0, 1, ...] }
//! ```
//!
//! `labels` is optional. Every trial must be a square matrix of the same size.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::labels::{unique_labels, ClassLabel};

/// A trial set with optional labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Trials, shape `(n_trials, n_channels, n_channels)`
    pub trials: Array3<f64>,
    /// One label per trial, if the data is labelled
    pub labels: Option<Vec<ClassLabel>>,
}

#[derive(Serialize, Deserialize)]
struct DatasetFile {
    trials: Vec<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<ClassLabel>>,
}

impl Dataset {
    /// Create a dataset, checking that labels align with trials
    pub fn new(trials: Array3<f64>, labels: Option<Vec<ClassLabel>>) -> Result<Self> {
        let (n_trials, rows, cols) = trials.dim();
        if rows != cols {
            return Err(Error::shape_mismatch(
                "trials",
                &[n_trials, rows, rows],
                &[n_trials, rows, cols],
            ));
        }
        if let Some(labels) = &labels {
            if labels.len() != n_trials {
                return Err(Error::invalid(
                    "labels",
                    labels.len(),
                    format!("expected one label per trial ({})", n_trials),
                ));
            }
        }
        Ok(Self { trials, labels })
    }

    /// Number of trials
    pub fn n_trials(&self) -> usize {
        self.trials.len_of(Axis(0))
    }

    /// Matrix size (channel count)
    pub fn n_channels(&self) -> usize {
        self.trials.len_of(Axis(1))
    }

    /// Distinct labels, ascending; empty when unlabelled
    pub fn classes(&self) -> Vec<ClassLabel> {
        self.labels.as_deref().map(unique_labels).unwrap_or_default()
    }

    fn from_file(file: DatasetFile) -> Result<Self> {
        let n_trials = file.trials.len();
        let n = file.trials.first().map(|t| t.len()).unwrap_or(0);

        let mut flat = Vec::with_capacity(n_trials * n * n);
        for (i, trial) in file.trials.into_iter().enumerate() {
            if trial.len() != n || trial.iter().any(|row| row.len() != n) {
                return Err(Error::invalid(
                    "trials",
                    i,
                    format!("trial is not a {}x{} matrix", n, n),
                ));
            }
            flat.extend(trial.into_iter().flatten());
        }

        let trials = Array3::from_shape_vec((n_trials, n, n), flat)
            .map_err(|e| Error::invalid("trials", n_trials, e.to_string()))?;
        Dataset::new(trials, file.labels)
    }

    fn to_file(&self) -> DatasetFile {
        let trials = self
            .trials
            .axis_iter(Axis(0))
            .map(|m| m.rows().into_iter().map(|r| r.to_vec()).collect())
            .collect();
        DatasetFile {
            trials,
            labels: self.labels.clone(),
        }
    }
}

/// Read a dataset from a JSON file
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = File::open(path.as_ref())?;
    let parsed: DatasetFile = serde_json::from_reader(BufReader::new(file))?;
    Dataset::from_file(parsed)
}

/// Parse a dataset from a JSON string
pub fn read_dataset_from_str(json: &str) -> Result<Dataset> {
    Dataset::from_file(serde_json::from_str(json)?)
}

/// Write a dataset to a JSON file
pub fn write_dataset<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    write_json(&dataset.to_file(), path)
}

/// Serialize a dataset to a JSON string
pub fn write_dataset_to_string(dataset: &Dataset) -> Result<String> {
    Ok(serde_json::to_string(&dataset.to_file())?)
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

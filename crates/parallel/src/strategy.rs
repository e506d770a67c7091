//! Parallel processing strategies

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spdkit_core::{Error, Result};

/// Processing mode for estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Single-threaded processing
    #[default]
    Sequential,
    /// Parallel processing using all available cores
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Map an `n_jobs` value onto a mode.
    ///
    /// `1` runs sequentially, `-1` uses every core, `k > 1` uses exactly `k`
    /// threads and `k < -1` uses `n_cpus + 1 + k` threads (`-2` = all but
    /// one). `0` is rejected.
    pub fn from_n_jobs(n_jobs: i32) -> Result<Self> {
        match n_jobs {
            0 => Err(Error::invalid("n_jobs", n_jobs, "must be non-zero")),
            1 => Ok(ProcessingMode::Sequential),
            -1 => Ok(ProcessingMode::Parallel),
            k if k > 1 => Ok(ProcessingMode::ParallelWith(k as usize)),
            k => {
                let threads = num_cpus() as i64 + 1 + k as i64;
                Ok(if threads <= 1 {
                    ProcessingMode::Sequential
                } else {
                    ProcessingMode::ParallelWith(threads as usize)
                })
            }
        }
    }

    /// Number of worker threads this mode runs on
    pub fn num_threads(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(threads) => (*threads).max(1),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    #[cfg(feature = "parallel")]
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(*threads).build() {
                    Ok(pool) => pool.install(|| range.into_par_iter().map(f).collect()),
                    Err(e) => {
                        tracing::warn!("thread pool unavailable ({}), running sequentially", e);
                        range.map(f).collect()
                    }
                }
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        range.map(f).collect()
    }
}

/// Get the number of available CPU cores
#[cfg(feature = "parallel")]
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

/// Get the number of available CPU cores
#[cfg(not(feature = "parallel"))]
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_jobs_convention() {
        assert_eq!(ProcessingMode::from_n_jobs(1).unwrap(), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_n_jobs(-1).unwrap(), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_n_jobs(4).unwrap(), ProcessingMode::ParallelWith(4));
        assert!(ProcessingMode::from_n_jobs(0).is_err());

        // -2 = all but one core
        let cpus = num_cpus();
        if cpus >= 3 {
            assert_eq!(
                ProcessingMode::from_n_jobs(-2).unwrap(),
                ProcessingMode::ParallelWith(cpus - 1)
            );
        }
        assert_eq!(ProcessingMode::from_n_jobs(-10_000).unwrap(), ProcessingMode::Sequential);
    }

    #[test]
    fn test_par_map_keeps_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let out = mode.par_map(0..100, |i| i * i);
            assert_eq!(out, (0..100).map(|i| i * i).collect::<Vec<_>>());
        }
    }
}

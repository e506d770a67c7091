//! # spdkit Parallel
//!
//! Parallel execution strategies for spdkit estimators.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, all-cores or fixed-size thread pools
//! - the `n_jobs` convention (`1`, `-1`, `-2`, ...) mapped onto those modes
//! - index-ordered `par_map`, so parallel runs merge deterministically
//!
//! Without the `parallel` feature (default on) every mode runs sequentially.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};

//! redeem-cleanlab: confident learning with noisy labels.
//!
//! This crate estimates how class labels were corrupted (the confident joint,
//! the noise matrix and its inverse), prunes the examples most likely to be
//! mislabelled, and trains any [`models::ClassifierModel`] on what remains.
//! It also ships the small pieces needed to evaluate that loop end to end:
//! two bundled classifiers (softmax logistic regression and one-vs-rest GBDT),
//! synthetic noise injection, a CSV reader and a parameter-grid harness.
//!
//! Randomness is always passed in explicitly (an `Rng` or a seed in
//! [`config::CleanlabConfig`]), so every result is reproducible.
pub mod classification;
pub mod config;
pub mod confident_joint;
pub mod data_handling;
pub mod error;
pub mod grid;
pub mod io;
pub mod latent_algebra;
pub mod latent_estimation;
pub mod math;
pub mod models;
pub mod noise_generation;
pub mod preprocessing;
pub mod pruning;
pub mod stats;

pub use classification::{FitOptions, NoiseEstimates, NoisyLabelLearner};
pub use config::{CleanlabConfig, ModelConfig, ModelType, PruneMethod};
pub use error::{CleanlabError, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CleanlabError, Result};

/// Policy used to decide which examples are dropped as likely label errors.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PruneMethod {
    /// Per observed class, drop the least self-confident examples.
    PruneByClass,
    /// Per (observed, latent) class pair, drop the examples with the largest margin
    /// in favour of the latent class.
    PruneByNoiseRate,
    /// Drop only examples flagged by both policies.
    Both,
}

impl PruneMethod {
    pub const ALL: [PruneMethod; 3] = [
        PruneMethod::PruneByNoiseRate,
        PruneMethod::PruneByClass,
        PruneMethod::Both,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PruneMethod::PruneByClass => "prune_by_class",
            PruneMethod::PruneByNoiseRate => "prune_by_noise_rate",
            PruneMethod::Both => "both",
        }
    }
}

impl Default for PruneMethod {
    fn default() -> Self {
        PruneMethod::PruneByNoiseRate
    }
}

impl fmt::Display for PruneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PruneMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "prune_by_class" => Ok(PruneMethod::PruneByClass),
            "prune_by_noise_rate" => Ok(PruneMethod::PruneByNoiseRate),
            "both" => Ok(PruneMethod::Both),
            _ => Err(format!(
                "Unknown prune method: {}. Valid options are: prune_by_class, prune_by_noise_rate, both",
                s
            )),
        }
    }
}

/// Options controlling noise estimation and pruning in `NoisyLabelLearner`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CleanlabConfig {
    pub prune_method: PruneMethod,
    /// Re-estimate the confident joint on the pruned subset until the prior settles.
    pub converge_latent_estimates: bool,
    /// Number of stratified cross-validation folds (>= 2).
    pub n_folds: usize,
    /// Worker threads used for the cross-validation folds (>= 1).
    pub parallelism: usize,
    pub seed: Option<u64>,
    /// Fraction of the estimated label errors to actually prune, in (0, 1].
    pub frac_noise: f64,
    /// Examples kept per class regardless of pruning. Zero disables the fallback.
    pub min_examples_per_class: usize,
    /// Weight retained examples by 1 / P(s=k|y=k) when the classifier supports it.
    pub use_sample_weights: bool,
}

impl Default for CleanlabConfig {
    fn default() -> Self {
        Self {
            prune_method: PruneMethod::default(),
            converge_latent_estimates: false,
            n_folds: 5,
            parallelism: 1,
            seed: None,
            frac_noise: 1.0,
            min_examples_per_class: 1,
            use_sample_weights: true,
        }
    }
}

impl CleanlabConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(CleanlabError::InvalidConfig(format!(
                "n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        if self.parallelism < 1 {
            return Err(CleanlabError::InvalidConfig(
                "parallelism must be at least 1".to_string(),
            ));
        }
        if !(self.frac_noise > 0.0 && self.frac_noise <= 1.0) {
            return Err(CleanlabError::InvalidConfig(format!(
                "frac_noise must be in (0, 1], got {}",
                self.frac_noise
            )));
        }
        Ok(())
    }

    pub fn with_prune_method(mut self, prune_method: PruneMethod) -> Self {
        self.prune_method = prune_method;
        self
    }

    pub fn with_converge_latent_estimates(mut self, converge: bool) -> Self {
        self.converge_latent_estimates = converge;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Central configuration for the classifiers shipped with the crate.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    Logistic {
        max_iter: usize,
        /// L2 penalty
        alpha: f64,
    },
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Logistic {
            max_iter: 1000,
            alpha: 1e-4,
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Logistic { .. } => "logistic",
            ModelType::GBDT { .. } => "gbdt",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" => Ok(ModelType::default()),
            "gbdt" => Ok(ModelType::GBDT {
                max_depth: 4,
                num_boost_round: 50,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: logistic, gbdt",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

//! Exhaustive sweep over the learner's pruning settings.

use std::cmp::Ordering;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::classification::{FitOptions, NoisyLabelLearner};
use crate::config::{CleanlabConfig, PruneMethod};
use crate::error::Result;
use crate::models::classifier_trait::ClassifierModel;

/// One combination of settings from a [`ParameterGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub prune_method: PruneMethod,
    pub converge_latent_estimates: bool,
}

impl GridPoint {
    /// `base` with this point's settings applied.
    pub fn apply(&self, base: &CleanlabConfig) -> CleanlabConfig {
        base.clone()
            .with_prune_method(self.prune_method)
            .with_converge_latent_estimates(self.converge_latent_estimates)
    }
}

/// Cartesian product of `converge_latent_estimates` (outer) and `prune_method` (inner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub prune_methods: Vec<PruneMethod>,
    pub converge_latent_estimates: Vec<bool>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        ParameterGrid {
            prune_methods: PruneMethod::ALL.to_vec(),
            converge_latent_estimates: vec![false, true],
        }
    }
}

impl ParameterGrid {
    pub fn points(&self) -> Vec<GridPoint> {
        self.converge_latent_estimates
            .iter()
            .flat_map(|&converge| {
                self.prune_methods.iter().map(move |&prune_method| GridPoint {
                    prune_method,
                    converge_latent_estimates: converge,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.prune_methods.len() * self.converge_latent_estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridScore {
    pub point: GridPoint,
    pub accuracy: f64,
    pub num_pruned: usize,
}

/// Fit one learner per grid point on the training data and score it on the
/// test data.
///
/// Each point trains a fresh copy of `model`. Scores come back best first;
/// equal scores keep grid order. The first failing point aborts the sweep.
#[allow(clippy::too_many_arguments)]
pub fn run_grid(
    grid: &ParameterGrid,
    model: &dyn ClassifierModel,
    base: &CleanlabConfig,
    x_train: &Array2<f64>,
    y_train: &[usize],
    x_test: &Array2<f64>,
    y_test: &[usize],
    options: &FitOptions,
) -> Result<Vec<GridScore>> {
    let mut scores = Vec::with_capacity(grid.len());
    for point in grid.points() {
        let mut learner = NoisyLabelLearner::new(model.fresh(), point.apply(base));
        let num_pruned = learner.fit(x_train, y_train, options.clone())?.num_pruned;
        let accuracy = learner.score(x_test, y_test)?;
        log::info!(
            "{} / converge_latent_estimates = {}: accuracy {:.4}",
            point.prune_method,
            point.converge_latent_estimates,
            accuracy
        );
        scores.push(GridScore {
            point,
            accuracy,
            num_pruned,
        });
    }
    scores.sort_by(|a, b| b.accuracy.partial_cmp(&a.accuracy).unwrap_or(Ordering::Equal));
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::logistic::LogisticRegression;

    #[test]
    fn test_default_grid_order() {
        let grid = ParameterGrid::default();
        let points = grid.points();
        assert_eq!(points.len(), 6);
        assert_eq!(grid.len(), 6);
        assert!(!points[0].converge_latent_estimates);
        assert_eq!(points[0].prune_method, PruneMethod::ALL[0]);
        assert_eq!(points[3].prune_method, PruneMethod::ALL[0]);
        assert!(points[3].converge_latent_estimates);
    }

    #[test]
    fn test_run_grid_sorts_best_first() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..24 {
            let class = i % 2;
            let offset = (i / 2) as f64 * 0.1;
            rows.extend_from_slice(&[class as f64 * 4.0 + offset, offset]);
            labels.push(class);
        }
        labels[0] = 1;
        let x = Array2::from_shape_vec((24, 2), rows).unwrap();

        let grid = ParameterGrid {
            prune_methods: vec![PruneMethod::PruneByNoiseRate, PruneMethod::Both],
            converge_latent_estimates: vec![false],
        };
        let base = CleanlabConfig {
            n_folds: 3,
            ..CleanlabConfig::default()
        }
        .with_seed(0);
        let scores = run_grid(
            &grid,
            &LogisticRegression::default(),
            &base,
            &x,
            &labels,
            &x,
            &labels,
            &FitOptions::default(),
        )
        .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0].accuracy >= scores[1].accuracy);
    }
}

//! Noise-robust training on top of any [`ClassifierModel`].
//!
//! [`NoisyLabelLearner::fit`] estimates how labels were corrupted, prunes the
//! examples most likely to be mislabelled and trains the wrapped classifier
//! once on what remains.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{CleanlabConfig, ModelConfig};
use crate::confident_joint::{compute_confident_joint, ConfidentJoint};
use crate::error::{CleanlabError, Result};
use crate::latent_algebra::{
    compute_inv_noise_matrix, compute_noise_matrix_from_inverse, compute_py,
    compute_py_from_noise_matrix, PyMethod,
};
use crate::latent_estimation::{
    conform_probabilities, estimate_latent, estimate_py_noise_matrices_and_cv_pred_proba,
};
use crate::math::{argmax, is_column_stochastic, is_row_stochastic, value_counts, STOCHASTIC_TOL};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::pruning::{find_label_issues, prune_counts_from_inverse, prune_until_converged, PruneOptions};
use crate::stats::accuracy_score;

/// Optional prior knowledge handed to [`NoisyLabelLearner::fit`].
///
/// Supplying either matrix skips cross-validated estimation entirely.
#[derive(Debug, Clone, Default)]
pub struct FitOptions {
    /// `P(s = i | y = j)`, column-stochastic.
    pub noise_matrix: Option<Array2<f64>>,
    /// `P(y = j | s = i)`, row-stochastic.
    pub inverse_noise_matrix: Option<Array2<f64>>,
    /// Out-of-sample predicted probabilities, shape (n_samples, n_classes).
    pub pred_probs: Option<Array2<f64>>,
}

impl FitOptions {
    pub fn with_noise_matrix(mut self, noise_matrix: Array2<f64>) -> Self {
        self.noise_matrix = Some(noise_matrix);
        self
    }

    pub fn with_inverse_noise_matrix(mut self, inverse_noise_matrix: Array2<f64>) -> Self {
        self.inverse_noise_matrix = Some(inverse_noise_matrix);
        self
    }

    pub fn with_pred_probs(mut self, pred_probs: Array2<f64>) -> Self {
        self.pred_probs = Some(pred_probs);
        self
    }

    fn has_matrix(&self) -> bool {
        self.noise_matrix.is_some() || self.inverse_noise_matrix.is_some()
    }
}

/// Everything estimated during the last call to `fit`.
#[derive(Debug, Clone)]
pub struct NoiseEstimates {
    pub noise_matrix: Array2<f64>,
    pub inverse_noise_matrix: Array2<f64>,
    /// Prior of the true labels.
    pub py: Array1<f64>,
    /// Marginal of the observed labels.
    pub ps: Array1<f64>,
    /// Only present when the joint was estimated from predicted probabilities.
    pub confident_joint: Option<ConfidentJoint>,
    pub pred_probs: Array2<f64>,
    /// `true` for the examples the final classifier was trained on.
    pub keep_mask: Vec<bool>,
    pub num_pruned: usize,
    /// Rounds of the convergence loop, 0 when it did not run.
    pub converge_iterations: usize,
}

/// Wraps a classifier and trains it on a pruned, noise-corrected view of the data.
pub struct NoisyLabelLearner {
    model: Box<dyn ClassifierModel>,
    config: CleanlabConfig,
    n_classes: usize,
    estimates: Option<NoiseEstimates>,
}

impl NoisyLabelLearner {
    pub fn new(model: Box<dyn ClassifierModel>, config: CleanlabConfig) -> Self {
        NoisyLabelLearner {
            model,
            config,
            n_classes: 0,
            estimates: None,
        }
    }

    /// Learner around a bundled model built from `model_config`.
    pub fn from_model_config(model_config: ModelConfig, config: CleanlabConfig) -> Self {
        Self::new(build_model(model_config), config)
    }

    pub fn config(&self) -> &CleanlabConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn ClassifierModel {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Box<dyn ClassifierModel> {
        self.model
    }

    /// Estimates from the last successful `fit`, if any.
    pub fn estimates(&self) -> Option<&NoiseEstimates> {
        self.estimates.as_ref()
    }

    /// Estimate label noise, prune likely label errors and fit the wrapped
    /// classifier on the remaining examples.
    ///
    /// # Arguments
    ///
    /// * `x` - Features, shape (n_samples, n_features)
    /// * `labels` - Observed (noisy) labels in `[0, K)`
    /// * `options` - Optional noise matrices or predicted probabilities
    ///
    /// # Errors
    ///
    /// * `InvalidNoiseMatrix` - a supplied matrix is not stochastic or has the wrong size
    /// * `EmptyPartition` - too few examples for the folds, or a class emptied by pruning
    /// * `ShapeMismatch` / `InvalidLabel` / `InvalidConfig` - malformed inputs
    /// * `Model` - the wrapped classifier failed
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        labels: &[usize],
        options: FitOptions,
    ) -> Result<&NoiseEstimates> {
        self.config.validate()?;
        if labels.is_empty() {
            return Err(CleanlabError::EmptyPartition(
                "no examples were provided".to_string(),
            ));
        }
        if x.nrows() != labels.len() {
            return Err(CleanlabError::shape(
                format!("{} feature rows", labels.len()),
                format!("{} rows", x.nrows()),
            ));
        }

        let n_classes = Self::resolve_n_classes(labels, &options)?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::info!(
            "Fitting {} on {} examples, {} classes ({})",
            self.model.name(),
            labels.len(),
            n_classes,
            self.config.prune_method
        );

        let label_counts = value_counts(labels, n_classes);
        let supplied = if options.has_matrix() {
            let ps = Array1::from_iter(
                label_counts
                    .iter()
                    .map(|&c| c as f64 / labels.len() as f64),
            );
            let (q, r, py) = Self::complete_matrices(&options, &ps)?;
            Some((q, r, py, ps))
        } else {
            None
        };

        let (pred_probs, cv_estimates) = match &options.pred_probs {
            Some(probs) => {
                if probs.nrows() != labels.len() {
                    return Err(CleanlabError::shape(
                        format!("{} rows of predicted probabilities", labels.len()),
                        format!("{} rows", probs.nrows()),
                    ));
                }
                log::debug!("Using supplied predicted probabilities");
                (conform_probabilities(probs.clone(), n_classes)?, None)
            }
            None if supplied.is_some() => {
                log::debug!("Noise matrix supplied; probing predicted probabilities in-sample");
                let mut probe = self.model.fresh();
                probe.fit(x, labels, None)?;
                (conform_probabilities(probe.predict_proba(x)?, n_classes)?, None)
            }
            None => {
                let (cj, latent, probs) = estimate_py_noise_matrices_and_cv_pred_proba(
                    self.model.as_ref(),
                    x,
                    labels,
                    n_classes,
                    self.config.n_folds,
                    self.config.parallelism,
                    &mut rng,
                )?;
                (probs, Some((cj, latent)))
            }
        };

        let prune_options = PruneOptions::from(&self.config);
        let has_matrix = supplied.is_some();

        let (mut noise_matrix, mut inverse_noise_matrix, mut py, ps, mut confident_joint, prune_counts) =
            if let Some((q, r, py, ps)) = supplied {
                let counts = prune_counts_from_inverse(&r, &label_counts)?;
                (q, r, py, ps, None, counts)
            } else {
                let (cj, latent) = match cv_estimates {
                    Some(estimated) => estimated,
                    None => {
                        let cj = compute_confident_joint(labels, &pred_probs, n_classes)?;
                        let latent = estimate_latent(&cj);
                        (cj, latent)
                    }
                };
                log::info!(
                    "Estimated {:.1} label errors from the confident joint",
                    cj.num_label_errors()
                );
                let counts = cj.counts.clone();
                let ps = cj.ps.clone();
                (
                    latent.noise_matrix,
                    latent.inverse_noise_matrix,
                    latent.py,
                    ps,
                    Some(cj),
                    counts,
                )
            };

        let mut keep_mask = find_label_issues(labels, &pred_probs, &prune_counts, &prune_options)?;
        let mut converge_iterations = 0;
        if self.config.converge_latent_estimates {
            if has_matrix {
                log::debug!("Supplied noise matrices are kept as is; skipping re-estimation");
            } else {
                let converged = prune_until_converged(
                    labels,
                    &pred_probs,
                    n_classes,
                    keep_mask,
                    &py,
                    &prune_options,
                )?;
                keep_mask = converged.keep_mask;
                converge_iterations = converged.iterations;
                noise_matrix = converged.latent.noise_matrix;
                inverse_noise_matrix = converged.latent.inverse_noise_matrix;
                py = converged.latent.py;
                confident_joint = Some(converged.confident_joint);
            }
        }

        let kept: Vec<usize> = keep_mask
            .iter()
            .enumerate()
            .filter_map(|(idx, &keep)| if keep { Some(idx) } else { None })
            .collect();
        let num_pruned = labels.len() - kept.len();
        log::info!(
            "Pruned {} of {} examples; training on {}",
            num_pruned,
            labels.len(),
            kept.len()
        );

        let x_kept = x.select(Axis(0), &kept);
        let y_kept: Vec<usize> = kept.iter().map(|&idx| labels[idx]).collect();
        let sample_weight = if self.config.use_sample_weights && self.model.supports_sample_weight() {
            Some(Self::sample_weights(&y_kept, &noise_matrix))
        } else {
            None
        };
        self.model.fit(&x_kept, &y_kept, sample_weight.as_deref())?;

        self.n_classes = n_classes;
        Ok(self.estimates.insert(NoiseEstimates {
            noise_matrix,
            inverse_noise_matrix,
            py,
            ps,
            confident_joint,
            pred_probs,
            keep_mask,
            num_pruned,
            converge_iterations,
        }))
    }

    /// Class probabilities from the fitted classifier, always `n_classes` wide.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.estimates.is_none() {
            return Err(CleanlabError::NotFitted);
        }
        conform_probabilities(self.model.predict_proba(x)?, self.n_classes)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.rows().into_iter().map(argmax).collect())
    }

    /// Accuracy of `predict(x)` against `labels`.
    pub fn score(&self, x: &Array2<f64>, labels: &[usize]) -> Result<f64> {
        let predictions = self.predict(x)?;
        accuracy_score(labels, &predictions)
    }

    /// K is the label range, widened by the supplied probabilities. A supplied
    /// matrix fixes K and must cover every label.
    fn resolve_n_classes(labels: &[usize], options: &FitOptions) -> Result<usize> {
        let from_labels = labels.iter().copied().max().unwrap_or(0) + 1;
        let from_probs = options.pred_probs.as_ref().map(|p| p.ncols()).unwrap_or(0);

        let dims: Vec<(usize, usize)> = options
            .noise_matrix
            .iter()
            .chain(options.inverse_noise_matrix.iter())
            .map(|m| m.dim())
            .collect();
        let n_classes = match dims.first() {
            Some(&(rows, _)) => {
                if dims.iter().any(|&(r, c)| r != rows || c != rows) {
                    return Err(CleanlabError::InvalidNoiseMatrix(format!(
                        "supplied matrices must be square and of equal size, got {:?}",
                        dims
                    )));
                }
                if from_labels > rows {
                    return Err(CleanlabError::InvalidNoiseMatrix(format!(
                        "{}x{} matrix cannot describe labels spanning {} classes",
                        rows, rows, from_labels
                    )));
                }
                rows
            }
            None => from_labels,
        };
        if from_probs > n_classes && !dims.is_empty() {
            return Err(CleanlabError::shape(
                format!("at most {} probability columns", n_classes),
                format!("{} columns", from_probs),
            ));
        }
        Ok(n_classes.max(from_probs))
    }

    /// Validate the supplied matrices and derive whichever is missing.
    fn complete_matrices(
        options: &FitOptions,
        ps: &Array1<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>, Array1<f64>)> {
        if let Some(q) = &options.noise_matrix {
            if !is_column_stochastic(q, STOCHASTIC_TOL) {
                return Err(CleanlabError::InvalidNoiseMatrix(
                    "noise matrix columns must be non-negative and sum to 1".to_string(),
                ));
            }
        }
        if let Some(r) = &options.inverse_noise_matrix {
            if !is_row_stochastic(r, STOCHASTIC_TOL) {
                return Err(CleanlabError::InvalidNoiseMatrix(
                    "inverse noise matrix rows must be non-negative and sum to 1".to_string(),
                ));
            }
        }

        match (&options.noise_matrix, &options.inverse_noise_matrix) {
            (Some(q), Some(r)) => {
                let py = compute_py(ps, q, r, PyMethod::Count)?;
                Ok((q.clone(), r.clone(), py))
            }
            (Some(q), None) => {
                let py = compute_py_from_noise_matrix(q, ps)?;
                let (r, _) = compute_inv_noise_matrix(q, &py)?;
                Ok((q.clone(), r, py))
            }
            (None, Some(r)) => {
                let (q, py) = compute_noise_matrix_from_inverse(r, ps)?;
                Ok((q, r.clone(), py))
            }
            (None, None) => Err(CleanlabError::InvalidConfig(
                "no noise matrix was supplied".to_string(),
            )),
        }
    }

    /// Weight each kept example of class `k` by `1 / P(s = k | y = k)`.
    fn sample_weights(labels: &[usize], noise_matrix: &Array2<f64>) -> Vec<f64> {
        labels
            .iter()
            .map(|&k| {
                let diag = noise_matrix[[k, k]];
                if diag > 0.0 {
                    1.0 / diag
                } else {
                    1.0
                }
            })
            .collect()
    }
}

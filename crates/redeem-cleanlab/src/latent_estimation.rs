//! Out-of-sample probability estimation and latent noise estimates.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rayon::prelude::*;

use crate::confident_joint::{compute_confident_joint, ConfidentJoint};
use crate::data_handling::{stratified_k_fold, Fold};
use crate::error::{CleanlabError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Noise matrices and prior derived from a confident joint.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentEstimates {
    pub py: Array1<f64>,
    /// `P(s = i | y = j)`, column-stochastic
    pub noise_matrix: Array2<f64>,
    /// `P(y = j | s = i)`, row-stochastic
    pub inverse_noise_matrix: Array2<f64>,
}

/// Normalise the confident joint by column (noise matrix) and by row (inverse
/// noise matrix). An all-zero column or row is treated as noise free and
/// replaced by the matching identity column or row.
pub fn estimate_latent(cj: &ConfidentJoint) -> LatentEstimates {
    let k = cj.n_classes();
    let col_sums = cj.counts.sum_axis(Axis(0));
    let row_sums = cj.counts.sum_axis(Axis(1));

    let mut noise_matrix = Array2::<f64>::zeros((k, k));
    let mut inverse_noise_matrix = Array2::<f64>::zeros((k, k));
    for j in 0..k {
        if col_sums[j] > 0.0 {
            for i in 0..k {
                noise_matrix[[i, j]] = cj.counts[[i, j]] / col_sums[j];
            }
        } else {
            log::warn!("No examples attributed to latent class {}; assuming it is noise free", j);
            noise_matrix[[j, j]] = 1.0;
        }
    }
    for i in 0..k {
        if row_sums[i] > 0.0 {
            for j in 0..k {
                inverse_noise_matrix[[i, j]] = cj.counts[[i, j]] / row_sums[i];
            }
        } else {
            inverse_noise_matrix[[i, i]] = 1.0;
        }
    }

    LatentEstimates {
        py: cj.py.clone(),
        noise_matrix,
        inverse_noise_matrix,
    }
}

/// Bring a classifier's probability output to exactly `n_classes` columns.
///
/// Models only emit columns up to the largest label they were trained on, so
/// missing trailing columns are zero-filled. Rows are renormalised; an all-zero
/// row becomes uniform.
pub(crate) fn conform_probabilities(probs: Array2<f64>, n_classes: usize) -> Result<Array2<f64>> {
    let (rows, cols) = probs.dim();
    if cols > n_classes {
        return Err(CleanlabError::shape(
            format!("at most {} probability columns", n_classes),
            format!("{} columns", cols),
        ));
    }
    let mut out = Array2::<f64>::zeros((rows, n_classes));
    for r in 0..rows {
        let total: f64 = probs.row(r).iter().filter(|v| v.is_finite()).map(|v| v.max(0.0)).sum();
        for c in 0..n_classes {
            out[[r, c]] = if total > 0.0 {
                if c < cols && probs[[r, c]].is_finite() {
                    probs[[r, c]].max(0.0) / total
                } else {
                    0.0
                }
            } else {
                1.0 / n_classes as f64
            };
        }
    }
    Ok(out)
}

fn predict_fold(
    model: &dyn ClassifierModel,
    x: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    fold_idx: usize,
    fold: &Fold,
) -> Result<(Vec<usize>, Array2<f64>)> {
    log::debug!(
        "Cross-validation fold {}: training on {} examples, predicting {}",
        fold_idx,
        fold.train_indices.len(),
        fold.test_indices.len()
    );
    let mut fold_model = model.fresh();
    let x_train = x.select(Axis(0), &fold.train_indices);
    let y_train: Vec<usize> = fold.train_indices.iter().map(|&i| labels[i]).collect();
    fold_model.fit(&x_train, &y_train, None)?;

    let x_test = x.select(Axis(0), &fold.test_indices);
    let probs = conform_probabilities(fold_model.predict_proba(&x_test)?, n_classes)?;
    Ok((fold.test_indices.clone(), probs))
}

/// Out-of-sample predicted probabilities via stratified k-fold cross-validation.
///
/// Every fold trains a fresh instance obtained from `model.fresh()`, so no
/// fitted state crosses folds. With `parallelism > 1` the folds run on a
/// dedicated rayon pool of that size; each fold returns the rows it owns and
/// they are scattered into the output after all folds have joined. The first
/// failing fold aborts the whole estimation.
///
/// # Arguments
///
/// * `model` - Prototype classifier; never fitted itself
/// * `x` - Features, shape (n_samples, n_features)
/// * `labels` - Observed (noisy) labels, shape (n_samples,)
/// * `n_classes` - Number of classes K
/// * `n_folds` - Number of folds
/// * `parallelism` - Number of worker threads
/// * `rng` - Random source used to shuffle the folds
///
/// # Returns
///
/// The probability matrix, shape (n_samples, n_classes).
pub fn estimate_cv_predicted_probabilities<R: Rng + ?Sized>(
    model: &dyn ClassifierModel,
    x: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    n_folds: usize,
    parallelism: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if x.nrows() != labels.len() {
        return Err(CleanlabError::shape(
            format!("{} feature rows", labels.len()),
            format!("{} rows", x.nrows()),
        ));
    }
    let folds = stratified_k_fold(labels, n_classes, n_folds, rng)?;
    log::info!(
        "Estimating out-of-sample probabilities with {}-fold cross-validation ({} worker{})",
        n_folds,
        parallelism,
        if parallelism == 1 { "" } else { "s" }
    );

    let results: Vec<(Vec<usize>, Array2<f64>)> = if parallelism > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .map_err(|e| CleanlabError::InvalidConfig(format!("failed to build thread pool: {}", e)))?;
        pool.install(|| {
            folds
                .par_iter()
                .enumerate()
                .map(|(i, fold)| predict_fold(model, x, labels, n_classes, i, fold))
                .collect::<Result<Vec<_>>>()
        })?
    } else {
        folds
            .iter()
            .enumerate()
            .map(|(i, fold)| predict_fold(model, x, labels, n_classes, i, fold))
            .collect::<Result<Vec<_>>>()?
    };

    let mut pred_probs = Array2::<f64>::zeros((labels.len(), n_classes));
    for (test_indices, probs) in results {
        for (row, &idx) in test_indices.iter().enumerate() {
            pred_probs.row_mut(idx).assign(&probs.row(row));
        }
    }
    Ok(pred_probs)
}

/// Cross-validated probabilities, the confident joint built from them and the
/// latent estimates derived from the joint.
pub fn estimate_py_noise_matrices_and_cv_pred_proba<R: Rng + ?Sized>(
    model: &dyn ClassifierModel,
    x: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    n_folds: usize,
    parallelism: usize,
    rng: &mut R,
) -> Result<(ConfidentJoint, LatentEstimates, Array2<f64>)> {
    let pred_probs =
        estimate_cv_predicted_probabilities(model, x, labels, n_classes, n_folds, parallelism, rng)?;
    let cj = compute_confident_joint(labels, &pred_probs, n_classes)?;
    let latent = estimate_latent(&cj);
    Ok((cj, latent, pred_probs))
}

//! Confident joint estimation.
//!
//! The confident joint `C[i, j]` counts examples observed with label `i` whose
//! out-of-sample predicted probabilities point to latent class `j`. A class
//! only "claims" an example when the predicted probability reaches that
//! class's threshold, the average self-confidence of examples labelled with it.

use ndarray::{Array1, Array2, Axis};
use statrs::statistics::Statistics;

use crate::error::{CleanlabError, Result};
use crate::math::{argmax, value_counts};

/// Estimated joint of noisy and latent labels plus the quantities derived with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidentJoint {
    /// `K x K` counts indexed `[noisy, latent]`, summing to the number of examples.
    pub counts: Array2<f64>,
    /// Per-class confidence thresholds. Infinite for classes never observed.
    pub thresholds: Array1<f64>,
    /// Latent class each example was attributed to.
    pub latent_labels: Vec<usize>,
    /// True-class prior, the normalised column sums of `counts`.
    pub py: Array1<f64>,
    /// Noisy-label marginal, the normalised row sums of `counts`.
    pub ps: Array1<f64>,
    /// Set when an unobserved class forced `py` back to uniform.
    pub prior_is_fallback: bool,
}

impl ConfidentJoint {
    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Total off-diagonal mass, the estimated number of label errors.
    pub fn num_label_errors(&self) -> f64 {
        let k = self.n_classes();
        self.counts.sum() - (0..k).map(|i| self.counts[[i, i]]).sum::<f64>()
    }
}

/// Check that labels and probabilities describe the same examples and classes.
pub(crate) fn validate_labels_and_probs(
    labels: &[usize],
    pred_probs: &Array2<f64>,
    n_classes: usize,
) -> Result<()> {
    if labels.is_empty() {
        return Err(CleanlabError::EmptyPartition(
            "no examples were provided".to_string(),
        ));
    }
    if pred_probs.nrows() != labels.len() {
        return Err(CleanlabError::shape(
            format!("{} rows of predicted probabilities", labels.len()),
            format!("{} rows", pred_probs.nrows()),
        ));
    }
    if pred_probs.ncols() != n_classes {
        return Err(CleanlabError::shape(
            format!("{} probability columns", n_classes),
            format!("{} columns", pred_probs.ncols()),
        ));
    }
    if let Some((index, &label)) = labels.iter().enumerate().find(|(_, &l)| l >= n_classes) {
        return Err(CleanlabError::InvalidLabel {
            label,
            index,
            n_classes,
        });
    }
    Ok(())
}

/// Per-class thresholds `t_j = mean(P[n, j] | s_n = j)`.
///
/// Classes without observed examples get `f64::INFINITY` so they never qualify.
pub fn compute_thresholds(
    labels: &[usize],
    pred_probs: &Array2<f64>,
    n_classes: usize,
) -> Array1<f64> {
    (0..n_classes)
        .map(|j| {
            let self_confidence: Vec<f64> = labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == j)
                .map(|(n, _)| pred_probs[[n, j]])
                .collect();
            if self_confidence.is_empty() {
                f64::INFINITY
            } else {
                self_confidence.iter().mean()
            }
        })
        .collect()
}

/// Latent class for one row: the most probable class among those reaching their
/// threshold, or the plain argmax when none does.
fn attribute_latent_class(probs: ndarray::ArrayView1<f64>, thresholds: &Array1<f64>) -> usize {
    let mut best: Option<usize> = None;
    for (k, &p) in probs.iter().enumerate() {
        if p >= thresholds[k] {
            match best {
                Some(b) if probs[b] >= p => {}
                _ => best = Some(k),
            }
        }
    }
    best.unwrap_or_else(|| argmax(probs))
}

/// Estimate the confident joint from out-of-sample predicted probabilities.
///
/// # Arguments
///
/// * `labels` - Observed (noisy) labels, shape (n_samples,)
/// * `pred_probs` - Out-of-sample predicted probabilities, shape (n_samples, n_classes)
/// * `n_classes` - Number of classes K
///
/// # Returns
///
/// The confident joint, normalised so that its entries sum to n_samples.
pub fn compute_confident_joint(
    labels: &[usize],
    pred_probs: &Array2<f64>,
    n_classes: usize,
) -> Result<ConfidentJoint> {
    validate_labels_and_probs(labels, pred_probs, n_classes)?;

    let n = labels.len();
    let thresholds = compute_thresholds(labels, pred_probs, n_classes);
    log::trace!("Per-class thresholds: {:?}", thresholds.to_vec());

    let mut counts = Array2::<f64>::zeros((n_classes, n_classes));
    let latent_labels: Vec<usize> = labels
        .iter()
        .enumerate()
        .map(|(idx, &label)| {
            let latent = attribute_latent_class(pred_probs.row(idx), &thresholds);
            counts[[label, latent]] += 1.0;
            latent
        })
        .collect();

    let total = counts.sum();
    if total > 0.0 {
        counts.mapv_inplace(|v| v * n as f64 / total);
    }

    let ps = counts.sum_axis(Axis(1)) / n as f64;
    let label_counts = value_counts(labels, n_classes);
    let missing: Vec<usize> = (0..n_classes).filter(|&k| label_counts[k] == 0).collect();

    let (py, prior_is_fallback) = if missing.is_empty() {
        (counts.sum_axis(Axis(0)) / n as f64, false)
    } else {
        log::warn!(
            "Classes {:?} have no observed examples; falling back to a uniform prior",
            missing
        );
        (Array1::from_elem(n_classes, 1.0 / n_classes as f64), true)
    };

    Ok(ConfidentJoint {
        counts,
        thresholds,
        latent_labels,
        py,
        ps,
        prior_is_fallback,
    })
}

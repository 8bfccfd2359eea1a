//! Pruning of likely mislabelled examples.
//!
//! Every policy works from a `K x K` matrix of expected `(noisy, latent)`
//! counts. The off-diagonal entries say how many examples of each observed
//! class are believed to belong elsewhere; the predicted probabilities decide
//! which concrete examples those are.

use ndarray::{Array1, Array2, Axis};

use crate::config::{CleanlabConfig, PruneMethod};
use crate::confident_joint::{compute_confident_joint, validate_labels_and_probs, ConfidentJoint};
use crate::error::{CleanlabError, Result};
use crate::latent_estimation::{estimate_latent, LatentEstimates};
use crate::math::{assert_square, l1_distance};

/// Upper bound on re-estimation rounds when converging latent estimates.
pub const MAX_CONVERGE_ITERS: usize = 5;

/// Stop re-estimating once the L1 change of `py` between rounds falls below this.
pub const CONVERGENCE_TOL: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneOptions {
    pub prune_method: PruneMethod,
    pub frac_noise: f64,
    pub min_examples_per_class: usize,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            prune_method: PruneMethod::default(),
            frac_noise: 1.0,
            min_examples_per_class: 1,
        }
    }
}

impl From<&CleanlabConfig> for PruneOptions {
    fn from(config: &CleanlabConfig) -> Self {
        Self {
            prune_method: config.prune_method,
            frac_noise: config.frac_noise,
            min_examples_per_class: config.min_examples_per_class,
        }
    }
}

/// Indices of the examples observed with each class.
fn indices_by_class(labels: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut by_class = vec![Vec::new(); n_classes];
    for (idx, &label) in labels.iter().enumerate() {
        by_class[label].push(idx);
    }
    by_class
}

fn num_to_prune(expected: f64, frac_noise: f64, available: usize) -> usize {
    let n = (expected * frac_noise).round();
    if n <= 0.0 {
        0
    } else {
        (n as usize).min(available)
    }
}

/// For each observed class `i`, flag the `sum_{j != i} counts[i, j]` examples
/// labelled `i` with the lowest self-confidence `P[n, i]`.
fn noise_mask_by_class(
    by_class: &[Vec<usize>],
    pred_probs: &Array2<f64>,
    prune_counts: &Array2<f64>,
    frac_noise: f64,
) -> Vec<bool> {
    let mut noise = vec![false; pred_probs.nrows()];
    for (i, members) in by_class.iter().enumerate() {
        let off_diagonal = prune_counts.row(i).sum() - prune_counts[[i, i]];
        let n_prune = num_to_prune(off_diagonal, frac_noise, members.len());
        if n_prune == 0 {
            continue;
        }
        let mut ranked = members.clone();
        ranked.sort_by(|&a, &b| pred_probs[[a, i]].total_cmp(&pred_probs[[b, i]]));
        for &idx in ranked.iter().take(n_prune) {
            noise[idx] = true;
        }
        log::debug!("prune_by_class: class {} flags {} of {}", i, n_prune, members.len());
    }
    noise
}

/// For each latent class `j` and observed class `i != j`, flag the
/// `counts[i, j]` examples labelled `i` with the largest margin `P[n, j] - P[n, i]`.
fn noise_mask_by_noise_rate(
    by_class: &[Vec<usize>],
    pred_probs: &Array2<f64>,
    prune_counts: &Array2<f64>,
    frac_noise: f64,
) -> Vec<bool> {
    let k = prune_counts.nrows();
    let mut noise = vec![false; pred_probs.nrows()];
    for j in 0..k {
        for (i, members) in by_class.iter().enumerate() {
            if i == j {
                continue;
            }
            let n_prune = num_to_prune(prune_counts[[i, j]], frac_noise, members.len());
            if n_prune == 0 {
                continue;
            }
            let margin = |n: usize| pred_probs[[n, j]] - pred_probs[[n, i]];
            let mut ranked = members.clone();
            ranked.sort_by(|&a, &b| margin(b).total_cmp(&margin(a)));
            for &idx in ranked.iter().take(n_prune) {
                noise[idx] = true;
            }
            log::trace!(
                "prune_by_noise_rate: {} examples labelled {} flagged as latent {}",
                n_prune,
                i,
                j
            );
        }
    }
    noise
}

/// Give back the most self-confident examples of any class that pruning would
/// leave below `min_keep` survivors.
fn retain_per_class(
    noise: &mut [bool],
    by_class: &[Vec<usize>],
    pred_probs: &Array2<f64>,
    min_keep: usize,
) -> Result<()> {
    for (i, members) in by_class.iter().enumerate() {
        if members.is_empty() {
            continue;
        }
        let kept = members.iter().filter(|&&idx| !noise[idx]).count();
        if kept == 0 && min_keep == 0 {
            return Err(CleanlabError::EmptyPartition(format!(
                "pruning removed every example of class {} and retention is disabled",
                i
            )));
        }
        let target = min_keep.min(members.len());
        if kept >= target {
            continue;
        }
        let mut flagged: Vec<usize> = members.iter().copied().filter(|&idx| noise[idx]).collect();
        flagged.sort_by(|&a, &b| pred_probs[[b, i]].total_cmp(&pred_probs[[a, i]]));
        for &idx in flagged.iter().take(target - kept) {
            noise[idx] = false;
        }
        log::warn!(
            "Pruning would leave class {} with {} examples; retaining {}",
            i,
            kept,
            target
        );
    }
    Ok(())
}

/// Identify reliably labelled examples.
///
/// # Arguments
///
/// * `labels` - Observed (noisy) labels, shape (n_samples,)
/// * `pred_probs` - Out-of-sample predicted probabilities, shape (n_samples, n_classes)
/// * `prune_counts` - Expected `(noisy, latent)` counts, shape (n_classes, n_classes),
///   usually the confident joint
/// * `options` - Pruning policy and retention settings
///
/// # Returns
///
/// A keep-mask of length n_samples where `true` marks an example to train on.
pub fn find_label_issues(
    labels: &[usize],
    pred_probs: &Array2<f64>,
    prune_counts: &Array2<f64>,
    options: &PruneOptions,
) -> Result<Vec<bool>> {
    let k = assert_square(prune_counts, "prune count matrix")?;
    validate_labels_and_probs(labels, pred_probs, k)?;

    let by_class = indices_by_class(labels, k);
    let mut noise = match options.prune_method {
        PruneMethod::PruneByClass => {
            noise_mask_by_class(&by_class, pred_probs, prune_counts, options.frac_noise)
        }
        PruneMethod::PruneByNoiseRate => {
            noise_mask_by_noise_rate(&by_class, pred_probs, prune_counts, options.frac_noise)
        }
        PruneMethod::Both => {
            let by_class_mask =
                noise_mask_by_class(&by_class, pred_probs, prune_counts, options.frac_noise);
            let by_rate_mask =
                noise_mask_by_noise_rate(&by_class, pred_probs, prune_counts, options.frac_noise);
            by_class_mask
                .iter()
                .zip(by_rate_mask.iter())
                .map(|(&a, &b)| a && b)
                .collect()
        }
    };

    retain_per_class(&mut noise, &by_class, pred_probs, options.min_examples_per_class)?;

    let n_flagged = noise.iter().filter(|&&flag| flag).count();
    log::debug!(
        "{} flagged {} of {} examples",
        options.prune_method,
        n_flagged,
        labels.len()
    );
    Ok(noise.into_iter().map(|flag| !flag).collect())
}

/// Expected `(noisy, latent)` counts implied by an inverse noise matrix:
/// `counts[i, j] = R[i, j] * n_i` with `n_i` the number of examples labelled `i`.
pub fn prune_counts_from_inverse(
    inverse_noise_matrix: &Array2<f64>,
    label_counts: &[usize],
) -> Result<Array2<f64>> {
    let k = assert_square(inverse_noise_matrix, "inverse noise matrix")?;
    if label_counts.len() != k {
        return Err(CleanlabError::shape(
            format!("{} label counts", k),
            format!("{}", label_counts.len()),
        ));
    }
    let n_i = Array1::from_iter(label_counts.iter().map(|&c| c as f64));
    Ok(inverse_noise_matrix * &n_i.insert_axis(Axis(1)))
}

/// Outcome of iterated pruning.
#[derive(Debug, Clone)]
pub struct ConvergedPrune {
    pub keep_mask: Vec<bool>,
    /// Confident joint estimated on the last kept subset.
    pub confident_joint: ConfidentJoint,
    pub latent: LatentEstimates,
    pub iterations: usize,
}

/// Fixed-point re-estimation: estimate the confident joint on the kept subset,
/// prune that subset again, and repeat until `py` moves less than
/// [`CONVERGENCE_TOL`] in L1, nothing new is pruned, or
/// [`MAX_CONVERGE_ITERS`] rounds have run.
pub fn prune_until_converged(
    labels: &[usize],
    pred_probs: &Array2<f64>,
    n_classes: usize,
    initial_keep: Vec<bool>,
    initial_py: &Array1<f64>,
    options: &PruneOptions,
) -> Result<ConvergedPrune> {
    validate_labels_and_probs(labels, pred_probs, n_classes)?;
    if initial_keep.len() != labels.len() {
        return Err(CleanlabError::shape(
            format!("keep mask of length {}", labels.len()),
            format!("length {}", initial_keep.len()),
        ));
    }

    let mut keep = initial_keep;
    let mut py_prev = initial_py.clone();
    let mut last: Option<(ConfidentJoint, LatentEstimates)> = None;
    let mut iterations = 0;

    while iterations < MAX_CONVERGE_ITERS {
        iterations += 1;
        let subset: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(idx, &k)| if k { Some(idx) } else { None })
            .collect();
        let sub_labels: Vec<usize> = subset.iter().map(|&idx| labels[idx]).collect();
        let sub_probs = pred_probs.select(Axis(0), &subset);

        let cj = compute_confident_joint(&sub_labels, &sub_probs, n_classes)?;
        let latent = estimate_latent(&cj);
        let delta = l1_distance(&latent.py, &py_prev);

        let sub_keep = find_label_issues(&sub_labels, &sub_probs, &cj.counts, options)?;
        let mut newly_pruned = 0;
        for (pos, &idx) in subset.iter().enumerate() {
            if !sub_keep[pos] {
                keep[idx] = false;
                newly_pruned += 1;
            }
        }

        log::debug!(
            "Convergence round {}: |delta py|_1 = {:.6}, newly pruned = {}",
            iterations,
            delta,
            newly_pruned
        );

        py_prev = latent.py.clone();
        last = Some((cj, latent));
        if delta < CONVERGENCE_TOL || newly_pruned == 0 {
            break;
        }
    }

    match last {
        Some((confident_joint, latent)) => Ok(ConvergedPrune {
            keep_mask: keep,
            confident_joint,
            latent,
            iterations,
        }),
        None => Err(CleanlabError::InvalidConfig(
            "convergence loop ran zero iterations".to_string(),
        )),
    }
}

//! Synthetic label noise for evaluation and demos.
//!
//! Noisy labels are drawn independently per example from the column of the
//! noise matrix indexed by the true label. All randomness comes from the
//! caller's `Rng`.

use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{CleanlabError, Result};
use crate::latent_algebra::compute_ps;
use crate::math::{assert_square, is_column_stochastic, STOCHASTIC_TOL};

/// Rejection-sampling budget for [`generate_noise_matrix_from_trace`].
pub const MAX_TRACE_ATTEMPTS: usize = 10_000;

/// Flip `true_labels` according to `noise_matrix`, where
/// `noise_matrix[[i, j]] = P(noisy = i | true = j)`.
///
/// # Errors
///
/// `InvalidNoiseMatrix` when the matrix is not square and column-stochastic,
/// `InvalidLabel` when a true label has no column in the matrix.
pub fn generate_noisy_labels<R: Rng + ?Sized>(
    true_labels: &[usize],
    noise_matrix: &Array2<f64>,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let k = assert_square(noise_matrix, "noise matrix")
        .map_err(|e| CleanlabError::InvalidNoiseMatrix(e.to_string()))?;
    if !is_column_stochastic(noise_matrix, STOCHASTIC_TOL) {
        return Err(CleanlabError::InvalidNoiseMatrix(
            "columns must be non-negative and sum to 1".to_string(),
        ));
    }

    let columns = (0..k)
        .map(|j| {
            WeightedIndex::new(noise_matrix.column(j).iter().map(|&w| w.max(0.0)))
                .map_err(|e| CleanlabError::InvalidNoiseMatrix(format!("column {}: {}", j, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut noisy = Vec::with_capacity(true_labels.len());
    for (index, &label) in true_labels.iter().enumerate() {
        let column = columns.get(label).ok_or(CleanlabError::InvalidLabel {
            label,
            index,
            n_classes: k,
        })?;
        noisy.push(column.sample(rng));
    }

    let flipped = noisy
        .iter()
        .zip(true_labels.iter())
        .filter(|(a, b)| a != b)
        .count();
    log::debug!("Flipped {} of {} labels", flipped, true_labels.len());
    Ok(noisy)
}

/// Whether a noise matrix still lets the true classes be learned: every noisy
/// class must be more likely among its own true class than overall, i.e.
/// `P(s = k) < P(s = k | y = k)` for every `k`.
pub fn noise_matrix_is_valid(noise_matrix: &Array2<f64>, py: &Array1<f64>) -> bool {
    if noise_matrix.nrows() != noise_matrix.ncols() || py.len() != noise_matrix.nrows() {
        return false;
    }
    if !is_column_stochastic(noise_matrix, STOCHASTIC_TOL) {
        return false;
    }
    let ps = compute_ps(noise_matrix, py);
    (0..py.len()).all(|k| ps[k] < noise_matrix[[k, k]])
}

/// Draw a random `k x k` column-stochastic noise matrix whose diagonal sums to
/// `trace`.
///
/// Diagonal entries are spread around `trace / k`; the remaining mass of each
/// column goes to the off-diagonal rows in random proportions. With
/// `valid_noise_matrix` set, draws are repeated until
/// [`noise_matrix_is_valid`] holds for `py`, which is then required.
pub fn generate_noise_matrix_from_trace<R: Rng + ?Sized>(
    k: usize,
    trace: f64,
    py: Option<&Array1<f64>>,
    valid_noise_matrix: bool,
    rng: &mut R,
) -> Result<Array2<f64>> {
    if k == 0 {
        return Err(CleanlabError::InvalidConfig(
            "noise matrix needs at least one class".to_string(),
        ));
    }
    if !(trace > 0.0 && trace <= k as f64) {
        return Err(CleanlabError::InvalidConfig(format!(
            "trace must be in (0, {}], got {}",
            k, trace
        )));
    }
    if k == 1 || (trace - k as f64).abs() < f64::EPSILON {
        return Ok(Array2::eye(k));
    }

    let py = match (valid_noise_matrix, py) {
        (true, Some(py)) if py.len() == k => Some(py),
        (true, Some(py)) => {
            return Err(CleanlabError::shape(
                format!("py of length {}", k),
                format!("length {}", py.len()),
            ))
        }
        (true, None) => {
            return Err(CleanlabError::InvalidConfig(
                "py is required to generate a valid noise matrix".to_string(),
            ))
        }
        (false, _) => None,
    };
    if valid_noise_matrix && trace <= 1.0 {
        return Err(CleanlabError::InvalidConfig(format!(
            "a valid noise matrix needs trace > 1, got {}",
            trace
        )));
    }

    let mean_diag = trace / k as f64;
    let spread = mean_diag.min(1.0 - mean_diag);

    for attempt in 1..=MAX_TRACE_ATTEMPTS {
        let jitter: Vec<f64> = (0..k).map(|_| rng.gen::<f64>()).collect();
        let jitter_mean = jitter.iter().sum::<f64>() / k as f64;

        let mut matrix = Array2::<f64>::zeros((k, k));
        for j in 0..k {
            let diag = (mean_diag + (jitter[j] - jitter_mean) * spread).clamp(0.0, 1.0);
            matrix[[j, j]] = diag;

            let shares: Vec<f64> = (0..k - 1).map(|_| rng.gen::<f64>() + 1e-12).collect();
            let share_total: f64 = shares.iter().sum();
            let mut rows = (0..k).filter(|&i| i != j);
            for share in shares {
                if let Some(i) = rows.next() {
                    matrix[[i, j]] = (1.0 - diag) * share / share_total;
                }
            }
        }

        match py {
            Some(py) if !noise_matrix_is_valid(&matrix, py) => continue,
            _ => {
                log::trace!("Noise matrix with trace {} drawn after {} attempt(s)", trace, attempt);
                return Ok(matrix);
            }
        }
    }

    Err(CleanlabError::InvalidConfig(format!(
        "no valid noise matrix with trace {} found in {} attempts",
        trace, MAX_TRACE_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_identity_noise_keeps_labels() {
        let true_labels = vec![0, 0, 1, 1, 2, 2];
        let mut rng = StdRng::seed_from_u64(42);
        let noisy = generate_noisy_labels(&true_labels, &Array2::eye(3), &mut rng).unwrap();
        assert_eq!(noisy, true_labels);
    }

    #[test]
    fn test_flip_rate_follows_matrix() {
        let q = array![[0.7, 0.0], [0.3, 1.0]];
        let true_labels = vec![0usize; 5000];
        let mut rng = StdRng::seed_from_u64(1);
        let noisy = generate_noisy_labels(&true_labels, &q, &mut rng).unwrap();
        let flipped = noisy.iter().filter(|&&l| l == 1).count() as f64 / 5000.0;
        assert!((flipped - 0.3).abs() < 0.03);
    }

    #[test]
    fn test_same_seed_same_labels() {
        let q = array![[0.5, 0.2], [0.5, 0.8]];
        let true_labels: Vec<usize> = (0..50).map(|i| i % 2).collect();
        let a = generate_noisy_labels(&true_labels, &q, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = generate_noisy_labels(&true_labels, &q, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let mut rng = StdRng::seed_from_u64(0);
        let not_stochastic = array![[0.5, 0.5], [0.4, 0.5]];
        assert!(matches!(
            generate_noisy_labels(&[0, 1], &not_stochastic, &mut rng),
            Err(CleanlabError::InvalidNoiseMatrix(_))
        ));
        assert!(matches!(
            generate_noisy_labels(&[0, 2], &Array2::eye(2), &mut rng),
            Err(CleanlabError::InvalidLabel { label: 2, index: 1, .. })
        ));
    }

    #[test]
    fn test_validity_check() {
        let py = array![0.5, 0.5];
        assert!(noise_matrix_is_valid(&array![[0.8, 0.3], [0.2, 0.7]], &py));
        // Noisy class 0 is more common overall than among true class 0.
        assert!(!noise_matrix_is_valid(&array![[0.4, 0.5], [0.6, 0.5]], &py));
    }

    #[test]
    fn test_generate_from_trace() {
        let py = array![0.3, 0.3, 0.4];
        let mut rng = StdRng::seed_from_u64(5);
        let q = generate_noise_matrix_from_trace(3, 2.1, Some(&py), true, &mut rng).unwrap();
        assert!(is_column_stochastic(&q, 1e-9));
        let trace: f64 = (0..3).map(|i| q[[i, i]]).sum();
        assert!((trace - 2.1).abs() < 1e-9);
        assert!(noise_matrix_is_valid(&q, &py));

        assert!(generate_noise_matrix_from_trace(3, 2.1, None, true, &mut rng).is_err());
        assert!(generate_noise_matrix_from_trace(3, 3.5, None, false, &mut rng).is_err());
        assert_eq!(
            generate_noise_matrix_from_trace(2, 2.0, None, false, &mut rng).unwrap(),
            Array2::<f64>::eye(2)
        );
    }
}

use ndarray::Array2;

use crate::error::{CleanlabError, Result};

fn check_same_len(a: &[usize], b: &[usize]) -> Result<()> {
    if a.len() != b.len() {
        return Err(CleanlabError::shape(
            format!("{} labels", a.len()),
            format!("{} labels", b.len()),
        ));
    }
    Ok(())
}

/// Fraction of positions where `y_pred` agrees with `y_true`.
///
/// # Arguments
///
/// * `y_true` - Reference labels.
/// * `y_pred` - Predicted labels, same length as `y_true`.
///
/// # Returns
///
/// Accuracy in [0, 1]. An empty input scores 0.
pub fn accuracy_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_same_len(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, b)| a == b)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Fraction of labels that differ between the true and the noisy vector.
pub fn fraction_mislabeled(true_labels: &[usize], noisy_labels: &[usize]) -> Result<f64> {
    Ok(1.0 - accuracy_score(true_labels, noisy_labels)?)
}

/// Empirical noise matrix `Q[i, j] = #(noisy = i, true = j) / #(true = j)`.
///
/// Columns of classes absent from `true_labels` are left as identity columns.
pub fn empirical_noise_matrix(
    true_labels: &[usize],
    noisy_labels: &[usize],
    n_classes: usize,
) -> Result<Array2<f64>> {
    check_same_len(true_labels, noisy_labels)?;
    let mut counts = Array2::<f64>::zeros((n_classes, n_classes));
    for (index, (&y, &s)) in true_labels.iter().zip(noisy_labels.iter()).enumerate() {
        let label = y.max(s);
        if label >= n_classes {
            return Err(CleanlabError::InvalidLabel {
                label,
                index,
                n_classes,
            });
        }
        counts[[s, y]] += 1.0;
    }
    for j in 0..n_classes {
        let total: f64 = counts.column(j).sum();
        if total > 0.0 {
            counts.column_mut(j).mapv_inplace(|v| v / total);
        } else {
            counts[[j, j]] = 1.0;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_score() {
        assert_eq!(accuracy_score(&[0, 1, 2, 2], &[0, 1, 1, 2]).unwrap(), 0.75);
        assert_eq!(accuracy_score(&[], &[]).unwrap(), 0.0);
        assert!(accuracy_score(&[0], &[0, 1]).is_err());
    }

    #[test]
    fn test_fraction_mislabeled() {
        let f = fraction_mislabeled(&[0, 0, 1, 1], &[0, 1, 1, 1]).unwrap();
        assert!((f - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empirical_noise_matrix() {
        let y = [0, 0, 0, 0, 1, 1];
        let s = [0, 0, 0, 1, 1, 1];
        let q = empirical_noise_matrix(&y, &s, 3).unwrap();
        let expected = array![[0.75, 0.0, 0.0], [0.25, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(q, expected);
        assert!(empirical_noise_matrix(&y, &s, 1).is_err());
    }
}

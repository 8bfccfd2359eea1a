use ndarray::{Array2, Axis};

use crate::error::{CleanlabError, Result};

/// Tolerance used when checking that rows or columns sum to one.
pub const STOCHASTIC_TOL: f64 = 1e-6;

/// Pivots smaller than this are treated as zero during inversion.
const PIVOT_EPS: f64 = 1e-12;

/// Return the side length of a square matrix, or a shape error naming `what`.
pub fn assert_square(m: &Array2<f64>, what: &str) -> Result<usize> {
    let (rows, cols) = m.dim();
    if rows != cols {
        return Err(CleanlabError::shape(
            format!("square {}", what),
            format!("{} x {}", rows, cols),
        ));
    }
    Ok(rows)
}

fn entries_are_probabilities(m: &Array2<f64>, tol: f64) -> bool {
    m.iter()
        .all(|&v| v.is_finite() && v >= -tol && v <= 1.0 + tol)
}

/// True when every entry is a probability and every column sums to one.
pub fn is_column_stochastic(m: &Array2<f64>, tol: f64) -> bool {
    entries_are_probabilities(m, tol)
        && m.sum_axis(Axis(0))
            .iter()
            .all(|&s| (s - 1.0).abs() <= tol)
}

/// True when every entry is a probability and every row sums to one.
pub fn is_row_stochastic(m: &Array2<f64>, tol: f64) -> bool {
    entries_are_probabilities(m, tol)
        && m.sum_axis(Axis(1))
            .iter()
            .all(|&s| (s - 1.0).abs() <= tol)
}

/// Invert a square matrix using Gauss-Jordan elimination with partial pivoting.
///
/// A singular matrix is reported as `DivisionByZero` on the column whose pivot
/// vanished.
pub fn invert(m: &Array2<f64>) -> Result<Array2<f64>> {
    let n = assert_square(m, "matrix")?;

    // Augmented [M | I]
    let mut aug = Array2::<f64>::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[[col, col]].abs();
        for row in (col + 1)..n {
            let val = aug[[row, col]].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }
        if max_val < PIVOT_EPS {
            return Err(CleanlabError::DivisionByZero {
                quantity: "pivot",
                index: col,
            });
        }
        if max_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [max_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..2 * n {
                aug[[row, j]] -= factor * aug[[col, j]];
            }
        }
    }

    let mut inverse = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inverse[[i, j]] = aug[[i, n + j]];
        }
    }
    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stochastic_checks() {
        let q = array![[0.8, 0.3], [0.2, 0.7]];
        assert!(is_column_stochastic(&q, STOCHASTIC_TOL));
        assert!(!is_row_stochastic(&q, STOCHASTIC_TOL));
        assert!(is_row_stochastic(&q.t().to_owned(), STOCHASTIC_TOL));

        let negative = array![[1.2, 0.0], [-0.2, 1.0]];
        assert!(!is_column_stochastic(&negative, STOCHASTIC_TOL));
    }

    #[test]
    fn test_invert_recovers_identity() {
        let m = array![[0.5, 0.0, 0.0], [0.5, 1.0, 0.5], [0.0, 0.0, 0.5]];
        let inv = invert(&m).unwrap();
        let product = m.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_invert_singular_matrix_fails() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            invert(&m),
            Err(CleanlabError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_assert_square_rejects_rectangular() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            assert_square(&m, "noise matrix"),
            Err(CleanlabError::ShapeMismatch { .. })
        ));
    }
}

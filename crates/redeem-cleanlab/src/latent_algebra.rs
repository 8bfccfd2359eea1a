//! Identities linking the noise matrix, the inverse noise matrix and the class marginals.
//!
//! Orientation used throughout the crate:
//!
//! * noise matrix `Q[i, j] = P(s = i | y = j)`, column-stochastic
//! * inverse noise matrix `R[i, j] = P(y = j | s = i)`, row-stochastic
//! * `py[j] = P(y = j)` is the true-class prior, `ps[i] = P(s = i)` the noisy marginal
//!
//! Both directions go through the joint `P(s = i, y = j) = Q[i, j] py[j] = R[i, j] ps[i]`.

use ndarray::{Array1, Array2};

use crate::error::{CleanlabError, Result};
use crate::math::{assert_square, invert, normalize};

/// How the true-class prior is derived from the noisy marginal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyMethod {
    /// `py = R^T ps`, summing the joint implied by the inverse noise matrix.
    Count,
    /// Solve `Q py = ps` for `py`.
    Equation,
}

fn check_vector_len(v: &Array1<f64>, k: usize, what: &str) -> Result<()> {
    if v.len() != k {
        return Err(CleanlabError::shape(
            format!("{} of length {}", what, k),
            format!("length {}", v.len()),
        ));
    }
    Ok(())
}

/// Noisy marginal implied by a noise matrix and a prior: `ps = Q py`.
pub fn compute_ps(noise_matrix: &Array2<f64>, py: &Array1<f64>) -> Array1<f64> {
    noise_matrix.dot(py)
}

/// Forward to inverse: `R[i, j] = Q[i, j] py[j] / ps[i]` with `ps = Q py`.
///
/// Returns the inverse noise matrix together with the noisy marginal it was
/// divided by.
pub fn compute_inv_noise_matrix(
    noise_matrix: &Array2<f64>,
    py: &Array1<f64>,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let k = assert_square(noise_matrix, "noise matrix")?;
    check_vector_len(py, k, "py")?;

    let ps = compute_ps(noise_matrix, py);
    let mut inverse = Array2::<f64>::zeros((k, k));
    for i in 0..k {
        if ps[i] <= 0.0 {
            return Err(CleanlabError::DivisionByZero {
                quantity: "ps",
                index: i,
            });
        }
        for j in 0..k {
            inverse[[i, j]] = noise_matrix[[i, j]] * py[j] / ps[i];
        }
    }
    Ok((inverse, ps))
}

/// Inverse to forward: `Q[i, j] = R[i, j] ps[i] / py[j]` with `py = R^T ps`.
///
/// Returns the noise matrix together with the prior it was divided by.
pub fn compute_noise_matrix_from_inverse(
    inverse_noise_matrix: &Array2<f64>,
    ps: &Array1<f64>,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let k = assert_square(inverse_noise_matrix, "inverse noise matrix")?;
    check_vector_len(ps, k, "ps")?;

    let py = inverse_noise_matrix.t().dot(ps);
    let mut noise_matrix = Array2::<f64>::zeros((k, k));
    for j in 0..k {
        if py[j] <= 0.0 {
            return Err(CleanlabError::DivisionByZero {
                quantity: "py",
                index: j,
            });
        }
        for i in 0..k {
            noise_matrix[[i, j]] = inverse_noise_matrix[[i, j]] * ps[i] / py[j];
        }
    }
    Ok((noise_matrix, py))
}

/// Solve `Q py = ps` for the prior.
///
/// Finite samples can make the exact solution slightly negative; negative
/// entries are clipped to zero and the result renormalised.
pub fn compute_py_from_noise_matrix(
    noise_matrix: &Array2<f64>,
    ps: &Array1<f64>,
) -> Result<Array1<f64>> {
    let k = assert_square(noise_matrix, "noise matrix")?;
    check_vector_len(ps, k, "ps")?;

    let py = invert(noise_matrix)?.dot(ps).mapv(|v| v.max(0.0));
    normalize(&py).ok_or_else(|| {
        CleanlabError::InvalidNoiseMatrix("noise matrix implies an all-zero prior".to_string())
    })
}

/// Derive `py` from `ps` with the requested method.
pub fn compute_py(
    ps: &Array1<f64>,
    noise_matrix: &Array2<f64>,
    inverse_noise_matrix: &Array2<f64>,
    method: PyMethod,
) -> Result<Array1<f64>> {
    match method {
        PyMethod::Count => {
            let k = assert_square(inverse_noise_matrix, "inverse noise matrix")?;
            check_vector_len(ps, k, "ps")?;
            let py = inverse_noise_matrix.t().dot(ps).mapv(|v| v.max(0.0));
            normalize(&py).ok_or_else(|| {
                CleanlabError::InvalidNoiseMatrix(
                    "inverse noise matrix implies an all-zero prior".to_string(),
                )
            })
        }
        PyMethod::Equation => compute_py_from_noise_matrix(noise_matrix, ps),
    }
}

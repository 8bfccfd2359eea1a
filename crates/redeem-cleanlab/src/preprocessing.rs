//! Small preprocessing utilities shared by the bundled models.
//!
//! Provides a simple Scaler for per-column mean/std standardization.

use ndarray::{Array1, Array2, Axis};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-6;

    /// Fit a `Scaler` from a matrix where rows are samples and columns are
    /// features. Returns `None` for an empty matrix.
    pub fn fit(x: &Array2<f64>) -> Option<Scaler> {
        let mean = x.mean_axis(Axis(0))?;
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() { s.max(Self::MIN_STD) } else { 1.0 });
        Some(Scaler { mean, std })
    }

    /// Standardize all rows with the fitted statistics.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.std
    }
}

/// Convenience: fit a scaler and return the transformed matrix in one call.
pub fn fit_transform(x: &Array2<f64>) -> Option<(Scaler, Array2<f64>)> {
    let scaler = Scaler::fit(x)?;
    let transformed = scaler.transform(x);
    Some((scaler, transformed))
}

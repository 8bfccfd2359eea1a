use ndarray::{Array1, Array2, Axis};

use crate::config::{ModelConfig, ModelType};
use crate::error::{CleanlabError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::preprocessing::Scaler;

/// Multinomial (softmax) logistic regression fit by full-batch gradient descent.
///
/// Features are standardized internally. Training is deterministic, which
/// keeps repeated fits with the same data bit-for-bit identical.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    params: ModelConfig,
    state: Option<FittedState>,
}

#[derive(Debug, Clone)]
struct FittedState {
    scaler: Scaler,
    /// (n_features, n_classes)
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl LogisticRegression {
    /// Convergence tolerance on the gradient norm
    const TOL: f64 = 1e-6;

    pub fn new(params: ModelConfig) -> Self {
        LogisticRegression {
            params,
            state: None,
        }
    }

    fn hyper_parameters(&self) -> (usize, f64) {
        match &self.params.model_type {
            ModelType::Logistic { max_iter, alpha } => (*max_iter, *alpha),
            other => {
                log::warn!(
                    "LogisticRegression built from {:?} params; using defaults",
                    other.name()
                );
                (1000, 1e-4)
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Row-wise softmax, shifted by the row max for stability.
    fn softmax(logits: &mut Array2<f64>) {
        for mut row in logits.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let total = row.sum();
            row.mapv_inplace(|v| v / total);
        }
    }
}

impl ClassifierModel for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], sample_weight: Option<&[f64]>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(CleanlabError::EmptyPartition(
                "cannot fit on zero examples".to_string(),
            ));
        }
        if y.len() != n_samples {
            return Err(CleanlabError::shape(
                format!("y length = {}", n_samples),
                format!("y length = {}", y.len()),
            ));
        }
        let weights_in: Array1<f64> = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(CleanlabError::shape(
                    format!("sample_weight length = {}", n_samples),
                    format!("sample_weight length = {}", w.len()),
                ))
            }
            Some(w) => Array1::from(w.to_vec()),
            None => Array1::ones(n_samples),
        };
        let total_weight = weights_in.sum();
        if !(total_weight > 0.0) {
            return Err(CleanlabError::Model(
                "sample weights must sum to a positive value".to_string(),
            ));
        }
        let row_weights = (weights_in / total_weight).insert_axis(Axis(1));

        let (max_iter, alpha) = self.hyper_parameters();
        let lr = self.params.learning_rate as f64;
        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;

        let scaler = Scaler::fit(x).ok_or_else(|| {
            CleanlabError::EmptyPartition("cannot fit on zero examples".to_string())
        })?;
        let xs = scaler.transform(x);

        let mut one_hot = Array2::<f64>::zeros((n_samples, n_classes));
        for (i, &label) in y.iter().enumerate() {
            one_hot[[i, label]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((x.ncols(), n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);

        for iter in 0..max_iter {
            let mut probs = xs.dot(&weights) + &bias;
            Self::softmax(&mut probs);

            let errors = (probs - &one_hot) * &row_weights;
            let dw = xs.t().dot(&errors) + &(&weights * alpha);
            let db = errors.sum_axis(Axis(0));

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < Self::TOL {
                log::trace!("Logistic regression converged after {} iterations", iter);
                break;
            }

            weights = weights - &(dw * lr);
            bias = bias - &(db * lr);
        }

        self.state = Some(FittedState {
            scaler,
            weights,
            bias,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(CleanlabError::NotFitted)?;
        if x.ncols() != state.weights.nrows() {
            return Err(CleanlabError::shape(
                format!("{} features", state.weights.nrows()),
                format!("{} features", x.ncols()),
            ));
        }
        let mut probs = state.scaler.transform(x).dot(&state.weights) + &state.bias;
        Self::softmax(&mut probs);
        Ok(probs)
    }

    fn supports_sample_weight(&self) -> bool {
        true
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        Box::new(LogisticRegression::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression_separates_three_classes() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [5.0, 5.0],
            [5.2, 4.9],
            [4.8, 5.1],
            [0.0, 5.0],
            [0.3, 5.2],
            [-0.2, 4.8],
        ];
        let y = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];

        let mut model = LogisticRegression::default();
        model.fit(&x, &y, None).unwrap();
        assert!(model.is_fitted());

        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.dim(), (9, 3));
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_sample_weights_shift_the_decision() {
        // Two identical points with conflicting labels: the heavier label wins.
        let x = array![[1.0], [1.0], [0.0], [2.0]];
        let y = vec![0, 1, 0, 1];
        let mut model = LogisticRegression::default();
        model
            .fit(&x, &y, Some(&[10.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let p = model.predict_proba(&array![[1.0]]).unwrap();
        assert!(p[[0, 0]] > p[[0, 1]]);
    }

    #[test]
    fn test_predict_before_fit_is_not_fitted() {
        let model = LogisticRegression::default();
        assert_eq!(
            model.predict_proba(&array![[1.0]]).unwrap_err(),
            CleanlabError::NotFitted
        );
    }

    #[test]
    fn test_fresh_is_unfitted() {
        let mut model = LogisticRegression::default();
        model.fit(&array![[0.0], [1.0]], &[0, 1], None).unwrap();
        let fresh = model.fresh();
        assert!(fresh.predict_proba(&array![[0.5]]).is_err());
        assert!(fresh.supports_sample_weight());
    }
}

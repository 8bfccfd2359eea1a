use ndarray::Array2;

use crate::error::Result;
use crate::math::argmax;

/// A small trait abstraction for the classifiers wrapped by the noisy-label
/// learner. Any model that can be fit on labelled rows and emit class
/// probabilities qualifies; the learner treats it as a black box.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model. Labels are class indices in `[0, K)`; `sample_weight`,
    /// when given, has one entry per row.
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], sample_weight: Option<&[f64]>) -> Result<()>;

    /// Predict class probabilities, shape (n_samples, n_classes seen during fit).
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices. Defaults to the argmax of `predict_proba`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.rows().into_iter().map(argmax).collect())
    }

    /// Whether `fit` honours `sample_weight`.
    fn supports_sample_weight(&self) -> bool {
        false
    }

    /// A new, unfitted model with the same hyper-parameters.
    fn fresh(&self) -> Box<dyn ClassifierModel>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CleanlabError>;

/// Failures surfaced by noise estimation, pruning and training.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleanlabError {
    /// A supplied noise or inverse noise matrix is not stochastic within tolerance.
    #[error("Invalid noise matrix: {0}")]
    InvalidNoiseMatrix(String),

    /// A marginal used as a divisor is zero.
    #[error("Division by zero: {quantity}[{index}] is zero")]
    DivisionByZero { quantity: &'static str, index: usize },

    /// A fold or class ended up without examples.
    #[error("Empty partition: {0}")]
    EmptyPartition(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Label {label} at index {index} is out of range for {n_classes} classes")]
    InvalidLabel {
        label: usize,
        index: usize,
        n_classes: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The wrapped classifier failed to fit or predict.
    #[error("Classifier error: {0}")]
    Model(String),
}

impl CleanlabError {
    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        CleanlabError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

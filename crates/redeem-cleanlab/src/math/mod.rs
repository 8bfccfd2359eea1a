//! Small numeric helpers on top of `ndarray`.
//!
//! `matrix` holds the stochastic-matrix checks and the dense inversion used by
//! the latent algebra; `vector` holds label counting and probability-vector
//! utilities shared by the estimators.
pub mod matrix;
pub mod vector;

pub use matrix::{
    assert_square, invert, is_column_stochastic, is_row_stochastic, STOCHASTIC_TOL,
};
pub use vector::{argmax, l1_distance, normalize, value_counts};

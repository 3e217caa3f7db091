//! Atom functions for building expressions.
//!
//! - **Affine atoms**: add, mul, sum, reshape, index, stack, transpose, ...
//! - **Nonlinear atoms**: norms, quadratic forms, exponential-cone functions

pub mod affine;
pub mod nonlinear;

pub use affine::{
    cumsum, diag, dot, flatten, hstack, index, matmul, reshape, slice, sum, sum_axis, trace,
    transpose, vstack,
};

pub use nonlinear::{
    abs, entropy, exp, log, max2, maximum, min2, minimum, neg_part, norm, norm1, norm2, norm_inf,
    pos, power, quad_form, quad_over_lin, sqrt, sum_squares,
};

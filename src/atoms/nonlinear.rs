//! Nonlinear atoms.
//!
//! None of these are affine; the standard rewrite table in
//! `canon::rules` replaces each with an epigraph variable and cone
//! constraints.

use std::sync::Arc;

use crate::error::{CvxError, Result};
use crate::expr::{Atom, Expr};

fn wrap(atom: fn(Arc<Expr>) -> Atom, x: &Expr) -> Expr {
    Expr::new(atom(Arc::new(x.clone())))
}

// ============================================================================
// Norms
// ============================================================================

/// L1 norm: ||x||_1 = sum(|x_i|).
pub fn norm1(x: &Expr) -> Expr {
    wrap(Atom::Norm1, x)
}

/// L2 norm: ||x||_2 = sqrt(sum(x_i^2)).
///
/// Rewritten as a second-order cone constraint `(t, x)`.
pub fn norm2(x: &Expr) -> Expr {
    wrap(Atom::Norm2, x)
}

/// Infinity norm: ||x||_inf = max(|x_i|).
pub fn norm_inf(x: &Expr) -> Expr {
    wrap(Atom::NormInf, x)
}

/// General p-norm for p = 1, 2 or infinity.
///
/// # Errors
///
/// Returns `CvxError::InvalidProblem` for any other p.
///
/// # Example
///
/// ```
/// use cvxcanon::prelude::*;
///
/// let x = variable(5);
/// let n = norm(&x, 2.0).unwrap();
/// assert_eq!(n.kind(), ExprKind::Norm2);
/// ```
pub fn norm(x: &Expr, p: f64) -> Result<Expr> {
    if p == 1.0 {
        Ok(norm1(x))
    } else if p == 2.0 {
        Ok(norm2(x))
    } else if p.is_infinite() && p > 0.0 {
        Ok(norm_inf(x))
    } else {
        Err(CvxError::InvalidProblem(format!(
            "norm p={} is not supported; use p=1, 2, or inf",
            p
        )))
    }
}

// ============================================================================
// Element-wise atoms
// ============================================================================

/// Absolute value: |x| (element-wise).
pub fn abs(x: &Expr) -> Expr {
    wrap(Atom::Abs, x)
}

/// Positive part: max(x, 0) (element-wise).
pub fn pos(x: &Expr) -> Expr {
    wrap(Atom::Pos, x)
}

/// Negative part: max(-x, 0) (element-wise).
pub fn neg_part(x: &Expr) -> Expr {
    wrap(Atom::NegPart, x)
}

// ============================================================================
// Maximum and minimum
// ============================================================================

/// Element-wise maximum of expressions.
///
/// A single expression is returned as-is.
///
/// # Errors
///
/// Returns `CvxError::InvalidProblem` when `exprs` is empty.
pub fn maximum(exprs: Vec<Expr>) -> Result<Expr> {
    extremum(exprs, Atom::Maximum, "maximum")
}

/// Element-wise minimum of expressions.
///
/// # Errors
///
/// Returns `CvxError::InvalidProblem` when `exprs` is empty.
pub fn minimum(exprs: Vec<Expr>) -> Result<Expr> {
    extremum(exprs, Atom::Minimum, "minimum")
}

fn extremum(
    mut exprs: Vec<Expr>,
    atom: fn(Vec<Arc<Expr>>) -> Atom,
    name: &str,
) -> Result<Expr> {
    match exprs.len() {
        0 => Err(CvxError::InvalidProblem(format!(
            "{} of an empty list",
            name
        ))),
        1 => Ok(exprs.remove(0)),
        _ => Ok(Expr::new(atom(exprs.into_iter().map(Arc::new).collect()))),
    }
}

/// Maximum of two expressions.
pub fn max2(a: &Expr, b: &Expr) -> Expr {
    Expr::new(Atom::Maximum(vec![Arc::new(a.clone()), Arc::new(b.clone())]))
}

/// Minimum of two expressions.
pub fn min2(a: &Expr, b: &Expr) -> Expr {
    Expr::new(Atom::Minimum(vec![Arc::new(a.clone()), Arc::new(b.clone())]))
}

// ============================================================================
// Quadratic atoms
// ============================================================================

/// Quadratic form: x' P x.
pub fn quad_form(x: &Expr, p: &Expr) -> Expr {
    Expr::new(Atom::QuadForm(Arc::new(x.clone()), Arc::new(p.clone())))
}

/// Sum of squares: ||x||_2^2.
pub fn sum_squares(x: &Expr) -> Expr {
    wrap(Atom::SumSquares, x)
}

/// Quadratic over linear: ||x||_2^2 / y, defined for y > 0.
pub fn quad_over_lin(x: &Expr, y: &Expr) -> Expr {
    Expr::new(Atom::QuadOverLin(Arc::new(x.clone()), Arc::new(y.clone())))
}

// ============================================================================
// Exponential cone atoms
// ============================================================================

pub fn exp(x: &Expr) -> Expr {
    wrap(Atom::Exp, x)
}

pub fn log(x: &Expr) -> Expr {
    wrap(Atom::Log, x)
}

/// Entropy: -x log(x) (element-wise).
pub fn entropy(x: &Expr) -> Expr {
    wrap(Atom::Entropy, x)
}

/// Element-wise power x^p.
pub fn power(x: &Expr, p: f64) -> Expr {
    Expr::new(Atom::Power(Arc::new(x.clone()), p))
}

pub fn sqrt(x: &Expr) -> Expr {
    power(x, 0.5)
}

//! Affine atoms and operator overloading.
//!
//! Affine atoms include:
//! - Addition, subtraction, negation
//! - Elementwise and matrix multiplication
//! - Sum, reshape, index and stack operations
//! - Transpose, trace, cumulative sum and diag

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::expr::{constant, Atom, Expr, IndexSpec, Shape};

fn unary(atom: fn(Arc<Expr>) -> Atom, x: &Expr) -> Expr {
    Expr::new(atom(Arc::new(x.clone())))
}

fn add_nodes(a: Expr, b: Expr) -> Expr {
    Expr::new(Atom::Add(Arc::new(a), Arc::new(b)))
}

fn mul_nodes(a: Expr, b: Expr) -> Expr {
    Expr::new(Atom::Mul(Arc::new(a), Arc::new(b)))
}

fn neg_node(a: Expr) -> Expr {
    Expr::new(Atom::Neg(Arc::new(a)))
}

fn sub_nodes(a: Expr, b: Expr) -> Expr {
    add_nodes(a, neg_node(b))
}

// ============================================================================
// Operator overloading for Expr
// ============================================================================

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        neg_node(self)
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        neg_node(self.clone())
    }
}

/// Implements a binary operator for every owned/borrowed combination.
macro_rules! binary_op {
    ($trait:ident, $method:ident, $build:ident) => {
        impl $trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $trait for &Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }
    };
}

binary_op!(Add, add, add_nodes);
binary_op!(Sub, sub, sub_nodes);
binary_op!(Mul, mul, mul_nodes);

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        mul_nodes(constant(rhs), self)
    }
}

impl Mul<f64> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        mul_nodes(constant(rhs), self.clone())
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        mul_nodes(constant(self), rhs)
    }
}

impl Mul<&Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        mul_nodes(constant(self), rhs.clone())
    }
}

impl Div<f64> for Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        mul_nodes(constant(1.0 / rhs), self)
    }
}

impl Div<f64> for &Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        mul_nodes(constant(1.0 / rhs), self.clone())
    }
}

// ============================================================================
// Affine atom functions
// ============================================================================

/// Sum of all elements.
pub fn sum(expr: &Expr) -> Expr {
    Expr::new(Atom::Sum(Arc::new(expr.clone()), None))
}

/// Sum along a specific axis (0 sums each column, 1 sums each row).
pub fn sum_axis(expr: &Expr, axis: usize) -> Expr {
    Expr::new(Atom::Sum(Arc::new(expr.clone()), Some(axis)))
}

/// Reshape an expression to a new shape (column-major).
pub fn reshape(expr: &Expr, shape: impl Into<Shape>) -> Expr {
    Expr::new(Atom::Reshape(Arc::new(expr.clone()), shape.into()))
}

/// Flatten an expression to a vector.
pub fn flatten(expr: &Expr) -> Expr {
    let size = expr.shape().size();
    reshape(expr, Shape::vector(size))
}

pub fn transpose(expr: &Expr) -> Expr {
    unary(Atom::Transpose, expr)
}

pub fn trace(expr: &Expr) -> Expr {
    unary(Atom::Trace, expr)
}

/// Cumulative sum down each column.
pub fn cumsum(expr: &Expr) -> Expr {
    Expr::new(Atom::Cumsum(Arc::new(expr.clone()), None))
}

/// Diagonal matrix from a vector, or the diagonal of a matrix.
pub fn diag(expr: &Expr) -> Expr {
    unary(Atom::Diag, expr)
}

/// Vertical stack (row-wise concatenation).
pub fn vstack(exprs: Vec<Expr>) -> Expr {
    Expr::new(Atom::VStack(exprs.into_iter().map(Arc::new).collect()))
}

/// Horizontal stack (column-wise concatenation).
pub fn hstack(exprs: Vec<Expr>) -> Expr {
    Expr::new(Atom::HStack(exprs.into_iter().map(Arc::new).collect()))
}

/// Matrix-vector or matrix-matrix multiplication.
pub fn matmul(a: &Expr, b: &Expr) -> Expr {
    Expr::new(Atom::MatMul(Arc::new(a.clone()), Arc::new(b.clone())))
}

/// Dot product of two vectors.
pub fn dot(a: &Expr, b: &Expr) -> Expr {
    sum(&(a * b))
}

/// Index a single element of the flattened expression.
pub fn index(expr: &Expr, idx: usize) -> Expr {
    Expr::new(Atom::Index(
        Arc::new(expr.clone()),
        IndexSpec::element(vec![idx]),
    ))
}

/// Slice a range from the flattened expression.
pub fn slice(expr: &Expr, start: usize, stop: usize) -> Expr {
    Expr::new(Atom::Index(
        Arc::new(expr.clone()),
        IndexSpec::range(start, stop),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{variable, ExprKind};

    #[test]
    fn test_add_sub_neg() {
        let x = variable(5);
        let y = variable(5);
        assert_eq!((&x + &y).shape(), Shape::vector(5));
        assert_eq!((&x - &y).shape(), Shape::vector(5));
        assert_eq!((-&x).shape(), Shape::vector(5));

        // subtraction is addition of a negation
        let d = &x - &y;
        assert_eq!(d.kind(), ExprKind::Add);
        assert_eq!(d.args()[1].kind(), ExprKind::Neg);
    }

    #[test]
    fn test_scalar_mul() {
        let x = variable(5);
        assert_eq!((2.0 * &x).shape(), Shape::vector(5));
        assert_eq!((&x * 2.0).shape(), Shape::vector(5));
        assert_eq!((&x / 2.0).kind(), ExprKind::Mul);
    }

    #[test]
    fn test_operands_keep_identity() {
        let x = variable(5);
        let e = &x + 1.0 * &x;
        assert_eq!(e.args()[0].id(), x.id());
        assert!(e.variables() == vec![x.id()]);
    }

    #[test]
    fn test_structural_shapes() {
        let x = variable((3, 4));
        assert_eq!(sum(&x).shape(), Shape::scalar());
        assert_eq!(transpose(&x).shape(), Shape::matrix(4, 3));
        assert_eq!(flatten(&x).shape(), Shape::vector(12));
        assert_eq!(trace(&variable((3, 3))).shape(), Shape::scalar());

        let a = variable((3, 4));
        let v = variable(4);
        assert_eq!(matmul(&a, &v).shape(), Shape::vector(3));

        let y = variable((2, 3));
        let z = variable((3, 3));
        assert_eq!(vstack(vec![y, z]).shape(), Shape::matrix(5, 3));
        assert_eq!(slice(&variable(6), 1, 4).shape(), Shape::vector(3));
        assert_eq!(index(&variable(6), 2).shape(), Shape::scalar());
    }
}

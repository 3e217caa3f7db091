//! Constant expression creation.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::expression::{Array, Atom, ConstantData, Expr};
use super::shape::Shape;

fn constant_node(value: Array, shape: Shape) -> Expr {
    Expr::new(Atom::Constant(ConstantData { value, shape }))
}

/// Create a constant expression from a scalar.
pub fn constant(value: f64) -> Expr {
    constant_node(Array::Scalar(value), Shape::scalar())
}

/// Create a constant expression from a vector.
pub fn constant_vec(values: Vec<f64>) -> Expr {
    let n = values.len();
    constant_node(Array::from_vec(values), Shape::vector(n))
}

/// Create a constant expression from column-major values.
pub fn constant_matrix(values: Vec<f64>, rows: usize, cols: usize) -> Expr {
    constant_dmatrix(DMatrix::from_vec(rows, cols, values))
}

/// Create a constant expression from a nalgebra DMatrix.
pub fn constant_dmatrix(matrix: DMatrix<f64>) -> Expr {
    let shape = Shape::matrix(matrix.nrows(), matrix.ncols());
    constant_node(Array::Dense(matrix), shape)
}

/// Create a constant expression from a sparse CSC matrix.
pub fn constant_sparse(matrix: CscMatrix<f64>) -> Expr {
    let shape = Shape::matrix(matrix.nrows(), matrix.ncols());
    constant_node(Array::Sparse(matrix), shape)
}

/// Create a constant leaf holding an already-evaluated value of a given shape.
pub fn constant_array(value: Array, shape: Shape) -> Expr {
    constant_node(value, shape)
}

fn filled(shape: Shape, fill: f64) -> Expr {
    let value = if shape.is_scalar() {
        Array::Scalar(fill)
    } else {
        Array::Dense(DMatrix::from_element(shape.rows(), shape.cols(), fill))
    };
    constant_node(value, shape)
}

/// Create a zero constant with the given shape.
pub fn zeros(shape: impl Into<Shape>) -> Expr {
    filled(shape.into(), 0.0)
}

/// Create a ones constant with the given shape.
pub fn ones(shape: impl Into<Shape>) -> Expr {
    filled(shape.into(), 1.0)
}

/// Create an identity matrix constant.
pub fn eye(n: usize) -> Expr {
    constant_dmatrix(DMatrix::identity(n, n))
}

/// Extension trait for creating constants from various types.
pub trait IntoConstant {
    fn into_constant(self) -> Expr;
}

impl IntoConstant for f64 {
    fn into_constant(self) -> Expr {
        constant(self)
    }
}

impl IntoConstant for Vec<f64> {
    fn into_constant(self) -> Expr {
        constant_vec(self)
    }
}

impl IntoConstant for DMatrix<f64> {
    fn into_constant(self) -> Expr {
        constant_dmatrix(self)
    }
}

impl IntoConstant for CscMatrix<f64> {
    fn into_constant(self) -> Expr {
        constant_sparse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_scalar() {
        let c = constant(5.0);
        assert_eq!(c.constant_value().and_then(Array::as_scalar), Some(5.0));
        assert!(c.is_constant());
        assert!(!c.has_params());
    }

    #[test]
    fn test_constant_vec_is_vector_shaped() {
        let c = constant_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(c.shape(), Shape::vector(3));
        assert_eq!(c.constant_value().map(Array::dims), Some((3, 1)));
    }

    #[test]
    fn test_zeros_ones_eye() {
        let z = zeros((3, 4));
        assert_eq!(z.shape(), Shape::matrix(3, 4));
        assert_eq!(z.value().unwrap().to_dense().sum(), 0.0);
        assert_eq!(ones(5).value().unwrap().to_dense().sum(), 5.0);
        assert_eq!(eye(3).shape(), Shape::matrix(3, 3));
    }

    #[test]
    fn test_sparse_evaluates_dense() {
        let csc = CscMatrix::identity(2);
        let c = constant_sparse(csc);
        assert_eq!(c.value().unwrap().to_dense(), DMatrix::identity(2, 2));
    }
}

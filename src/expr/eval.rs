//! Numeric evaluation of expression trees.
//!
//! Values are computed on dense column-major matrices: scalars are 1 x 1,
//! vectors n x 1. Each node's result is reshaped to its declared shape.

use std::sync::Arc;

use nalgebra::DMatrix;

use super::expression::{Array, Atom, Expr, IndexSpec};
use super::traverse::fold_postorder;
use crate::error::{CvxError, Result};

/// Evaluate a whole subtree without native recursion.
pub fn evaluate(root: &Arc<Expr>) -> Result<Array> {
    fold_postorder(root, |_| true, |node, args| evaluate_node(node, args))
}

/// Evaluate one node given the values of its children.
pub(crate) fn evaluate_node(expr: &Expr, args: Vec<Array>) -> Result<Array> {
    let m: Vec<DMatrix<f64>> = args.iter().map(Array::to_dense).collect();
    let result = match expr.atom() {
        Atom::Variable(v) => {
            return Err(CvxError::MissingValue(format!(
                "variable {} has no value",
                v.name.clone().unwrap_or_else(|| expr.id().to_string())
            )))
        }
        Atom::Constant(c) => return Ok(c.value.clone()),
        Atom::Parameter(p) => {
            return p.get().ok_or_else(|| {
                CvxError::MissingValue(format!(
                    "parameter {} has no value",
                    p.name.clone().unwrap_or_else(|| expr.id().to_string())
                ))
            })
        }
        Atom::CallbackParam(c) => return c.call(),
        Atom::Custom(op, _) => return op.eval(&args),

        Atom::Add(..) => zip_broadcast(&m[0], &m[1], |a, b| a + b)?,
        Atom::Neg(_) => -&m[0],
        Atom::Mul(..) => zip_broadcast(&m[0], &m[1], |a, b| a * b)?,
        Atom::MatMul(..) => matmul(&m[0], &m[1])?,
        Atom::Sum(_, axis) => match axis {
            None => DMatrix::from_element(1, 1, m[0].sum()),
            Some(0) => DMatrix::from_fn(1, m[0].ncols(), |_, j| m[0].column(j).sum()),
            Some(_) => DMatrix::from_fn(m[0].nrows(), 1, |i, _| m[0].row(i).sum()),
        },
        Atom::Reshape(..) => m[0].clone(),
        Atom::Index(_, spec) => index(&m[0], spec)?,
        Atom::VStack(_) => stack(&m, true)?,
        Atom::HStack(_) => stack(&m, false)?,
        Atom::Transpose(_) => m[0].transpose(),
        Atom::Trace(_) => {
            let a = &m[0];
            let n = a.nrows().min(a.ncols());
            DMatrix::from_element(1, 1, (0..n).map(|i| a[(i, i)]).sum())
        }
        Atom::Cumsum(_, axis) => cumsum(&m[0], axis.unwrap_or(0)),
        Atom::Diag(_) => diag(&m[0]),

        Atom::Norm1(_) => DMatrix::from_element(1, 1, m[0].iter().map(|v| v.abs()).sum()),
        Atom::Norm2(_) => DMatrix::from_element(1, 1, m[0].norm()),
        Atom::NormInf(_) => DMatrix::from_element(1, 1, m[0].amax()),
        Atom::Abs(_) => m[0].map(f64::abs),
        Atom::Pos(_) => m[0].map(|v| v.max(0.0)),
        Atom::NegPart(_) => m[0].map(|v| (-v).max(0.0)),
        Atom::Maximum(_) => fold_elementwise(&m, f64::max)?,
        Atom::Minimum(_) => fold_elementwise(&m, f64::min)?,
        Atom::QuadForm(..) => {
            let (x, p) = (&m[0], &m[1]);
            if p.nrows() != x.nrows() || p.ncols() != x.nrows() {
                return Err(mismatch(p, x));
            }
            x.transpose() * p * x
        }
        Atom::SumSquares(_) => DMatrix::from_element(1, 1, m[0].norm_squared()),
        Atom::QuadOverLin(..) => {
            let y = scalar_of(&m[1])?;
            DMatrix::from_element(1, 1, m[0].norm_squared() / y)
        }
        Atom::Exp(_) => m[0].map(f64::exp),
        Atom::Log(_) => m[0].map(f64::ln),
        Atom::Entropy(_) => m[0].map(|v| if v == 0.0 { 0.0 } else { -v * v.ln() }),
        Atom::Power(_, p) => m[0].map(|v| v.powf(*p)),
    };
    Array::from_dense(result, &expr.shape())
}

fn mismatch(a: &DMatrix<f64>, b: &DMatrix<f64>) -> CvxError {
    CvxError::ShapeMismatch {
        expected: format!("({}, {})", a.nrows(), a.ncols()),
        got: format!("({}, {})", b.nrows(), b.ncols()),
    }
}

fn is_unit(m: &DMatrix<f64>) -> bool {
    m.nrows() == 1 && m.ncols() == 1
}

fn scalar_of(m: &DMatrix<f64>) -> Result<f64> {
    if is_unit(m) {
        Ok(m[(0, 0)])
    } else {
        Err(CvxError::ShapeMismatch {
            expected: "()".into(),
            got: format!("({}, {})", m.nrows(), m.ncols()),
        })
    }
}

/// Elementwise combination; 1 x 1 operands broadcast.
fn zip_broadcast(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<DMatrix<f64>> {
    if a.shape() == b.shape() {
        Ok(a.zip_map(b, f))
    } else if is_unit(a) {
        let s = a[(0, 0)];
        Ok(b.map(|v| f(s, v)))
    } else if is_unit(b) {
        let s = b[(0, 0)];
        Ok(a.map(|v| f(v, s)))
    } else {
        Err(mismatch(a, b))
    }
}

fn fold_elementwise(m: &[DMatrix<f64>], f: fn(f64, f64) -> f64) -> Result<DMatrix<f64>> {
    let (first, rest) = m
        .split_first()
        .ok_or_else(|| CvxError::InvalidProblem("elementwise max/min of nothing".into()))?;
    rest.iter()
        .try_fold(first.clone(), |acc, next| zip_broadcast(&acc, next, f))
}

fn matmul(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if is_unit(a) || is_unit(b) {
        return zip_broadcast(a, b, |x, y| x * y);
    }
    if a.ncols() == b.nrows() {
        return Ok(a * b);
    }
    // vector @ matrix and vector @ vector treat the left operand as a row
    if a.ncols() == 1 && a.nrows() == b.nrows() {
        return Ok(a.transpose() * b);
    }
    Err(mismatch(a, b))
}

fn index(a: &DMatrix<f64>, spec: &IndexSpec) -> Result<DMatrix<f64>> {
    let select = |range: &Option<(usize, usize, usize)>, len: usize| -> Result<Vec<usize>> {
        let picked: Vec<usize> = match range {
            None => (0..len).collect(),
            Some((start, stop, step)) => (*start..*stop).step_by((*step).max(1)).collect(),
        };
        match picked.iter().find(|&&i| i >= len) {
            Some(i) => Err(CvxError::ShapeMismatch {
                expected: format!("index < {}", len),
                got: i.to_string(),
            }),
            None => Ok(picked),
        }
    };

    match spec.ranges.as_slice() {
        [range] => {
            let flat = a.as_slice();
            let picked = select(range, flat.len())?;
            Ok(DMatrix::from_iterator(
                picked.len(),
                1,
                picked.iter().map(|&i| flat[i]),
            ))
        }
        [rows, cols] => {
            let rows = select(rows, a.nrows())?;
            let cols = select(cols, a.ncols())?;
            Ok(DMatrix::from_fn(rows.len(), cols.len(), |i, j| {
                a[(rows[i], cols[j])]
            }))
        }
        _ => Err(CvxError::InvalidProblem(format!(
            "unsupported index with {} dimensions",
            spec.ranges.len()
        ))),
    }
}

fn stack(m: &[DMatrix<f64>], vertical: bool) -> Result<DMatrix<f64>> {
    let Some(first) = m.first() else {
        return Ok(DMatrix::zeros(1, 1));
    };
    if vertical {
        let cols = first.ncols();
        if let Some(bad) = m.iter().find(|b| b.ncols() != cols) {
            return Err(mismatch(first, bad));
        }
        let rows: usize = m.iter().map(|b| b.nrows()).sum();
        let mut out = DMatrix::zeros(rows, cols);
        let mut offset = 0;
        for block in m {
            out.view_mut((offset, 0), block.shape()).copy_from(block);
            offset += block.nrows();
        }
        Ok(out)
    } else {
        let rows = first.nrows();
        if let Some(bad) = m.iter().find(|b| b.nrows() != rows) {
            return Err(mismatch(first, bad));
        }
        let cols: usize = m.iter().map(|b| b.ncols()).sum();
        let mut out = DMatrix::zeros(rows, cols);
        let mut offset = 0;
        for block in m {
            out.view_mut((0, offset), block.shape()).copy_from(block);
            offset += block.ncols();
        }
        Ok(out)
    }
}

fn cumsum(a: &DMatrix<f64>, axis: usize) -> DMatrix<f64> {
    let mut out = a.clone();
    if axis == 0 {
        for j in 0..out.ncols() {
            for i in 1..out.nrows() {
                out[(i, j)] += out[(i - 1, j)];
            }
        }
    } else {
        for i in 0..out.nrows() {
            for j in 1..out.ncols() {
                out[(i, j)] += out[(i, j - 1)];
            }
        }
    }
    out
}

fn diag(a: &DMatrix<f64>) -> DMatrix<f64> {
    if a.ncols() == 1 {
        DMatrix::from_diagonal(&a.column(0).clone_owned())
    } else {
        let n = a.nrows().min(a.ncols());
        DMatrix::from_fn(n, 1, |i, _| a[(i, i)])
    }
}

//! Core expression types for cvxcanon.
//!
//! An `Expr` is an immutable node: a process-unique `ExprId`, an `Atom`
//! describing the operator and its children, and two flags computed once at
//! construction. Children are shared through `Arc`, so a rewritten tree can
//! point at the exact nodes of the tree it was derived from.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::shape::Shape;
use super::traverse::Descendants;
use crate::error::{CvxError, Result};

/// Unique identifier for expressions and constraints.
///
/// Expressions and constraints draw from the same counter, so an id never
/// names two different nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u64);

impl ExprId {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ExprId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Numeric value storage (dense, sparse or scalar).
#[derive(Debug, Clone)]
pub enum Array {
    /// Dense matrix storage.
    Dense(DMatrix<f64>),
    /// Sparse CSC matrix storage.
    Sparse(CscMatrix<f64>),
    /// Scalar value.
    Scalar(f64),
}

impl Array {
    /// Dimensions of the column-major storage.
    pub fn dims(&self) -> (usize, usize) {
        match self {
            Array::Dense(m) => (m.nrows(), m.ncols()),
            Array::Sparse(m) => (m.nrows(), m.ncols()),
            Array::Scalar(_) => (1, 1),
        }
    }

    /// Get the total number of elements.
    pub fn size(&self) -> usize {
        let (rows, cols) = self.dims();
        rows * cols
    }

    /// Try to get as a scalar value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Dense(m) if m.nrows() == 1 && m.ncols() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// Check if all elements are non-negative.
    pub fn is_nonneg(&self) -> bool {
        match self {
            Array::Scalar(v) => *v >= 0.0,
            Array::Dense(m) => m.iter().all(|&v| v >= 0.0),
            Array::Sparse(m) => m.values().iter().all(|&v| v >= 0.0),
        }
    }

    /// Dense copy of the values.
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => nalgebra_sparse::convert::serial::convert_csc_dense(m),
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
        }
    }

    /// Wrap a dense result so that its storage matches `shape`.
    ///
    /// A 1 x n row produced for a vector shape is laid out as a column.
    pub fn from_dense(m: DMatrix<f64>, shape: &Shape) -> Result<Self> {
        if m.nrows() * m.ncols() != shape.size() {
            return Err(CvxError::ShapeMismatch {
                expected: shape.to_string(),
                got: format!("({}, {})", m.nrows(), m.ncols()),
            });
        }
        if shape.is_scalar() {
            return Ok(Array::Scalar(m[(0, 0)]));
        }
        if m.nrows() == shape.rows() && m.ncols() == shape.cols() {
            return Ok(Array::Dense(m));
        }
        Ok(Array::Dense(DMatrix::from_column_slice(
            shape.rows(),
            shape.cols(),
            m.as_slice(),
        )))
    }

    /// Create from a vector.
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

/// Data for a variable expression.
#[derive(Debug, Clone)]
pub struct VariableData {
    /// Shape of the variable.
    pub shape: Shape,
    /// Optional name for display.
    pub name: Option<String>,
    /// Variable is declared non-negative.
    pub nonneg: bool,
    /// Variable is declared non-positive.
    pub nonpos: bool,
}

/// Data for a constant expression.
#[derive(Debug, Clone)]
pub struct ConstantData {
    /// The constant value.
    pub value: Array,
    /// Declared shape; vectors are stored as n x 1 columns.
    pub shape: Shape,
}

/// Data for a parameter: a named placeholder whose value may change between solves.
///
/// Clones share the same value slot.
#[derive(Debug, Clone)]
pub struct ParameterData {
    pub shape: Shape,
    pub name: Option<String>,
    value: Arc<RwLock<Option<Array>>>,
}

impl ParameterData {
    pub(crate) fn new(shape: Shape, name: Option<String>, value: Option<Array>) -> Self {
        ParameterData {
            shape,
            name,
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Current value, if one has been assigned.
    pub fn get(&self) -> Option<Array> {
        self.value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set(&self, value: Option<Array>) {
        *self
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

/// Closure backing a deferred-evaluation leaf.
pub type Callback = Arc<dyn Fn() -> Result<Array> + Send + Sync>;

/// A leaf whose value is recomputed by a callback on every read.
#[derive(Clone)]
pub struct CallbackParam {
    pub shape: Shape,
    callback: Callback,
}

impl CallbackParam {
    pub fn new(shape: Shape, callback: Callback) -> Self {
        CallbackParam { shape, callback }
    }

    /// Invoke the callback. Never cached.
    pub fn call(&self) -> Result<Array> {
        (self.callback)()
    }
}

impl fmt::Debug for CallbackParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackParam")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// A user-defined operator.
///
/// Custom operators are keyed in rewrite tables by their `name`.
pub trait CustomOp: fmt::Debug + Send + Sync {
    /// Stable type tag.
    fn name(&self) -> &'static str;

    /// Output shape given the operator's children.
    fn shape(&self, args: &[Arc<Expr>]) -> Shape;

    /// Numeric value given the children's values.
    fn eval(&self, _args: &[Array]) -> Result<Array> {
        Err(CvxError::NotEvaluable(format!(
            "operator {} has no numeric semantics",
            self.name()
        )))
    }

    /// Whether a copy of this operator may be built over a new args list.
    fn rebuildable(&self) -> bool {
        true
    }
}

/// Specification for indexing operations.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Ranges for each dimension: (start, stop, step).
    /// None means take the whole dimension.
    pub ranges: Vec<Option<(usize, usize, usize)>>,
}

impl IndexSpec {
    /// Create an index spec for a single element.
    pub fn element(indices: Vec<usize>) -> Self {
        IndexSpec {
            ranges: indices.into_iter().map(|i| Some((i, i + 1, 1))).collect(),
        }
    }

    /// Create an index spec for a range.
    pub fn range(start: usize, stop: usize) -> Self {
        IndexSpec {
            ranges: vec![Some((start, stop, 1))],
        }
    }

    /// Create an index spec that takes everything.
    pub fn all() -> Self {
        IndexSpec { ranges: vec![None] }
    }
}

/// Operator and children of an expression node.
#[derive(Debug, Clone)]
pub enum Atom {
    // ========== Leaf nodes ==========
    /// A decision variable.
    Variable(VariableData),
    /// A constant value.
    Constant(ConstantData),
    /// A parameter.
    Parameter(ParameterData),
    /// A deferred-evaluation leaf.
    CallbackParam(CallbackParam),

    // ========== Affine atoms ==========
    Add(Arc<Expr>, Arc<Expr>),
    Neg(Arc<Expr>),
    /// Elementwise (or scalar) multiplication.
    Mul(Arc<Expr>, Arc<Expr>),
    MatMul(Arc<Expr>, Arc<Expr>),
    /// Summation with optional axis.
    Sum(Arc<Expr>, Option<usize>),
    Reshape(Arc<Expr>, Shape),
    Index(Arc<Expr>, IndexSpec),
    VStack(Vec<Arc<Expr>>),
    HStack(Vec<Arc<Expr>>),
    Transpose(Arc<Expr>),
    Trace(Arc<Expr>),
    /// Cumulative sum along axis.
    Cumsum(Arc<Expr>, Option<usize>),
    /// Diagonal matrix from vector (or diagonal of matrix).
    Diag(Arc<Expr>),

    // ========== Nonlinear atoms ==========
    Norm1(Arc<Expr>),
    Norm2(Arc<Expr>),
    NormInf(Arc<Expr>),
    Abs(Arc<Expr>),
    Pos(Arc<Expr>),
    NegPart(Arc<Expr>),
    Maximum(Vec<Arc<Expr>>),
    Minimum(Vec<Arc<Expr>>),
    /// Quadratic form: x' P x
    QuadForm(Arc<Expr>, Arc<Expr>),
    SumSquares(Arc<Expr>),
    /// Quadratic over linear: ||x||_2^2 / y
    QuadOverLin(Arc<Expr>, Arc<Expr>),
    Exp(Arc<Expr>),
    Log(Arc<Expr>),
    /// Entropy: -x * log(x) (elementwise).
    Entropy(Arc<Expr>),
    Power(Arc<Expr>, f64),

    /// User-defined operator.
    Custom(Arc<dyn CustomOp>, Vec<Arc<Expr>>),
}

impl Atom {
    /// Children in positional order.
    pub fn args(&self) -> Vec<&Arc<Expr>> {
        match self {
            Atom::Variable(_) | Atom::Constant(_) | Atom::Parameter(_) | Atom::CallbackParam(_) => {
                Vec::new()
            }
            Atom::Add(a, b)
            | Atom::Mul(a, b)
            | Atom::MatMul(a, b)
            | Atom::QuadForm(a, b)
            | Atom::QuadOverLin(a, b) => vec![a, b],
            Atom::Neg(a)
            | Atom::Sum(a, _)
            | Atom::Reshape(a, _)
            | Atom::Index(a, _)
            | Atom::Transpose(a)
            | Atom::Trace(a)
            | Atom::Cumsum(a, _)
            | Atom::Diag(a)
            | Atom::Norm1(a)
            | Atom::Norm2(a)
            | Atom::NormInf(a)
            | Atom::Abs(a)
            | Atom::Pos(a)
            | Atom::NegPart(a)
            | Atom::SumSquares(a)
            | Atom::Exp(a)
            | Atom::Log(a)
            | Atom::Entropy(a)
            | Atom::Power(a, _) => vec![a],
            Atom::VStack(exprs)
            | Atom::HStack(exprs)
            | Atom::Maximum(exprs)
            | Atom::Minimum(exprs)
            | Atom::Custom(_, exprs) => exprs.iter().collect(),
        }
    }

    /// Move the children out, leaving an empty scalar leaf behind.
    fn take_args(&mut self) -> Vec<Arc<Expr>> {
        let leaf = Atom::Constant(ConstantData {
            value: Array::Scalar(0.0),
            shape: Shape::scalar(),
        });
        match std::mem::replace(self, leaf) {
            Atom::Variable(_) | Atom::Constant(_) | Atom::Parameter(_) | Atom::CallbackParam(_) => {
                Vec::new()
            }
            Atom::Add(a, b)
            | Atom::Mul(a, b)
            | Atom::MatMul(a, b)
            | Atom::QuadForm(a, b)
            | Atom::QuadOverLin(a, b) => vec![a, b],
            Atom::Neg(a)
            | Atom::Sum(a, _)
            | Atom::Reshape(a, _)
            | Atom::Index(a, _)
            | Atom::Transpose(a)
            | Atom::Trace(a)
            | Atom::Cumsum(a, _)
            | Atom::Diag(a)
            | Atom::Norm1(a)
            | Atom::Norm2(a)
            | Atom::NormInf(a)
            | Atom::Abs(a)
            | Atom::Pos(a)
            | Atom::NegPart(a)
            | Atom::SumSquares(a)
            | Atom::Exp(a)
            | Atom::Log(a)
            | Atom::Entropy(a)
            | Atom::Power(a, _) => vec![a],
            Atom::VStack(exprs)
            | Atom::HStack(exprs)
            | Atom::Maximum(exprs)
            | Atom::Minimum(exprs)
            | Atom::Custom(_, exprs) => exprs,
        }
    }

    /// Type tag of this atom.
    pub fn kind(&self) -> ExprKind {
        match self {
            Atom::Variable(_) => ExprKind::Variable,
            Atom::Constant(_) => ExprKind::Constant,
            Atom::Parameter(_) => ExprKind::Parameter,
            Atom::CallbackParam(_) => ExprKind::CallbackParam,
            Atom::Add(..) => ExprKind::Add,
            Atom::Neg(_) => ExprKind::Neg,
            Atom::Mul(..) => ExprKind::Mul,
            Atom::MatMul(..) => ExprKind::MatMul,
            Atom::Sum(..) => ExprKind::Sum,
            Atom::Reshape(..) => ExprKind::Reshape,
            Atom::Index(..) => ExprKind::Index,
            Atom::VStack(_) => ExprKind::VStack,
            Atom::HStack(_) => ExprKind::HStack,
            Atom::Transpose(_) => ExprKind::Transpose,
            Atom::Trace(_) => ExprKind::Trace,
            Atom::Cumsum(..) => ExprKind::Cumsum,
            Atom::Diag(_) => ExprKind::Diag,
            Atom::Norm1(_) => ExprKind::Norm1,
            Atom::Norm2(_) => ExprKind::Norm2,
            Atom::NormInf(_) => ExprKind::NormInf,
            Atom::Abs(_) => ExprKind::Abs,
            Atom::Pos(_) => ExprKind::Pos,
            Atom::NegPart(_) => ExprKind::NegPart,
            Atom::Maximum(_) => ExprKind::Maximum,
            Atom::Minimum(_) => ExprKind::Minimum,
            Atom::QuadForm(..) => ExprKind::QuadForm,
            Atom::SumSquares(_) => ExprKind::SumSquares,
            Atom::QuadOverLin(..) => ExprKind::QuadOverLin,
            Atom::Exp(_) => ExprKind::Exp,
            Atom::Log(_) => ExprKind::Log,
            Atom::Entropy(_) => ExprKind::Entropy,
            Atom::Power(..) => ExprKind::Power,
            Atom::Custom(op, _) => ExprKind::Custom(op.name()),
        }
    }
}

/// Hashable type tag of an expression node, used to key rewrite tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Variable,
    Constant,
    Parameter,
    CallbackParam,
    Add,
    Neg,
    Mul,
    MatMul,
    Sum,
    Reshape,
    Index,
    VStack,
    HStack,
    Transpose,
    Trace,
    Cumsum,
    Diag,
    Norm1,
    Norm2,
    NormInf,
    Abs,
    Pos,
    NegPart,
    Maximum,
    Minimum,
    QuadForm,
    SumSquares,
    QuadOverLin,
    Exp,
    Log,
    Entropy,
    Power,
    Custom(&'static str),
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Custom(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// An expression node.
///
/// Cloning an `Expr` yields the same node (same id); use `with_args` to
/// build a new node of the same kind.
#[derive(Debug, Clone)]
pub struct Expr {
    id: ExprId,
    atom: Atom,
    shape: Shape,
    is_constant: bool,
    has_params: bool,
}

impl Expr {
    /// Build a node with a fresh id.
    pub fn new(atom: Atom) -> Self {
        let (is_constant, has_params) = match &atom {
            Atom::Variable(_) => (false, false),
            Atom::Constant(_) => (true, false),
            Atom::Parameter(_) | Atom::CallbackParam(_) => (true, true),
            other => {
                let args = other.args();
                (
                    args.iter().all(|a| a.is_constant),
                    args.iter().any(|a| a.has_params),
                )
            }
        };
        Expr {
            id: ExprId::new(),
            shape: infer_shape(&atom),
            atom,
            is_constant,
            has_params,
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    pub fn kind(&self) -> ExprKind {
        self.atom.kind()
    }

    /// Children in positional order.
    pub fn args(&self) -> Vec<&Arc<Expr>> {
        self.atom.args()
    }

    /// True when no variable occurs in this subtree.
    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    /// True when a parameter (or deferred leaf) occurs in this subtree.
    pub fn has_params(&self) -> bool {
        self.has_params
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.atom, Atom::Variable(_))
    }

    /// Get the unique ID if this is a variable.
    pub fn variable_id(&self) -> Option<ExprId> {
        match self.atom {
            Atom::Variable(_) => Some(self.id),
            _ => None,
        }
    }

    /// Get the constant value if this is a constant leaf.
    pub fn constant_value(&self) -> Option<&Array> {
        match &self.atom {
            Atom::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// Shape of the expression, inferred once at construction.
    pub fn shape(&self) -> Shape {
        self.shape.clone()
    }

    /// Build a new node of the same kind over `args`, with a fresh id.
    ///
    /// Variables are never copied; leaves other than variables are copied
    /// only from an empty args list.
    pub fn with_args(&self, args: Vec<Arc<Expr>>) -> Result<Expr> {
        let kind = self.kind();
        let rebuild_error = |reason: String| CvxError::NotReconstructible {
            kind: kind.to_string(),
            reason,
        };
        let arity = |expected: usize, got: usize| {
            rebuild_error(format!("expected {} args, got {}", expected, got))
        };

        let n = args.len();
        let one = |args: Vec<Arc<Expr>>| -> Result<Arc<Expr>> {
            let [a]: [Arc<Expr>; 1] = args.try_into().map_err(|_| arity(1, n))?;
            Ok(a)
        };

        let atom = match &self.atom {
            Atom::Variable(_) => {
                return Err(rebuild_error(
                    "variables are passed through and never copied".into(),
                ))
            }
            Atom::Constant(_) | Atom::Parameter(_) | Atom::CallbackParam(_) => {
                if n != 0 {
                    return Err(arity(0, n));
                }
                self.atom.clone()
            }
            Atom::Add(..)
            | Atom::Mul(..)
            | Atom::MatMul(..)
            | Atom::QuadForm(..)
            | Atom::QuadOverLin(..) => {
                let [a, b]: [Arc<Expr>; 2] = args.try_into().map_err(|_| arity(2, n))?;
                match &self.atom {
                    Atom::Add(..) => Atom::Add(a, b),
                    Atom::Mul(..) => Atom::Mul(a, b),
                    Atom::MatMul(..) => Atom::MatMul(a, b),
                    Atom::QuadForm(..) => Atom::QuadForm(a, b),
                    _ => Atom::QuadOverLin(a, b),
                }
            }
            Atom::Neg(_) => Atom::Neg(one(args)?),
            Atom::Sum(_, axis) => Atom::Sum(one(args)?, *axis),
            Atom::Reshape(_, shape) => Atom::Reshape(one(args)?, shape.clone()),
            Atom::Index(_, spec) => Atom::Index(one(args)?, spec.clone()),
            Atom::Transpose(_) => Atom::Transpose(one(args)?),
            Atom::Trace(_) => Atom::Trace(one(args)?),
            Atom::Cumsum(_, axis) => Atom::Cumsum(one(args)?, *axis),
            Atom::Diag(_) => Atom::Diag(one(args)?),
            Atom::Norm1(_) => Atom::Norm1(one(args)?),
            Atom::Norm2(_) => Atom::Norm2(one(args)?),
            Atom::NormInf(_) => Atom::NormInf(one(args)?),
            Atom::Abs(_) => Atom::Abs(one(args)?),
            Atom::Pos(_) => Atom::Pos(one(args)?),
            Atom::NegPart(_) => Atom::NegPart(one(args)?),
            Atom::SumSquares(_) => Atom::SumSquares(one(args)?),
            Atom::Exp(_) => Atom::Exp(one(args)?),
            Atom::Log(_) => Atom::Log(one(args)?),
            Atom::Entropy(_) => Atom::Entropy(one(args)?),
            Atom::Power(_, p) => Atom::Power(one(args)?, *p),
            Atom::VStack(_) => Atom::VStack(args),
            Atom::HStack(_) => Atom::HStack(args),
            Atom::Maximum(_) | Atom::Minimum(_) if n == 0 => {
                return Err(rebuild_error("needs at least one argument".into()))
            }
            Atom::Maximum(_) => Atom::Maximum(args),
            Atom::Minimum(_) => Atom::Minimum(args),
            Atom::Custom(op, old) => {
                if !op.rebuildable() {
                    return Err(rebuild_error(
                        "custom operator cannot be rebuilt from an args list".into(),
                    ));
                }
                if old.len() != n {
                    return Err(arity(old.len(), n));
                }
                Atom::Custom(Arc::clone(op), args)
            }
        };
        Ok(Expr::new(atom))
    }

    /// Evaluate the numeric value of this subtree.
    ///
    /// Fails when a variable or an unset parameter is reached.
    pub fn value(&self) -> Result<Array> {
        let args = self
            .args()
            .into_iter()
            .map(super::eval::evaluate)
            .collect::<Result<Vec<_>>>()?;
        super::eval::evaluate_node(self, args)
    }

    /// Assign a value to a parameter node.
    pub fn set_value(&self, value: impl Into<Array>) -> Result<()> {
        match &self.atom {
            Atom::Parameter(p) => {
                let value = value.into();
                if value.size() != p.shape.size() {
                    return Err(CvxError::ShapeMismatch {
                        expected: p.shape.to_string(),
                        got: format!("{:?}", value.dims()),
                    });
                }
                p.set(Some(value));
                Ok(())
            }
            _ => Err(CvxError::InvalidProblem(format!(
                "cannot assign a value to {} node {}",
                self.kind(),
                self.id
            ))),
        }
    }

    /// Pre-order iterator over this node and all of its descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(self)
    }

    /// Collect all variables in this expression, sorted by id.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars: Vec<ExprId> = self.descendants().filter_map(|e| e.variable_id()).collect();
        vars.sort();
        vars.dedup();
        vars
    }

    /// Collect all parameters in this expression, sorted by id.
    pub fn parameters(&self) -> Vec<ExprId> {
        let mut params: Vec<ExprId> = self
            .descendants()
            .filter(|e| matches!(e.atom, Atom::Parameter(_)))
            .map(|e| e.id)
            .collect();
        params.sort();
        params.dedup();
        params
    }

    pub(crate) fn map_variable(mut self, f: impl FnOnce(&mut VariableData)) -> Expr {
        if let Atom::Variable(v) = &mut self.atom {
            f(v);
            self.shape = v.shape.clone();
        }
        self
    }
}

impl Drop for Expr {
    /// Tears the subtree down through a heap stack. Only children whose last
    /// reference is held here are unwrapped; shared ones just lose a count.
    fn drop(&mut self) {
        let mut pending = self.atom.take_args();
        while let Some(child) = pending.pop() {
            if let Some(mut inner) = Arc::into_inner(child) {
                pending.extend(inner.atom.take_args());
            }
        }
    }
}

/// Output shape of `atom`, read from its children's stored shapes.
fn infer_shape(atom: &Atom) -> Shape {
    match atom {
        Atom::Variable(v) => v.shape.clone(),
        Atom::Constant(c) => c.shape.clone(),
        Atom::Parameter(p) => p.shape.clone(),
        Atom::CallbackParam(c) => c.shape.clone(),

        Atom::Add(a, b) | Atom::Mul(a, b) => a
            .shape()
            .broadcast(&b.shape())
            .unwrap_or_else(Shape::scalar),
        Atom::Neg(a) => a.shape(),
        Atom::MatMul(a, b) => a.shape().matmul(&b.shape()).unwrap_or_else(Shape::scalar),
        Atom::Sum(a, axis) => {
            let dims = a.shape();
            match axis {
                _ if dims.ndim() <= 1 => Shape::scalar(),
                Some(0) => Shape::vector(dims.cols()),
                Some(_) => Shape::vector(dims.rows()),
                None => Shape::scalar(),
            }
        }
        Atom::Reshape(_, shape) => shape.clone(),
        Atom::Index(a, spec) => {
            let base = a.shape();
            let mut new_dims = Vec::new();
            for (i, r) in spec.ranges.iter().enumerate() {
                match r {
                    Some((start, stop, step)) => {
                        let step = (*step).max(1);
                        let size = stop.saturating_sub(*start).div_ceil(step);
                        if size > 1 {
                            new_dims.push(size);
                        }
                    }
                    None if spec.ranges.len() == 1 => new_dims.push(base.size()),
                    None => {
                        if i < base.ndim() {
                            new_dims.push(base.dims()[i]);
                        }
                    }
                }
            }
            Shape::from(new_dims)
        }
        Atom::VStack(exprs) => match exprs.first() {
            None => Shape::scalar(),
            Some(first) => {
                let total_rows: usize = exprs.iter().map(|e| e.shape().rows()).sum();
                if first.shape().ndim() <= 1 {
                    Shape::vector(total_rows)
                } else {
                    Shape::matrix(total_rows, first.shape().cols())
                }
            }
        },
        Atom::HStack(exprs) => match exprs.first() {
            None => Shape::scalar(),
            Some(first) => {
                let total_cols: usize = exprs.iter().map(|e| e.shape().cols()).sum();
                Shape::matrix(first.shape().rows(), total_cols)
            }
        },
        Atom::Transpose(a) => a.shape().transpose(),
        Atom::Trace(_) => Shape::scalar(),
        Atom::Cumsum(a, _) => a.shape(),
        Atom::Diag(a) => {
            let s = a.shape();
            if s.ndim() <= 1 {
                let n = s.size();
                Shape::matrix(n, n)
            } else {
                Shape::vector(s.rows().min(s.cols()))
            }
        }

        Atom::Norm1(_) | Atom::Norm2(_) | Atom::NormInf(_) => Shape::scalar(),
        Atom::Abs(a) | Atom::Pos(a) | Atom::NegPart(a) => a.shape(),
        Atom::Maximum(exprs) | Atom::Minimum(exprs) => exprs
            .iter()
            .map(|e| e.shape())
            .reduce(|acc, s| acc.broadcast(&s).unwrap_or(acc))
            .unwrap_or_else(Shape::scalar),
        Atom::QuadForm(..) | Atom::SumSquares(_) | Atom::QuadOverLin(..) => Shape::scalar(),
        Atom::Exp(a) | Atom::Log(a) | Atom::Entropy(a) | Atom::Power(a, _) => a.shape(),

        Atom::Custom(op, args) => op.shape(args),
    }
}

// Convenient From implementations for automatic conversion
impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        crate::expr::constant(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        crate::expr::constant(value as f64)
    }
}

impl From<&Expr> for Expr {
    fn from(expr: &Expr) -> Self {
        expr.clone()
    }
}

//! Expression types and creation utilities.
//!
//! This module provides the expression tree consumed by canonicalization:
//! - `Expr` - an immutable node (`ExprId` + `Atom` + constness flags)
//! - `ExprKind` - hashable type tag used to key rewrite tables
//! - `Shape` and `Array` - shapes and numeric values
//! - Variables, constants, parameters and deferred (callback) leaves
//! - Iterative traversal and numeric evaluation

pub mod constant;
pub mod eval;
pub mod expression;
pub mod parameter;
pub mod shape;
pub mod traverse;
pub mod variable;

pub use constant::{
    constant, constant_array, constant_dmatrix, constant_matrix, constant_sparse, constant_vec,
    eye, ones, zeros, IntoConstant,
};
pub use expression::{
    Array, Atom, Callback, CallbackParam, ConstantData, CustomOp, Expr, ExprId, ExprKind,
    IndexSpec, ParameterData, VariableData,
};
pub use parameter::{callback_param, named_parameter, parameter, parameter_with_value};
pub use shape::Shape;
pub use traverse::{fold_postorder, Descendants};
pub use variable::{named_variable, nonneg_variable, variable, VariableBuilder, VariableExt};

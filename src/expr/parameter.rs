//! Parameters and deferred-evaluation leaves.

use std::sync::Arc;

use super::expression::{Array, Atom, CallbackParam, Expr, ParameterData};
use super::shape::Shape;
use crate::error::Result;

/// Create a parameter with the given shape and no value.
pub fn parameter(shape: impl Into<Shape>) -> Expr {
    Expr::new(Atom::Parameter(ParameterData::new(shape.into(), None, None)))
}

/// Create a named parameter with the given shape and no value.
pub fn named_parameter(name: impl Into<String>, shape: impl Into<Shape>) -> Expr {
    Expr::new(Atom::Parameter(ParameterData::new(
        shape.into(),
        Some(name.into()),
        None,
    )))
}

/// Create a parameter with an initial value.
pub fn parameter_with_value(shape: impl Into<Shape>, value: impl Into<Array>) -> Result<Expr> {
    let p = parameter(shape);
    p.set_value(value)?;
    Ok(p)
}

/// Create a leaf whose value is produced by `f` each time it is read.
pub fn callback_param<F>(shape: impl Into<Shape>, f: F) -> Expr
where
    F: Fn() -> Result<Array> + Send + Sync + 'static,
{
    Expr::new(Atom::CallbackParam(CallbackParam::new(
        shape.into(),
        Arc::new(f),
    )))
}

//! Numeric solutions keyed by variable and constraint id.

use std::collections::HashMap;

use crate::expr::{Array, Expr, ExprId};

/// Solution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal solution found.
    Optimal,
    /// Problem is infeasible.
    Infeasible,
    /// Problem is unbounded.
    Unbounded,
    /// The solver failed.
    Error,
    /// Unknown status.
    Unknown,
}

/// Free-form solver attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Text(String),
}

/// A solution to an optimization problem.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// Optimal value, if any.
    pub opt_val: Option<f64>,
    /// Primal values by variable id.
    pub primal_vars: HashMap<ExprId, Array>,
    /// Dual values by constraint id.
    pub dual_vars: HashMap<ExprId, Array>,
    /// Solver attributes (solve time, iterations, ...).
    pub attr: HashMap<String, AttrValue>,
}

impl Solution {
    pub fn new(
        status: SolveStatus,
        opt_val: Option<f64>,
        primal_vars: HashMap<ExprId, Array>,
        dual_vars: HashMap<ExprId, Array>,
        attr: HashMap<String, AttrValue>,
    ) -> Self {
        Solution {
            status,
            opt_val,
            primal_vars,
            dual_vars,
            attr,
        }
    }

    /// A solution with no primal or dual values.
    ///
    /// Infeasible problems get +inf, unbounded ones -inf.
    pub fn failure(status: SolveStatus) -> Self {
        let opt_val = match status {
            SolveStatus::Infeasible => Some(f64::INFINITY),
            SolveStatus::Unbounded => Some(f64::NEG_INFINITY),
            _ => None,
        };
        Solution::new(
            status,
            opt_val,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
        )
    }

    /// Get the value of a variable by id.
    pub fn get_value(&self, var_id: ExprId) -> Option<&Array> {
        self.primal_vars.get(&var_id)
    }

    /// Get the value of a variable expression.
    pub fn value(&self, var: &Expr) -> Option<&Array> {
        var.variable_id().and_then(|id| self.get_value(id))
    }

    /// Get the dual value of a constraint by id.
    pub fn dual_value(&self, cons_id: ExprId) -> Option<&Array> {
        self.dual_vars.get(&cons_id)
    }
}

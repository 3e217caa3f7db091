//! Problem definition.
//!
//! The `Problem` struct represents an optimization problem with:
//! - An objective (minimize or maximize)
//! - An ordered list of constraints
//!
//! Use the builder pattern to construct problems:
//! ```
//! use cvxcanon::prelude::*;
//!
//! let x = variable(3);
//! let problem = Problem::minimize(sum(&x))
//!     .subject_to([x.geq(&constant(1.0))])
//!     .build();
//! assert_eq!(problem.constraints.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constraints::Constraint;
use crate::expr::{Atom, Expr, ExprId, Shape};

/// Objective type for optimization problems.
#[derive(Debug, Clone)]
pub enum Objective {
    /// Minimize the expression.
    Minimize(Arc<Expr>),
    /// Maximize the expression.
    Maximize(Arc<Expr>),
}

impl Objective {
    /// Get the expression being optimized.
    pub fn expr(&self) -> &Arc<Expr> {
        match self {
            Objective::Minimize(e) | Objective::Maximize(e) => e,
        }
    }

    /// Check if this is a minimization.
    pub fn is_minimize(&self) -> bool {
        matches!(self, Objective::Minimize(_))
    }

    /// Same sense, different expression.
    pub fn with_expr(&self, expr: Arc<Expr>) -> Objective {
        match self {
            Objective::Minimize(_) => Objective::Minimize(expr),
            Objective::Maximize(_) => Objective::Maximize(expr),
        }
    }
}

/// An optimization problem.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The objective to optimize.
    pub objective: Objective,
    /// The constraints, in order.
    pub constraints: Vec<Arc<Constraint>>,
}

impl Problem {
    pub fn new(objective: Objective, constraints: Vec<Arc<Constraint>>) -> Self {
        Problem {
            objective,
            constraints,
        }
    }

    /// Create a minimization problem.
    pub fn minimize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Minimize(Arc::new(expr)),
            constraints: Vec::new(),
        }
    }

    /// Create a maximization problem.
    pub fn maximize(expr: Expr) -> ProblemBuilder {
        ProblemBuilder {
            objective: Objective::Maximize(Arc::new(expr)),
            constraints: Vec::new(),
        }
    }

    /// Every expression tree of the problem: objective first, then
    /// constraint arguments in order.
    fn roots(&self) -> impl Iterator<Item = &Arc<Expr>> {
        std::iter::once(self.objective.expr())
            .chain(self.constraints.iter().flat_map(|c| c.args()))
    }

    /// Get all variable IDs in this problem, sorted.
    pub fn variables(&self) -> Vec<ExprId> {
        self.variable_shapes().into_keys().collect()
    }

    /// Variables with their shapes, ordered by id.
    pub fn variable_shapes(&self) -> BTreeMap<ExprId, Shape> {
        let mut shapes = BTreeMap::new();
        for node in self.roots().flat_map(|root| root.descendants()) {
            if let Atom::Variable(v) = node.atom() {
                shapes.insert(node.id(), v.shape.clone());
            }
        }
        shapes
    }

    /// Get all parameter IDs in this problem, sorted.
    pub fn parameters(&self) -> Vec<ExprId> {
        self.parameter_shapes().into_keys().collect()
    }

    /// Parameters with their shapes, ordered by id.
    pub fn parameter_shapes(&self) -> BTreeMap<ExprId, Shape> {
        let mut shapes = BTreeMap::new();
        for node in self.roots().flat_map(|root| root.descendants()) {
            if let Atom::Parameter(p) = node.atom() {
                shapes.insert(node.id(), p.shape.clone());
            }
        }
        shapes
    }

    /// Look up a constraint by id.
    pub fn constraint(&self, id: ExprId) -> Option<&Arc<Constraint>> {
        self.constraints.iter().find(|c| c.id() == id)
    }
}

/// Builder for constructing problems.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    objective: Objective,
    constraints: Vec<Arc<Constraint>>,
}

impl ProblemBuilder {
    /// Add constraints to the problem.
    pub fn subject_to(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints
            .extend(constraints.into_iter().map(Arc::new));
        self
    }

    /// Add a single constraint.
    pub fn constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(Arc::new(c));
        self
    }

    /// Build the problem.
    pub fn build(self) -> Problem {
        Problem {
            objective: self.objective,
            constraints: self.constraints,
        }
    }
}

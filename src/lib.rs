//! # cvxcanon
//!
//! Canonicalization for a convex-optimization modeling layer.
//!
//! cvxcanon takes a problem built from expression trees (variables,
//! constants, parameters and atoms) and rewrites every node into a
//! restricted vocabulary that a later solver-facing stage understands. Rewrites
//! come from a pluggable rule table; auxiliary constraints produced along the
//! way are collected in order, and an `InverseData` record maps a solution of
//! the rewritten problem back onto the original ids.
//!
//! ## Quick Start
//!
//! ```
//! use cvxcanon::prelude::*;
//!
//! let x = variable(2);
//! let c = sum(&x).leq(&constant(5.0));
//! let c_id = c.id();
//! let problem = Problem::minimize(norm1(&x)).subject_to([c]).build();
//!
//! let canon = Canonicalizer::new(cone_methods());
//! let (canonical, inverse_data) = canon.apply(&problem)?;
//!
//! // Auxiliary constraints come first; the rewritten `<=` is last.
//! let top = canonical.constraints.last().map(|c| c.id());
//! assert_eq!(inverse_data.cons_id_map.get(&c_id).copied(), top);
//! # Ok::<(), CvxError>(())
//! ```
//!
//! ## Dispatch
//!
//! Each node is handled by the first matching case:
//!
//! - constant subtrees that depend on a parameter become a deferred leaf
//!   re-evaluated on every read
//! - other constant subtrees are folded into a constant leaf
//! - variables pass through unchanged, keeping their identity
//! - nodes with a rule in the table are rewritten by that rule
//! - everything else is rebuilt over its canonicalized args with a fresh id
//!
//! ## Architecture
//!
//! - **Expression trees** built from `Expr` nodes with `Arc` sharing
//! - **Iterative traversal** so deeply nested expressions do not exhaust the stack
//! - **Reductions** (`Reduction`, `Chain`) compose problem rewrites and invert solutions
//! - **Rule tables** (`CanonMethods`) configure how each node kind is rewritten

pub mod atoms;
pub mod canon;
pub mod constraints;
pub mod error;
pub mod expr;
pub mod problem;
pub mod reductions;
pub mod solution;

/// Prelude module for convenient imports.
///
/// ```
/// use cvxcanon::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{
        callback_param, constant, constant_dmatrix, constant_matrix, constant_sparse,
        constant_vec, eye, named_parameter, named_variable, nonneg_variable, ones, parameter,
        variable, zeros, Array, Expr, ExprId, ExprKind, IntoConstant, Shape, VariableBuilder,
        VariableExt,
    };

    // Atoms
    pub use crate::atoms::{
        abs, cumsum, diag, dot, entropy, exp, flatten, hstack, index, log, matmul, max2, maximum,
        min2, minimum, neg_part, norm, norm1, norm2, norm_inf, pos, power, quad_form,
        quad_over_lin, reshape, slice, sqrt, sum, sum_axis, sum_squares, trace, transpose, vstack,
    };

    // Constraints
    pub use crate::constraints::{Constraint, ConstraintExt, ConstraintKind, Relation};

    // Problem and solution
    pub use crate::problem::{Objective, Problem, ProblemBuilder};
    pub use crate::solution::{AttrValue, Solution, SolveStatus};

    // Reductions
    pub use crate::canon::{cone_methods, CanonMethods, Canonicalizer};
    pub use crate::reductions::{Chain, InverseData, Reduction};

    // Errors
    pub use crate::error::{CvxError, Result};
}

// Re-export main types at crate root
pub use canon::{CanonMethods, Canonicalizer};
pub use error::{CvxError, Result};
pub use problem::Problem;
pub use reductions::{InverseData, Reduction};
pub use solution::{Solution, SolveStatus};

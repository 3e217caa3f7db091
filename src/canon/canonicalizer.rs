//! Rule-driven canonicalization.
//!
//! The canonicalizer walks every expression tree of a problem bottom-up and
//! rewrites each node into the vocabulary of the next stage. Each node is
//! handled by the first matching case:
//!
//! 1. Constant subtrees that depend on a parameter become a deferred leaf
//!    that re-evaluates the original subtree on every read.
//! 2. Other constant subtrees are evaluated once and become constant leaves.
//! 3. Variables are returned as-is.
//! 4. Nodes whose kind has a rule in the `CanonMethods` table are rewritten
//!    by that rule.
//! 5. Everything else is rebuilt over its canonicalized args with a fresh id.
//!
//! Cases 3 and 4 are swapped relative to the usual rule-first dispatch: the
//! variable check comes before the table lookup, so a rule keyed on
//! `ExprKind::Variable` is never consulted and variables always keep their
//! identity.
//!
//! Parameter-dependent subtrees are still walked, so a parameter-free
//! constant inside one is folded and any evaluation error surfaces here
//! rather than on a later read of the deferred leaf.
//!
//! Rules may introduce auxiliary constraints. These are emitted in
//! post-order, children before parents and siblings left to right, ahead
//! of the top-level constraint they support.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::constraints::{Constraint, ConstraintKind};
use crate::error::Result;
use crate::expr::{callback_param, constant_array, fold_postorder, Expr, ExprKind};
use crate::problem::Problem;
use crate::reductions::{InverseData, Reduction};
use crate::solution::Solution;

/// Rewrite rule for an expression kind.
///
/// Receives the original node and its canonicalized args; returns the
/// canonical node plus any auxiliary constraints.
pub type ExprRule = Arc<
    dyn Fn(&Arc<Expr>, Vec<Arc<Expr>>) -> Result<(Arc<Expr>, Vec<Arc<Constraint>>)> + Send + Sync,
>;

/// Rewrite rule for a constraint kind.
///
/// Always yields exactly one top-level constraint; any further structure
/// goes in the auxiliary list.
pub type ConstraintRule = Arc<
    dyn Fn(&Arc<Constraint>, Vec<Arc<Expr>>) -> Result<(Arc<Constraint>, Vec<Arc<Constraint>>)>
        + Send
        + Sync,
>;

/// Table of rewrite rules keyed by node kind.
#[derive(Clone, Default)]
pub struct CanonMethods {
    exprs: HashMap<ExprKind, ExprRule>,
    constraints: HashMap<ConstraintKind, ConstraintRule>,
}

impl CanonMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the rule for an expression kind.
    pub fn with_expr<F>(mut self, kind: ExprKind, rule: F) -> Self
    where
        F: Fn(&Arc<Expr>, Vec<Arc<Expr>>) -> Result<(Arc<Expr>, Vec<Arc<Constraint>>)>
            + Send
            + Sync
            + 'static,
    {
        self.exprs.insert(kind, Arc::new(rule));
        self
    }

    /// Register (or replace) the rule for a constraint kind.
    pub fn with_constraint<F>(mut self, kind: ConstraintKind, rule: F) -> Self
    where
        F: Fn(&Arc<Constraint>, Vec<Arc<Expr>>) -> Result<(Arc<Constraint>, Vec<Arc<Constraint>>)>
            + Send
            + Sync
            + 'static,
    {
        self.constraints.insert(kind, Arc::new(rule));
        self
    }

    /// Remove the rule for an expression kind.
    pub fn without_expr(mut self, kind: ExprKind) -> Self {
        self.exprs.remove(&kind);
        self
    }

    pub fn expr_rule(&self, kind: ExprKind) -> Option<&ExprRule> {
        self.exprs.get(&kind)
    }

    pub fn constraint_rule(&self, kind: ConstraintKind) -> Option<&ConstraintRule> {
        self.constraints.get(&kind)
    }

    /// Total number of rules.
    pub fn len(&self) -> usize {
        self.exprs.len() + self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CanonMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonMethods")
            .field("exprs", &self.exprs.keys().collect::<Vec<_>>())
            .field("constraints", &self.constraints.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The canonicalization reduction.
///
/// Holds only its immutable rule table, so one instance can be shared
/// across threads and reused across problems.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    methods: CanonMethods,
}

impl Canonicalizer {
    pub fn new(methods: CanonMethods) -> Self {
        Canonicalizer { methods }
    }

    pub fn methods(&self) -> &CanonMethods {
        &self.methods
    }

    /// Canonicalize an expression tree, returning the canonical root and the
    /// auxiliary constraints produced along the way.
    pub fn canonicalize_tree(&self, expr: &Arc<Expr>) -> Result<(Arc<Expr>, Vec<Arc<Constraint>>)> {
        let mut aux = Vec::new();
        let canon = self.canonicalize_into(expr, &mut aux)?;
        Ok((canon, aux))
    }

    /// Canonicalize a constraint and the expression trees under it.
    pub fn canonicalize_constraint_tree(
        &self,
        constraint: &Arc<Constraint>,
    ) -> Result<(Arc<Constraint>, Vec<Arc<Constraint>>)> {
        let mut aux = Vec::new();
        let canon = self.canonicalize_constraint_into(constraint, &mut aux)?;
        Ok((canon, aux))
    }

    /// Canonicalize a single node given its already-canonicalized args.
    pub fn canonicalize_expr(
        &self,
        expr: &Arc<Expr>,
        args: Vec<Arc<Expr>>,
    ) -> Result<(Arc<Expr>, Vec<Arc<Constraint>>)> {
        if expr.is_constant() {
            if expr.has_params() {
                trace!("{} {}: deferred", expr.kind(), expr.id());
                let node = Arc::clone(expr);
                let deferred = callback_param(expr.shape(), move || node.value());
                return Ok((Arc::new(deferred), Vec::new()));
            }
            trace!("{} {}: folded", expr.kind(), expr.id());
            let folded = constant_array(expr.value()?, expr.shape());
            return Ok((Arc::new(folded), Vec::new()));
        }

        // Variables keep their identity even if a table keys `ExprKind::Variable`.
        if expr.is_variable() {
            return Ok((Arc::clone(expr), Vec::new()));
        }

        if let Some(rule) = self.methods.expr_rule(expr.kind()) {
            trace!("{} {}: rewritten by rule", expr.kind(), expr.id());
            return rule(expr, args);
        }

        trace!("{} {}: copied", expr.kind(), expr.id());
        Ok((Arc::new(expr.with_args(args)?), Vec::new()))
    }

    /// Canonicalize a single constraint given its already-canonicalized args.
    pub fn canonicalize_constraint(
        &self,
        constraint: &Arc<Constraint>,
        args: Vec<Arc<Expr>>,
    ) -> Result<(Arc<Constraint>, Vec<Arc<Constraint>>)> {
        match self.methods.constraint_rule(constraint.kind()) {
            Some(rule) => {
                trace!("{} {}: rewritten by rule", constraint.kind(), constraint.id());
                rule(constraint, args)
            }
            None => {
                trace!("{} {}: copied", constraint.kind(), constraint.id());
                Ok((Arc::new(constraint.with_args(args)?), Vec::new()))
            }
        }
    }

    /// Post-order walk that appends auxiliary constraints to `aux` in the
    /// order the nodes producing them are visited.
    ///
    /// Parameter-free constant subtrees are not entered: they fold to a single
    /// leaf in one evaluation.
    fn canonicalize_into(
        &self,
        expr: &Arc<Expr>,
        aux: &mut Vec<Arc<Constraint>>,
    ) -> Result<Arc<Expr>> {
        fold_postorder(
            expr,
            |node| !node.is_constant() || node.has_params(),
            |node, args| {
                let (canon, extra) = self.canonicalize_expr(node, args)?;
                aux.extend(extra);
                Ok(canon)
            },
        )
    }

    fn canonicalize_constraint_into(
        &self,
        constraint: &Arc<Constraint>,
        aux: &mut Vec<Arc<Constraint>>,
    ) -> Result<Arc<Constraint>> {
        let args = constraint
            .args()
            .into_iter()
            .map(|arg| self.canonicalize_into(arg, aux))
            .collect::<Result<Vec<_>>>()?;
        let (canon, extra) = self.canonicalize_constraint(constraint, args)?;
        aux.extend(extra);
        Ok(canon)
    }
}

impl Reduction for Canonicalizer {
    fn name(&self) -> &str {
        "Canonicalization"
    }

    fn apply(&self, problem: &Problem) -> Result<(Problem, InverseData)> {
        let mut inverse_data = InverseData::new(problem);

        let mut constraints = Vec::new();
        let objective = self.canonicalize_into(problem.objective.expr(), &mut constraints)?;
        let objective_aux = constraints.len();

        for constraint in &problem.constraints {
            let canon = self.canonicalize_constraint_into(constraint, &mut constraints)?;
            inverse_data.cons_id_map.insert(constraint.id(), canon.id());
            constraints.push(canon);
        }

        debug!(
            "canonicalized {} constraints into {} ({} from the objective, {} rules)",
            problem.constraints.len(),
            constraints.len(),
            objective_aux,
            self.methods.len()
        );
        let canonical = Problem::new(problem.objective.with_expr(objective), constraints);
        Ok((canonical, inverse_data))
    }

    fn invert(&self, solution: &Solution, inverse_data: &InverseData) -> Solution {
        let primal_vars = inverse_data
            .id_map
            .keys()
            .filter_map(|id| solution.primal_vars.get(id).map(|v| (*id, v.clone())))
            .collect();
        let dual_vars = inverse_data
            .cons_id_map
            .iter()
            .filter_map(|(orig, canon)| solution.dual_vars.get(canon).map(|v| (*orig, v.clone())))
            .collect();
        Solution::new(
            solution.status,
            solution.opt_val,
            primal_vars,
            dual_vars,
            solution.attr.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::atoms::{abs, sum};
    use crate::constraints::ConstraintExt;
    use crate::expr::{constant, constant_vec, parameter, variable, Array, Atom, Shape};
    use crate::solution::SolveStatus;

    fn arc(e: Expr) -> Arc<Expr> {
        Arc::new(e)
    }

    #[test]
    fn test_variable_passes_through() {
        let x = arc(variable(3));
        let (canon, aux) = Canonicalizer::default().canonicalize_tree(&x).unwrap();
        assert!(Arc::ptr_eq(&canon, &x));
        assert!(aux.is_empty());
    }

    #[test]
    fn test_variable_rule_is_ignored() {
        let methods = CanonMethods::new().with_expr(ExprKind::Variable, |e, _| {
            Ok((Arc::new(variable(e.shape())), Vec::new()))
        });
        let x = arc(variable(3));
        let (canon, _) = Canonicalizer::new(methods).canonicalize_tree(&x).unwrap();
        assert!(Arc::ptr_eq(&canon, &x));
    }

    #[test]
    fn test_constant_subtree_folds() {
        let e = arc(&constant_vec(vec![1.0, 2.0]) + &constant(1.0));
        let (canon, aux) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
        assert!(aux.is_empty());
        assert_eq!(canon.kind(), ExprKind::Constant);
        assert_eq!(canon.shape(), Shape::vector(2));
        let value = canon.constant_value().unwrap().to_dense();
        assert_eq!(value.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn test_parameter_subtree_defers() {
        let p = parameter(());
        p.set_value(1.0).unwrap();
        let e = arc(&p * &constant(2.0));
        let (canon, _) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
        assert_eq!(canon.kind(), ExprKind::CallbackParam);
        assert_eq!(canon.value().unwrap().as_scalar(), Some(2.0));

        p.set_value(5.0).unwrap();
        assert_eq!(canon.value().unwrap().as_scalar(), Some(10.0));
    }

    #[test]
    fn test_deferred_subtree_folds_constant_children() {
        let p = parameter(());
        p.set_value(1.0).unwrap();
        let bad = constant_vec(vec![1.0, 2.0]) * constant_vec(vec![1.0, 2.0, 3.0]);
        let e = arc(&bad + &p);
        let err = Canonicalizer::default().canonicalize_tree(&e).unwrap_err();
        assert!(matches!(err, crate::error::CvxError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_fallback_copies_with_fresh_id() {
        let x = arc(variable(2));
        let e = arc(Expr::new(Atom::Neg(Arc::clone(&x))));
        let (canon, _) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
        assert_ne!(canon.id(), e.id());
        assert_eq!(canon.kind(), ExprKind::Neg);
        assert!(Arc::ptr_eq(canon.args()[0], &x));
    }

    #[test]
    fn test_rule_sees_canonical_args() {
        let methods = CanonMethods::new().with_expr(ExprKind::Abs, |_, args| {
            let t = Arc::new(variable(args[0].shape()));
            let c = Arc::new(Constraint::nonneg((*t).clone()));
            Ok((t, vec![c]))
        });
        let x = variable(2);
        let e = arc(sum(&abs(&(&x + &constant(1.0)))));
        let (canon, aux) = Canonicalizer::new(methods).canonicalize_tree(&e).unwrap();
        assert_eq!(canon.kind(), ExprKind::Sum);
        assert_eq!(canon.args()[0].kind(), ExprKind::Variable);
        assert_eq!(aux.len(), 1);
    }

    #[test]
    fn test_apply_and_invert() {
        let x = variable(2);
        let c = x.leq(&constant(1.0));
        let c_id = c.id();
        let problem = Problem::minimize(sum(&x)).subject_to([c]).build();

        let canon = Canonicalizer::default();
        let (out, data) = canon.apply(&problem).unwrap();
        assert_eq!(out.constraints.len(), 1);
        let new_id = out.constraints[0].id();
        assert_ne!(new_id, c_id);
        assert_eq!(data.cons_id_map.get(&c_id), Some(&new_id));

        let mut primal = HashMap::new();
        primal.insert(x.id(), Array::from_vec(vec![1.0, 1.0]));
        let mut dual = HashMap::new();
        dual.insert(new_id, Array::Scalar(0.5));
        let mut attr = HashMap::new();
        attr.insert("iterations".to_string(), crate::solution::AttrValue::Int(7));
        let sol = Solution::new(SolveStatus::Optimal, Some(2.0), primal, dual, attr);

        let back = canon.invert(&sol, &data);
        assert_eq!(back.status, SolveStatus::Optimal);
        assert_eq!(back.opt_val, Some(2.0));
        assert!(back.get_value(x.id()).is_some());
        assert_eq!(back.dual_value(c_id).and_then(|v| v.as_scalar()), Some(0.5));
        assert_eq!(back.attr.len(), 1);
    }
}

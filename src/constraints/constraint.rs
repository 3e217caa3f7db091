//! Constraint nodes.
//!
//! Cone relations understood by later stages:
//! - Zero: expr == 0 (zero cone)
//! - NonNeg: expr >= 0 (nonnegative orthant)
//! - SOC: ||x||_2 <= t (second-order cone)
//! - ExpCone: y * exp(x / y) <= z, y > 0
//! - PowerCone: |z| <= x^alpha * y^(1 - alpha), x, y >= 0
//!
//! `Equality` and `Inequality` keep both sides as written by the user and
//! are rewritten into cone relations during canonicalization.

use std::fmt;
use std::sync::Arc;

use crate::error::{CvxError, Result};
use crate::expr::{Expr, ExprId};

/// The relation a constraint imposes on its arguments.
#[derive(Debug, Clone)]
pub enum Relation {
    /// expr == 0.
    Zero(Arc<Expr>),
    /// expr >= 0.
    NonNeg(Arc<Expr>),
    /// lhs == rhs.
    Equality(Arc<Expr>, Arc<Expr>),
    /// lhs <= rhs.
    Inequality(Arc<Expr>, Arc<Expr>),
    /// ||x||_2 <= t. The t argument must be scalar, x can be a vector.
    SOC { t: Arc<Expr>, x: Arc<Expr> },
    /// (x, y, z) in the exponential cone, elementwise.
    ExpCone {
        x: Arc<Expr>,
        y: Arc<Expr>,
        z: Arc<Expr>,
    },
    /// (x, y, z) in the 3D power cone with exponent `alpha` in (0, 1).
    PowerCone {
        x: Arc<Expr>,
        y: Arc<Expr>,
        z: Arc<Expr>,
        alpha: f64,
    },
}

/// Hashable type tag of a constraint, used to key rewrite tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Zero,
    NonNeg,
    Equality,
    Inequality,
    SOC,
    ExpCone,
    PowerCone,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A constraint in an optimization problem.
///
/// Ids come from the same counter as expression ids.
#[derive(Debug, Clone)]
pub struct Constraint {
    id: ExprId,
    relation: Relation,
}

impl Constraint {
    /// Build a constraint with a fresh id.
    pub fn new(relation: Relation) -> Self {
        Constraint {
            id: ExprId::new(),
            relation,
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn kind(&self) -> ConstraintKind {
        match self.relation {
            Relation::Zero(_) => ConstraintKind::Zero,
            Relation::NonNeg(_) => ConstraintKind::NonNeg,
            Relation::Equality(..) => ConstraintKind::Equality,
            Relation::Inequality(..) => ConstraintKind::Inequality,
            Relation::SOC { .. } => ConstraintKind::SOC,
            Relation::ExpCone { .. } => ConstraintKind::ExpCone,
            Relation::PowerCone { .. } => ConstraintKind::PowerCone,
        }
    }

    /// Arguments in positional order.
    pub fn args(&self) -> Vec<&Arc<Expr>> {
        match &self.relation {
            Relation::Zero(e) | Relation::NonNeg(e) => vec![e],
            Relation::Equality(a, b) | Relation::Inequality(a, b) => vec![a, b],
            Relation::SOC { t, x } => vec![t, x],
            Relation::ExpCone { x, y, z } | Relation::PowerCone { x, y, z, .. } => vec![x, y, z],
        }
    }

    /// Build a constraint of the same kind over `args`, with a fresh id.
    pub fn with_args(&self, args: Vec<Arc<Expr>>) -> Result<Constraint> {
        let n = args.len();
        let arity = |expected: usize| CvxError::NotReconstructible {
            kind: self.kind().to_string(),
            reason: format!("expected {} args, got {}", expected, n),
        };
        let relation = match &self.relation {
            Relation::Zero(_) | Relation::NonNeg(_) => {
                let [e]: [Arc<Expr>; 1] = args.try_into().map_err(|_| arity(1))?;
                match self.relation {
                    Relation::Zero(_) => Relation::Zero(e),
                    _ => Relation::NonNeg(e),
                }
            }
            Relation::Equality(..) | Relation::Inequality(..) | Relation::SOC { .. } => {
                let [a, b]: [Arc<Expr>; 2] = args.try_into().map_err(|_| arity(2))?;
                match self.relation {
                    Relation::Equality(..) => Relation::Equality(a, b),
                    Relation::Inequality(..) => Relation::Inequality(a, b),
                    _ => Relation::SOC { t: a, x: b },
                }
            }
            Relation::ExpCone { .. } | Relation::PowerCone { .. } => {
                let [x, y, z]: [Arc<Expr>; 3] = args.try_into().map_err(|_| arity(3))?;
                match self.relation {
                    Relation::PowerCone { alpha, .. } => Relation::PowerCone { x, y, z, alpha },
                    _ => Relation::ExpCone { x, y, z },
                }
            }
        };
        Ok(Constraint::new(relation))
    }

    /// Create a zero-cone constraint: expr == 0.
    pub fn zero(expr: Expr) -> Self {
        Constraint::new(Relation::Zero(Arc::new(expr)))
    }

    /// Create a nonnegative-orthant constraint: expr >= 0.
    pub fn nonneg(expr: Expr) -> Self {
        Constraint::new(Relation::NonNeg(Arc::new(expr)))
    }

    /// Create an equality constraint: lhs == rhs.
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Constraint::new(Relation::Equality(Arc::new(lhs), Arc::new(rhs)))
    }

    /// Create an inequality constraint: lhs <= rhs.
    pub fn leq(lhs: Expr, rhs: Expr) -> Self {
        Constraint::new(Relation::Inequality(Arc::new(lhs), Arc::new(rhs)))
    }

    /// Create an inequality constraint: lhs >= rhs.
    pub fn geq(lhs: Expr, rhs: Expr) -> Self {
        Constraint::leq(rhs, lhs)
    }

    /// Create a SOC constraint: ||x||_2 <= t.
    pub fn soc(t: Expr, x: Expr) -> Self {
        Constraint::new(Relation::SOC {
            t: Arc::new(t),
            x: Arc::new(x),
        })
    }

    pub fn exp_cone(x: Expr, y: Expr, z: Expr) -> Self {
        Constraint::new(Relation::ExpCone {
            x: Arc::new(x),
            y: Arc::new(y),
            z: Arc::new(z),
        })
    }

    pub fn power_cone(x: Expr, y: Expr, z: Expr, alpha: f64) -> Self {
        Constraint::new(Relation::PowerCone {
            x: Arc::new(x),
            y: Arc::new(y),
            z: Arc::new(z),
            alpha,
        })
    }

    /// Get all variable IDs in this constraint, sorted.
    pub fn variables(&self) -> Vec<ExprId> {
        let mut vars: Vec<ExprId> = self.args().into_iter().flat_map(|e| e.variables()).collect();
        vars.sort();
        vars.dedup();
        vars
    }

    /// Get all parameter IDs in this constraint, sorted.
    pub fn parameters(&self) -> Vec<ExprId> {
        let mut params: Vec<ExprId> = self
            .args()
            .into_iter()
            .flat_map(|e| e.parameters())
            .collect();
        params.sort();
        params.dedup();
        params
    }
}

/// Extension trait for creating constraints from expressions.
pub trait ConstraintExt {
    /// Create equality constraint: self == rhs.
    fn equals(&self, rhs: &Expr) -> Constraint;

    /// Create inequality constraint: self <= rhs.
    fn leq(&self, rhs: &Expr) -> Constraint;

    /// Create inequality constraint: self >= rhs.
    fn geq(&self, rhs: &Expr) -> Constraint;
}

impl ConstraintExt for Expr {
    fn equals(&self, rhs: &Expr) -> Constraint {
        Constraint::eq(self.clone(), rhs.clone())
    }

    fn leq(&self, rhs: &Expr) -> Constraint {
        Constraint::leq(self.clone(), rhs.clone())
    }

    fn geq(&self, rhs: &Expr) -> Constraint {
        Constraint::geq(self.clone(), rhs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant, variable};

    #[test]
    fn test_constraint_ext() {
        let x = variable(5);
        let c = constant(1.0);

        let eq = x.equals(&c);
        assert_eq!(eq.kind(), ConstraintKind::Equality);
        assert_eq!(eq.args()[0].id(), x.id());

        let le = x.leq(&c);
        assert_eq!(le.kind(), ConstraintKind::Inequality);
        assert_eq!(le.args()[0].id(), x.id());
    }

    #[test]
    fn test_geq_swaps_sides() {
        let x = variable(());
        let c = constant(0.0);
        let ge = x.geq(&c);
        assert_eq!(ge.kind(), ConstraintKind::Inequality);
        assert_eq!(ge.args()[0].id(), c.id());
        assert_eq!(ge.args()[1].id(), x.id());
    }

    #[test]
    fn test_ids_disjoint_from_expressions() {
        let x = variable(());
        let c = Constraint::nonneg(x.clone());
        assert_ne!(c.id(), x.id());
        assert!(c.id() > x.id());
    }

    #[test]
    fn test_with_args_fresh_id() {
        let t = variable(());
        let x = variable(3);
        let soc = Constraint::soc(t.clone(), x.clone());
        let args: Vec<Arc<Expr>> = soc.args().into_iter().cloned().collect();

        let copy = soc.with_args(args).unwrap();
        assert_ne!(copy.id(), soc.id());
        assert_eq!(copy.kind(), ConstraintKind::SOC);
        assert!(Arc::ptr_eq(copy.args()[1], soc.args()[1]));

        assert!(matches!(
            soc.with_args(vec![Arc::new(t)]),
            Err(CvxError::NotReconstructible { .. })
        ));
    }

    #[test]
    fn test_power_cone_keeps_alpha() {
        let pc = Constraint::power_cone(variable(()), variable(()), variable(()), 0.3);
        let args = pc.args().into_iter().cloned().collect();
        match pc.with_args(args).unwrap().relation() {
            Relation::PowerCone { alpha, .. } => assert_eq!(*alpha, 0.3),
            other => panic!("expected power cone, got {:?}", other),
        }
    }

    #[test]
    fn test_variables() {
        let x = variable(2);
        let y = variable(2);
        let c = (&x + &y).leq(&x);
        assert_eq!(c.variables(), {
            let mut ids = vec![x.id(), y.id()];
            ids.sort();
            ids
        });
    }
}

//! Standard rewrite rules targeting the conic vocabulary.
//!
//! After these rules run, every nonlinear atom is replaced by a fresh
//! epigraph (or hypograph) variable, and every constraint is one of
//! `Zero`, `NonNeg`, `SOC`, `ExpCone` or `PowerCone` over affine args.

use std::sync::Arc;

use super::canonicalizer::CanonMethods;
use crate::constraints::{Constraint, ConstraintKind, Relation};
use crate::error::{CvxError, Result};
use crate::expr::{constant, ones, Atom, Expr, ExprKind, Shape, VariableBuilder};

type Rewrite = (Arc<Expr>, Vec<Arc<Constraint>>);
type ConstraintRewrite = (Arc<Constraint>, Vec<Arc<Constraint>>);

/// Rule table that rewrites every nonlinear atom into cone constraints.
pub fn cone_methods() -> CanonMethods {
    CanonMethods::new()
        .with_constraint(ConstraintKind::Equality, equality_canon)
        .with_constraint(ConstraintKind::Inequality, inequality_canon)
        .with_expr(ExprKind::Abs, abs_canon)
        .with_expr(ExprKind::Pos, pos_canon)
        .with_expr(ExprKind::NegPart, neg_part_canon)
        .with_expr(ExprKind::Norm1, norm1_canon)
        .with_expr(ExprKind::NormInf, norm_inf_canon)
        .with_expr(ExprKind::Norm2, norm2_canon)
        .with_expr(ExprKind::Maximum, maximum_canon)
        .with_expr(ExprKind::Minimum, minimum_canon)
        .with_expr(ExprKind::SumSquares, sum_squares_canon)
        .with_expr(ExprKind::QuadOverLin, quad_over_lin_canon)
        .with_expr(ExprKind::Exp, exp_canon)
        .with_expr(ExprKind::Log, log_canon)
        .with_expr(ExprKind::Entropy, entropy_canon)
        .with_expr(ExprKind::Power, power_canon)
}

// ============================================================================
// Node helpers
// ============================================================================

fn add(a: &Arc<Expr>, b: &Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::new(Atom::Add(Arc::clone(a), Arc::clone(b))))
}

fn neg(a: &Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::new(Atom::Neg(Arc::clone(a))))
}

fn sub(a: &Arc<Expr>, b: &Arc<Expr>) -> Arc<Expr> {
    add(a, &neg(b))
}

fn scale(k: f64, a: &Arc<Expr>) -> Arc<Expr> {
    Arc::new(Expr::new(Atom::Mul(Arc::new(constant(k)), Arc::clone(a))))
}

fn flatten(a: &Arc<Expr>) -> Arc<Expr> {
    let shape = a.shape();
    if shape.ndim() <= 1 {
        Arc::clone(a)
    } else {
        Arc::new(Expr::new(Atom::Reshape(
            Arc::clone(a),
            Shape::vector(shape.size()),
        )))
    }
}

fn aux_var(shape: Shape) -> Arc<Expr> {
    Arc::new(VariableBuilder::new(shape).build())
}

fn nonneg(e: Arc<Expr>) -> Arc<Constraint> {
    Arc::new(Constraint::new(Relation::NonNeg(e)))
}

fn unary(args: Vec<Arc<Expr>>, kind: ExprKind) -> Result<Arc<Expr>> {
    let n = args.len();
    let [x]: [Arc<Expr>; 1] = args.try_into().map_err(|_| CvxError::NotReconstructible {
        kind: kind.to_string(),
        reason: format!("expected 1 arg, got {}", n),
    })?;
    Ok(x)
}

fn binary(args: Vec<Arc<Expr>>, kind: String) -> Result<[Arc<Expr>; 2]> {
    let n = args.len();
    args.try_into().map_err(|_| CvxError::NotReconstructible {
        kind,
        reason: format!("expected 2 args, got {}", n),
    })
}

/// `||x||_2^2 <= t * y` as `||(2x, t - y)||_2 <= t + y`.
fn rotated_soc(x: &Arc<Expr>, t: &Arc<Expr>, y: &Arc<Expr>) -> Arc<Constraint> {
    let stacked = Arc::new(Expr::new(Atom::VStack(vec![
        scale(2.0, &flatten(x)),
        sub(t, y),
    ])));
    Arc::new(Constraint::new(Relation::SOC {
        t: add(t, y),
        x: stacked,
    }))
}

// ============================================================================
// Constraint rules
// ============================================================================

/// `lhs == rhs` becomes `lhs - rhs == 0`.
fn equality_canon(c: &Arc<Constraint>, args: Vec<Arc<Expr>>) -> Result<ConstraintRewrite> {
    let [lhs, rhs] = binary(args, c.kind().to_string())?;
    let zero = Constraint::new(Relation::Zero(sub(&lhs, &rhs)));
    Ok((Arc::new(zero), Vec::new()))
}

/// `lhs <= rhs` becomes `s >= 0` and `lhs + s - rhs == 0` for a slack `s`.
fn inequality_canon(c: &Arc<Constraint>, args: Vec<Arc<Expr>>) -> Result<ConstraintRewrite> {
    let [lhs, rhs] = binary(args, c.kind().to_string())?;
    let shape = lhs.shape().broadcast(&rhs.shape()).unwrap_or_else(|| lhs.shape());
    let slack = Arc::new(VariableBuilder::new(shape).nonneg().build());
    let zero = Constraint::new(Relation::Zero(sub(&add(&lhs, &slack), &rhs)));
    Ok((Arc::new(zero), vec![nonneg(slack)]))
}

// ============================================================================
// Piecewise-linear atoms
// ============================================================================

fn abs_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let aux = vec![nonneg(sub(&t, &x)), nonneg(add(&t, &x))];
    Ok((t, aux))
}

fn pos_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let aux = vec![nonneg(sub(&t, &x)), nonneg(Arc::clone(&t))];
    Ok((t, aux))
}

fn neg_part_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let aux = vec![nonneg(add(&t, &x)), nonneg(Arc::clone(&t))];
    Ok((t, aux))
}

/// `sum(t)` with `-t <= x <= t`.
fn norm1_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let aux = vec![nonneg(sub(&t, &x)), nonneg(add(&t, &x))];
    let total = Arc::new(Expr::new(Atom::Sum(t, None)));
    Ok((total, aux))
}

/// Scalar `t` with `-t <= x_i <= t` for every element.
fn norm_inf_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(Shape::scalar());
    let aux = vec![nonneg(sub(&t, &x)), nonneg(add(&t, &x))];
    Ok((t, aux))
}

fn maximum_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let t = aux_var(expr.shape());
    let aux = args.iter().map(|a| nonneg(sub(&t, a))).collect();
    Ok((t, aux))
}

fn minimum_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let t = aux_var(expr.shape());
    let aux = args.iter().map(|a| nonneg(sub(a, &t))).collect();
    Ok((t, aux))
}

// ============================================================================
// Second-order cone atoms
// ============================================================================

fn norm2_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(Shape::scalar());
    let soc = Constraint::new(Relation::SOC {
        t: Arc::clone(&t),
        x,
    });
    Ok((t, vec![Arc::new(soc)]))
}

fn sum_squares_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(Shape::scalar());
    let one = Arc::new(constant(1.0));
    let soc = rotated_soc(&x, &t, &one);
    Ok((t, vec![soc]))
}

fn quad_over_lin_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let [x, y] = binary(args, expr.kind().to_string())?;
    let t = aux_var(Shape::scalar());
    let soc = rotated_soc(&x, &t, &y);
    Ok((t, vec![soc]))
}

// ============================================================================
// Exponential cone atoms
// ============================================================================

/// `(x, 1, t)` in K_exp: t >= exp(x).
fn exp_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let cone = Constraint::new(Relation::ExpCone {
        y: Arc::new(ones(x.shape())),
        x,
        z: Arc::clone(&t),
    });
    Ok((t, vec![Arc::new(cone)]))
}

/// `(t, 1, x)` in K_exp: t <= log(x).
fn log_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let cone = Constraint::new(Relation::ExpCone {
        x: Arc::clone(&t),
        y: Arc::new(ones(x.shape())),
        z: x,
    });
    Ok((t, vec![Arc::new(cone)]))
}

/// `(t, x, 1)` in K_exp: t <= -x log(x).
fn entropy_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let x = unary(args, expr.kind())?;
    let t = aux_var(x.shape());
    let cone = Constraint::new(Relation::ExpCone {
        x: Arc::clone(&t),
        z: Arc::new(ones(x.shape())),
        y: x,
    });
    Ok((t, vec![Arc::new(cone)]))
}

// ============================================================================
// Power cone atoms
// ============================================================================

fn power_canon(expr: &Arc<Expr>, args: Vec<Arc<Expr>>) -> Result<Rewrite> {
    let p = match expr.atom() {
        Atom::Power(_, p) => *p,
        _ => {
            return Err(CvxError::NotReconstructible {
                kind: expr.kind().to_string(),
                reason: "power rule applied to a non-power node".into(),
            })
        }
    };
    let x = unary(args, expr.kind())?;

    if (p - 1.0).abs() < 1e-10 {
        return Ok((x, Vec::new()));
    }
    if p.abs() < 1e-10 {
        return Ok((Arc::new(ones(x.shape())), Vec::new()));
    }

    let t = aux_var(x.shape());
    let one = Arc::new(ones(x.shape()));
    let t_ref = Arc::clone(&t);
    let relation = if p > 0.0 && p < 1.0 {
        // t <= x^p
        Relation::PowerCone {
            x,
            y: one,
            z: t_ref,
            alpha: p,
        }
    } else if p > 1.0 {
        // t >= |x|^p
        Relation::PowerCone {
            x: t_ref,
            y: one,
            z: x,
            alpha: 1.0 / p,
        }
    } else {
        // t >= x^p for p < 0, i.e. t * x^(-p) >= 1
        Relation::PowerCone {
            x: t_ref,
            y: x,
            z: one,
            alpha: 1.0 / (1.0 - p),
        }
    };
    Ok((t, vec![Arc::new(Constraint::new(relation))]))
}

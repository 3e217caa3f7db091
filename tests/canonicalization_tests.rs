//! End-to-end tests for the canonicalization reduction.

use std::collections::HashMap;
use std::sync::Arc;

use cvxcanon::expr::{Atom, CustomOp};
use cvxcanon::prelude::*;

/// `lhs <= rhs` rewritten as `s >= 0` plus `lhs + s == rhs`.
fn slack_methods() -> CanonMethods {
    CanonMethods::new().with_constraint(ConstraintKind::Inequality, |_, args| {
        let (lhs, rhs) = (&args[0], &args[1]);
        let s = nonneg_variable(lhs.shape());
        let aux = Arc::new(s.geq(&constant(0.0)));
        let top = Arc::new((lhs.as_ref() + &s).equals(rhs));
        Ok((top, vec![aux]))
    })
}

fn solution(primal: HashMap<ExprId, Array>, dual: HashMap<ExprId, Array>) -> Solution {
    Solution::new(SolveStatus::Optimal, Some(5.0), primal, dual, HashMap::new())
}

#[derive(Debug)]
struct Opaque {
    rebuildable: bool,
}

impl CustomOp for Opaque {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn shape(&self, args: &[Arc<Expr>]) -> Shape {
        args[0].shape()
    }

    fn rebuildable(&self) -> bool {
        self.rebuildable
    }
}

fn opaque(x: &Expr, rebuildable: bool) -> Expr {
    Expr::new(Atom::Custom(
        Arc::new(Opaque { rebuildable }),
        vec![Arc::new(x.clone())],
    ))
}

#[test_log::test]
fn test_slack_example_end_to_end() {
    let x0 = variable(());
    let x1 = variable(());
    let c = (&x0 + &x1).leq(&constant(5.0));
    let c_id = c.id();
    let problem = Problem::minimize(&x0 + &x1).subject_to([c]).build();

    let canon = Canonicalizer::new(slack_methods());
    let (out, data) = canon.apply(&problem).unwrap();

    // [s >= 0, x0 + x1 + s == 5]
    assert_eq!(out.constraints.len(), 2);
    let aux_id = out.constraints[0].id();
    let top_id = out.constraints[1].id();
    assert_eq!(out.constraints[1].kind(), ConstraintKind::Equality);
    assert_eq!(data.cons_id_map.len(), 1);
    assert_eq!(data.cons_id_map.get(&c_id), Some(&top_id));
    assert!(!data.cons_id_map.values().any(|id| *id == aux_id));

    let mut dual = HashMap::new();
    dual.insert(top_id, Array::Scalar(-1.0));
    let back = canon.invert(&solution(HashMap::new(), dual), &data);
    assert_eq!(back.dual_vars.len(), 1);
    assert_eq!(back.dual_value(c_id).and_then(|d| d.as_scalar()), Some(-1.0));
    assert_eq!(back.opt_val, Some(5.0));
}

#[test_log::test]
fn test_every_constraint_mapped_once() {
    let x = variable(3);
    let constraints = vec![
        x.leq(&constant(1.0)),
        x.geq(&constant(-1.0)),
        sum(&x).equals(&constant(0.0)),
        Constraint::soc(norm1(&x), x.clone()),
    ];
    let ids: Vec<ExprId> = constraints.iter().map(|c| c.id()).collect();
    let problem = Problem::minimize(norm2(&x)).subject_to(constraints).build();

    let (out, data) = Canonicalizer::new(cone_methods()).apply(&problem).unwrap();
    assert_eq!(data.cons_id_map.len(), ids.len());
    for id in &ids {
        let canon_id = data.cons_id_map[id];
        assert!(out.constraint(canon_id).is_some());
        assert!(!ids.contains(&canon_id));
    }
}

#[test_log::test]
fn test_variables_keep_identity() {
    let x = Arc::new(variable(2));
    let y = Arc::new(variable(2));
    let e = Arc::new(Expr::new(Atom::Add(
        Arc::new(Expr::new(Atom::Neg(Arc::clone(&x)))),
        Arc::clone(&y),
    )));

    let (canon, aux) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
    assert!(aux.is_empty());
    assert!(Arc::ptr_eq(canon.args()[0].args()[0], &x));
    assert!(Arc::ptr_eq(canon.args()[1], &y));

    let (lone, aux) = Canonicalizer::new(cone_methods())
        .canonicalize_tree(&x)
        .unwrap();
    assert!(Arc::ptr_eq(&lone, &x));
    assert!(aux.is_empty());
}

#[test_log::test]
fn test_constant_folding_ignores_rules() {
    // The Abs rule would add constraints; a constant subtree is folded first.
    let a = constant_vec(vec![-1.0, 2.0]);
    let e = Arc::new(abs(&a));
    let (canon, aux) = Canonicalizer::new(cone_methods())
        .canonicalize_tree(&e)
        .unwrap();
    assert!(aux.is_empty());
    assert_eq!(canon.kind(), ExprKind::Constant);
    assert_eq!(
        canon.constant_value().unwrap().to_dense().as_slice(),
        &[1.0, 2.0]
    );
}

#[test_log::test]
fn test_deferred_parameter_tracks_updates() {
    let p = parameter(2);
    p.set_value(vec![1.0, 2.0]).unwrap();
    let x = variable(2);
    let c = x.leq(&(2.0 * &p));
    let problem = Problem::minimize(sum(&x)).subject_to([c]).build();

    let (out, _) = Canonicalizer::default().apply(&problem).unwrap();
    let rhs = Arc::clone(out.constraints[0].args()[1]);
    assert_eq!(rhs.kind(), ExprKind::CallbackParam);
    assert!(rhs.has_params());
    assert_eq!(rhs.value().unwrap().to_dense().as_slice(), &[2.0, 4.0]);

    p.set_value(vec![3.0, -1.0]).unwrap();
    assert_eq!(rhs.value().unwrap().to_dense().as_slice(), &[6.0, -2.0]);
}

#[test_log::test]
fn test_fallback_ids_are_fresh() {
    let x = variable((2, 3));
    let e = Arc::new(sum_axis(&transpose(&x), 0));
    let before = ExprId::new();

    let (canon, _) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
    assert_eq!(canon.kind(), ExprKind::Sum);
    assert!(canon.id() > before);
    assert!(canon.args()[0].id() > before);
    assert_eq!(canon.shape(), e.shape());
}

#[test_log::test]
fn test_aux_constraints_in_postorder() {
    // Abs rule: new epigraph variable, aux constraint over the canonical arg.
    let methods = CanonMethods::new().with_expr(ExprKind::Abs, |_, args| {
        let t = Arc::new(variable(args[0].shape()));
        let aux = Arc::new(Constraint::nonneg(args[0].as_ref().clone()));
        Ok((t, vec![aux]))
    });
    let x = variable(());
    let y = variable(());
    let inner = abs(&x);
    let e = &abs(&inner) + &abs(&y);
    let c = e.leq(&constant(1.0));
    let c_id = c.id();
    let problem = Problem::minimize(constant(0.0)).subject_to([c]).build();

    let (out, data) = Canonicalizer::new(methods).apply(&problem).unwrap();
    let args: Vec<ExprId> = out.constraints[..3]
        .iter()
        .map(|c| c.args()[0].id())
        .collect();

    assert_eq!(out.constraints.len(), 4);
    assert_eq!(args[0], x.id());
    assert_ne!(args[1], x.id());
    assert_ne!(args[1], y.id());
    assert_eq!(args[2], y.id());
    assert_eq!(data.cons_id_map[&c_id], out.constraints[3].id());
}

#[test_log::test]
fn test_invert_omits_missing_ids() {
    let x = variable(());
    let y = variable(());
    let c1 = x.leq(&constant(1.0));
    let c2 = y.leq(&constant(1.0));
    let (id1, id2) = (c1.id(), c2.id());
    let problem = Problem::minimize(&x + &y).subject_to([c1, c2]).build();

    let canon = Canonicalizer::new(cone_methods());
    let (out, data) = canon.apply(&problem).unwrap();

    let mut primal = HashMap::new();
    primal.insert(x.id(), Array::Scalar(1.0));
    let mut dual = HashMap::new();
    dual.insert(data.cons_id_map[&id2], Array::Scalar(0.25));
    // an auxiliary constraint's dual is not carried back
    dual.insert(out.constraints[0].id(), Array::Scalar(9.0));

    let back = canon.invert(&solution(primal, dual), &data);
    assert!(back.get_value(x.id()).is_some());
    assert!(back.get_value(y.id()).is_none());
    assert!(back.dual_value(id1).is_none());
    assert_eq!(back.dual_value(id2).and_then(|d| d.as_scalar()), Some(0.25));
    assert_eq!(back.dual_vars.len(), 1);
}

#[test_log::test]
fn test_unrebuildable_node_without_rule_fails() {
    let x = variable(2);
    let e = Arc::new(opaque(&x, false));
    let err = Canonicalizer::default().canonicalize_tree(&e).unwrap_err();
    match err {
        CvxError::NotReconstructible { kind, .. } => assert_eq!(kind, "opaque"),
        other => panic!("expected NotReconstructible, got {:?}", other),
    }

    // A rule for the custom kind takes precedence over the fallback.
    let methods = CanonMethods::new().with_expr(ExprKind::Custom("opaque"), |_, args| {
        Ok((Arc::clone(&args[0]), Vec::new()))
    });
    let (canon, _) = Canonicalizer::new(methods).canonicalize_tree(&e).unwrap();
    assert_eq!(canon.id(), x.id());

    // Rebuildable custom ops are copied.
    let e = Arc::new(opaque(&x, true));
    let (canon, _) = Canonicalizer::default().canonicalize_tree(&e).unwrap();
    assert_eq!(canon.kind(), ExprKind::Custom("opaque"));
    assert_ne!(canon.id(), e.id());
}

#[test_log::test]
fn test_evaluation_errors_propagate() {
    let e = Arc::new(opaque(&constant(1.0), true));
    let err = Canonicalizer::default().canonicalize_tree(&e).unwrap_err();
    assert!(matches!(err, CvxError::NotEvaluable(_)));
}

#[test_log::test]
fn test_evaluation_errors_under_parameters_propagate() {
    let x = variable(());
    let p = parameter(());
    p.set_value(1.0).unwrap();
    let problem = Problem::minimize(&x + &(&opaque(&constant(1.0), true) + &p)).build();
    let err = Canonicalizer::default().apply(&problem).unwrap_err();
    assert!(matches!(err, CvxError::NotEvaluable(_)));
}

#[test_log::test]
fn test_chain_with_canonicalizer() {
    let x = variable(3);
    let c = norm_inf(&x).leq(&constant(2.0));
    let c_id = c.id();
    let problem = Problem::maximize(sum(&x)).subject_to([c]).build();

    let chain = Chain::default()
        .then(Canonicalizer::new(cone_methods()))
        .then(Canonicalizer::default());
    let (out, data) = chain.apply(&problem).unwrap();
    assert_eq!(data.len(), 2);
    assert!(!data[0].minimize);

    let first = data[0].cons_id_map[&c_id];
    let last = data[1].cons_id_map[&first];
    assert_eq!(out.constraints.last().map(|c| c.id()), Some(last));

    let mut dual = HashMap::new();
    dual.insert(last, Array::Scalar(1.5));
    let mut primal = HashMap::new();
    primal.insert(x.id(), Array::from_vec(vec![2.0, 2.0, 2.0]));
    let back = chain.invert(&solution(primal, dual), &data).unwrap();
    assert_eq!(back.dual_value(c_id).and_then(|d| d.as_scalar()), Some(1.5));
    assert!(back.get_value(x.id()).is_some());
}

#[test_log::test]
fn test_shared_across_threads() {
    let canon = Arc::new(Canonicalizer::new(cone_methods()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let canon = Arc::clone(&canon);
            std::thread::spawn(move || {
                let x = variable(4);
                let problem = Problem::minimize(norm1(&x))
                    .subject_to([x.geq(&constant(1.0))])
                    .build();
                canon.apply(&problem).map(|(out, _)| out.constraints.len())
            })
        })
        .collect();
    for handle in handles {
        // norm1: 2 aux; inequality: slack aux + top-level
        assert_eq!(handle.join().unwrap().unwrap(), 4);
    }
}

#[test_log::test]
fn test_deep_nesting() {
    let x = variable(());
    let mut e = x.clone();
    for _ in 0..50_000 {
        e = -e;
    }
    let root = Arc::new(e);
    let (canon, aux) = Canonicalizer::default().canonicalize_tree(&root).unwrap();
    assert!(aux.is_empty());
    assert_eq!(canon.kind(), ExprKind::Neg);
    assert_eq!(canon.variables(), vec![x.id()]);
    drop(root);
    drop(canon);
}

#[test_log::test]
fn test_deep_constant_chain() {
    let mut e = constant(1.0);
    for _ in 0..50_000 {
        e = -e;
    }
    let root = Arc::new(e);
    let (canon, aux) = Canonicalizer::default().canonicalize_tree(&root).unwrap();
    assert!(aux.is_empty());
    assert_eq!(canon.kind(), ExprKind::Constant);
    assert_eq!(canon.constant_value().and_then(|v| v.as_scalar()), Some(1.0));
}

#[test_log::test]
fn test_deep_parameter_chain() {
    let x = variable(());
    let p = parameter(());
    p.set_value(2.0).unwrap();
    let mut e = p.clone();
    for _ in 0..50_000 {
        e = -e;
    }
    let problem = Problem::minimize(&x + &e).build();
    let (out, _) = Canonicalizer::default().apply(&problem).unwrap();
    let deferred = out.objective.expr().args()[1].clone();
    assert_eq!(deferred.kind(), ExprKind::CallbackParam);
    assert_eq!(deferred.value().unwrap().as_scalar(), Some(2.0));

    p.set_value(3.0).unwrap();
    assert_eq!(deferred.value().unwrap().as_scalar(), Some(3.0));
    drop(out);
    drop(problem);
}

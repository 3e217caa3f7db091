//! Bookkeeping snapshot taken when a reduction is applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::constraints::Constraint;
use crate::expr::{ExprId, Shape};
use crate::problem::Problem;

/// Original-to-reduced id mappings for one reduction step.
#[derive(Debug, Clone, Default)]
pub struct InverseData {
    /// Variable id in the original problem to variable id in the reduced one.
    pub id_map: BTreeMap<ExprId, ExprId>,
    pub var_shapes: BTreeMap<ExprId, Shape>,
    /// Offset of each variable in the stacked (column-major) variable vector.
    pub var_offsets: BTreeMap<ExprId, usize>,
    /// Length of the stacked variable vector.
    pub x_length: usize,
    pub param_shapes: BTreeMap<ExprId, Shape>,
    /// Original constraints by id.
    pub id2cons: HashMap<ExprId, Arc<Constraint>>,
    /// Original constraint id to reduced top-level constraint id.
    pub cons_id_map: BTreeMap<ExprId, ExprId>,
    /// The original objective is a minimization.
    pub minimize: bool,
}

impl InverseData {
    /// Snapshot the variables, parameters and constraints of `problem`.
    ///
    /// `cons_id_map` starts empty; the reduction fills it.
    pub fn new(problem: &Problem) -> Self {
        let var_shapes = problem.variable_shapes();

        let mut var_offsets = BTreeMap::new();
        let mut x_length = 0;
        for (id, shape) in &var_shapes {
            var_offsets.insert(*id, x_length);
            x_length += shape.size();
        }

        InverseData {
            id_map: var_shapes.keys().map(|id| (*id, *id)).collect(),
            var_offsets,
            x_length,
            var_shapes,
            param_shapes: problem.parameter_shapes(),
            id2cons: problem
                .constraints
                .iter()
                .map(|c| (c.id(), Arc::clone(c)))
                .collect(),
            cons_id_map: BTreeMap::new(),
            minimize: problem.objective.is_minimize(),
        }
    }
}

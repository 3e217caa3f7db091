//! Sequential composition of reductions.

use log::debug;

use super::{InverseData, Reduction};
use crate::error::{CvxError, Result};
use crate::problem::Problem;
use crate::solution::Solution;

/// Applies reductions in order and inverts them in reverse.
#[derive(Default)]
pub struct Chain {
    reductions: Vec<Box<dyn Reduction>>,
}

impl Chain {
    pub fn new(reductions: Vec<Box<dyn Reduction>>) -> Self {
        Chain { reductions }
    }

    /// Append a reduction.
    pub fn then(mut self, reduction: impl Reduction + 'static) -> Self {
        self.reductions.push(Box::new(reduction));
        self
    }

    pub fn len(&self) -> usize {
        self.reductions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reductions.is_empty()
    }

    /// Run every reduction, returning the final problem and the inverse data
    /// of each stage in application order.
    pub fn apply(&self, problem: &Problem) -> Result<(Problem, Vec<InverseData>)> {
        let mut current = problem.clone();
        let mut inverse = Vec::with_capacity(self.reductions.len());
        for reduction in &self.reductions {
            if !reduction.accepts(&current) {
                return Err(CvxError::InvalidProblem(format!(
                    "reduction {} does not accept the problem",
                    reduction.name()
                )));
            }
            let (next, data) = reduction.apply(&current)?;
            debug!(
                "{}: {} -> {} constraints",
                reduction.name(),
                current.constraints.len(),
                next.constraints.len()
            );
            current = next;
            inverse.push(data);
        }
        Ok((current, inverse))
    }

    /// Map a solution of the final problem back through every stage.
    pub fn invert(&self, solution: &Solution, inverse_data: &[InverseData]) -> Result<Solution> {
        if inverse_data.len() != self.reductions.len() {
            return Err(CvxError::InvalidProblem(format!(
                "expected inverse data for {} reductions, got {}",
                self.reductions.len(),
                inverse_data.len()
            )));
        }
        let mut solution = solution.clone();
        for (reduction, data) in self.reductions.iter().zip(inverse_data).rev() {
            solution = reduction.invert(&solution, data);
        }
        Ok(solution)
    }
}

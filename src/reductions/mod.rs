//! Reductions: problem-to-problem transformations with solution inversion.
//!
//! A reduction rewrites a `Problem` into an equivalent one and records an
//! `InverseData` snapshot that lets a solution of the rewritten problem be
//! mapped back onto the original problem's ids. Reductions compose with
//! `Chain`.

mod chain;
mod inverse_data;

pub use chain::Chain;
pub use inverse_data::InverseData;

use crate::error::Result;
use crate::problem::Problem;
use crate::solution::Solution;

/// A problem transformation that can map solutions back.
pub trait Reduction {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Whether this reduction can be applied to `problem`.
    fn accepts(&self, _problem: &Problem) -> bool {
        true
    }

    /// Rewrite `problem`, returning the new problem and the data needed to
    /// invert its solutions.
    fn apply(&self, problem: &Problem) -> Result<(Problem, InverseData)>;

    /// Map a solution of the rewritten problem back to the original ids.
    fn invert(&self, solution: &Solution, inverse_data: &InverseData) -> Solution;
}

//! Constraint nodes and builders.

pub mod constraint;

pub use constraint::{Constraint, ConstraintExt, ConstraintKind, Relation};

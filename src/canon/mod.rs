//! Canonicalization: rewriting problems into a restricted node vocabulary.
//!
//! - `Canonicalizer` walks the problem and applies the rule table
//! - `CanonMethods` is the rule table, keyed by node kind
//! - `cone_methods()` is the standard table targeting cone constraints

pub mod canonicalizer;
pub mod rules;

pub use canonicalizer::{CanonMethods, Canonicalizer, ConstraintRule, ExprRule};
pub use rules::cone_methods;

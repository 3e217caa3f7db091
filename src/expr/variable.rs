//! Variable creation with builder pattern.

use super::expression::{Atom, Expr, VariableData};
use super::shape::Shape;

/// Builder for creating variables with various attributes.
#[derive(Default)]
pub struct VariableBuilder {
    shape: Shape,
    name: Option<String>,
    nonneg: bool,
    nonpos: bool,
}

impl VariableBuilder {
    /// Create a new variable builder with the given shape.
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            ..Default::default()
        }
    }

    /// Set the name of the variable.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare the variable non-negative.
    pub fn nonneg(mut self) -> Self {
        self.nonneg = true;
        self.nonpos = false;
        self
    }

    /// Declare the variable non-positive.
    pub fn nonpos(mut self) -> Self {
        self.nonpos = true;
        self.nonneg = false;
        self
    }

    /// Build the variable expression.
    pub fn build(self) -> Expr {
        Expr::new(Atom::Variable(VariableData {
            shape: self.shape,
            name: self.name,
            nonneg: self.nonneg,
            nonpos: self.nonpos,
        }))
    }
}

/// Create a variable with the given shape.
///
/// # Examples
///
/// ```
/// use cvxcanon::expr::variable;
///
/// let x = variable(());
/// let y = variable(5);
/// let z = variable((3, 4));
/// assert!(z.is_variable());
/// ```
pub fn variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).build()
}

/// Create a named variable with the given shape.
pub fn named_variable(name: impl Into<String>, shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).name(name).build()
}

/// Create a non-negative variable with the given shape.
pub fn nonneg_variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).nonneg().build()
}

/// Extension trait for variable-like operations on Expr.
///
/// Attributes are changed in place; the variable keeps its id.
pub trait VariableExt {
    fn nonneg(self) -> Expr;

    fn nonpos(self) -> Expr;

    /// Give a name to this expression (if it's a variable).
    fn named(self, name: impl Into<String>) -> Expr;
}

impl VariableExt for Expr {
    fn nonneg(self) -> Expr {
        self.map_variable(|v| {
            v.nonneg = true;
            v.nonpos = false;
        })
    }

    fn nonpos(self) -> Expr {
        self.map_variable(|v| {
            v.nonpos = true;
            v.nonneg = false;
        })
    }

    fn named(self, name: impl Into<String>) -> Expr {
        let name = name.into();
        self.map_variable(|v| v.name = Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_builder() {
        let x = VariableBuilder::new(5).name("x").nonneg().build();

        if let Atom::Variable(v) = x.atom() {
            assert_eq!(v.shape, Shape::vector(5));
            assert_eq!(v.name, Some("x".to_string()));
            assert!(v.nonneg);
            assert!(!v.nonpos);
        } else {
            panic!("Expected Variable");
        }
        assert_eq!(x.variable_id(), Some(x.id()));
    }

    #[test]
    fn test_variable_ext_keeps_id() {
        let x = variable(5);
        let id = x.id();
        let x = x.nonneg().named("x");
        assert_eq!(x.id(), id);
        if let Atom::Variable(v) = x.atom() {
            assert!(v.nonneg);
            assert_eq!(v.name, Some("x".to_string()));
        } else {
            panic!("Expected Variable");
        }
    }

    #[test]
    fn test_shapes() {
        assert_eq!(variable(()).shape(), Shape::scalar());
        assert_eq!(named_variable("y", 5).shape(), Shape::vector(5));
        assert_eq!(nonneg_variable((3, 4)).shape(), Shape::matrix(3, 4));
    }
}

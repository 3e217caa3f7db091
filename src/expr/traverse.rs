//! Iterative traversal of expression trees.
//!
//! User-built expressions can be nested arbitrarily deep, so walks use an
//! explicit heap-allocated stack instead of native recursion.

use std::sync::Arc;

use super::expression::Expr;

/// Pre-order, left-to-right iterator over a node and its descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(root: &'a Expr) -> Self {
        Descendants { stack: vec![root] }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<&'a Expr> {
        let node = self.stack.pop()?;
        self.stack
            .extend(node.atom().args().into_iter().rev().map(|arg| arg.as_ref()));
        Some(node)
    }
}

struct Frame<'a, T> {
    node: &'a Arc<Expr>,
    children: Vec<&'a Arc<Expr>>,
    done: Vec<T>,
}

impl<'a, T> Frame<'a, T> {
    fn enter(node: &'a Arc<Expr>, descend: &mut impl FnMut(&Expr) -> bool) -> Self {
        let children = if descend(node.as_ref()) {
            node.atom().args()
        } else {
            Vec::new()
        };
        Frame {
            node,
            done: Vec::with_capacity(children.len()),
            children,
        }
    }
}

/// Post-order fold over an expression tree.
///
/// `visit` is called once per node, children before parents and siblings
/// left to right, with the results already computed for the node's
/// children. When `descend` returns false for a node its subtree is not
/// entered and `visit` receives an empty list for it. The first error
/// stops the walk.
pub fn fold_postorder<'a, T, E>(
    root: &'a Arc<Expr>,
    mut descend: impl FnMut(&Expr) -> bool,
    mut visit: impl FnMut(&'a Arc<Expr>, Vec<T>) -> Result<T, E>,
) -> Result<T, E> {
    let mut stack = vec![Frame::enter(root, &mut descend)];
    loop {
        let next_child = stack
            .last()
            .and_then(|frame| frame.children.get(frame.done.len()).copied());
        if let Some(child) = next_child {
            let frame = Frame::enter(child, &mut descend);
            stack.push(frame);
            continue;
        }

        let Some(Frame { node, done, .. }) = stack.pop() else {
            unreachable!("the root frame returns before the stack empties");
        };
        let result = visit(node, done)?;
        match stack.last_mut() {
            Some(parent) => parent.done.push(result),
            None => return Ok(result),
        }
    }
}

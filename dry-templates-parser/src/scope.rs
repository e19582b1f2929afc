//! Scope stack
//!
//! The markup tokenizer and the text scanner produce a flat stream of events.
//! The scope stack turns that stream into a tree: opening an element or a
//! block appends its node to the current scope and pushes a new one, closing
//! it pops the scope and hands the collected nodes back to the caller, which
//! moves them into the node that opened it.

use log::trace;

use crate::error::{ErrorKind, ParseError, Result};
use crate::template::Node;

#[derive(Debug)]
pub struct ScopeStack {
    /// Content lists from the root outwards. Never empty.
    frames: Vec<Vec<Node>>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }

    /// Number of open scopes above the root
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn current(&mut self) -> &mut Vec<Node> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Opens a child scope
    pub fn push(&mut self) {
        self.frames.push(Vec::new());
        trace!("scope push, depth {}", self.depth());
    }

    /// Closes the current scope, returning its content
    pub fn pop(&mut self) -> Result<Vec<Node>> {
        if self.frames.len() == 1 {
            return Err(ParseError::new(
                ErrorKind::UnbalancedScope,
                "Closing a scope that was never opened",
            ));
        }
        let content = self.frames.pop().unwrap_or_default();
        trace!("scope pop, depth {}", self.depth());
        Ok(content)
    }

    pub fn append(&mut self, node: Node) {
        self.current().push(node);
    }

    pub fn last_mut(&mut self) -> Option<&mut Node> {
        self.current().last_mut()
    }

    /// Removes the last node of the current scope
    pub fn take_last(&mut self) -> Option<Node> {
        self.current().pop()
    }

    /// Returns the root content, failing if any scope is still open
    pub fn finish(mut self) -> Result<Vec<Node>> {
        if self.frames.len() > 1 {
            return Err(ParseError::new(
                ErrorKind::UnbalancedScope,
                format!("{} element or block scope(s) left unclosed", self.depth()),
            ));
        }
        Ok(self.frames.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let mut stack = ScopeStack::new();
        stack.append(Node::Text("root".to_string()));
        stack.push();
        stack.append(Node::Text("child".to_string()));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.last_mut().as_deref(), Some(&Node::Text("child".to_string())));

        let content = stack.pop().unwrap();
        assert_eq!(content, vec![Node::Text("child".to_string())]);
        assert_eq!(stack.last_mut().as_deref(), Some(&Node::Text("root".to_string())));
        assert_eq!(stack.finish().unwrap().len(), 1);
    }

    #[test]
    fn pop_on_root_fails() {
        let mut stack = ScopeStack::new();
        assert_eq!(stack.pop().unwrap_err().kind(), ErrorKind::UnbalancedScope);
    }

    #[test]
    fn unclosed_scope_fails() {
        let mut stack = ScopeStack::new();
        stack.push();
        assert_eq!(stack.finish().unwrap_err().kind(), ErrorKind::UnbalancedScope);
    }

    #[test]
    fn take_last() {
        let mut stack = ScopeStack::new();
        assert!(stack.take_last().is_none());
        stack.append(Node::Comment("[if IE]".to_string()));
        assert!(stack.take_last().is_some());
        assert!(stack.last_mut().is_none());
    }
}

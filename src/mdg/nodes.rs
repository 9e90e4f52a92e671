//! Document nodes
//!
//! Nodes are the consumers of the resolution pipeline. Each phase of [`crate::mdg::tree`]
//! walks all documents depth first and calls the matching [`Node`] method:
//!
//! 1. `register`: allocate ids, request number ranges, register tags and documents
//! 2. `resolve_labels`: claim slots in number ranges
//! 3. `resolve_values`: compute derived text (titles, terms), possibly deferred to the next pass
//!
//! `emit` renders a node into a text buffer. The pipeline uses it for derived text; final
//! document output is left to the caller.
//!
//! Per run state of a node is kept in the resolution, keyed by the scope and the node's
//! [`NodeKey`], so the same node can be expanded several times through blocks.

use std::fmt;

use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::location::Location;

pub mod block;
pub mod labeled;
pub mod reference;
pub mod sectionref;
pub mod term;
pub mod text;

pub use block::{BlockDef, BlockRef, Param, Value};
pub use labeled::{NestedRule, Section, SubRange};
pub use reference::{Ref, RefMode};
pub use sectionref::SectionRef;
pub use term::{Term, TermRef, TERM_TYPE};
pub use text::{Attr, Text};

pub trait Node: fmt::Debug {
    fn location(&self) -> &Location;

    /// User chosen tag of taggable nodes.
    fn tag(&self) -> Option<&str> {
        None
    }

    /// Top level sections count for structural embedding.
    fn is_section(&self) -> bool {
        false
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()>;

    fn resolve_labels(&self, _ctx: &mut ResolutionContext<'_>) -> Result<()> {
        Ok(())
    }

    fn resolve_values(&self, _ctx: &mut ResolutionContext<'_>) -> Result<()> {
        Ok(())
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()>;

    /// Renders the node without registered state, as needed for tag substitutions during
    /// registration. Only text, attributes and values support it.
    fn evaluate_static(&self, _ctx: &mut ResolutionContext<'_>, _out: &mut String) -> Result<()> {
        Err(ResolveError::NotStatic {
            location: self.location().clone(),
        })
    }
}

/// Identity of a node instance, taken from its address.
///
/// Nodes are boxed inside the [`NodeSequence`] of a document or block that stays alive in an
/// `Rc` for the whole run, and no node kind is zero sized, so addresses are stable and unique
/// while a resolution exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of<T: ?Sized>(node: &T) -> Self {
        NodeKey(node as *const T as *const () as usize)
    }
}

#[derive(Debug, Default)]
pub struct NodeSequence(Vec<Box<dyn Node>>);

impl NodeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: impl Node + 'static) {
        self.0.push(Box::new(node));
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Node> {
        self.0.iter().map(|n| n.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.iter().try_for_each(|n| n.register(ctx))
    }

    pub fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.iter().try_for_each(|n| n.resolve_labels(ctx))
    }

    pub fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.iter().try_for_each(|n| n.resolve_values(ctx))
    }

    pub fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.0.iter().try_for_each(|n| n.emit(ctx, out))
    }

    pub fn evaluate_static(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.0.iter().try_for_each(|n| n.evaluate_static(ctx, out))
    }
}

impl From<Vec<Box<dyn Node>>> for NodeSequence {
    fn from(nodes: Vec<Box<dyn Node>>) -> Self {
        Self(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdg::nodes::text::Text;

    #[test]
    fn test_node_keys_are_stable_and_distinct() {
        let mut seq = NodeSequence::new();
        seq.push(Text::new(Location::document("/doc"), "a"));
        seq.push(Text::new(Location::document("/doc"), "a"));
        let first: Vec<NodeKey> = seq.iter().map(|n| NodeKey::of(n)).collect();
        let again: Vec<NodeKey> = seq.iter().map(|n| NodeKey::of(n)).collect();
        assert_eq!(first, again);
        assert_ne!(first[0], first[1]);
    }
}

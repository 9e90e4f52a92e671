//! Resolution contexts
//!
//! Nodes see the resolver through a [`ResolutionContext`]: the run wide [`Resolution`] plus the
//! frame the node is visited in. Frames form a parent chain:
//!
//! - `Document`: top frame of a document, owns the structural id counters per label type
//! - `SubRange`: body of a labeled node, owns the id counter and the number range of its type
//! - `Block`: expansion of a block, owns a new scope and the block call stack
//! - `Static`: evaluation of a parameter value in the scope it was defined in
//!
//! Id allocation and number range lookup walk up the chain to the closest frame owning the
//! requested type. Name lookups go through the frame's scope, see [`crate::mdg::scope`].

use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::mdg::error::{ResolveError, Result, Unresolved};
use crate::mdg::history::CallStack;
use crate::mdg::labels::LabelRule;
use crate::mdg::link::{self, Link};
use crate::mdg::location::Location;
use crate::mdg::nodes::{BlockDef, NodeKey, NodeSequence};
use crate::mdg::numbering::{Numbering, RangeId, SlotId};
use crate::mdg::options::Options;
use crate::mdg::scope::{
    BlockEntry, BlockId, RefId, RefTarget, Referencable, Registry, ScopeId, ScopeParent, TagEntry,
    ValueBinding, ValueId,
};
use crate::mdg::tree::{DocumentRequest, Resolution};

/// Handle of a resolution frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    #[cfg(test)]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }
}

#[derive(Debug)]
pub(crate) enum FrameKind {
    Document {
        ids: BTreeMap<String, LabelRule>,
    },
    SubRange {
        typ: String,
        ids: LabelRule,
        range: Option<RangeId>,
    },
    Block {
        callstack: CallStack,
    },
    Static,
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) parent: Option<ContextId>,
    pub(crate) document: String,
    pub(crate) scope: ScopeId,
    pub(crate) kind: FrameKind,
}

/// Attributes available to `{name}` tag substitutions and attribute nodes.
pub const CONTEXT_ATTRIBUTES: [&str; 5] = ["scope", "namespace", "docpath", "docname", "docdir"];

impl Resolution {
    pub(crate) fn push_frame(&mut self, frame: Frame) -> ContextId {
        self.frames.push(frame);
        ContextId(self.frames.len() - 1)
    }

    /// Registers a block inventory in `scope`, binding parameter defaults to `frame`.
    pub(crate) fn register_blocks(
        &mut self,
        scope: ScopeId,
        frame: ContextId,
        blocks: &[Rc<BlockDef>],
    ) -> Result<()> {
        for definition in blocks {
            let mut defaults = BTreeMap::new();
            for param in &definition.params {
                if let Some(default) = &param.default {
                    let value = self.registry.add_value(ValueBinding {
                        body: Rc::clone(default),
                        frame,
                    });
                    defaults.insert(param.name.clone(), value);
                }
            }
            let entry = BlockEntry {
                definition: Rc::clone(definition),
                scope,
                defaults,
            };
            self.registry
                .register_block(scope, &definition.tag, entry)?;
        }
        Ok(())
    }
}

pub struct ResolutionContext<'r> {
    res: &'r mut Resolution,
    frame: ContextId,
}

impl<'r> ResolutionContext<'r> {
    pub(crate) fn new(res: &'r mut Resolution, frame: ContextId) -> Self {
        Self { res, frame }
    }

    /// Context for a child frame.
    pub fn at(&mut self, frame: ContextId) -> ResolutionContext<'_> {
        ResolutionContext {
            res: &mut *self.res,
            frame,
        }
    }

    pub fn frame(&self) -> ContextId {
        self.frame
    }

    fn current(&self) -> &Frame {
        &self.res.frames[self.frame.0]
    }

    pub fn document(&self) -> &str {
        &self.current().document
    }

    pub fn scope(&self) -> ScopeId {
        self.current().scope
    }

    pub fn options(&self) -> &Options {
        &self.res.options
    }

    pub fn registry(&self) -> &Registry {
        &self.res.registry
    }

    pub fn numbering(&self) -> &Numbering {
        &self.res.numbering
    }

    pub fn numbering_mut(&mut self) -> &mut Numbering {
        &mut self.res.numbering
    }

    pub fn resolution(&self) -> &Resolution {
        &*self.res
    }

    /// Allocates the next structural id for `typ` at the current nesting depth.
    pub fn next_id(&mut self, typ: &str) -> LabelRule {
        let mut cursor = Some(self.frame);
        while let Some(id) = cursor {
            let frame = &mut self.res.frames[id.0];
            match &mut frame.kind {
                FrameKind::SubRange { typ: t, ids, .. } if *t == typ => {
                    *ids = ids.next();
                    return ids.clone();
                }
                FrameKind::Document { ids } => {
                    let rule = ids
                        .entry(typ.to_string())
                        .or_insert_with(|| LabelRule::void(typ, None));
                    *rule = rule.next();
                    return rule.clone();
                }
                _ => cursor = frame.parent,
            }
        }
        LabelRule::void(typ, None).next()
    }

    /// Declares that the current document uses number ranges of `typ`.
    pub fn request_number_range(&mut self, typ: &str) {
        let document = self.document().to_string();
        if let Some(info) = self.res.documents.get_mut(&document) {
            if !info.ranges.iter().any(|t| t == typ) {
                info.ranges.push(typ.to_string());
            }
        }
    }

    /// Declares a structural embedding of the document `link` points to.
    pub fn request_document(&mut self, link: &Link, location: &Location) -> Result<()> {
        let document = self.document().to_string();
        let Some(info) = self.res.documents.get_mut(&document) else {
            return Ok(());
        };
        if let Some(first) = info.requests.iter().find(|r| r.link == *link) {
            return Err(ResolveError::DuplicateRequest {
                location: location.clone(),
                document: link.to_string(),
                first: first.location.clone(),
            });
        }
        info.requests.push(DocumentRequest {
            link: link.clone(),
            location: location.clone(),
            target: None,
        });
        Ok(())
    }

    pub fn register_referencable(
        &mut self,
        node: Referencable,
        tags: Vec<String>,
        explicit: bool,
    ) -> Result<RefId> {
        let scope = self.scope();
        self.res
            .registry
            .register_referencable(scope, node, tags, explicit)
    }

    pub fn register_tag(
        &mut self,
        typ: &str,
        tag: &str,
        node: NodeKey,
        location: &Location,
        explicit: bool,
    ) -> Result<()> {
        let scope = self.scope();
        let entry = TagEntry {
            scope,
            node,
            location: location.clone(),
        };
        self.res
            .registry
            .register_tag(scope, typ, tag, entry, explicit)
    }

    /// Registers a block definition in the current scope.
    pub fn register_block(&mut self, definition: &Rc<BlockDef>) -> Result<()> {
        let (scope, frame) = (self.scope(), self.frame);
        self.res
            .register_blocks(scope, frame, std::slice::from_ref(definition))
    }

    /// Number range currently used for `typ`. Only available during label resolution.
    pub fn number_range(&self, typ: &str, location: &Location) -> Result<RangeId> {
        let missing = || ResolveError::MissingNumberRange {
            location: location.clone(),
            typ: typ.to_string(),
        };
        let mut cursor = Some(self.frame);
        while let Some(id) = cursor {
            let frame = &self.res.frames[id.0];
            match &frame.kind {
                FrameKind::SubRange { typ: t, range, .. } if t == typ => {
                    return range.ok_or_else(missing);
                }
                FrameKind::Document { .. } => {
                    return self.res.document_range(&frame.document, typ).ok_or_else(missing);
                }
                _ => cursor = frame.parent,
            }
        }
        Err(missing())
    }

    pub fn lookup_referencable(&self, link: &Link) -> Option<RefTarget> {
        self.res.registry.lookup_referencable(self.scope(), link)
    }

    pub fn lookup_block(&self, link: &Link) -> Option<BlockId> {
        self.res.registry.lookup_block(self.scope(), link)
    }

    pub fn lookup_tag(&self, typ: &str, name: &str) -> Option<&TagEntry> {
        self.res.registry.lookup_tag(self.scope(), typ, name)
    }

    pub fn lookup_value(&self, name: &str) -> Option<ValueId> {
        self.res.registry.lookup_value(self.scope(), name)
    }

    /// Relative path plus anchor of a link target, as seen from the current document.
    pub fn determine_link(&self, link: &Link) -> std::result::Result<String, String> {
        self.res.determine_link(self.document(), link)
    }

    /// Defers a failed value resolution to the next pass.
    pub fn register_unresolved(&mut self, location: &Location, error: &ResolveError) {
        tracing::debug!(location = %location, error = %error, "deferred value resolution");
        let document = self.document().to_string();
        self.res.unresolved.push(Unresolved {
            document,
            location: location.clone(),
            message: error.to_string(),
        });
    }

    pub fn callstack(&self) -> CallStack {
        let mut cursor = Some(self.frame);
        while let Some(id) = cursor {
            let frame = &self.res.frames[id.0];
            if let FrameKind::Block { callstack } = &frame.kind {
                return callstack.clone();
            }
            cursor = frame.parent;
        }
        CallStack::default()
    }

    /// Frame for the body of a labeled node of type `typ`; `ids` is the first child id rule.
    pub fn sub_range_frame(&mut self, typ: &str, ids: LabelRule) -> ContextId {
        let frame = Frame {
            parent: Some(self.frame),
            document: self.document().to_string(),
            scope: self.scope(),
            kind: FrameKind::SubRange {
                typ: typ.to_string(),
                ids,
                range: None,
            },
        };
        self.res.push_frame(frame)
    }

    pub fn set_frame_range(&mut self, frame: ContextId, number_range: RangeId) {
        if let FrameKind::SubRange { range, .. } = &mut self.res.frames[frame.0].kind {
            *range = Some(number_range);
        }
    }

    /// Opens the scope and frame for an expansion of `block`.
    ///
    /// Without a tag the scope is named after the block and numbered (`demo-1`, `demo-2`).
    pub fn expand_block(
        &mut self,
        block: BlockId,
        tag: Option<&str>,
        location: &Location,
    ) -> Result<ContextId> {
        let entry = self.res.registry.block(block).clone();
        let (name, extend) = match tag {
            Some(tag) => (tag, false),
            None => (entry.definition.tag.trim_start_matches('/'), true),
        };
        let caller = self.scope();
        let scope_error = |message: String| ResolveError::ScopeName {
            location: location.clone(),
            name: message,
        };
        let name = self
            .res
            .registry
            .next_sub_scope_name(caller, name, extend)
            .map_err(scope_error)?;
        let outer = self.callstack();
        let callstack = outer
            .add(&entry.definition.name, location)
            .map_err(|cycle| ResolveError::RecursiveBlock {
                location: location.clone(),
                block: entry.definition.name.clone(),
                cycle,
                callstack: outer.to_string(),
            })?;
        let document = self.document().to_string();
        let scope = self.res.registry.new_scope(
            &name,
            &document,
            ScopeParent::Scope(caller),
            ScopeParent::Scope(entry.scope),
        );
        self.res
            .registry
            .add_sub_scope(caller, &name, scope)
            .map_err(scope_error)?;
        let frame = self.res.push_frame(Frame {
            parent: Some(self.frame),
            document,
            scope,
            kind: FrameKind::Block { callstack },
        });
        tracing::debug!(block = %entry.definition.name, scope = %name, "expanding block");
        self.res
            .register_blocks(scope, frame, &entry.definition.blocks)?;
        Ok(frame)
    }

    /// Binds a parameter value to the frame its body is evaluated in.
    pub fn add_value(&mut self, body: Rc<NodeSequence>, frame: ContextId) -> ValueId {
        self.res.registry.add_value(ValueBinding { body, frame })
    }

    /// Makes `value` visible as `name` in the current scope.
    pub fn set_value(&mut self, name: &str, value: ValueId) {
        let scope = self.scope();
        self.res.registry.set_value(scope, name, value);
    }

    /// Frame evaluating `value` in the scope it was bound in.
    pub fn static_frame(&mut self, value: ValueId) -> ContextId {
        let bound = self.res.registry.value(value).frame;
        let scope = self.res.frames[bound.0].scope;
        let frame = Frame {
            parent: Some(self.frame),
            document: self.document().to_string(),
            scope,
            kind: FrameKind::Static,
        };
        self.res.push_frame(frame)
    }

    pub fn set_state<T: Any>(&mut self, node: NodeKey, state: T) {
        let scope = self.scope();
        self.res.states.insert((scope, node), Box::new(state));
    }

    pub fn state<T: Any>(&self, node: NodeKey, location: &Location) -> Result<&T> {
        self.state_in(self.scope(), node)
            .ok_or_else(|| ResolveError::MissingNodeContext {
                location: location.clone(),
            })
    }

    pub fn state_mut<T: Any>(&mut self, node: NodeKey, location: &Location) -> Result<&mut T> {
        let scope = self.scope();
        self.res
            .states
            .get_mut(&(scope, node))
            .and_then(|s| s.downcast_mut::<T>())
            .ok_or_else(|| ResolveError::MissingNodeContext {
                location: location.clone(),
            })
    }

    /// State of a node registered in another scope.
    pub fn state_in<T: Any>(&self, scope: ScopeId, node: NodeKey) -> Option<&T> {
        self.res
            .states
            .get(&(scope, node))
            .and_then(|s| s.downcast_ref::<T>())
    }

    /// Binds a claimed slot to a registered node.
    pub fn bind_slot(&mut self, node: RefId, range: RangeId, slot: SlotId) {
        let abbrev = self.res.numbering.abbrev(range).to_string();
        let r = self.res.registry.referencable_mut(node);
        r.slot = Some(slot);
        r.abbrev = abbrev;
    }

    pub fn set_title(&mut self, node: RefId, title: String) {
        self.res.registry.referencable_mut(node).title = Some(title);
    }

    /// Document a structural link points to.
    pub fn document_for_link(&self, link: &Link) -> Option<String> {
        self.res.document_for_link(link)
    }

    /// Appends the top level of `document` to `range` and returns the claimed slot.
    pub fn set_number_range_for(
        &mut self,
        document: &str,
        typ: &str,
        range: RangeId,
    ) -> Option<SlotId> {
        let info = self.res.documents.get(document)?;
        let level = info
            .document
            .rules
            .get(typ)
            .filter(|r| r.rule.is_none())
            .and_then(|r| r.level);
        let assigned = self.res.numbering.assignable_next(range, level);
        let slot = self.res.numbering.current(assigned);
        if let Some(info) = self.res.documents.get_mut(document) {
            info.struct_ranges.insert(typ.to_string(), assigned);
        }
        slot
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let scope = self.res.registry.scope(self.scope());
        let document = self.document();
        match name {
            "scope" => Some(scope.name().to_string()),
            "namespace" => Some(scope.namespace().to_string()),
            "docpath" => Some(document.to_string()),
            "docname" => Some(link::base(document)),
            "docdir" => Some(link::dir(document)),
            _ => None,
        }
    }

    /// Expands `{name}` substitutions in a tag.
    ///
    /// Returns the tag and whether it is explicit, i.e. forwarded without scope prefixes.
    /// Tags in document scope are always explicit and may not use substitutions.
    pub fn evaluate_tag(&mut self, tag: &str, location: &Location) -> Result<(String, bool)> {
        let invalid = |message: String| ResolveError::Tag {
            location: location.clone(),
            message,
        };
        let document_scope = self.res.registry.scope(self.scope()).name().is_empty();
        let mut explicit = document_scope;
        let mut result = String::new();
        let mut name: Option<String> = None;
        for c in tag.chars() {
            match name.take() {
                None if c == '{' => {
                    if document_scope {
                        return Err(invalid("no anchor composition for document scope".into()));
                    }
                    name = Some(String::new());
                }
                None => result.push(c),
                Some(n) if c == '}' => {
                    if n.is_empty() {
                        return Err(invalid("empty tag substitution".into()));
                    }
                    let value = self.substitution(&n, location)?;
                    if value.contains('\n') {
                        return Err(invalid("tag substitution contains a newline".into()));
                    }
                    result.push_str(&value);
                    explicit = true;
                }
                Some(mut n) => {
                    n.push(c);
                    name = Some(n);
                }
            }
        }
        if name.is_some() {
            return Err(invalid(format!("unterminated substitution in tag {:?}", tag)));
        }
        Ok((result, explicit))
    }

    fn substitution(&mut self, name: &str, location: &Location) -> Result<String> {
        if let Some(attr) = self.attribute(name) {
            return Ok(attr);
        }
        let value = self.lookup_value(name).ok_or_else(|| ResolveError::Tag {
            location: location.clone(),
            message: format!("invalid tag substitution {:?}", name),
        })?;
        let body = Rc::clone(&self.res.registry.value(value).body);
        let frame = self.static_frame(value);
        let mut out = String::new();
        body.evaluate_static(&mut self.at(frame), &mut out)?;
        Ok(out.trim().to_string())
    }
}

//! Blocks and values
//!
//! A block is a reusable node sequence with named parameters. Every [`BlockRef`] expands the
//! block in a fresh scope: dynamically nested into the caller, statically nested into the
//! scope the block was defined in. Arguments are node sequences evaluated in the caller's
//! frame, defaults are evaluated in the frame of the defining scope. Inside the body a
//! [`Value`] node renders a parameter.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::mdg::context::{ContextId, ResolutionContext};
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::link::Link;
use crate::mdg::location::Location;

use super::{Node, NodeKey, NodeSequence};

#[derive(Debug)]
pub struct Param {
    pub name: String,
    pub default: Option<Rc<NodeSequence>>,
}

/// Block definition, part of the block inventory of a document or an enclosing block.
#[derive(Debug)]
pub struct BlockDef {
    pub location: Location,
    pub tag: String,
    /// Qualified name used in call stacks (`/doc#outer/inner`).
    pub name: String,
    pub params: Vec<Param>,
    pub blocks: Vec<Rc<BlockDef>>,
    pub body: Rc<NodeSequence>,
}

#[derive(Debug, Clone)]
struct Expansion {
    frame: ContextId,
    body: Rc<NodeSequence>,
}

/// Expansion of a block.
#[derive(Debug)]
pub struct BlockRef {
    location: Location,
    tag: Option<String>,
    block: String,
    args: BTreeMap<String, Rc<NodeSequence>>,
}

impl BlockRef {
    pub fn new(
        location: Location,
        block: impl Into<String>,
        tag: Option<String>,
        args: BTreeMap<String, Rc<NodeSequence>>,
    ) -> Self {
        Self {
            location,
            tag,
            block: block.into(),
            args,
        }
    }

    fn expansion(&self, ctx: &ResolutionContext<'_>) -> Result<Expansion> {
        ctx.state::<Expansion>(NodeKey::of(self), &self.location)
            .cloned()
    }
}

impl Node for BlockRef {
    fn location(&self) -> &Location {
        &self.location
    }

    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let invalid = |message: String| ResolveError::Link {
            location: self.location.clone(),
            message,
        };
        let link = Link::parse(&self.block, true)
            .and_then(|l| l.abs(ctx.document(), false))
            .map_err(invalid)?;
        let block = ctx
            .lookup_block(&link)
            .ok_or_else(|| ResolveError::UnknownBlock {
                location: self.location.clone(),
                link: link.to_string(),
            })?;
        let entry = ctx.registry().block(block).clone();
        let definition = &entry.definition;

        if let Some(name) = self
            .args
            .keys()
            .find(|name| !definition.params.iter().any(|p| p.name == **name))
        {
            return Err(ResolveError::UnknownParameter {
                location: self.location.clone(),
                block: definition.name.clone(),
                name: name.clone(),
            });
        }

        let tag = match &self.tag {
            Some(tag) => Some(ctx.evaluate_tag(tag, &self.location)?.0),
            None => None,
        };
        let caller = ctx.frame();
        let frame = ctx.expand_block(block, tag.as_deref(), &self.location)?;

        let mut inner = ctx.at(frame);
        for param in &definition.params {
            let value = match (self.args.get(&param.name), entry.defaults.get(&param.name)) {
                (Some(arg), _) => inner.add_value(Rc::clone(arg), caller),
                (None, Some(default)) => *default,
                (None, None) => {
                    return Err(ResolveError::MissingArgument {
                        location: self.location.clone(),
                        block: definition.name.clone(),
                        name: param.name.clone(),
                    })
                }
            };
            inner.set_value(&param.name, value);
        }

        let expansion = Expansion {
            frame,
            body: Rc::clone(&definition.body),
        };
        ctx.set_state(NodeKey::of(self), expansion.clone());
        expansion.body.register(&mut ctx.at(frame))
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.resolve_labels(&mut ctx.at(e.frame))
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.resolve_values(&mut ctx.at(e.frame))
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.emit(&mut ctx.at(e.frame), out)
    }
}

/// Renders a block parameter.
#[derive(Debug)]
pub struct Value {
    location: Location,
    name: String,
}

impl Value {
    pub fn new(location: Location, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }

    fn expansion(&self, ctx: &ResolutionContext<'_>) -> Result<Expansion> {
        ctx.state::<Expansion>(NodeKey::of(self), &self.location)
            .cloned()
    }
}

impl Node for Value {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let value = ctx
            .lookup_value(&self.name)
            .ok_or_else(|| ResolveError::UnknownValue {
                location: self.location.clone(),
                name: self.name.clone(),
            })?;
        let body = Rc::clone(&ctx.registry().value(value).body);
        let frame = ctx.static_frame(value);
        ctx.set_state(NodeKey::of(self), Expansion {
            frame,
            body: Rc::clone(&body),
        });
        body.register(&mut ctx.at(frame))
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.resolve_labels(&mut ctx.at(e.frame))
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.resolve_values(&mut ctx.at(e.frame))
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let e = self.expansion(ctx)?;
        e.body.emit(&mut ctx.at(e.frame), out)
    }

    fn evaluate_static(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let value = ctx
            .lookup_value(&self.name)
            .ok_or_else(|| ResolveError::UnknownValue {
                location: self.location.clone(),
                name: self.name.clone(),
            })?;
        let body = Rc::clone(&ctx.registry().value(value).body);
        let frame = ctx.static_frame(value);
        body.evaluate_static(&mut ctx.at(frame), out)
    }
}

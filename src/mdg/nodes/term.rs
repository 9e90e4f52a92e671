use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::location::Location;

use super::{Node, NodeKey, NodeSequence};

/// Tag type of term definitions.
pub const TERM_TYPE: &str = "term";

#[derive(Debug, Default)]
struct TermState {
    text: Option<String>,
}

/// Term definition. Its rendered text is available to [`TermRef`] nodes via the tag.
#[derive(Debug)]
pub struct Term {
    location: Location,
    tag: String,
    text: NodeSequence,
}

impl Term {
    pub fn new(location: Location, tag: impl Into<String>, text: NodeSequence) -> Self {
        Self {
            location,
            tag: tag.into(),
            text,
        }
    }
}

impl Node for Term {
    fn location(&self) -> &Location {
        &self.location
    }

    fn tag(&self) -> Option<&str> {
        Some(&self.tag)
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let (tag, explicit) = ctx.evaluate_tag(&self.tag, &self.location)?;
        ctx.register_tag(TERM_TYPE, &tag, NodeKey::of(self), &self.location, explicit)?;
        ctx.set_state(NodeKey::of(self), TermState::default());
        self.text.register(ctx)
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.text.resolve_labels(ctx)
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.text.resolve_values(ctx)?;
        let mut text = String::new();
        match self.text.emit(ctx, &mut text) {
            Ok(()) => {
                ctx.state_mut::<TermState>(NodeKey::of(self), &self.location)?
                    .text = Some(text.trim().to_string());
            }
            Err(err) => ctx.register_unresolved(&self.location, &err),
        }
        Ok(())
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.text.emit(ctx, out)
    }
}

/// Renders the text of a term definition.
#[derive(Debug)]
pub struct TermRef {
    location: Location,
    tag: String,
}

impl TermRef {
    pub fn new(location: Location, tag: impl Into<String>) -> Self {
        Self {
            location,
            tag: tag.into(),
        }
    }
}

impl Node for TermRef {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, _ctx: &mut ResolutionContext<'_>) -> Result<()> {
        Ok(())
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let entry = ctx
            .lookup_tag(TERM_TYPE, &self.tag)
            .ok_or_else(|| ResolveError::UnknownTag {
                location: self.location.clone(),
                typ: TERM_TYPE.to_string(),
                tag: self.tag.clone(),
            })?;
        let text = ctx
            .state_in::<TermState>(entry.scope, entry.node)
            .and_then(|s| s.text.as_deref())
            .ok_or_else(|| ResolveError::NotResolved {
                location: self.location.clone(),
                what: format!("term {}", self.tag),
            })?;
        out.push_str(text);
        Ok(())
    }
}

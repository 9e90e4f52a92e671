use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::link::Link;
use crate::mdg::location::Location;
use crate::mdg::scope::{RefId, RefTarget};

use super::{Node, NodeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    /// Abbreviation and label of the target (`Fig. 2.1`).
    Label,
    /// Title of the target.
    Title,
}

#[derive(Debug, Clone)]
struct RefState {
    link: Link,
    target: Option<RefTarget>,
}

/// Reference to a labeled node or a document.
#[derive(Debug)]
pub struct Ref {
    location: Location,
    link: String,
    mode: RefMode,
}

impl Ref {
    pub fn new(location: Location, link: impl Into<String>, mode: RefMode) -> Self {
        Self {
            location,
            link: link.into(),
            mode,
        }
    }

    fn not_resolved(&self, what: &str) -> ResolveError {
        ResolveError::NotResolved {
            location: self.location.clone(),
            what: format!("{} of {}", what, self.link),
        }
    }

    fn target(&self, ctx: &ResolutionContext<'_>) -> Result<RefId> {
        let state = ctx.state::<RefState>(NodeKey::of(self), &self.location)?;
        let target = match &state.target {
            Some(RefTarget::Node(id)) => Some(*id),
            Some(RefTarget::Document(document)) => ctx.registry().root_node(document),
            None => None,
        };
        target.ok_or_else(|| ResolveError::UnresolvedLink {
            location: self.location.clone(),
            link: state.link.to_string(),
        })
    }
}

impl Node for Ref {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let link = Link::parse(&self.link, true)
            .and_then(|l| l.abs(ctx.document(), false))
            .map_err(|message| ResolveError::Link {
                location: self.location.clone(),
                message,
            })?;
        ctx.set_state(NodeKey::of(self), RefState { link, target: None });
        Ok(())
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let link = ctx
            .state::<RefState>(NodeKey::of(self), &self.location)?
            .link
            .clone();
        let target = ctx
            .lookup_referencable(&link)
            .ok_or_else(|| ResolveError::UnresolvedLink {
                location: self.location.clone(),
                link: link.to_string(),
            })?;
        ctx.state_mut::<RefState>(NodeKey::of(self), &self.location)?
            .target = Some(target);
        Ok(())
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let target = ctx.registry().referencable(self.target(ctx)?);
        match self.mode {
            RefMode::Label => {
                let name = target
                    .slot
                    .and_then(|slot| ctx.numbering().name(slot))
                    .ok_or_else(|| self.not_resolved("label"))?;
                if !target.abbrev.is_empty() {
                    out.push_str(&target.abbrev);
                    out.push(' ');
                }
                out.push_str(&name);
            }
            RefMode::Title => {
                let title = target
                    .title
                    .as_deref()
                    .ok_or_else(|| self.not_resolved("title"))?;
                out.push_str(title);
            }
        }
        Ok(())
    }
}

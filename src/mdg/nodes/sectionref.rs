use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::link::Link;
use crate::mdg::location::Location;

use super::{Node, NodeKey};

/// Structural embedding of another document as a sub section.
///
/// The target is a document path or a global tag (`#/intro`) of a node in the target
/// document. The top level section of the target continues the section numbering at the
/// position of this node.
#[derive(Debug)]
pub struct SectionRef {
    location: Location,
    link: String,
}

impl SectionRef {
    pub fn new(location: Location, link: impl Into<String>) -> Self {
        Self {
            location,
            link: link.into(),
        }
    }

    fn link(&self, ctx: &ResolutionContext<'_>) -> Result<Link> {
        let invalid = |message: String| ResolveError::Link {
            location: self.location.clone(),
            message,
        };
        let link = Link::parse(&self.link, false).map_err(invalid)?;
        if !link.is_tag() && !link.anchor().is_empty() {
            return Err(invalid(format!(
                "section reference {:?} must address a document or a global tag",
                self.link
            )));
        }
        link.abs(ctx.document(), false).map_err(invalid)
    }
}

impl Node for SectionRef {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let section = ctx.options().section_type.clone();
        ctx.next_id(&section);
        ctx.request_number_range(&section);
        let link = self.link(ctx)?;
        ctx.request_document(&link, &self.location)?;
        ctx.set_state(NodeKey::of(self), link);
        Ok(())
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let link = ctx.state::<Link>(NodeKey::of(self), &self.location)?.clone();
        if ctx.lookup_referencable(&link).is_none() {
            return Err(ResolveError::UnresolvedLink {
                location: self.location.clone(),
                link: link.to_string(),
            });
        }
        let document = ctx
            .document_for_link(&link)
            .ok_or_else(|| ResolveError::UnresolvedLink {
                location: self.location.clone(),
                link: link.to_string(),
            })?;
        let section = ctx.options().section_type.clone();
        let range = ctx.number_range(&section, &self.location)?;
        ctx.set_number_range_for(&document, &section, range);
        Ok(())
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let link = ctx.state::<Link>(NodeKey::of(self), &self.location)?;
        let target = ctx
            .determine_link(link)
            .map_err(|message| ResolveError::Link {
                location: self.location.clone(),
                message,
            })?;
        out.push_str(&target);
        out.push('\n');
        Ok(())
    }
}

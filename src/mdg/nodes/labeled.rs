//! Labeled nodes
//!
//! Sections and sub ranges share the same life cycle. On registration they allocate a
//! structural id, register themselves as referencable and open a sub range frame for their
//! body. During label resolution they claim the next slot of their number range and hand the
//! sub range of that slot to their body. Titles are rendered during value resolution and
//! stored on the referencable, so references can pick them up.

use crate::mdg::context::{ContextId, ResolutionContext};
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::labels::LabelRule;
use crate::mdg::location::Location;
use crate::mdg::scope::{RefId, Referencable};

use super::{Node, NodeKey, NodeSequence};

#[derive(Debug, Clone, Copy)]
struct LabeledState {
    reference: RefId,
    frame: ContextId,
}

/// Rule applied to the sub range opened by a [`SubRange`].
#[derive(Debug, Clone)]
pub struct NestedRule {
    pub separator: String,
    pub rule: Option<LabelRule>,
    pub level: Option<usize>,
}

#[derive(Debug)]
struct Labeled {
    location: Location,
    typ: Option<String>,
    tag: Option<String>,
    title: NodeSequence,
    body: NodeSequence,
}

impl Labeled {
    fn typ<'a>(&'a self, ctx: &'a ResolutionContext<'_>) -> &'a str {
        match &self.typ {
            Some(typ) => typ,
            None => &ctx.options().section_type,
        }
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let typ = self.typ(ctx).to_string();
        let ids = ctx.next_id(&typ);
        let id = ids.id();

        let mut tags = Vec::new();
        let mut explicit = false;
        if let Some(tag) = &self.tag {
            let (tag, e) = ctx.evaluate_tag(tag, &self.location)?;
            if !tag.is_empty() {
                tags.push(tag);
                explicit = e;
            }
        }
        tags.push(id.to_string());

        ctx.request_number_range(&typ);
        let document = ctx.document().to_string();
        let reference = ctx.register_referencable(
            Referencable::new(id, &document, &self.location),
            tags,
            explicit,
        )?;
        self.title.register(ctx)?;

        let frame = ctx.sub_range_frame(&typ, ids.sub());
        ctx.set_state(NodeKey::of(self), LabeledState { reference, frame });
        self.body.register(&mut ctx.at(frame))
    }

    fn resolve_labels(
        &self,
        ctx: &mut ResolutionContext<'_>,
        nested: Option<&NestedRule>,
    ) -> Result<()> {
        let state = *ctx.state::<LabeledState>(NodeKey::of(self), &self.location)?;
        self.title.resolve_labels(ctx)?;

        let typ = self.typ(ctx).to_string();
        let range = ctx.number_range(&typ, &self.location)?;
        let slot = ctx
            .numbering_mut()
            .next(range)
            .map_err(|e| ResolveError::numbering(&self.location, e))?;
        ctx.bind_slot(state.reference, range, slot);

        let sub = ctx
            .numbering_mut()
            .sub(range)
            .map_err(|e| ResolveError::numbering(&self.location, e))?;
        if let Some(nested) = nested {
            let numbering = ctx.numbering_mut();
            if nested.level.is_some() {
                numbering.set_weight(sub, nested.level);
            }
            numbering.set_rule(sub, &nested.separator, nested.rule.clone());
        }
        ctx.set_frame_range(state.frame, sub);
        self.body.resolve_labels(&mut ctx.at(state.frame))
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        let state = *ctx.state::<LabeledState>(NodeKey::of(self), &self.location)?;
        self.title.resolve_values(ctx)?;

        let mut title = String::new();
        match self.title.emit(ctx, &mut title) {
            Ok(()) => {
                let title = title.trim();
                if title.contains('\n') {
                    return Err(ResolveError::MultilineTitle {
                        location: self.location.clone(),
                        title: title.to_string(),
                    });
                }
                ctx.set_title(state.reference, title.to_string());
            }
            Err(err) => ctx.register_unresolved(&self.location, &err),
        }
        self.body.resolve_values(&mut ctx.at(state.frame))
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let state = *ctx.state::<LabeledState>(NodeKey::of(self), &self.location)?;
        let label = ctx
            .registry()
            .referencable(state.reference)
            .slot
            .and_then(|slot| ctx.numbering().name(slot));
        if let Some(label) = label {
            out.push_str(&label);
            out.push(' ');
        }
        self.title.emit(ctx, out)?;
        out.push('\n');
        self.body.emit(&mut ctx.at(state.frame), out)
    }
}

/// Section of the document hierarchy, numbered in the section number range.
#[derive(Debug)]
pub struct Section(Labeled);

impl Section {
    pub fn new(
        location: Location,
        tag: Option<String>,
        title: NodeSequence,
        body: NodeSequence,
    ) -> Self {
        Self(Labeled {
            location,
            typ: None,
            tag,
            title,
            body,
        })
    }
}

impl Node for Section {
    fn location(&self) -> &Location {
        &self.0.location
    }

    fn tag(&self) -> Option<&str> {
        self.0.tag.as_deref()
    }

    fn is_section(&self) -> bool {
        true
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.register(ctx)
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.resolve_labels(ctx, None)
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.resolve_values(ctx)
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.0.emit(ctx, out)
    }
}

/// Labeled entity of an arbitrary number range type (figure, table, ...).
///
/// A nested rule configures the numbering of sub ranges of the same type opened in its body.
#[derive(Debug)]
pub struct SubRange {
    labeled: Labeled,
    nested: Option<NestedRule>,
}

impl SubRange {
    pub fn new(
        location: Location,
        typ: impl Into<String>,
        tag: Option<String>,
        title: NodeSequence,
        body: NodeSequence,
    ) -> Self {
        Self {
            labeled: Labeled {
                location,
                typ: Some(typ.into()),
                tag,
                title,
                body,
            },
            nested: None,
        }
    }

    pub fn with_nested_rule(mut self, nested: NestedRule) -> Self {
        self.nested = Some(nested);
        self
    }

    pub fn range_type(&self) -> &str {
        self.labeled.typ.as_deref().unwrap_or_default()
    }
}

impl Node for SubRange {
    fn location(&self) -> &Location {
        &self.labeled.location
    }

    fn tag(&self) -> Option<&str> {
        self.labeled.tag.as_deref()
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.labeled.register(ctx)
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.labeled.resolve_labels(ctx, self.nested.as_ref())
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.labeled.resolve_values(ctx)
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.labeled.emit(ctx, out)
    }
}

use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::location::Location;

use super::Node;

/// Literal text.
#[derive(Debug)]
pub struct Text {
    location: Location,
    text: String,
}

impl Text {
    pub fn new(location: Location, text: impl Into<String>) -> Self {
        Self {
            location,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Node for Text {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, _ctx: &mut ResolutionContext<'_>) -> Result<()> {
        Ok(())
    }

    fn emit(&self, _ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        out.push_str(&self.text);
        Ok(())
    }

    fn evaluate_static(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.emit(ctx, out)
    }
}

/// Renders a context attribute (`scope`, `namespace`, `docpath`, `docname`, `docdir`).
#[derive(Debug)]
pub struct Attr {
    location: Location,
    name: String,
}

impl Attr {
    pub fn new(location: Location, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }
}

impl Node for Attr {
    fn location(&self) -> &Location {
        &self.location
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        match ctx.attribute(&self.name) {
            Some(_) => Ok(()),
            None => Err(ResolveError::UnknownValue {
                location: self.location.clone(),
                name: self.name.clone(),
            }),
        }
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        if let Some(value) = ctx.attribute(&self.name) {
            out.push_str(&value);
        }
        Ok(())
    }

    fn evaluate_static(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        let value = ctx
            .attribute(&self.name)
            .ok_or_else(|| ResolveError::UnknownValue {
                location: self.location.clone(),
                name: self.name.clone(),
            })?;
        out.push_str(&value);
        Ok(())
    }
}

use std::rc::Rc;

use crate::mdg::error::{ResolveError, Result};
use crate::mdg::location::Location;
use crate::mdg::nodes::{BlockDef, NodeSequence};
use crate::mdg::rules::LabelRules;
use crate::mdg::source::{Builder, DocumentSource};

/// A parsed document, identified by its reference path.
#[derive(Debug)]
pub struct Document {
    pub refpath: String,
    pub template: bool,
    pub rules: LabelRules,
    pub blocks: Vec<Rc<BlockDef>>,
    pub nodes: Rc<NodeSequence>,
}

impl Document {
    /// Parses a YAML document description, see [`crate::mdg::source`].
    pub fn from_yaml(refpath: &str, source: &str) -> Result<Self> {
        let description =
            DocumentSource::from_yaml(source).map_err(|e| ResolveError::Source {
                location: Location::document(refpath),
                message: e.to_string(),
            })?;
        Self::from_source(refpath, &description)
    }

    pub fn from_source(refpath: &str, description: &DocumentSource) -> Result<Self> {
        let built = Builder::new(refpath).build(description)?;
        Ok(Self {
            refpath: refpath.to_string(),
            template: built.template,
            rules: built.rules,
            blocks: built.blocks,
            nodes: Rc::new(built.nodes),
        })
    }

    /// Number of top level sections.
    pub fn top_level_sections(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_section()).count()
    }
}

use serde::Serialize;

use crate::mdg::link::Link;
use crate::mdg::scope::{RefId, RefTarget};

use super::Resolution;

/// Resolved label information of one labeled node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub abbrev: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub anchors: Vec<String>,
}

impl Resolution {
    /// Labeled nodes of a document in registration order.
    pub fn labels(&self, document: &str) -> Vec<LabelEntry> {
        self.registry
            .referencables(document)
            .map(|id| self.label_entry(id))
            .collect()
    }

    fn label_entry(&self, id: RefId) -> LabelEntry {
        let node = self.registry.referencable(id);
        let label = node.slot.and_then(|s| self.numbering.slot(s).label());
        LabelEntry {
            id: node.id.to_string(),
            name: label
                .map(|l| self.numbering.label_name(l))
                .unwrap_or_default(),
            level: label.and_then(|l| l.level()),
            abbrev: node.abbrev.clone(),
            title: node.title.clone(),
            anchors: node.anchors.clone(),
        }
    }

    /// Label of the node `link` refers to, as seen from `document`.
    pub fn label_for(&self, document: &str, link: &str) -> Option<String> {
        let link = Link::parse(link, true).ok()?.abs(document, true).ok()?;
        let id = match &self.registry.resolved(&link)?.target {
            RefTarget::Node(id) => *id,
            RefTarget::Document(document) => self.registry.root_node(document)?,
        };
        let slot = self.registry.referencable(id).slot?;
        self.numbering.name(slot)
    }

    /// Title of the node `link` refers to, as seen from `document`.
    pub fn title_for(&self, document: &str, link: &str) -> Option<&str> {
        let link = Link::parse(link, true).ok()?.abs(document, true).ok()?;
        let id = match &self.registry.resolved(&link)?.target {
            RefTarget::Node(id) => *id,
            RefTarget::Document(document) => self.registry.root_node(document)?,
        };
        self.registry.referencable(id).title.as_deref()
    }
}

use std::fmt;

use serde::Serialize;

use super::rule::LabelRule;
use crate::mdg::numbering::SlotId;

/// Structural identity of a label: its type plus the dash joined ordinal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelId {
    typ: String,
    id: String,
}

impl LabelId {
    pub fn new(typ: &str, id: usize) -> Self {
        Self {
            typ: typ.to_string(),
            id: id.to_string(),
        }
    }

    pub fn sub(&self, id: usize) -> Self {
        Self {
            typ: self.typ.clone(),
            id: format!("{}-{}", self.id, id),
        }
    }

    /// Appends the ordinal path of `other` (used by composed rules).
    pub fn extend(&self, other: &LabelId) -> Self {
        Self {
            typ: self.typ.clone(),
            id: format!("{}-{}", self.id, other.id),
        }
    }

    pub fn typ(&self) -> &str {
        &self.typ
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.typ, self.id)
    }
}

/// Label bound to a hierarchy slot during label creation.
///
/// A prefixed label renders the label of its master slot in front of its own name. The prefix
/// is kept as a slot reference and named on demand, see `Numbering::label_name`.
#[derive(Debug, Clone)]
pub enum Label {
    Plain(LabelRule),
    Prefixed {
        prefix: SlotId,
        separator: String,
        rule: LabelRule,
    },
}

impl Label {
    pub fn rule(&self) -> &LabelRule {
        match self {
            Label::Plain(rule) => rule,
            Label::Prefixed { rule, .. } => rule,
        }
    }

    pub fn id(&self) -> LabelId {
        self.rule().id()
    }

    pub fn typ(&self) -> &str {
        self.rule().typ()
    }

    pub fn level(&self) -> Option<usize> {
        self.rule().level()
    }

    pub fn prefix(&self) -> Option<SlotId> {
        match self {
            Label::Plain(_) => None,
            Label::Prefixed { prefix, .. } => Some(*prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_id_paths() {
        let id = LabelId::new("figure", 2).sub(1).sub(3);
        assert_eq!(id.to_string(), "figure-2-1-3");
        assert_eq!(id.typ(), "figure");
        assert_eq!(id.extend(&LabelId::new("figure", 4)).id(), "2-1-3-4");
    }
}

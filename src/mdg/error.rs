//! Error types for label numbering and document resolution
//!
//! Resolution aborts on the first fatal error. The only soft failures are deferred value
//! resolutions, collected as [`Unresolved`] entries and escalated to
//! [`ResolveError::Unresolved`] once a resolution pass makes no further progress.

use std::fmt;

use thiserror::Error;

use super::history::History;
use super::labels::LabelId;
use super::location::Location;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("number format missing")]
    Missing,
    #[error("invalid character {0:?} in number format {1:?}")]
    InvalidCharacter(char, String),
    #[error("separator {0:?} without preceding number style in number format {1:?}")]
    DoubleSeparator(char, String),
}

/// Contract violations of the number range state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumberingError {
    #[error("number range {typ} used before first slot")]
    NoCurrentSlot { typ: String },
    #[error("sub range for {id} already created")]
    SubRangeExists { id: LabelId },
    #[error("number range {typ} already finalized by assignment")]
    Finalized { typ: String },
    #[error("no label rule for number range {typ}")]
    MissingRule { typ: String },
}

/// Value resolution that failed in the last pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub document: String,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

fn list_unresolved(entries: &[Unresolved]) -> String {
    let lines: Vec<String> = entries.iter().map(|e| format!("   {}", e)).collect();
    lines.join("\n")
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{location}: invalid number format: {source}")]
    Format {
        location: Location,
        #[source]
        source: FormatError,
    },

    #[error("{location}: {source}")]
    Numbering {
        location: Location,
        #[source]
        source: NumberingError,
    },

    #[error("{location}: invalid numberrange declaration: {message}")]
    Declaration { location: Location, message: String },

    #[error("{location}: invalid link: {message}")]
    Link { location: Location, message: String },

    #[error("{location}: invalid tag: {message}")]
    Tag { location: Location, message: String },

    #[error("{location}: duplicate {kind} {tag:?} (first registered at {first})")]
    Duplicate {
        location: Location,
        kind: &'static str,
        tag: String,
        first: Location,
    },

    #[error("{location}: duplicate id {id} (first registered at {first})")]
    DuplicateId {
        location: Location,
        id: LabelId,
        first: Location,
    },

    #[error("{location}: scope name {name:?} already used")]
    ScopeName { location: Location, name: String },

    #[error("document {refpath:?} added twice")]
    DuplicateDocument { refpath: String },

    #[error("{location}: document {document:?} requested twice (first requested at {first})")]
    DuplicateRequest {
        location: Location,
        document: String,
        first: Location,
    },

    #[error("{location}: document {document:?} already embedded by {first}")]
    DuplicateEmbedding {
        location: Location,
        document: String,
        first: Location,
    },

    #[error("{location}: embedded document {document:?} has {count} top level sections")]
    TopLevelSections {
        location: Location,
        document: String,
        count: usize,
    },

    #[error("{location}: structural document cycle {cycle}")]
    StructuralCycle { location: Location, cycle: History },

    #[error("{location}: number range {typ} has unknown master {master:?}")]
    UnknownMaster {
        location: Location,
        typ: String,
        master: String,
    },

    #[error("{location}: number range master cycle {cycle}")]
    MasterCycle { location: Location, cycle: History },

    #[error("{location}: number range {typ} cannot be configured in embedded document")]
    EmbeddedRangeConfig { location: Location, typ: String },

    #[error("{location}: number range {typ} not available")]
    MissingNumberRange { location: Location, typ: String },

    #[error("{location}: link {link} cannot be resolved")]
    UnresolvedLink { location: Location, link: String },

    #[error("{location}: block {link} not found")]
    UnknownBlock { location: Location, link: String },

    #[error("{location}: recursive use of block {block} ({cycle}) via {callstack}")]
    RecursiveBlock {
        location: Location,
        block: String,
        cycle: History,
        callstack: String,
    },

    #[error("{location}: unknown parameter {name:?} for block {block}")]
    UnknownParameter {
        location: Location,
        block: String,
        name: String,
    },

    #[error("{location}: missing argument {name:?} for block {block}")]
    MissingArgument {
        location: Location,
        block: String,
        name: String,
    },

    #[error("{location}: value {name:?} not defined")]
    UnknownValue { location: Location, name: String },

    #[error("{location}: {typ} {tag:?} not found")]
    UnknownTag {
        location: Location,
        typ: String,
        tag: String,
    },

    #[error("{location}: {what} not resolved yet")]
    NotResolved { location: Location, what: String },

    #[error("{location}: title must not contain line breaks: {title:?}")]
    MultilineTitle { location: Location, title: String },

    #[error("{location}: node context missing")]
    MissingNodeContext { location: Location },

    #[error("{location}: no static evaluation possible")]
    NotStatic { location: Location },

    #[error("{location}: invalid document description: {message}")]
    Source { location: Location, message: String },

    #[error("found {} unresolved nodes:\n{}", .0.len(), list_unresolved(.0))]
    Unresolved(Vec<Unresolved>),
}

impl ResolveError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            ResolveError::DuplicateDocument { .. } | ResolveError::Unresolved(_) => None,
            ResolveError::Format { location, .. }
            | ResolveError::Numbering { location, .. }
            | ResolveError::Declaration { location, .. }
            | ResolveError::Link { location, .. }
            | ResolveError::Tag { location, .. }
            | ResolveError::Duplicate { location, .. }
            | ResolveError::DuplicateId { location, .. }
            | ResolveError::ScopeName { location, .. }
            | ResolveError::DuplicateRequest { location, .. }
            | ResolveError::DuplicateEmbedding { location, .. }
            | ResolveError::TopLevelSections { location, .. }
            | ResolveError::StructuralCycle { location, .. }
            | ResolveError::UnknownMaster { location, .. }
            | ResolveError::MasterCycle { location, .. }
            | ResolveError::EmbeddedRangeConfig { location, .. }
            | ResolveError::MissingNumberRange { location, .. }
            | ResolveError::UnresolvedLink { location, .. }
            | ResolveError::UnknownBlock { location, .. }
            | ResolveError::RecursiveBlock { location, .. }
            | ResolveError::UnknownParameter { location, .. }
            | ResolveError::MissingArgument { location, .. }
            | ResolveError::UnknownValue { location, .. }
            | ResolveError::UnknownTag { location, .. }
            | ResolveError::NotResolved { location, .. }
            | ResolveError::MultilineTitle { location, .. }
            | ResolveError::MissingNodeContext { location }
            | ResolveError::NotStatic { location }
            | ResolveError::Source { location, .. } => Some(location),
        }
    }

    pub(crate) fn numbering(location: &Location, source: NumberingError) -> Self {
        ResolveError::Numbering {
            location: location.clone(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_lists_every_location() {
        let err = ResolveError::Unresolved(vec![
            Unresolved {
                document: "/a".into(),
                location: Location::new("a.yaml", 2, 1),
                message: "title of #x not resolved yet".into(),
            },
            Unresolved {
                document: "/a".into(),
                location: Location::new("a.yaml", 5, 1),
                message: "title of #y not resolved yet".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("found 2 unresolved nodes:"));
        assert!(text.contains("a.yaml:2:1"));
        assert!(text.contains("a.yaml:5:1"));
        assert!(err.location().is_none());
    }
}

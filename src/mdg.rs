//! Main module for mdg label numbering and document resolution

pub mod context;
pub mod document;
pub mod error;
pub mod history;
pub mod inline;
pub mod labels;
pub mod link;
pub mod location;
pub mod nodes;
pub mod numbering;
pub mod options;
pub mod rules;
pub mod scope;
pub mod source;
pub mod tree;

pub use document::Document;
pub use error::{ResolveError, Result};
pub use options::Options;
pub use tree::{LabelEntry, Resolution, Tree};

//! Label rules and number formats
//!
//! Leaves of the numbering engine: [`format`] turns ordinals into text, [`rule`] holds the
//! persistent per-level counters, [`label`] the identities and bound labels produced from them.

pub mod format;
pub mod label;
pub mod rule;

pub use format::{NumberFormat, NumberStyle, SEPARATORS};
pub use label::{Label, LabelId};
pub use rule::LabelRule;

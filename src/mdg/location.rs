//! Source locations attached to nodes and errors
//!
//! Every node carries a [`Location`]: the source name of the document it was read from plus a
//! line:column position. Documents loaded from a YAML description number their statements in
//! reading order, so `line` is the statement ordinal there and `column` the nesting depth.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Location {
    pub source: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(source: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            source: source.into(),
            line,
            column,
        }
    }

    /// Location of a whole document (no statement position).
    pub fn document(source: impl Into<String>) -> Self {
        Self::new(source, 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Location::new("a.yaml", 3, 2).to_string(), "a.yaml:3:2");
        assert_eq!(Location::document("a.yaml").to_string(), "a.yaml");
    }
}

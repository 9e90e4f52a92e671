//! Resolver configuration
//!
//! ```yaml
//! section_type: section
//! link_suffix: .md
//! default_rules:
//!   section: "1."
//!   figure: "numbered"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mdg::labels::LabelRule;
use crate::mdg::rules::parse_rule_kind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Label type of sections and structural document references.
    pub section_type: String,
    /// Appended to document paths by link determination.
    pub link_suffix: String,
    /// Rule kind per label type for root documents without own declaration.
    pub default_rules: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            section_type: "section".to_string(),
            link_suffix: ".md".to_string(),
            default_rules: BTreeMap::new(),
        }
    }
}

impl Options {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Configured default rule for a type, `None` if there is no entry.
    pub fn default_rule(
        &self,
        typ: &str,
        level: Option<usize>,
    ) -> Result<Option<(String, Option<LabelRule>)>, String> {
        match self.default_rules.get(typ) {
            Some(kind) => parse_rule_kind(typ, kind, level).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::from_yaml("link_suffix: .html\n").unwrap();
        assert_eq!(options.section_type, "section");
        assert_eq!(options.link_suffix, ".html");
        assert!(options.default_rule("section", None).unwrap().is_none());
    }

    #[test]
    fn test_default_rule() {
        let options = Options::from_yaml("default_rules:\n  figure: \"-a\"\n").unwrap();
        let (sep, rule) = options.default_rule("figure", Some(0)).unwrap().unwrap();
        assert_eq!(sep, "-");
        assert_eq!(rule.unwrap().next().name(), "a");
        assert!(Options::from_yaml("default_rules:\n  figure: \"?\"\n")
            .unwrap()
            .default_rule("figure", None)
            .is_err());
    }
}

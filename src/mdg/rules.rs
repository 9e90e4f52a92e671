//! Number range declarations
//!
//! Documents configure their label types with declarations of the form
//!
//!     name[:type][:#level] [master=name[:#limit]] [abbrev=text]
//!
//! e.g. `section:1.:#1 abbrev=Sect.` or `figure:-a master=section:#1`. The type is
//! `numbered`, `void` or a number format; a leading separator character is split off and used
//! as the range separator. Levels and limits are written 1-based.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::mdg::error::{ResolveError, Result};
use crate::mdg::labels::{LabelRule, NumberFormat, SEPARATORS};
use crate::mdg::location::Location;

static HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^:\s=]+)(?::(?P<a>[^:\s]+))?(?::(?P<b>[^:\s]+))?$")
        .unwrap()
});

static ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<field>[^=]*)=(?P<value>.*)$").unwrap());

/// Configuration of one label type in a document.
#[derive(Debug, Clone, Default)]
pub struct LabelRuleInfo {
    pub location: Location,
    pub rule: Option<LabelRule>,
    pub level: Option<usize>,
    pub separator: String,
    pub abbrev: String,
    pub master: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct LabelRules(BTreeMap<String, LabelRuleInfo>);

impl LabelRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, typ: &str) -> Option<&LabelRuleInfo> {
        self.0.get(typ)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets rule, level, abbreviation and separator of a type.
    ///
    /// A type may be declared in several steps, but the rule only once.
    pub fn set_label_rule(
        &mut self,
        location: &Location,
        typ: &str,
        abbrev: &str,
        separator: &str,
        rule: Option<LabelRule>,
        level: Option<usize>,
    ) -> std::result::Result<(), String> {
        let info = self
            .0
            .entry(typ.to_string())
            .or_insert_with(|| LabelRuleInfo {
                location: location.clone(),
                ..LabelRuleInfo::default()
            });
        if rule.is_some() && info.rule.is_some() {
            return Err("label type already set".to_string());
        }
        if level.is_some() {
            info.level = level;
        }
        if rule.is_some() {
            info.rule = rule;
        }
        if !abbrev.is_empty() {
            info.abbrev = abbrev.to_string();
        }
        if !separator.is_empty() {
            info.separator = separator.to_string();
        }
        Ok(())
    }

    pub fn set_label_master(
        &mut self,
        location: &Location,
        typ: &str,
        master: &str,
        separator: &str,
        limit: Option<usize>,
    ) -> std::result::Result<(), String> {
        let info = self
            .0
            .entry(typ.to_string())
            .or_insert_with(|| LabelRuleInfo {
                location: location.clone(),
                ..LabelRuleInfo::default()
            });
        if let Some(old) = &info.master {
            if old != master {
                return Err(format!("label master already set for {}", typ));
            }
        }
        info.master = Some(master.to_string());
        info.limit = limit;
        info.separator = separator.to_string();
        Ok(())
    }

    /// Parses and applies a declaration.
    pub fn declare(&mut self, declaration: &str, location: &Location) -> Result<()> {
        let err = |message: String| ResolveError::Declaration {
            location: location.clone(),
            message,
        };
        let decl = parse_declaration(declaration).map_err(err)?;
        self.set_label_rule(
            location,
            &decl.name,
            &decl.abbrev,
            &decl.separator,
            decl.rule,
            decl.level,
        )
        .map_err(err)?;
        if let Some(master) = &decl.master {
            self.set_label_master(location, &decl.name, master, &decl.separator, decl.limit)
                .map_err(err)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Declaration {
    name: String,
    rule: Option<LabelRule>,
    level: Option<usize>,
    separator: String,
    abbrev: String,
    master: Option<String>,
    limit: Option<usize>,
}

pub(crate) fn parse_level(s: &str, what: &str) -> std::result::Result<usize, String> {
    let digits = s
        .strip_prefix('#')
        .ok_or_else(|| format!("{} must start with #", what))?;
    let n: usize = digits
        .parse()
        .map_err(|e| format!("number required for {}, but found {:?}: {}", what, s, e))?;
    n.checked_sub(1)
        .ok_or_else(|| format!("invalid {} {}", what, s))
}

/// Splits an optional leading separator off a rule kind and builds the rule.
///
/// A bare separator configures no rule.
pub fn parse_rule_kind(
    typ: &str,
    kind: &str,
    level: Option<usize>,
) -> std::result::Result<(String, Option<LabelRule>), String> {
    let mut chars = kind.chars();
    let (separator, kind) = match chars.next() {
        Some(c) if SEPARATORS.contains(c) => (c.to_string(), chars.as_str()),
        _ => (String::new(), kind),
    };
    let rule = match kind {
        "" if !separator.is_empty() => return Ok((separator, None)),
        "numbered" => LabelRule::numbered(typ, level),
        "void" => LabelRule::void(typ, level),
        spec => {
            let format = NumberFormat::parse(spec)
                .map_err(|e| format!("unknown label type {:?}: {}", spec, e))?;
            LabelRule::free_form(typ, format, level)
        }
    };
    Ok((separator, Some(rule)))
}

fn parse_declaration(declaration: &str) -> std::result::Result<Declaration, String> {
    let mut parts = declaration.split_whitespace();
    let head = parts
        .next()
        .ok_or_else(|| "at least the range type is required".to_string())?;

    let mut master = None;
    let mut limit = None;
    let mut abbrev = String::new();
    for (i, arg) in parts.enumerate() {
        let caps = ARGUMENT
            .captures(arg)
            .ok_or_else(|| format!("argument {} [{}] requires assignment", i + 1, arg))?;
        let value = &caps["value"];
        match &caps["field"] {
            "master" => {
                let comps: Vec<&str> = value.split(':').collect();
                match comps.as_slice() {
                    [name] => master = Some(name.to_string()),
                    [name, l] => {
                        master = Some(name.to_string());
                        limit = Some(parse_level(l, "master limit")?);
                    }
                    _ => return Err("expected master spec <name>[:#<level limit>]".to_string()),
                }
            }
            "abbrev" => abbrev = value.to_string(),
            "" => {
                return Err(format!(
                    "argument {} [{}] requires non-empty field name",
                    i + 1,
                    arg
                ))
            }
            field => {
                return Err(format!(
                    "argument {} [{}] uses unknown field {} (use master or abbrev)",
                    i + 1,
                    arg,
                    field
                ))
            }
        }
    }

    let caps = HEAD
        .captures(head)
        .ok_or_else(|| "expected label spec <name>[:<type>][:#<level>]".to_string())?;
    let name = caps["name"].to_string();
    let (kind, level) = match (caps.name("a"), caps.name("b")) {
        (None, _) => (None, None),
        (Some(a), None) if a.as_str().starts_with('#') => {
            (None, Some(parse_level(a.as_str(), "section level")?))
        }
        (Some(a), None) => (Some(a.as_str()), None),
        (Some(a), Some(b)) => (Some(a.as_str()), Some(parse_level(b.as_str(), "section level")?)),
    };
    let (separator, rule) = match kind {
        Some(kind) => parse_rule_kind(&name, kind, level)?,
        None => (String::new(), None),
    };
    Ok(Declaration {
        name,
        rule,
        level,
        separator,
        abbrev,
        master,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn declared(decls: &[&str]) -> LabelRules {
        let mut rules = LabelRules::new();
        for d in decls {
            rules.declare(d, &Location::new("doc", 1, 1)).unwrap();
        }
        rules
    }

    #[test]
    fn test_full_declaration() {
        let rules = declared(&["figure:-a:#2 master=section:#1 abbrev=Fig."]);
        let info = rules.get("figure").unwrap();
        assert_eq!(info.separator, "-");
        assert_eq!(info.level, Some(1));
        assert_eq!(info.abbrev, "Fig.");
        assert_eq!(info.master.as_deref(), Some("section"));
        assert_eq!(info.limit, Some(0));
        let rule = info.rule.as_ref().unwrap();
        assert_eq!(rule.kind(), "freeform");
        assert_eq!(rule.next().name(), "a");
        assert_eq!(rule.level(), Some(1));
    }

    #[test]
    fn test_separator_only() {
        let rules = declared(&["figure:- master=section"]);
        let info = rules.get("figure").unwrap();
        assert!(info.rule.is_none());
        assert_eq!(info.separator, "-");
        assert_eq!(info.master.as_deref(), Some("section"));
        assert_eq!(info.limit, None);
    }

    #[test]
    fn test_level_only() {
        let rules = declared(&["section:#3"]);
        let info = rules.get("section").unwrap();
        assert!(info.rule.is_none());
        assert_eq!(info.level, Some(2));
    }

    #[test]
    fn test_incremental_declaration() {
        let rules = declared(&["table:numbered", "table abbrev=Tab."]);
        let info = rules.get("table").unwrap();
        assert_eq!(info.rule.as_ref().map(|r| r.kind()), Some("numbered"));
        assert_eq!(info.abbrev, "Tab.");
    }

    #[test]
    fn test_rule_set_twice() {
        let mut rules = declared(&["table:numbered"]);
        let err = rules
            .declare("table:void", &Location::new("doc", 2, 1))
            .unwrap_err();
        assert!(err.to_string().contains("label type already set"));
    }

    #[rstest(
        decl,
        case("section:1.:3"),
        case("section:1.:#0"),
        case("section:x"),
        case("section size=3"),
        case("section master=a:b:c"),
        case("section =x"),
        case("a:b:c:d")
    )]
    fn test_invalid_declarations(decl: &str) {
        let mut rules = LabelRules::new();
        assert!(matches!(
            rules.declare(decl, &Location::new("doc", 1, 1)),
            Err(ResolveError::Declaration { .. })
        ));
    }
}

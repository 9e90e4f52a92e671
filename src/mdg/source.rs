//! YAML document descriptions
//!
//! Documents are handed to the resolver as YAML. Every node is a single key map naming the
//! node kind:
//!
//! ```yaml
//! numberranges:
//!   - "section:1.:#1 abbrev=Sect."
//!   - "figure:-a master=section abbrev=Fig."
//! blocks:
//!   - tag: note
//!     params:
//!       - name: title
//!         default: "Note"
//!     nodes:
//!       - subrange: { range: figure, tag: "{title}", title: "{{value title}}" }
//! nodes:
//!   - section:
//!       tag: intro
//!       title: Introduction
//!       nodes:
//!         - text: "See {{ref #fig}}"
//!         - subrange: { range: figure, tag: fig, title: A figure }
//!         - blockref: { block: note, args: { title: Details } }
//!   - sectionref: chapter
//!   - term: { tag: mdg, text: multi document generator }
//! ```
//!
//! Text values (text, titles, arguments, defaults) may contain inline directives, see
//! [`crate::mdg::inline`].

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::inline::parse_inline;
use crate::mdg::location::Location;
use crate::mdg::nodes::{
    BlockDef, BlockRef, NestedRule, Node, NodeSequence, Param, Section, SectionRef, SubRange,
    Term,
};
use crate::mdg::rules::{parse_level, parse_rule_kind, LabelRules};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentSource {
    /// Templates are only used via block references and never resolved on their own.
    pub template: bool,
    pub numberranges: Vec<String>,
    pub blocks: Vec<BlockSource>,
    pub nodes: Vec<NodeSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockSource {
    pub tag: String,
    #[serde(default)]
    pub params: Vec<ParamSource>,
    #[serde(default)]
    pub blocks: Vec<BlockSource>,
    #[serde(default)]
    pub nodes: Vec<NodeSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSource {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    Text(String),
    Section {
        #[serde(default)]
        tag: Option<String>,
        title: String,
        #[serde(default)]
        nodes: Vec<NodeSource>,
    },
    Subrange {
        range: String,
        #[serde(default)]
        tag: Option<String>,
        #[serde(default)]
        title: String,
        /// Rule for nested ranges of the same type: `[separator]kind[:#level]`.
        #[serde(default)]
        numberrange: Option<String>,
        #[serde(default)]
        nodes: Vec<NodeSource>,
    },
    Sectionref(String),
    Blockref {
        block: String,
        #[serde(default)]
        tag: Option<String>,
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
    Term {
        tag: String,
        text: String,
    },
}

impl DocumentSource {
    pub fn from_yaml(source: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let de = serde_yaml::Deserializer::from_str(source);
        serde_yaml::with::singleton_map_recursive::deserialize(de)
    }
}

/// Parsed content of a document description.
pub(crate) struct Built {
    pub template: bool,
    pub rules: LabelRules,
    pub blocks: Vec<Rc<BlockDef>>,
    pub nodes: NodeSequence,
}

/// Turns a description into nodes, numbering statements in reading order.
pub(crate) struct Builder<'a> {
    refpath: &'a str,
    line: usize,
}

impl<'a> Builder<'a> {
    pub fn new(refpath: &'a str) -> Self {
        Self { refpath, line: 0 }
    }

    fn next_location(&mut self, depth: usize) -> Location {
        self.line += 1;
        Location::new(self.refpath, self.line, depth)
    }

    pub fn build(mut self, source: &DocumentSource) -> Result<Built> {
        let mut rules = LabelRules::new();
        for declaration in &source.numberranges {
            let location = self.next_location(0);
            rules.declare(declaration, &location)?;
        }
        let refpath = self.refpath;
        let blocks = source
            .blocks
            .iter()
            .map(|b| self.block(b, &format!("{}#{}", refpath, b.tag), 0))
            .collect::<Result<Vec<_>>>()?;
        let nodes = self.nodes(&source.nodes, 0)?;
        Ok(Built {
            template: source.template,
            rules,
            blocks,
            nodes,
        })
    }

    fn block(&mut self, source: &BlockSource, name: &str, depth: usize) -> Result<Rc<BlockDef>> {
        let location = self.next_location(depth);
        let params = source
            .params
            .iter()
            .map(|p| {
                let default = match &p.default {
                    Some(text) => Some(Rc::new(parse_inline(text, &location)?)),
                    None => None,
                };
                Ok(Param {
                    name: p.name.clone(),
                    default,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let blocks = source
            .blocks
            .iter()
            .map(|b| self.block(b, &format!("{}/{}", name, b.tag), depth + 1))
            .collect::<Result<Vec<_>>>()?;
        let body = self.nodes(&source.nodes, depth + 1)?;
        Ok(Rc::new(BlockDef {
            location,
            tag: source.tag.clone(),
            name: name.to_string(),
            params,
            blocks,
            body: Rc::new(body),
        }))
    }

    fn nodes(&mut self, sources: &[NodeSource], depth: usize) -> Result<NodeSequence> {
        let mut nodes: Vec<Box<dyn Node>> = Vec::with_capacity(sources.len());
        for source in sources {
            nodes.push(self.node(source, depth)?);
        }
        Ok(nodes.into())
    }

    fn node(&mut self, source: &NodeSource, depth: usize) -> Result<Box<dyn Node>> {
        let location = self.next_location(depth);
        let node: Box<dyn Node> = match source {
            NodeSource::Text(text) => Box::new(InlineText(parse_inline(text, &location)?, location)),
            NodeSource::Section { tag, title, nodes } => {
                let title = parse_inline(title, &location)?;
                let body = self.nodes(nodes, depth + 1)?;
                Box::new(Section::new(location, tag.clone(), title, body))
            }
            NodeSource::Subrange {
                range,
                tag,
                title,
                numberrange,
                nodes,
            } => {
                if range.is_empty() {
                    return Err(ResolveError::Source {
                        location,
                        message: "number range type may not be empty".to_string(),
                    });
                }
                let title = parse_inline(title, &location)?;
                let body = self.nodes(nodes, depth + 1)?;
                let mut node = SubRange::new(location.clone(), range, tag.clone(), title, body);
                if let Some(spec) = numberrange {
                    let nested =
                        nested_rule(range, spec).map_err(|message| ResolveError::Declaration {
                            location: location.clone(),
                            message,
                        })?;
                    node = node.with_nested_rule(nested);
                }
                Box::new(node)
            }
            NodeSource::Sectionref(link) => Box::new(SectionRef::new(location, link)),
            NodeSource::Blockref { block, tag, args } => {
                let args = args
                    .iter()
                    .map(|(name, text)| {
                        Ok((name.clone(), Rc::new(parse_inline(text, &location)?)))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Box::new(BlockRef::new(location, block, tag.clone(), args))
            }
            NodeSource::Term { tag, text } => {
                let text = parse_inline(text, &location)?;
                Box::new(Term::new(location, tag, text))
            }
        };
        Ok(node)
    }
}

/// Parses `[separator]kind[:#level]` for the nested ranges of a sub range.
fn nested_rule(typ: &str, spec: &str) -> std::result::Result<NestedRule, String> {
    let (kind, level) = match spec.split_once(':') {
        Some((kind, level)) => (kind, Some(parse_level(level, "level")?)),
        None => (spec, None),
    };
    let (separator, rule) = parse_rule_kind(typ, kind, level)?;
    Ok(NestedRule {
        separator,
        rule,
        level,
    })
}

/// Text statement: the inline nodes of one text value.
#[derive(Debug)]
struct InlineText(NodeSequence, Location);

impl Node for InlineText {
    fn location(&self) -> &Location {
        &self.1
    }

    fn register(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.register(ctx)
    }

    fn resolve_labels(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.resolve_labels(ctx)
    }

    fn resolve_values(&self, ctx: &mut ResolutionContext<'_>) -> Result<()> {
        self.0.resolve_values(ctx)
    }

    fn emit(&self, ctx: &mut ResolutionContext<'_>, out: &mut String) -> Result<()> {
        self.0.emit(ctx, out)?;
        out.push('\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
numberranges:
  - "figure:-a abbrev=Fig."
blocks:
  - tag: note
    params:
      - name: title
        default: Note
    blocks:
      - tag: inner
        nodes:
          - text: inner
    nodes:
      - text: "{{value title}}"
nodes:
  - section:
      tag: intro
      title: Introduction
      nodes:
        - subrange: { range: figure, tag: fig, title: A figure, numberrange: "-1:#2" }
        - blockref: { block: note, args: { title: Details } }
  - sectionref: chapter
  - term: { tag: mdg, text: multi document generator }
"#;

    #[test]
    fn test_parse_description() {
        let source = DocumentSource::from_yaml(SOURCE).unwrap();
        assert!(!source.template);
        assert_eq!(source.numberranges.len(), 1);
        assert_eq!(source.blocks[0].params[0].default.as_deref(), Some("Note"));
        assert_eq!(source.nodes.len(), 3);
        assert_eq!(source.nodes[1], NodeSource::Sectionref("chapter".to_string()));
    }

    #[test]
    fn test_build_nodes() {
        let source = DocumentSource::from_yaml(SOURCE).unwrap();
        let built = Builder::new("/doc").build(&source).unwrap();
        assert_eq!(built.nodes.len(), 3);
        assert!(built.nodes.iter().next().unwrap().is_section());
        assert_eq!(built.blocks[0].name, "/doc#note");
        assert_eq!(built.blocks[0].blocks[0].name, "/doc#note/inner");
        assert_eq!(built.rules.get("figure").unwrap().abbrev, "Fig.");
    }

    #[test]
    fn test_nested_rule() {
        let nested = nested_rule("figure", "-1:#2").unwrap();
        assert_eq!(nested.separator, "-");
        assert_eq!(nested.level, Some(1));
        assert!(nested.rule.is_some());
        assert!(nested_rule("figure", "-1:2").is_err());
    }

    #[test]
    fn test_unknown_node_kind() {
        assert!(DocumentSource::from_yaml("nodes:\n  - bogus: x\n").is_err());
    }
}

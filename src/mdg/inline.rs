//! Inline directives
//!
//! Text fragments of a document may embed directives in double braces:
//!
//! - `{{ref link}}`: label of the referenced node, prefixed by the range abbreviation
//! - `{{title link}}`: title of the referenced node
//! - `{{value name}}`: block parameter
//! - `{{attr name}}`: context attribute, see [`crate::mdg::context::CONTEXT_ATTRIBUTES`]
//! - `{{term tag}}`: text of a term definition
//!
//! Tokenization is handled by logos; a single `{` not starting a directive is plain text.

use logos::Logos;

use crate::mdg::error::{ResolveError, Result};
use crate::mdg::location::Location;
use crate::mdg::nodes::{Attr, NodeSequence, Ref, RefMode, TermRef, Text, Value};

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum InlineToken {
    #[regex(r"\{\{[^{}]*\}\}")]
    Directive,

    #[regex(r"[^{]+")]
    Text,

    #[token("{")]
    Brace,
}

/// Splits `text` into a node sequence of text and directive nodes.
pub fn parse_inline(text: &str, location: &Location) -> Result<NodeSequence> {
    let mut nodes = NodeSequence::new();
    let mut pending = String::new();
    let mut lexer = InlineToken::lexer(text);

    while let Some(token) = lexer.next() {
        let slice = lexer.slice();
        match token {
            Ok(InlineToken::Directive) => {
                if !pending.is_empty() {
                    nodes.push(Text::new(location.clone(), std::mem::take(&mut pending)));
                }
                push_directive(&mut nodes, &slice[2..slice.len() - 2], location)?;
            }
            Ok(InlineToken::Text) | Ok(InlineToken::Brace) | Err(_) => pending.push_str(slice),
        }
    }
    if !pending.is_empty() {
        nodes.push(Text::new(location.clone(), pending));
    }
    Ok(nodes)
}

fn push_directive(nodes: &mut NodeSequence, directive: &str, location: &Location) -> Result<()> {
    let invalid = |message: String| ResolveError::Source {
        location: location.clone(),
        message,
    };
    let mut words = directive.split_whitespace();
    let keyword = words
        .next()
        .ok_or_else(|| invalid("empty directive".into()))?;
    let argument = words
        .next()
        .ok_or_else(|| invalid(format!("directive {} requires an argument", keyword)))?;
    if words.next().is_some() {
        return Err(invalid(format!(
            "directive {} takes a single argument",
            keyword
        )));
    }
    let location = location.clone();
    match keyword {
        "ref" => nodes.push(Ref::new(location, argument, RefMode::Label)),
        "title" => nodes.push(Ref::new(location, argument, RefMode::Title)),
        "value" => nodes.push(Value::new(location, argument)),
        "attr" => nodes.push(Attr::new(location, argument)),
        "term" => nodes.push(TermRef::new(location, argument)),
        _ => return Err(invalid(format!("unknown directive {:?}", keyword))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<InlineToken> {
        InlineToken::lexer(source).filter_map(|t| t.ok()).collect()
    }

    #[test]
    fn test_tokenize_directives() {
        assert_eq!(
            tokens("see {{ref #a}} now"),
            vec![InlineToken::Text, InlineToken::Directive, InlineToken::Text]
        );
        assert_eq!(
            tokens("a { b"),
            vec![InlineToken::Text, InlineToken::Brace, InlineToken::Text]
        );
    }

    #[test]
    fn test_parse_merges_plain_text() {
        let nodes = parse_inline("a { b } c", &Location::document("/doc")).unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_parse_directives() {
        let nodes =
            parse_inline("{{ref #a}}, {{title #a}}: {{value p}}", &Location::document("/doc"))
                .unwrap();
        assert_eq!(nodes.len(), 5);
    }

    #[test]
    fn test_invalid_directives() {
        let location = Location::document("/doc");
        assert!(parse_inline("{{}}", &location).is_err());
        assert!(parse_inline("{{ref}}", &location).is_err());
        assert!(parse_inline("{{ref a b}}", &location).is_err());
        assert!(parse_inline("{{bogus a}}", &location).is_err());
    }
}

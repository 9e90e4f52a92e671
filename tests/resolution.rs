//! Resolution of YAML described document trees

use mdg_core::mdg::error::NumberingError;
use mdg_core::mdg::link::Link;
use mdg_core::mdg::{Options, ResolveError, Resolution, Tree};
use rstest::rstest;
use serde_json::json;

fn tree(documents: &[(&str, &str)]) -> Tree {
    tree_with(Options::default(), documents)
}

fn tree_with(options: Options, documents: &[(&str, &str)]) -> Tree {
    let mut tree = Tree::new(options);
    for (path, source) in documents {
        tree.add_yaml(path, source).unwrap();
    }
    tree
}

fn resolve(documents: &[(&str, &str)]) -> Resolution {
    tree(documents).resolve().unwrap()
}

fn resolve_err(documents: &[(&str, &str)]) -> ResolveError {
    tree(documents).resolve().unwrap_err()
}

fn report(res: &Resolution, document: &str) -> String {
    res.labels(document)
        .iter()
        .map(|e| format!("{} | {} | {}", e.id, e.name, e.title.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

const ARTICLE: &str = r#"
numberranges:
  - "figure:-a master=section abbrev=Fig."
nodes:
  - section:
      tag: intro
      title: Introduction
      nodes:
        - subrange: { range: figure, tag: f1, title: First }
        - subrange: { range: figure, tag: f2, title: Second }
        - section:
            tag: details
            title: Details
            nodes:
              - subrange: { range: figure, tag: f3, title: "Third after {{ref #f1}}" }
  - section:
      tag: usage
      title: "Using {{title #intro}}"
      nodes:
        - subrange: { range: figure, tag: f4, title: Fourth }
"#;

#[test]
fn test_master_prefixed_labels() {
    let res = resolve(&[("/article", ARTICLE)]);
    insta::assert_snapshot!(report(&res, "/article"), @r###"
    section-1 | 1 | Introduction
    figure-1 | 1-a | First
    figure-2 | 1-b | Second
    section-1-1 | 1.1 | Details
    figure-3 | 1.1-a | Third after Fig. 1-a
    section-2 | 2 | Using Introduction
    figure-4 | 2-a | Fourth
    "###);
}

#[test]
fn test_label_entry_serialization() {
    let res = resolve(&[("/article", ARTICLE)]);
    let labels = res.labels("/article");
    assert_eq!(
        serde_json::to_value(&labels[0]).unwrap(),
        json!({
            "id": "section-1",
            "name": "1",
            "level": 0,
            "title": "Introduction",
            "anchors": ["intro", "section-1"],
        })
    );
    assert_eq!(
        serde_json::to_value(&labels[1]).unwrap(),
        json!({
            "id": "figure-1",
            "name": "1-a",
            "level": 0,
            "abbrev": "Fig.",
            "title": "First",
            "anchors": ["f1", "figure-1"],
        })
    );
    assert_eq!(labels[3].level, Some(1));
}

#[test]
fn test_queries_by_link() {
    let res = resolve(&[("/article", ARTICLE)]);
    assert_eq!(res.label_for("/article", "#details").as_deref(), Some("1.1"));
    assert_eq!(res.label_for("/article", "section-2").as_deref(), Some("2"));
    assert_eq!(res.title_for("/article", "#f4"), Some("Fourth"));
    assert_eq!(res.label_for("/article", "#missing"), None);
}

const BOOK: &str = r#"
nodes:
  - section: { tag: start, title: Start }
  - sectionref: chapter
  - section: { tag: end, title: End }
"#;

const CHAPTER: &str = r#"
nodes:
  - section:
      tag: chapter
      title: Chapter
      nodes:
        - section: { tag: inner, title: "Inner, see {{ref /book#end}}" }
"#;

#[test]
fn test_embedded_document_continues_numbering() {
    let res = resolve(&[("/book", BOOK), ("/chapter", CHAPTER)]);
    assert_eq!(res.roots().collect::<Vec<_>>(), ["/book"]);
    assert_eq!(res.embedded_by("/chapter"), Some("/book"));
    assert_eq!(res.embedded_by("/book"), None);

    assert_eq!(res.label_for("/book", "#start").as_deref(), Some("1"));
    assert_eq!(res.label_for("/chapter", "#chapter").as_deref(), Some("2"));
    assert_eq!(res.label_for("/chapter", "#inner").as_deref(), Some("2.1"));
    assert_eq!(res.label_for("/book", "#end").as_deref(), Some("3"));
    assert_eq!(res.title_for("/chapter", "#inner"), Some("Inner, see 3"));
}

#[test]
fn test_render_embedding_document() {
    let mut res = resolve(&[("/book", BOOK), ("/chapter", CHAPTER)]);
    assert_eq!(res.render("/book").unwrap(), "1 Start\nchapter.md\n3 End\n");
    assert_eq!(
        res.render("/chapter").unwrap(),
        "2 Chapter\n2.1 Inner, see 3\n"
    );
}

#[test]
fn test_determine_link() {
    let res = resolve(&[("/book", BOOK), ("/chapter", CHAPTER)]);
    assert_eq!(
        res.determine_link("/chapter", &Link::new("/book", "end")).unwrap(),
        "book.md#end"
    );
    assert_eq!(
        res.determine_link("/book", &Link::new("", "end")).unwrap(),
        "#end"
    );
    assert!(res.determine_link("/book", &Link::new("", "nothing")).is_err());
}

#[test]
fn test_embedded_level_declaration_pins_level() {
    let chapter = format!("numberranges:\n  - \"section:#2\"\n{}", CHAPTER);
    let res = resolve(&[("/book", BOOK), ("/chapter", &chapter)]);
    let labels = res.labels("/chapter");
    assert_eq!(labels[0].name, "2");
    assert_eq!(labels[0].level, Some(1));
    assert_eq!(labels[1].name, "2.1");
    assert_eq!(labels[1].level, Some(2));
}

#[test]
fn test_embedded_rule_declaration_is_rejected() {
    let chapter = format!("numberranges:\n  - \"section:a\"\n{}", CHAPTER);
    let err = resolve_err(&[("/book", BOOK), ("/chapter", &chapter)]);
    assert!(matches!(err, ResolveError::EmbeddedRangeConfig { ref typ, .. } if typ == "section"));
}

#[test]
fn test_default_rule_from_options() {
    let options = Options::from_yaml("default_rules:\n  section: \"A-1.\"\n").unwrap();
    let res = tree_with(options, &[("/book", BOOK), ("/chapter", CHAPTER)])
        .resolve()
        .unwrap();
    assert_eq!(res.label_for("/chapter", "#inner").as_deref(), Some("B-1"));
    assert_eq!(res.label_for("/book", "#end").as_deref(), Some("C"));
}

const LIBRARY: &str = r#"
template: true
blocks:
  - tag: /figure
    params:
      - name: caption
      - name: kind
        default: plain
    nodes:
      - subrange:
          range: figure
          tag: "{caption}"
          title: "{{value caption}} ({{value kind}})"
"#;

const MAIN: &str = r##"
nodes:
  - section:
      tag: s
      title: Section
      nodes:
        - blockref: { block: "#/figure", tag: one, args: { caption: Main } }
        - blockref: { block: "#/figure", args: { caption: Other, kind: special } }
        - text: "See {{ref #Main}} and {{title #Other}}"
"##;

#[test]
fn test_block_expansion() {
    let mut res = resolve(&[("/lib", LIBRARY), ("/main", MAIN)]);
    insta::assert_snapshot!(report(&res, "/main"), @r###"
    section-1 | 1 | Section
    figure-1 | 1 | Main (plain)
    figure-2 | 2 | Other (special)
    "###);
    assert_eq!(
        res.render("/main").unwrap(),
        "1 Section\n1 Main (plain)\n2 Other (special)\nSee 1 and Other (special)\n"
    );
    assert!(res.labels("/lib").is_empty());
}

#[test]
fn test_recursive_block() {
    let err = resolve_err(&[(
        "/doc",
        r#"
blocks:
  - tag: a
    nodes:
      - blockref: { block: b }
  - tag: b
    nodes:
      - blockref: { block: a }
nodes:
  - blockref: { block: a }
"#,
    )]);
    assert!(matches!(err, ResolveError::RecursiveBlock { ref block, .. } if block == "/doc#a"));
}

#[test]
fn test_block_arguments_are_checked() {
    let doc = |args: &str| {
        format!(
            "blocks:\n  - tag: note\n    params:\n      - name: title\n    nodes:\n      - text: \"{{{{value title}}}}\"\nnodes:\n  - blockref: {{ block: note{} }}\n",
            args
        )
    };
    let missing = doc("");
    assert!(matches!(
        resolve_err(&[("/doc", &missing)]),
        ResolveError::MissingArgument { ref name, .. } if name == "title"
    ));
    let unknown = doc(", args: { title: x, color: red }");
    assert!(matches!(
        resolve_err(&[("/doc", &unknown)]),
        ResolveError::UnknownParameter { ref name, .. } if name == "color"
    ));
    let mut res = resolve(&[("/doc", &doc(", args: { title: Hello }"))]);
    assert_eq!(res.render("/doc").unwrap(), "Hello\n");
}

#[test]
fn test_unknown_block() {
    let err = resolve_err(&[("/doc", "nodes:\n  - blockref: { block: nothing }\n")]);
    assert!(matches!(err, ResolveError::UnknownBlock { .. }));
}

#[test]
fn test_forward_title_reference_resolves() {
    let res = resolve(&[(
        "/doc",
        r#"
nodes:
  - section: { tag: a, title: "Before {{title #b}}" }
  - section: { tag: b, title: "{{title #c}} part" }
  - section: { tag: c, title: Last }
"#,
    )]);
    assert_eq!(res.title_for("/doc", "#a"), Some("Before Last part"));
}

#[test]
fn test_cyclic_titles_stay_unresolved() {
    let err = resolve_err(&[(
        "/doc",
        r#"
nodes:
  - section: { tag: a, title: "A {{title #b}}" }
  - section: { tag: b, title: "B {{title #a}}" }
"#,
    )]);
    match err {
        ResolveError::Unresolved(unresolved) => assert_eq!(unresolved.len(), 2),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn test_terms() {
    let mut res = resolve(&[(
        "/doc",
        r#"
nodes:
  - text: "The {{term mdg}} is small"
  - term: { tag: mdg, text: "generator for {{title #s}}" }
  - section: { tag: s, title: Documents }
"#,
    )]);
    let out = res.render("/doc").unwrap();
    assert!(out.starts_with("The generator for Documents is small\n"));
}

#[test]
fn test_duplicate_tag() {
    let err = resolve_err(&[(
        "/doc",
        "nodes:\n  - section: { tag: x, title: A }\n  - section: { tag: x, title: B }\n",
    )]);
    assert!(matches!(err, ResolveError::Duplicate { .. }));
}

#[test]
fn test_unresolved_reference() {
    let err = resolve_err(&[("/doc", "nodes:\n  - text: \"{{ref #nowhere}}\"\n")]);
    assert!(matches!(err, ResolveError::UnresolvedLink { .. }));
}

#[test]
fn test_duplicate_embedding() {
    let err = resolve_err(&[
        ("/a", "nodes:\n  - sectionref: c\n"),
        ("/b", "nodes:\n  - sectionref: c\n"),
        ("/c", "nodes:\n  - section: { title: C }\n"),
    ]);
    assert!(matches!(err, ResolveError::DuplicateEmbedding { ref document, .. } if document == "/c"));
}

#[test]
fn test_embedded_document_with_two_sections() {
    let err = resolve_err(&[
        ("/a", "nodes:\n  - sectionref: b\n"),
        (
            "/b",
            "nodes:\n  - section: { title: One }\n  - section: { title: Two }\n",
        ),
    ]);
    assert!(matches!(err, ResolveError::TopLevelSections { count: 2, .. }));
}

#[test]
fn test_structural_cycle() {
    let err = resolve_err(&[
        ("/a", "nodes:\n  - sectionref: b\n"),
        ("/b", "nodes:\n  - sectionref: a\n"),
    ]);
    assert!(matches!(err, ResolveError::StructuralCycle { .. }));
}

#[test]
fn test_unknown_master() {
    let err = resolve_err(&[(
        "/doc",
        "numberranges:\n  - \"figure:1 master=table\"\nnodes:\n  - subrange: { range: figure, title: F }\n",
    )]);
    assert!(matches!(err, ResolveError::UnknownMaster { ref master, .. } if master == "table"));
}

#[test]
fn test_master_cycle() {
    let err = resolve_err(&[(
        "/doc",
        "numberranges:\n  - \"figure:1 master=table\"\n  - \"table:1 master=figure\"\n",
    )]);
    assert!(matches!(err, ResolveError::MasterCycle { .. }));
}

#[test]
fn test_documents_must_be_unique() {
    let mut tree = Tree::new(Options::default());
    tree.add_yaml("doc", "nodes: []\n").unwrap();
    assert_eq!(tree.documents().collect::<Vec<_>>(), ["/doc"]);
    assert!(matches!(
        tree.add_yaml("/doc", "nodes: []\n"),
        Err(ResolveError::DuplicateDocument { .. })
    ));
}

#[test]
fn test_master_limit_truncates_prefix() {
    let res = resolve(&[(
        "/doc",
        r#"
numberranges:
  - "figure:-a master=section:#1"
nodes:
  - section:
      tag: intro
      title: Intro
      nodes:
        - section:
            tag: details
            title: Details
            nodes:
              - subrange: { range: figure, tag: f1, title: Deep }
        - subrange: { range: figure, tag: f2, title: Shallow }
  - section:
      tag: usage
      title: Usage
      nodes:
        - subrange: { range: figure, tag: f3, title: Next }
"#,
    )]);
    insta::assert_snapshot!(report(&res, "/doc"), @r###"
    section-1 | 1 | Intro
    section-1-1 | 1.1 | Details
    figure-1 | 1-a | Deep
    figure-2 | 1-b | Shallow
    section-2 | 2 | Usage
    figure-3 | 2-a | Next
    "###);
}

#[test]
fn test_master_range_spans_embedded_document() {
    let book = r#"
numberranges:
  - "figure:-a master=section"
nodes:
  - section:
      tag: start
      title: Start
      nodes:
        - subrange: { range: figure, title: S }
  - sectionref: chapter
  - section:
      tag: end
      title: End
      nodes:
        - subrange: { range: figure, title: E }
"#;
    let chapter = r#"
nodes:
  - section:
      tag: chapter
      title: Chapter
      nodes:
        - subrange: { range: figure, title: C1 }
        - subrange: { range: figure, title: C2 }
"#;
    let res = resolve(&[("/book", book), ("/chapter", chapter)]);
    insta::assert_snapshot!(report(&res, "/book"), @r###"
    section-1 | 1 | Start
    figure-1 | 1-a | S
    section-3 | 3 | End
    figure-2 | 3-a | E
    "###);
    insta::assert_snapshot!(report(&res, "/chapter"), @r###"
    section-1 | 2 | Chapter
    figure-1 | 2-a | C1
    figure-2 | 2-b | C2
    "###);
}

#[test]
fn test_section_reference_to_global_tag() {
    let mut res = resolve(&[
        ("/book", "nodes:\n  - section: { title: Start }\n  - sectionref: \"#/chap\"\n"),
        ("/chapter", "nodes:\n  - section: { tag: /chap, title: Chapter }\n"),
    ]);
    assert_eq!(res.embedded_by("/chapter"), Some("/book"));
    assert_eq!(res.label_for("/chapter", "#/chap").as_deref(), Some("2"));
    assert!(res.render("/book").unwrap().contains("chapter.md#"));
}

#[test]
fn test_section_reference_with_document_anchor_is_rejected() {
    let err = resolve_err(&[
        ("/book", "nodes:\n  - sectionref: \"chapter#intro\"\n"),
        ("/chapter", "nodes:\n  - section: { tag: intro, title: Chapter }\n"),
    ]);
    assert!(matches!(err, ResolveError::Link { .. }));
}

#[test]
fn test_forwarded_value_in_nested_block_tag() {
    let res = resolve(&[(
        "/doc",
        r#"
blocks:
  - tag: outer
    params:
      - name: t
    nodes:
      - blockref: { block: inner, args: { t: "{{value t}}" } }
  - tag: inner
    params:
      - name: t
    nodes:
      - subrange: { range: figure, tag: "{t}", title: "T {{value t}}" }
nodes:
  - blockref: { block: outer, args: { t: main } }
  - text: "See {{ref #main}}"
"#,
    )]);
    assert_eq!(res.label_for("/doc", "#main").as_deref(), Some("1"));
    assert_eq!(res.title_for("/doc", "#main"), Some("T main"));
}

#[test]
fn test_reference_in_tag_substitution_is_not_static() {
    let err = resolve_err(&[(
        "/doc",
        r#"
blocks:
  - tag: fig
    params:
      - name: t
    nodes:
      - subrange: { range: figure, tag: "{t}", title: F }
nodes:
  - section: { tag: other, title: Other }
  - blockref: { block: fig, args: { t: "x{{ref #other}}" } }
"#,
    )]);
    assert!(matches!(err, ResolveError::NotStatic { .. }));
}

#[rstest]
#[case::attribute("{docname}-fig", "#guide-fig")]
#[case::parameter_default("{name}-fig", "#g-fig")]
fn test_tag_template_substitution(#[case] tag: &str, #[case] link: &str) {
    let doc = format!(
        "blocks:\n  - tag: fig\n    params:\n      - name: name\n        default: g\n    nodes:\n      - subrange: {{ range: figure, tag: \"{}\", title: F }}\nnodes:\n  - blockref: {{ block: fig }}\n",
        tag
    );
    let res = resolve(&[("/guide", &doc)]);
    assert_eq!(res.label_for("/guide", link).as_deref(), Some("1"));
}

#[test]
fn test_tag_template_in_document_scope_is_rejected() {
    let err = resolve_err(&[("/doc", "nodes:\n  - section: { tag: \"{docname}\", title: A }\n")]);
    match err {
        ResolveError::Tag { message, .. } => {
            assert!(message.contains("no anchor composition for document scope"))
        }
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn test_second_top_level_section_after_assignment() {
    let err = resolve_err(&[
        ("/book", "nodes:\n  - sectionref: chapter\n"),
        (
            "/chapter",
            r#"
blocks:
  - tag: more
    nodes:
      - section: { title: B }
nodes:
  - section: { title: A }
  - blockref: { block: more }
"#,
        ),
    ]);
    assert!(matches!(
        err,
        ResolveError::Numbering {
            source: NumberingError::Finalized { ref typ },
            ..
        } if typ == "section"
    ));
}

//! Scope and tag registry
//!
//! Scopes mirror document and block nesting. Every scope has two parents:
//!
//! - the dynamic parent (the scope the block was expanded in), which registrations are
//!   forwarded to
//! - the static parent (the scope the block was defined in), which lookups fall back to
//!
//! Document scopes use the global index for both. Registrations travel from the registering
//! scope up the dynamic chain to the global index. Relative tags of implicitly scoped
//! registrations get the scope name prepended on every step, so a node tagged `fig` inside
//! block expansion `demo-1` is `fig` locally and `demo-1/fig` in the document. Absolute tags
//! are forwarded unchanged and must be unique in the whole tree.
//!
//! All scopes, registered nodes, blocks and values live in arenas inside [`Registry`].

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::mdg::context::ContextId;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::labels::LabelId;
use crate::mdg::link::{self, Link};
use crate::mdg::location::Location;
use crate::mdg::nodes::{BlockDef, NodeKey, NodeSequence};
use crate::mdg::numbering::SlotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeParent {
    Scope(ScopeId),
    Global,
}

/// A registered referencable node.
#[derive(Debug, Clone)]
pub struct Referencable {
    pub id: LabelId,
    pub document: String,
    pub location: Location,
    /// Tags as seen by the global index.
    pub anchors: Vec<String>,
    pub slot: Option<SlotId>,
    pub abbrev: String,
    pub title: Option<String>,
}

impl Referencable {
    pub fn new(id: LabelId, document: &str, location: &Location) -> Self {
        Self {
            id,
            document: document.to_string(),
            location: location.clone(),
            anchors: Vec::new(),
            slot: None,
            abbrev: String::new(),
            title: None,
        }
    }
}

/// A block registered in a scope, with its default values bound in that scope.
#[derive(Debug, Clone)]
pub struct BlockEntry {
    pub definition: Rc<BlockDef>,
    pub scope: ScopeId,
    pub defaults: BTreeMap<String, ValueId>,
}

/// A parameter value: nodes plus the frame they are evaluated in.
#[derive(Debug, Clone)]
pub struct ValueBinding {
    pub body: Rc<NodeSequence>,
    pub frame: ContextId,
}

#[derive(Debug, Clone)]
pub struct TagEntry {
    pub scope: ScopeId,
    pub node: NodeKey,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Node(RefId),
    Document(String),
}

#[derive(Debug, Clone)]
pub struct ResolvedRef {
    pub document: String,
    pub anchor: String,
    pub target: RefTarget,
}

#[derive(Debug)]
pub struct Scope {
    name: String,
    namespace: String,
    document: String,
    parent: ScopeParent,
    static_parent: ScopeParent,
    ids: HashMap<LabelId, RefId>,
    anchors: HashMap<String, RefId>,
    blocks: HashMap<String, BlockId>,
    tags: HashMap<String, HashMap<String, TagEntry>>,
    values: HashMap<String, ValueId>,
    counts: HashMap<String, usize>,
    children: BTreeMap<String, ScopeId>,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn parent(&self) -> ScopeParent {
        self.parent
    }

    pub fn static_parent(&self) -> ScopeParent {
        self.static_parent
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, ScopeId)> {
        self.children.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Local anchor a link refers to, empty if the link points into another document.
    fn anchor<'l>(&self, link: &'l Link) -> &'l str {
        if link.is_tag() || link.path().is_empty() || link.path() == self.document {
            link.anchor()
        } else {
            ""
        }
    }

    /// Tags as forwarded to the dynamic parent.
    fn forward(&self, tags: &[String]) -> Vec<String> {
        let last = tags.len().saturating_sub(1);
        tags.iter()
            .enumerate()
            .map(|(i, t)| {
                if i == last || link::is_abs(t) || self.name.is_empty() {
                    t.clone()
                } else {
                    link::join(&self.name, t)
                }
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct GlobalIndex {
    refindex: HashMap<Link, ResolvedRef>,
    tags: HashMap<String, HashMap<String, TagEntry>>,
    blocks: HashMap<String, BlockId>,
    roots: HashMap<String, RefId>,
    documents: HashMap<String, ScopeId>,
}

#[derive(Debug)]
pub struct Registry {
    root_type: String,
    scopes: Vec<Scope>,
    refs: Vec<Referencable>,
    blocks: Vec<BlockEntry>,
    values: Vec<ValueBinding>,
    global: GlobalIndex,
}

impl Registry {
    /// `root_type` is the label type whose first node becomes a document's root node.
    pub fn new(root_type: &str) -> Self {
        Self {
            root_type: root_type.to_string(),
            scopes: Vec::new(),
            refs: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            global: GlobalIndex::default(),
        }
    }

    pub fn new_scope(
        &mut self,
        name: &str,
        document: &str,
        parent: ScopeParent,
        static_parent: ScopeParent,
    ) -> ScopeId {
        let namespace = match parent {
            ScopeParent::Scope(p) => link::join(&self.scopes[p.0].namespace, name),
            ScopeParent::Global => name.to_string(),
        };
        self.scopes.push(Scope {
            name: name.to_string(),
            namespace,
            document: document.to_string(),
            parent,
            static_parent,
            ids: HashMap::new(),
            anchors: HashMap::new(),
            blocks: HashMap::new(),
            tags: HashMap::new(),
            values: HashMap::new(),
            counts: HashMap::new(),
            children: BTreeMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// Creates the top level scope of a document and makes the document addressable.
    pub fn add_document(&mut self, document: &str) -> ScopeId {
        let scope = self.new_scope("", document, ScopeParent::Global, ScopeParent::Global);
        self.global.documents.insert(document.to_string(), scope);
        self.global.refindex.insert(
            Link::new(document, ""),
            ResolvedRef {
                document: document.to_string(),
                anchor: String::new(),
                target: RefTarget::Document(document.to_string()),
            },
        );
        scope
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn document_scope(&self, document: &str) -> Option<ScopeId> {
        self.global.documents.get(document).copied()
    }

    /// Name for a new child scope: `name-N` when extending, else `name` if still unused.
    pub fn next_sub_scope_name(
        &mut self,
        scope: ScopeId,
        name: &str,
        extend: bool,
    ) -> std::result::Result<String, String> {
        let counts = &mut self.scopes[scope.0].counts;
        let count = counts.entry(name.to_string()).or_insert(0);
        if extend {
            *count += 1;
            return Ok(format!("{}-{}", name, count));
        }
        if *count != 0 {
            return Err(format!("scope name {:?} already used", name));
        }
        *count = 1;
        Ok(name.to_string())
    }

    pub fn add_sub_scope(
        &mut self,
        scope: ScopeId,
        name: &str,
        child: ScopeId,
    ) -> std::result::Result<(), String> {
        let children = &mut self.scopes[scope.0].children;
        if children.contains_key(name) {
            return Err(format!("scope name {:?} already used", name));
        }
        children.insert(name.to_string(), child);
        Ok(())
    }

    pub fn referencable(&self, id: RefId) -> &Referencable {
        &self.refs[id.0]
    }

    pub fn referencable_mut(&mut self, id: RefId) -> &mut Referencable {
        &mut self.refs[id.0]
    }

    /// Referencables of a document in registration order.
    pub fn referencables<'a>(&'a self, document: &'a str) -> impl Iterator<Item = RefId> + 'a {
        self.refs
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.document == document)
            .map(|(i, _)| RefId(i))
    }

    /// Node a bare document link resolves to.
    pub fn root_node(&self, document: &str) -> Option<RefId> {
        self.global.roots.get(document).copied()
    }

    pub fn resolved(&self, link: &Link) -> Option<&ResolvedRef> {
        self.global.refindex.get(link)
    }

    /// Registers a node under the given tags and forwards it up the dynamic chain.
    ///
    /// The last tag is the node's id string. Returns the node handle; the tags as seen by the
    /// global index are stored as its anchors.
    pub fn register_referencable(
        &mut self,
        scope: ScopeId,
        node: Referencable,
        tags: Vec<String>,
        explicit: bool,
    ) -> Result<RefId> {
        self.refs.push(node);
        let rid = RefId(self.refs.len() - 1);
        let mut tags = tags;
        let mut current = ScopeParent::Scope(scope);
        while let ScopeParent::Scope(s) = current {
            self.register_local(s, rid, &tags)?;
            let sc = &self.scopes[s.0];
            if !explicit {
                tags = sc.forward(&tags);
            }
            current = sc.parent;
        }
        self.register_global(rid, &tags)?;
        self.refs[rid.0].anchors = tags;
        Ok(rid)
    }

    fn register_local(&mut self, scope: ScopeId, rid: RefId, tags: &[String]) -> Result<()> {
        let node = &self.refs[rid.0];
        let sc = &self.scopes[scope.0];
        for tag in tags {
            if let Some(other) = sc.anchors.get(tag) {
                return Err(ResolveError::Duplicate {
                    location: node.location.clone(),
                    kind: "anchor",
                    tag: tag.clone(),
                    first: self.refs[other.0].location.clone(),
                });
            }
        }
        if let Some(other) = sc.ids.get(&node.id) {
            return Err(ResolveError::DuplicateId {
                location: node.location.clone(),
                id: node.id.clone(),
                first: self.refs[other.0].location.clone(),
            });
        }
        let id = node.id.clone();
        let sc = &mut self.scopes[scope.0];
        sc.ids.insert(id, rid);
        for tag in tags {
            sc.anchors.insert(tag.clone(), rid);
        }
        Ok(())
    }

    fn register_global(&mut self, rid: RefId, tags: &[String]) -> Result<()> {
        let node = &self.refs[rid.0];
        for tag in tags {
            let key = if link::is_abs(tag) {
                let key = Link::tag(tag.clone());
                if let Some(ResolvedRef {
                    target: RefTarget::Node(other),
                    ..
                }) = self.global.refindex.get(&key)
                {
                    return Err(ResolveError::Duplicate {
                        location: node.location.clone(),
                        kind: "tag",
                        tag: tag.clone(),
                        first: self.refs[other.0].location.clone(),
                    });
                }
                key
            } else {
                Link::new(node.document.clone(), tag.clone())
            };
            self.global.refindex.insert(
                key,
                ResolvedRef {
                    document: node.document.clone(),
                    anchor: tag.clone(),
                    target: RefTarget::Node(rid),
                },
            );
        }
        if node.id.typ() == self.root_type && !self.global.roots.contains_key(&node.document) {
            self.global.roots.insert(node.document.clone(), rid);
        }
        Ok(())
    }

    /// Registers a tag of the given type (e.g. a term), forwarded like referencables.
    pub fn register_tag(
        &mut self,
        scope: ScopeId,
        typ: &str,
        tag: &str,
        entry: TagEntry,
        explicit: bool,
    ) -> Result<()> {
        let mut tag = tag.to_string();
        let mut document = String::new();
        let mut current = ScopeParent::Scope(scope);
        while let ScopeParent::Scope(s) = current {
            let sc = &mut self.scopes[s.0];
            let local = sc.tags.entry(typ.to_string()).or_default();
            if let Some(first) = local.get(&tag) {
                return Err(ResolveError::Duplicate {
                    location: entry.location.clone(),
                    kind: "tag",
                    tag,
                    first: first.location.clone(),
                });
            }
            local.insert(tag.clone(), entry.clone());
            if !explicit && !link::is_abs(&tag) && !sc.name.is_empty() {
                tag = link::join(&sc.name, &tag);
            }
            document = sc.document.clone();
            current = sc.parent;
        }
        let key = if link::is_abs(&tag) {
            tag.clone()
        } else {
            format!("{}#{}", document, tag)
        };
        let global = self.global.tags.entry(typ.to_string()).or_default();
        if let Some(first) = global.get(&key) {
            return Err(ResolveError::Duplicate {
                location: entry.location.clone(),
                kind: "tag",
                tag,
                first: first.location.clone(),
            });
        }
        global.insert(key, entry);
        Ok(())
    }

    /// Registers a block in a scope. Absolute tags are forwarded to the parents as well.
    pub fn register_block(&mut self, scope: ScopeId, anchor: &str, entry: BlockEntry) -> Result<BlockId> {
        let location = entry.definition.location.clone();
        self.blocks.push(entry);
        let bid = BlockId(self.blocks.len() - 1);
        let mut current = ScopeParent::Scope(scope);
        while let ScopeParent::Scope(s) = current {
            if let Some(other) = self.scopes[s.0].blocks.get(anchor) {
                return Err(self.duplicate_block(anchor, &location, *other));
            }
            self.scopes[s.0].blocks.insert(anchor.to_string(), bid);
            if !link::is_abs(anchor) {
                return Ok(bid);
            }
            current = self.scopes[s.0].parent;
        }
        if let Some(other) = self.global.blocks.get(anchor) {
            return Err(self.duplicate_block(anchor, &location, *other));
        }
        self.global.blocks.insert(anchor.to_string(), bid);
        Ok(bid)
    }

    fn duplicate_block(&self, anchor: &str, location: &Location, other: BlockId) -> ResolveError {
        ResolveError::Duplicate {
            location: location.clone(),
            kind: "block",
            tag: anchor.to_string(),
            first: self.blocks[other.0].definition.location.clone(),
        }
    }

    pub fn block(&self, id: BlockId) -> &BlockEntry {
        &self.blocks[id.0]
    }

    pub fn add_value(&mut self, binding: ValueBinding) -> ValueId {
        self.values.push(binding);
        ValueId(self.values.len() - 1)
    }

    pub fn set_value(&mut self, scope: ScopeId, name: &str, value: ValueId) {
        self.scopes[scope.0].values.insert(name.to_string(), value);
    }

    pub fn value(&self, id: ValueId) -> &ValueBinding {
        &self.values[id.0]
    }

    /// Walks the static chain of `scope`, returning the first hit of `f`.
    fn find_static<'a, T>(
        &'a self,
        scope: ScopeId,
        mut f: impl FnMut(&'a Scope) -> Option<T>,
    ) -> Option<T> {
        let mut current = ScopeParent::Scope(scope);
        while let ScopeParent::Scope(s) = current {
            let sc = &self.scopes[s.0];
            if let Some(found) = f(sc) {
                return Some(found);
            }
            current = sc.static_parent;
        }
        None
    }

    pub fn lookup_referencable(&self, scope: ScopeId, link: &Link) -> Option<RefTarget> {
        self.find_static(scope, |sc| {
            let anchor = sc.anchor(link);
            if anchor.is_empty() {
                None
            } else {
                sc.anchors.get(anchor).map(|r| RefTarget::Node(*r))
            }
        })
        .or_else(|| self.global.refindex.get(link).map(|r| r.target.clone()))
    }

    pub fn lookup_block(&self, scope: ScopeId, link: &Link) -> Option<BlockId> {
        self.find_static(scope, |sc| {
            let anchor = sc.anchor(link);
            if anchor.is_empty() {
                None
            } else {
                sc.blocks.get(anchor).copied()
            }
        })
        .or_else(|| {
            if link.is_tag() {
                self.global.blocks.get(link.anchor()).copied()
            } else {
                let scope = self.global.documents.get(link.path())?;
                self.scopes[scope.0].blocks.get(link.anchor()).copied()
            }
        })
    }

    pub fn lookup_tag(&self, scope: ScopeId, typ: &str, tag: &str) -> Option<&TagEntry> {
        self.find_static(scope, |sc| sc.tags.get(typ).and_then(|m| m.get(tag)))
            .or_else(|| self.global.tags.get(typ).and_then(|m| m.get(tag)))
    }

    pub fn lookup_value(&self, scope: ScopeId, name: &str) -> Option<ValueId> {
        self.find_static(scope, |sc| sc.values.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize) -> Location {
        Location::new("doc", line, 1)
    }

    fn node(n: usize, line: usize) -> Referencable {
        Referencable::new(LabelId::new("section", n), "/doc", &loc(line))
    }

    fn tags(tag: &str, n: usize) -> Vec<String> {
        vec![tag.to_string(), format!("section-{}", n)]
    }

    #[test]
    fn test_implicit_tags_are_prefixed_while_forwarded() {
        let mut r = Registry::new("section");
        let doc = r.add_document("/doc");
        let block = r.new_scope("demo-1", "/doc", ScopeParent::Scope(doc), ScopeParent::Scope(doc));
        let rid = r.register_referencable(block, node(1, 3), tags("fig", 1), false).unwrap();

        assert_eq!(r.referencable(rid).anchors, ["demo-1/fig", "section-1"]);
        assert_eq!(
            r.lookup_referencable(block, &Link::new("", "fig")),
            Some(RefTarget::Node(rid))
        );
        assert_eq!(
            r.lookup_referencable(doc, &Link::new("", "demo-1/fig")),
            Some(RefTarget::Node(rid))
        );
        assert_eq!(r.lookup_referencable(doc, &Link::new("", "fig")), None);
        assert_eq!(
            r.resolved(&Link::new("/doc", "demo-1/fig")).map(|r| r.target.clone()),
            Some(RefTarget::Node(rid))
        );
        assert_eq!(r.scope(block).namespace(), "demo-1");
    }

    #[test]
    fn test_explicit_tags_are_kept() {
        let mut r = Registry::new("section");
        let doc = r.add_document("/doc");
        let block = r.new_scope("demo-1", "/doc", ScopeParent::Scope(doc), ScopeParent::Scope(doc));
        let rid = r.register_referencable(block, node(1, 3), tags("fig", 1), true).unwrap();
        assert_eq!(r.referencable(rid).anchors, ["fig", "section-1"]);
    }

    #[test]
    fn test_absolute_tags_are_global() {
        let mut r = Registry::new("section");
        let a = r.add_document("/a");
        let b = r.add_document("/b");
        let block = r.new_scope("demo-1", "/a", ScopeParent::Scope(a), ScopeParent::Scope(a));
        let rid = r
            .register_referencable(block, node(1, 2), tags("/fig", 1), false)
            .unwrap();
        assert_eq!(
            r.lookup_referencable(b, &Link::tag("/fig")),
            Some(RefTarget::Node(rid))
        );

        let other = Referencable::new(LabelId::new("section", 1), "/b", &loc(9));
        let err = r
            .register_referencable(b, other, tags("/fig", 1), true)
            .unwrap_err();
        match err {
            ResolveError::Duplicate { kind, first, .. } => {
                assert_eq!(kind, "tag");
                assert_eq!(first, loc(2));
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_duplicate_local_anchor() {
        let mut r = Registry::new("section");
        let doc = r.add_document("/doc");
        r.register_referencable(doc, node(1, 1), tags("intro", 1), true)
            .unwrap();
        assert!(matches!(
            r.register_referencable(doc, node(2, 5), tags("intro", 2), true),
            Err(ResolveError::Duplicate { kind: "anchor", .. })
        ));
    }

    #[test]
    fn test_document_root_node() {
        let mut r = Registry::new("section");
        let doc = r.add_document("/doc");
        let first = r.register_referencable(doc, node(1, 1), tags("a", 1), true).unwrap();
        r.register_referencable(doc, node(2, 2), tags("b", 2), true).unwrap();
        assert_eq!(r.root_node("/doc"), Some(first));
        assert_eq!(
            r.lookup_referencable(doc, &Link::new("/doc", "")),
            Some(RefTarget::Document("/doc".into()))
        );
    }

    #[test]
    fn test_lookups_follow_static_chain() {
        let mut r = Registry::new("section");
        let a = r.add_document("/a");
        let b = r.add_document("/b");
        let value = r.add_value(ValueBinding {
            body: Rc::new(NodeSequence::default()),
            frame: ContextId::new(0),
        });
        r.set_value(b, "color", value);
        // expanded in /a, defined in /b
        let block = r.new_scope("demo-1", "/a", ScopeParent::Scope(a), ScopeParent::Scope(b));
        assert_eq!(r.lookup_value(block, "color"), Some(value));
        assert_eq!(r.lookup_value(a, "color"), None);
    }

    #[test]
    fn test_sub_scope_names() {
        let mut r = Registry::new("section");
        let doc = r.add_document("/doc");
        assert_eq!(r.next_sub_scope_name(doc, "demo", true).unwrap(), "demo-1");
        assert_eq!(r.next_sub_scope_name(doc, "demo", true).unwrap(), "demo-2");
        assert_eq!(r.next_sub_scope_name(doc, "mine", false).unwrap(), "mine");
        assert!(r.next_sub_scope_name(doc, "mine", false).is_err());
    }

    #[test]
    fn test_tags_forward_to_document_qualified_global() {
        let mut r = Registry::new("section");
        let a = r.add_document("/a");
        let b = r.add_document("/b");
        let entry = TagEntry {
            scope: a,
            node: NodeKey::of(&1u8),
            location: loc(4),
        };
        r.register_tag(a, "term", "api", entry.clone(), true).unwrap();
        assert!(r.lookup_tag(a, "term", "api").is_some());
        assert!(r.lookup_tag(b, "term", "api").is_none());
        assert!(r.lookup_tag(b, "term", "/a#api").is_some());
        assert!(r.register_tag(a, "term", "api", entry, true).is_err());
    }
}

//! Document tree resolver
//!
//! A [`Tree`] holds the parsed documents of one compiler run. [`Tree::resolve`] runs the
//! resolution pipeline and returns the [`Resolution`] aggregate owning all run state:
//!
//! 1. registration: scopes, blocks, ids, tags, requested number ranges and documents
//! 2. structure: structural embeddings, root documents and document order
//! 3. number ranges: per root range construction, label resolution and label creation
//! 4. values: titles and terms, iterated until no further progress is made
//!
//! Any error aborts the run. Emission of the final documents is left to the caller, which
//! can query labels, titles and links from the resolution.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::mdg::context::{ContextId, Frame, FrameKind, ResolutionContext};
use crate::mdg::document::Document;
use crate::mdg::error::{ResolveError, Result, Unresolved};
use crate::mdg::link::{self, Link};
use crate::mdg::location::Location;
use crate::mdg::nodes::NodeKey;
use crate::mdg::numbering::{Numbering, RangeId};
use crate::mdg::options::Options;
use crate::mdg::scope::{Registry, ScopeId};

mod ranges;
mod report;
mod structure;
mod values;

pub use report::LabelEntry;

/// Structural embedding requested by a section reference.
#[derive(Debug, Clone)]
pub(crate) struct DocumentRequest {
    pub(crate) link: Link,
    pub(crate) location: Location,
    pub(crate) target: Option<String>,
}

#[derive(Debug)]
pub(crate) struct DocumentInfo {
    pub(crate) document: Rc<Document>,
    pub(crate) scope: ScopeId,
    pub(crate) frame: ContextId,
    /// Number range types in request order.
    pub(crate) ranges: Vec<String>,
    pub(crate) requests: Vec<DocumentRequest>,
    pub(crate) embedded_by: Option<(String, Location)>,
    /// Ranges handed over by the embedding document.
    pub(crate) struct_ranges: HashMap<String, RangeId>,
    pub(crate) root: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RangeEntry {
    pub(crate) typ: String,
    pub(crate) range: RangeId,
    pub(crate) master: Option<String>,
    pub(crate) location: Location,
}

/// Number ranges shared by a root document and all documents embedded into it.
#[derive(Debug, Default)]
pub(crate) struct RootInfo {
    pub(crate) ranges: Vec<RangeEntry>,
}

impl RootInfo {
    pub(crate) fn range(&self, typ: &str) -> Option<&RangeEntry> {
        self.ranges.iter().find(|r| r.typ == typ)
    }
}

/// Set of documents resolved together.
#[derive(Debug, Default)]
pub struct Tree {
    documents: BTreeMap<String, Rc<Document>>,
    options: Options,
}

impl Tree {
    pub fn new(options: Options) -> Self {
        Self {
            documents: BTreeMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn add_document(&mut self, document: Document) -> Result<()> {
        if !link::is_abs(&document.refpath) {
            return Err(ResolveError::Source {
                location: Location::document(&document.refpath),
                message: "document reference path must be absolute".to_string(),
            });
        }
        if self.documents.contains_key(&document.refpath) {
            return Err(ResolveError::DuplicateDocument {
                refpath: document.refpath,
            });
        }
        tracing::debug!(document = %document.refpath, "added document");
        self.documents
            .insert(document.refpath.clone(), Rc::new(document));
        Ok(())
    }

    /// Parses and adds a YAML document description. Relative paths are taken from the root.
    pub fn add_yaml(&mut self, refpath: &str, source: &str) -> Result<()> {
        let refpath = link::clean(&link::join("/", refpath));
        let document = Document::from_yaml(&refpath, source)?;
        self.add_document(document)
    }

    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(|k| k.as_str())
    }

    pub fn resolve(&self) -> Result<Resolution> {
        let mut res = Resolution::new(self.options.clone());
        tracing::info!(documents = self.documents.len(), "resolve blocks");
        res.setup(&self.documents)?;
        res.register()?;
        tracing::info!("resolve structure");
        res.resolve_structure()?;
        res.resolve_document_order()?;
        tracing::info!("resolve number ranges");
        res.resolve_number_ranges()?;
        tracing::info!("resolve values");
        res.resolve_values()?;
        Ok(res)
    }
}

/// Run state of one resolution.
pub struct Resolution {
    pub(crate) options: Options,
    pub(crate) documents: BTreeMap<String, DocumentInfo>,
    pub(crate) roots: BTreeMap<String, RootInfo>,
    pub(crate) registry: Registry,
    pub(crate) numbering: Numbering,
    pub(crate) frames: Vec<Frame>,
    pub(crate) states: HashMap<(ScopeId, NodeKey), Box<dyn Any>>,
    pub(crate) unresolved: Vec<Unresolved>,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("documents", &self.documents.keys().collect::<Vec<_>>())
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .field("frames", &self.frames.len())
            .field("unresolved", &self.unresolved.len())
            .finish()
    }
}

impl Resolution {
    fn new(options: Options) -> Self {
        let registry = Registry::new(&options.section_type);
        Self {
            options,
            documents: BTreeMap::new(),
            roots: BTreeMap::new(),
            registry,
            numbering: Numbering::new(),
            frames: Vec::new(),
            states: HashMap::new(),
            unresolved: Vec::new(),
        }
    }

    /// Creates the document scopes and frames and registers the block inventories.
    fn setup(&mut self, documents: &BTreeMap<String, Rc<Document>>) -> Result<()> {
        for (refpath, document) in documents {
            let scope = self.registry.add_document(refpath);
            let frame = self.push_frame(Frame {
                parent: None,
                document: refpath.clone(),
                scope,
                kind: FrameKind::Document {
                    ids: BTreeMap::new(),
                },
            });
            self.documents.insert(
                refpath.clone(),
                DocumentInfo {
                    document: Rc::clone(document),
                    scope,
                    frame,
                    ranges: Vec::new(),
                    requests: Vec::new(),
                    embedded_by: None,
                    struct_ranges: HashMap::new(),
                    root: None,
                },
            );
        }
        for (refpath, document) in documents {
            let (scope, frame) = match self.documents.get(refpath) {
                Some(info) => (info.scope, info.frame),
                None => continue,
            };
            self.register_blocks(scope, frame, &document.blocks)?;
        }
        Ok(())
    }

    fn register(&mut self) -> Result<()> {
        let walks: Vec<(String, ContextId, Rc<Document>)> = self
            .documents
            .iter()
            .map(|(p, i)| (p.clone(), i.frame, Rc::clone(&i.document)))
            .collect();
        for (refpath, frame, document) in walks {
            tracing::debug!(document = %refpath, "register");
            let mut ctx = ResolutionContext::new(self, frame);
            for typ in document.rules.types() {
                ctx.request_number_range(typ);
            }
            document.nodes.register(&mut ctx)?;
        }
        Ok(())
    }

    fn info(&self, document: &str) -> Option<&DocumentInfo> {
        self.documents.get(document)
    }

    /// Number range used for `typ` by the top level of `document`.
    pub(crate) fn document_range(&self, document: &str, typ: &str) -> Option<RangeId> {
        let info = self.info(document)?;
        if let Some(range) = info.struct_ranges.get(typ) {
            return Some(*range);
        }
        let root = info.root.as_ref()?;
        self.roots.get(root)?.range(typ).map(|r| r.range)
    }

    /// Document addressed by a link.
    pub(crate) fn document_for_link(&self, link: &Link) -> Option<String> {
        let resolved = self.registry.resolved(link)?;
        self.documents
            .contains_key(&resolved.document)
            .then(|| resolved.document.clone())
    }

    /// Relative path plus anchor of a link target as seen from document `from`.
    pub fn determine_link(&self, from: &str, link: &Link) -> std::result::Result<String, String> {
        let link = link.abs(from, true)?;
        let resolved = self
            .registry
            .resolved(&link)
            .ok_or_else(|| format!("cannot resolve link {}", link))?;
        let mut target = String::new();
        if resolved.document != from {
            target = link::relative(
                &link::dir(from),
                &format!("{}{}", resolved.document, self.options.link_suffix),
            );
        }
        if !resolved.anchor.is_empty() {
            target.push('#');
            target.push_str(&resolved.anchor);
        }
        Ok(target)
    }

    /// Root documents in path order.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(|k| k.as_str())
    }

    /// Document structurally embedding `document`.
    pub fn embedded_by(&self, document: &str) -> Option<&str> {
        self.info(document)?
            .embedded_by
            .as_ref()
            .map(|(d, _)| d.as_str())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn numbering(&self) -> &Numbering {
        &self.numbering
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Renders the nodes of a document with all resolved labels, titles and links.
    pub fn render(&mut self, document: &str) -> Result<String> {
        let info = self
            .info(document)
            .ok_or_else(|| ResolveError::UnresolvedLink {
                location: Location::document(document),
                link: document.to_string(),
            })?;
        let (frame, nodes) = (info.frame, Rc::clone(&info.document.nodes));
        let mut out = String::new();
        nodes.emit(&mut ResolutionContext::new(self, frame), &mut out)?;
        Ok(out)
    }
}

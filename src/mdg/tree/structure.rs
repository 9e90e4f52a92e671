use crate::mdg::error::{ResolveError, Result};
use crate::mdg::history::History;
use crate::mdg::location::Location;

use super::{Resolution, RootInfo};

impl Resolution {
    /// Resolves the targets of all structural requests. Tag links address the document
    /// owning the tagged node.
    ///
    /// A document may be embedded only once and then has at most one top level section.
    pub(super) fn resolve_structure(&mut self) -> Result<()> {
        let sources: Vec<String> = self.documents.keys().cloned().collect();
        for source in sources {
            let requests = match self.documents.get(&source) {
                Some(info) => info.requests.clone(),
                None => continue,
            };
            for (index, request) in requests.iter().enumerate() {
                let target = if request.link.is_tag() {
                    self.registry
                        .resolved(&request.link)
                        .map(|r| r.document.clone())
                        .unwrap_or_default()
                } else {
                    request.link.path().to_string()
                };
                let Some(info) = self.documents.get_mut(&target) else {
                    return Err(ResolveError::UnresolvedLink {
                        location: request.location.clone(),
                        link: request.link.to_string(),
                    });
                };
                if let Some((_, first)) = &info.embedded_by {
                    return Err(ResolveError::DuplicateEmbedding {
                        location: request.location.clone(),
                        document: target,
                        first: first.clone(),
                    });
                }
                let count = info.document.top_level_sections();
                if count > 1 {
                    return Err(ResolveError::TopLevelSections {
                        location: request.location.clone(),
                        document: target,
                        count,
                    });
                }
                tracing::debug!(document = %target, by = %source, "found structural usage");
                info.embedded_by = Some((source.clone(), request.location.clone()));
                if let Some(info) = self.documents.get_mut(&source) {
                    info.requests[index].target = Some(target);
                }
            }
        }
        Ok(())
    }

    /// Assigns every document to the root of its embedding chain.
    pub(super) fn resolve_document_order(&mut self) -> Result<()> {
        let documents: Vec<String> = self.documents.keys().cloned().collect();
        for document in documents {
            self.document_order(&document, &History::new())?;
        }
        Ok(())
    }

    fn document_order(&mut self, document: &str, history: &History) -> Result<String> {
        let Some(info) = self.documents.get(document) else {
            return Ok(document.to_string());
        };
        if let Some(root) = &info.root {
            return Ok(root.clone());
        }
        let embedded_by = info.embedded_by.clone();
        let history = history.add(document).map_err(|cycle| {
            let location = embedded_by
                .as_ref()
                .map(|(_, l)| l.clone())
                .unwrap_or_else(|| Location::document(document));
            ResolveError::StructuralCycle { location, cycle }
        })?;

        let root = match embedded_by {
            Some((parent, _)) => {
                let root = self.document_order(&parent, &history)?;
                tracing::debug!(document = %document, root = %root, "sub structure");
                root
            }
            None => {
                tracing::debug!(document = %document, "root document");
                self.roots.insert(document.to_string(), RootInfo::default());
                document.to_string()
            }
        };
        if let Some(info) = self.documents.get_mut(document) {
            info.root = Some(root.clone());
        }
        Ok(root)
    }
}

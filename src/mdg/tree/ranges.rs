//! Number range construction and label creation
//!
//! Ranges are owned by root documents. Walking a root, every requested type without a range
//! gets one, configured by the declaration of the document requesting it first, by the
//! configured default rule, or as plain numbered range. Embedded documents reuse the ranges
//! of their root and are walked after the document embedding them, in request order.
//!
//! Once all nodes claimed their slots, labels are created per root, masters before their
//! dependents.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};
use crate::mdg::history::History;
use crate::mdg::labels::LabelRule;
use crate::mdg::location::Location;
use crate::mdg::numbering::{Numbering, PrefixProvider};

use super::{RangeEntry, Resolution};

impl Resolution {
    pub(super) fn resolve_number_ranges(&mut self) -> Result<()> {
        let roots: Vec<String> = self.roots.keys().cloned().collect();
        for root in &roots {
            self.resolve_document_ranges(root)?;
        }
        for root in &roots {
            let entries = match self.roots.get(root) {
                Some(info) => info.ranges.clone(),
                None => continue,
            };
            let mut resolved = HashSet::new();
            for entry in &entries {
                self.create_labels(root, &entries, entry, &History::new(), &mut resolved)?;
            }
        }
        Ok(())
    }

    fn resolve_document_ranges(&mut self, document: &str) -> Result<()> {
        let (root, requested, rules, frame, nodes, requests) = {
            let Some(info) = self.documents.get(document) else {
                return Ok(());
            };
            (
                info.root.clone().unwrap_or_else(|| document.to_string()),
                info.ranges.clone(),
                info.document.rules.clone(),
                info.frame,
                Rc::clone(&info.document.nodes),
                info.requests.clone(),
            )
        };
        tracing::debug!(document = %document, ranges = ?requested, "found number ranges");

        for typ in &requested {
            let declared = rules.get(typ);
            let existing = self.roots.get(&root).and_then(|r| r.range(typ)).is_some();
            if existing {
                if let Some(info) = declared {
                    if root != document && (info.rule.is_some() || info.master.is_some()) {
                        return Err(ResolveError::EmbeddedRangeConfig {
                            location: info.location.clone(),
                            typ: typ.clone(),
                        });
                    }
                }
                tracing::debug!(document = %document, typ = %typ, "reusing number range");
                continue;
            }

            let location = declared
                .map(|i| i.location.clone())
                .unwrap_or_else(|| Location::document(document));
            let level = declared.and_then(|i| i.level).unwrap_or(0);
            let (mut separator, mut rule) = match declared {
                Some(info) => (info.separator.clone(), info.rule.clone()),
                None => (String::new(), None),
            };
            if rule.is_none() {
                let default = self
                    .options
                    .default_rule(typ, Some(level))
                    .map_err(|message| ResolveError::Declaration {
                        location: location.clone(),
                        message,
                    })?;
                if let Some((sep, r)) = default {
                    if separator.is_empty() {
                        separator = sep;
                    }
                    rule = r;
                }
            }
            let rule = match rule {
                Some(rule) if rule.level().is_none() => rule.with_level(Some(level)),
                Some(rule) => rule,
                None => LabelRule::numbered(typ, Some(level)),
            };

            let master = declared.and_then(|i| i.master.clone());
            let provider = master
                .as_ref()
                .map(|m| master_provider(m.clone(), declared.and_then(|i| i.limit)));
            let abbrev = declared.map(|i| i.abbrev.as_str()).unwrap_or_default();
            let range = self.numbering.new_range(typ, abbrev, provider);
            self.numbering.set_rule(range, &separator, Some(rule));
            tracing::debug!(
                document = %document,
                typ = %typ,
                master = ?master,
                "created number range"
            );
            if let Some(info) = self.roots.get_mut(&root) {
                info.ranges.push(RangeEntry {
                    typ: typ.clone(),
                    range,
                    master,
                    location,
                });
            }
        }

        if let Some(info) = self.roots.get(&root) {
            for entry in &info.ranges {
                check_master_cycle(&info.ranges, entry, &History::new())?;
            }
        }

        let active: HashMap<String, _> = self
            .roots
            .get(&root)
            .map(|r| r.ranges.iter().map(|e| e.typ.clone()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|typ| {
                let range = self.document_range(document, &typ)?;
                Some((typ, range))
            })
            .collect();
        self.numbering.set_active(active);

        tracing::debug!(document = %document, "resolve labels");
        nodes.resolve_labels(&mut ResolutionContext::new(self, frame))?;

        for request in &requests {
            if let Some(target) = &request.target {
                self.resolve_document_ranges(target)?;
            }
        }
        Ok(())
    }

    fn create_labels(
        &mut self,
        root: &str,
        entries: &[RangeEntry],
        entry: &RangeEntry,
        history: &History,
        resolved: &mut HashSet<String>,
    ) -> Result<()> {
        if !resolved.insert(entry.typ.clone()) {
            return Ok(());
        }
        let history = history
            .add(&entry.typ)
            .map_err(|cycle| ResolveError::MasterCycle {
                location: entry.location.clone(),
                cycle,
            })?;
        if let Some(master) = &entry.master {
            let master = master_entry(entries, entry, master)?;
            self.create_labels(root, entries, master, &history, resolved)?;
        }
        tracing::debug!(document = %root, typ = %entry.typ, "generate labels");
        self.numbering
            .create_labels(entry.range, None)
            .map_err(|e| ResolveError::numbering(&entry.location, e))
    }
}

fn master_entry<'a>(
    entries: &'a [RangeEntry],
    entry: &RangeEntry,
    master: &str,
) -> Result<&'a RangeEntry> {
    entries
        .iter()
        .find(|e| e.typ == master)
        .ok_or_else(|| ResolveError::UnknownMaster {
            location: entry.location.clone(),
            typ: entry.typ.clone(),
            master: master.to_string(),
        })
}

fn check_master_cycle(entries: &[RangeEntry], entry: &RangeEntry, history: &History) -> Result<()> {
    let history = history
        .add(&entry.typ)
        .map_err(|cycle| ResolveError::MasterCycle {
            location: entry.location.clone(),
            cycle,
        })?;
    match &entry.master {
        Some(master) => check_master_cycle(entries, master_entry(entries, entry, master)?, &history),
        None => Ok(()),
    }
}

/// Prefix provider following the deepest current slot of the active master range, truncated
/// to `limit`.
fn master_provider(master: String, limit: Option<usize>) -> PrefixProvider {
    Rc::new(move |n: &Numbering| {
        let range = n.active(&master)?;
        let mut slot = n.actual(range)?;
        if let Some(limit) = limit {
            while n.slot(slot).level() > limit {
                slot = n.slot(slot).parent()?;
            }
        }
        Some(slot)
    })
}

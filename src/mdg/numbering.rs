//! Number ranges and hierarchy labels
//!
//! Labels are assigned in two phases.
//!
//! Shape discovery: while nodes are walked, they call [`Numbering::next`] to claim a new slot
//! in a range and [`Numbering::sub`] to open the child range below the current slot. Every
//! claimed slot is a [`HierarchyLabel`]. If the range is slaved to a master range, its prefix
//! provider is asked for the master's slot at that moment and the answer is stored with the
//! new slot.
//!
//! Label creation: [`Numbering::create_labels`] walks the discovered shape in creation order
//! and binds concrete label rules to the slots. A change of the stored master slot restarts
//! the counter, so a range slaved to a section range counts "2-a", "2-b", "3-a", ...
//!
//! Ranges and slots live in one arena owned by [`Numbering`] and are addressed by
//! [`RangeId`] and [`SlotId`].

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::mdg::error::NumberingError;
use crate::mdg::labels::{Label, LabelId, LabelRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

/// Yields the master slot a new slot is prefixed with.
pub type PrefixProvider = Rc<dyn Fn(&Numbering) -> Option<SlotId>>;

/// One claimed slot in a range.
#[derive(Debug, Clone)]
pub struct HierarchyLabel {
    range: RangeId,
    id_rule: LabelRule,
    level: usize,
    parent: Option<SlotId>,
    prefix: Option<SlotId>,
    nested: Option<RangeId>,
    next: Option<SlotId>,
    pinned: Option<usize>,
    label: Option<Label>,
}

impl HierarchyLabel {
    pub fn id(&self) -> LabelId {
        self.id_rule.id()
    }

    pub fn typ(&self) -> &str {
        self.id_rule.typ()
    }

    pub fn range(&self) -> RangeId {
        self.range
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn parent(&self) -> Option<SlotId> {
        self.parent
    }

    pub fn prefix(&self) -> Option<SlotId> {
        self.prefix
    }

    pub fn nested(&self) -> Option<RangeId> {
        self.nested
    }

    pub fn next(&self) -> Option<SlotId> {
        self.next
    }

    /// Unset until label creation has run for the owning range.
    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }
}

struct NumberRange {
    typ: String,
    abbrev: String,
    level: usize,
    id_rule: LabelRule,
    parent: Option<SlotId>,
    first: Option<SlotId>,
    current: Option<SlotId>,
    prefix: Option<SlotId>,
    provider: Option<PrefixProvider>,
    separator: String,
    rule: Option<LabelRule>,
    weight: Option<usize>,
    sub_created: bool,
    assignable: bool,
    finalized: bool,
}

impl fmt::Debug for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumberRange")
            .field("typ", &self.typ)
            .field("level", &self.level)
            .field("first", &self.first)
            .field("current", &self.current)
            .field("master", &self.provider.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Numbering {
    ranges: Vec<NumberRange>,
    slots: Vec<HierarchyLabel>,
    active: HashMap<String, RangeId>,
}

impl Numbering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root range for `typ`.
    pub fn new_range(
        &mut self,
        typ: &str,
        abbrev: &str,
        provider: Option<PrefixProvider>,
    ) -> RangeId {
        self.push_range(NumberRange {
            typ: typ.to_string(),
            abbrev: abbrev.to_string(),
            level: 0,
            id_rule: LabelRule::void(typ, Some(1)),
            parent: None,
            first: None,
            current: None,
            prefix: None,
            provider,
            separator: String::new(),
            rule: None,
            weight: None,
            sub_created: false,
            assignable: false,
            finalized: false,
        })
    }

    fn push_range(&mut self, range: NumberRange) -> RangeId {
        self.ranges.push(range);
        RangeId(self.ranges.len() - 1)
    }

    pub fn typ(&self, range: RangeId) -> &str {
        &self.ranges[range.0].typ
    }

    pub fn abbrev(&self, range: RangeId) -> &str {
        &self.ranges[range.0].abbrev
    }

    pub fn level(&self, range: RangeId) -> usize {
        self.ranges[range.0].level
    }

    pub fn separator(&self, range: RangeId) -> &str {
        &self.ranges[range.0].separator
    }

    pub fn rule(&self, range: RangeId) -> Option<&LabelRule> {
        self.ranges[range.0].rule.as_ref()
    }

    /// Configures the own rule and the separator used for composition and prefixing.
    pub fn set_rule(&mut self, range: RangeId, separator: &str, rule: Option<LabelRule>) {
        let r = &mut self.ranges[range.0];
        r.separator = separator.to_string();
        r.rule = rule;
    }

    /// Explicit display level for all labels of the range.
    pub fn set_weight(&mut self, range: RangeId, weight: Option<usize>) {
        self.ranges[range.0].weight = weight;
    }

    pub fn slot(&self, slot: SlotId) -> &HierarchyLabel {
        &self.slots[slot.0]
    }

    pub fn first(&self, range: RangeId) -> Option<SlotId> {
        self.ranges[range.0].first
    }

    /// Latest slot of this range level.
    pub fn current(&self, range: RangeId) -> Option<SlotId> {
        self.ranges[range.0].current
    }

    /// Latest slot of the range, descending into the nested ranges of current slots.
    pub fn actual(&self, range: RangeId) -> Option<SlotId> {
        let mut slot = self.current(range)?;
        while let Some(nested) = self.slots[slot.0].nested {
            match self.current(nested) {
                Some(s) => slot = s,
                None => break,
            }
        }
        Some(slot)
    }

    /// Iterates the slots of one range level in creation order.
    pub fn slots(&self, range: RangeId) -> impl Iterator<Item = SlotId> + '_ {
        std::iter::successors(self.first(range), move |s| self.slots[s.0].next)
    }

    /// Claims the next slot.
    ///
    /// A range created by [`Numbering::assignable_next`] hands out its preassigned slot once
    /// and is finalized afterwards.
    pub fn next(&mut self, range: RangeId) -> Result<SlotId, NumberingError> {
        let r = &mut self.ranges[range.0];
        if r.finalized {
            return Err(NumberingError::Finalized { typ: r.typ.clone() });
        }
        r.sub_created = false;
        if r.assignable {
            if let Some(current) = r.current {
                r.finalized = true;
                return Ok(current);
            }
        }
        Ok(self.claim(range, None))
    }

    fn claim(&mut self, range: RangeId, pinned: Option<usize>) -> SlotId {
        let provider = self.ranges[range.0].provider.clone();
        if let Some(provider) = provider {
            let prefix = provider(self);
            self.ranges[range.0].prefix = prefix;
        }
        let id = SlotId(self.slots.len());
        let r = &mut self.ranges[range.0];
        r.id_rule = r.id_rule.next();
        let slot = HierarchyLabel {
            range,
            id_rule: r.id_rule.clone(),
            level: r.level,
            parent: r.parent,
            prefix: r.prefix,
            nested: None,
            next: None,
            pinned,
            label: None,
        };
        let previous = r.current.replace(id);
        if previous.is_none() {
            r.first = Some(id);
        }
        let parent = r.parent;
        self.slots.push(slot);
        match previous {
            Some(p) => self.slots[p.0].next = Some(id),
            None => {
                if let Some(parent) = parent {
                    self.slots[parent.0].nested = Some(range);
                }
            }
        }
        id
    }

    /// Opens the child range below the current slot. Allowed once per slot.
    pub fn sub(&mut self, range: RangeId) -> Result<RangeId, NumberingError> {
        let r = &mut self.ranges[range.0];
        let current = r.current.ok_or_else(|| NumberingError::NoCurrentSlot {
            typ: r.typ.clone(),
        })?;
        if r.sub_created {
            return Err(NumberingError::SubRangeExists {
                id: self.slots[current.0].id(),
            });
        }
        r.sub_created = true;
        let sub = NumberRange {
            typ: r.typ.clone(),
            abbrev: r.abbrev.clone(),
            level: r.level + 1,
            id_rule: self.slots[current.0].id_rule.sub(),
            parent: Some(current),
            first: None,
            current: None,
            prefix: r.prefix,
            provider: None,
            separator: r.separator.clone(),
            rule: None,
            weight: None,
            sub_created: false,
            assignable: false,
            finalized: false,
        };
        Ok(self.push_range(sub))
    }

    /// Claims a slot in `range` and returns a new range that hands out exactly this slot.
    ///
    /// Used to append the top level of an embedded document to the sequence of the embedding
    /// one. `level` pins the display level of the slot's label.
    pub fn assignable_next(&mut self, range: RangeId, level: Option<usize>) -> RangeId {
        let slot = self.claim(range, level);
        let r = &self.ranges[range.0];
        let assigned = NumberRange {
            typ: r.typ.clone(),
            abbrev: r.abbrev.clone(),
            level: r.level,
            id_rule: self.slots[slot.0].id_rule.clone(),
            parent: r.parent,
            first: None,
            current: Some(slot),
            prefix: r.prefix,
            provider: None,
            separator: r.separator.clone(),
            rule: None,
            weight: level,
            sub_created: false,
            assignable: true,
            finalized: false,
        };
        self.push_range(assigned)
    }

    /// Binds labels to all slots of the range and its nested ranges.
    ///
    /// The own rule, if configured, is composed with the parent level of the incoming rule.
    /// Without an own rule the incoming one is used as is.
    pub fn create_labels(
        &mut self,
        range: RangeId,
        incoming: Option<LabelRule>,
    ) -> Result<(), NumberingError> {
        let r = &self.ranges[range.0];
        let mut rule = match (&r.rule, incoming) {
            (Some(own), Some(incoming)) => match incoming.parent() {
                Some(parent) => LabelRule::compose(parent, &r.separator, own.clone()),
                None => own.clone(),
            },
            (Some(own), None) => own.clone(),
            (None, Some(incoming)) => incoming,
            (None, None) => {
                return Err(NumberingError::MissingRule {
                    typ: r.typ.clone(),
                })
            }
        };
        if r.weight.is_some() {
            rule = rule.with_level(r.weight);
        }
        let separator = r.separator.clone();

        let mut previous: Option<SlotId> = None;
        let mut cursor = r.first;
        while let Some(id) = cursor {
            let slot = &self.slots[id.0];
            if slot.prefix != previous {
                rule = rule.reset();
            }
            previous = slot.prefix;
            rule = rule.next();
            let bound = rule.with_level(slot.pinned);
            let label = match slot.prefix {
                Some(prefix) => Label::Prefixed {
                    prefix,
                    separator: separator.clone(),
                    rule: bound.clone(),
                },
                None => Label::Plain(bound.clone()),
            };
            let nested = slot.nested;
            cursor = slot.next;
            tracing::trace!(
                slot = %slot.id(),
                label = %label.id(),
                level = ?label.level(),
                "bound label"
            );
            self.slots[id.0].label = Some(label);
            if let Some(nested) = nested {
                self.create_labels(nested, Some(bound.sub()))?;
            }
        }
        Ok(())
    }

    /// Display name of a bound label, including the names of its master prefixes.
    pub fn label_name(&self, label: &Label) -> String {
        match label {
            Label::Plain(rule) => rule.name(),
            Label::Prefixed {
                prefix,
                separator,
                rule,
            } => {
                let prefix = self.name(*prefix).unwrap_or_default();
                let own = rule.name();
                if prefix.is_empty() {
                    own
                } else {
                    format!("{}{}{}", prefix, separator, own)
                }
            }
        }
    }

    /// Display name of a slot; `None` before label creation.
    pub fn name(&self, slot: SlotId) -> Option<String> {
        self.slots[slot.0].label.as_ref().map(|l| self.label_name(l))
    }

    /// Ranges prefix providers look masters up in, per type.
    pub fn set_active(&mut self, active: HashMap<String, RangeId>) {
        self.active = active;
    }

    pub fn active(&self, typ: &str) -> Option<RangeId> {
        self.active.get(typ).copied()
    }
}

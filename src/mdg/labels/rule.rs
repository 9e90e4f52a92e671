//! Label rules
//!
//! A [`LabelRule`] is a persistent counter for one level of a label type. Every operation
//! returns a new rule and leaves the receiver untouched, so rules handed out to slots earlier
//! keep their id and name however the numbering continues.
//!
//! Variants:
//!
//! - `Void`: counts structurally, renders an empty name
//! - `Numbered`: parent joined decimals ("1.2.3")
//! - `FreeForm`: rendered through a [`NumberFormat`] chain ("1a", "A-1", "1.ii")
//! - `Compose`: a base rule glued to a current rule with a separator

use std::rc::Rc;

use super::format::NumberFormat;
use super::label::LabelId;

/// Per-level counter state shared by the counting variants.
///
/// `id` is the structural ordinal and keeps growing across resets, `number` is the displayed
/// ordinal.
#[derive(Debug, Clone)]
pub struct Counter<F = ()> {
    typ: Rc<str>,
    id: usize,
    number: usize,
    level: Option<usize>,
    format: F,
    parent: Option<Rc<Counter<F>>>,
}

impl<F: Clone> Counter<F> {
    fn root(typ: &str, level: Option<usize>, format: F) -> Self {
        Self {
            typ: Rc::from(typ),
            id: 0,
            number: 0,
            level,
            format,
            parent: None,
        }
    }

    fn next(&self) -> Self {
        Self {
            id: self.id + 1,
            number: self.number + 1,
            ..self.clone()
        }
    }

    fn sub(&self, format: F) -> Self {
        Self {
            typ: Rc::clone(&self.typ),
            id: 0,
            number: 0,
            level: Some(self.level.map_or(0, |l| l + 1)),
            format,
            parent: Some(Rc::new(self.clone())),
        }
    }

    fn reset(&self) -> Self {
        Self {
            number: 0,
            ..self.clone()
        }
    }

    fn with_level(&self, level: Option<usize>) -> Self {
        match level {
            Some(_) => Self {
                level,
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    fn label_id(&self) -> LabelId {
        match &self.parent {
            None => LabelId::new(&self.typ, self.id),
            Some(p) => p.label_id().sub(self.id),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.parent.as_deref().cloned()
    }

    pub fn number(&self) -> usize {
        self.number
    }
}

impl Counter {
    fn numbered_name(&self) -> String {
        match &self.parent {
            None => self.number.to_string(),
            Some(p) => format!("{}.{}", p.numbered_name(), self.number),
        }
    }
}

impl Counter<NumberFormat> {
    fn free_form_name(&self) -> String {
        let own = self.format.format(self.number);
        match &self.parent {
            None => own,
            Some(p) => {
                let parent = p.free_form_name();
                if parent.is_empty() {
                    own
                } else {
                    format!("{}{}{}", parent, p.format.separator(), own)
                }
            }
        }
    }
}

/// Two rules glued by a separator. Counting operations act on `current`.
#[derive(Debug)]
pub struct Compose {
    base: LabelRule,
    separator: String,
    current: LabelRule,
}

#[derive(Debug, Clone)]
pub enum LabelRule {
    Void(Counter),
    Numbered(Counter),
    FreeForm(Counter<NumberFormat>),
    Compose(Rc<Compose>),
}

impl LabelRule {
    pub fn void(typ: &str, level: Option<usize>) -> Self {
        LabelRule::Void(Counter::root(typ, Some(level.unwrap_or(0)), ()))
    }

    pub fn numbered(typ: &str, level: Option<usize>) -> Self {
        LabelRule::Numbered(Counter::root(typ, level, ()))
    }

    pub fn free_form(typ: &str, format: NumberFormat, level: Option<usize>) -> Self {
        LabelRule::FreeForm(Counter::root(typ, level, format))
    }

    /// Glues `label` behind `prefix`.
    ///
    /// The composed level is the label's own level if set, else one below the prefix.
    pub fn compose(prefix: LabelRule, separator: &str, label: LabelRule) -> Self {
        let level = label
            .level()
            .or_else(|| Some(prefix.level().map_or(0, |l| l + 1)));
        LabelRule::Compose(Rc::new(Compose {
            current: label.with_level(level),
            base: prefix,
            separator: separator.to_string(),
        }))
    }

    pub fn typ(&self) -> &str {
        match self {
            LabelRule::Void(c) | LabelRule::Numbered(c) => &*c.typ,
            LabelRule::FreeForm(c) => &*c.typ,
            LabelRule::Compose(c) => c.current.typ(),
        }
    }

    /// Short description of the rule kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LabelRule::Void(_) => "void",
            LabelRule::Numbered(_) => "numbered",
            LabelRule::FreeForm(_) => "freeform",
            LabelRule::Compose(_) => "composed",
        }
    }

    pub fn level(&self) -> Option<usize> {
        match self {
            LabelRule::Void(c) | LabelRule::Numbered(c) => c.level,
            LabelRule::FreeForm(c) => c.level,
            LabelRule::Compose(c) => c.current.level(),
        }
    }

    pub fn id(&self) -> LabelId {
        match self {
            LabelRule::Void(c) | LabelRule::Numbered(c) => c.label_id(),
            LabelRule::FreeForm(c) => c.label_id(),
            LabelRule::Compose(c) => c.base.id().extend(&c.current.id()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            LabelRule::Void(_) => String::new(),
            LabelRule::Numbered(c) => c.numbered_name(),
            LabelRule::FreeForm(c) => c.free_form_name(),
            LabelRule::Compose(c) => {
                let base = c.base.name();
                let current = c.current.name();
                if base.is_empty() {
                    current
                } else if current.is_empty() {
                    base
                } else {
                    format!("{}{}{}", base, c.separator, current)
                }
            }
        }
    }

    pub fn parent(&self) -> Option<LabelRule> {
        match self {
            LabelRule::Void(c) => c.parent().map(LabelRule::Void),
            LabelRule::Numbered(c) => c.parent().map(LabelRule::Numbered),
            LabelRule::FreeForm(c) => c.parent().map(LabelRule::FreeForm),
            LabelRule::Compose(c) => c.current.parent().or_else(|| Some(c.base.clone())),
        }
    }

    pub fn next(&self) -> Self {
        match self {
            LabelRule::Void(c) => LabelRule::Void(c.next()),
            LabelRule::Numbered(c) => LabelRule::Numbered(c.next()),
            LabelRule::FreeForm(c) => LabelRule::FreeForm(c.next()),
            LabelRule::Compose(c) => c.with_current(c.current.next()),
        }
    }

    pub fn sub(&self) -> Self {
        match self {
            LabelRule::Void(c) => LabelRule::Void(c.sub(())),
            LabelRule::Numbered(c) => LabelRule::Numbered(c.sub(())),
            LabelRule::FreeForm(c) => LabelRule::FreeForm(c.sub(c.format.sub())),
            LabelRule::Compose(c) => c.with_current(c.current.sub()),
        }
    }

    pub fn reset(&self) -> Self {
        match self {
            LabelRule::Void(c) => LabelRule::Void(c.reset()),
            LabelRule::Numbered(c) => LabelRule::Numbered(c.reset()),
            LabelRule::FreeForm(c) => LabelRule::FreeForm(c.reset()),
            LabelRule::Compose(c) => c.with_current(c.current.reset()),
        }
    }

    /// Overrides the level; `None` keeps the rule as is.
    pub fn with_level(&self, level: Option<usize>) -> Self {
        match self {
            LabelRule::Void(c) => LabelRule::Void(c.with_level(level)),
            LabelRule::Numbered(c) => LabelRule::Numbered(c.with_level(level)),
            LabelRule::FreeForm(c) => LabelRule::FreeForm(c.with_level(level)),
            LabelRule::Compose(c) => c.with_current(c.current.with_level(level)),
        }
    }
}

impl Compose {
    fn with_current(&self, current: LabelRule) -> LabelRule {
        LabelRule::Compose(Rc::new(Compose {
            base: self.base.clone(),
            separator: self.separator.clone(),
            current,
        }))
    }
}

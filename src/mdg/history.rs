//! Ordered visit paths with cycle detection
//!
//! [`History`] is used for structural document nesting and master range chains, [`CallStack`]
//! for nested block expansion. Both are persistent: adding returns a new value.

use std::fmt;

use super::location::Location;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct History(Vec<String>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, s: &str) -> bool {
        self.0.iter().any(|e| e == s)
    }

    /// Appends `s`, or returns the cycle (from the first occurrence of `s` back to `s`).
    pub fn add(&self, s: &str) -> Result<History, History> {
        match self.0.iter().position(|e| e == s) {
            Some(i) => {
                let mut cycle = self.0[i..].to_vec();
                cycle.push(s.to_string());
                Err(History(cycle))
            }
            None => {
                let mut next = self.0.clone();
                next.push(s.to_string());
                Ok(History(next))
            }
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("->"))
    }
}

/// Block expansions currently in progress, with the invocation locations.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    history: History,
    locations: Vec<Location>,
}

impl CallStack {
    pub fn add(&self, name: &str, location: &Location) -> Result<CallStack, History> {
        let history = self.history.add(name)?;
        let mut locations = self.locations.clone();
        locations.push(location.clone());
        Ok(CallStack { history, locations })
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locs: Vec<String> = self.locations.iter().map(|l| l.to_string()).collect();
        write!(f, "{}", locs.join(" -> "))
    }
}

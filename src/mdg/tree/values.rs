use std::rc::Rc;

use crate::mdg::context::ResolutionContext;
use crate::mdg::error::{ResolveError, Result};

use super::Resolution;

impl Resolution {
    /// Resolves values of all non template documents until nothing is left or a pass makes
    /// no progress.
    pub(super) fn resolve_values(&mut self) -> Result<()> {
        let walks: Vec<_> = self
            .documents
            .iter()
            .filter(|(_, info)| !info.document.template)
            .map(|(path, info)| (path.clone(), info.frame, Rc::clone(&info.document.nodes)))
            .collect();

        let mut last: Option<usize> = None;
        loop {
            self.unresolved.clear();
            for (path, frame, nodes) in &walks {
                let before = self.unresolved.len();
                nodes.resolve_values(&mut ResolutionContext::new(self, *frame))?;
                let found = self.unresolved.len() - before;
                if found > 0 {
                    tracing::debug!(document = %path, unresolved = found, "found unresolved nodes");
                }
            }
            let count = self.unresolved.len();
            tracing::debug!(unresolved = count, "value resolution pass done");
            if count == 0 {
                return Ok(());
            }
            if last.is_some_and(|last| count >= last) {
                return Err(ResolveError::Unresolved(std::mem::take(
                    &mut self.unresolved,
                )));
            }
            last = Some(count);
        }
    }
}

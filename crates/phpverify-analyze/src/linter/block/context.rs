//! Per-block walk state

use super::super::ExitFlags;
use crate::scope::Scope;

/// State of one block being walked.
///
/// Branches get a [`child`](BlockContext::child): the scope is copied, the
/// exit bookkeeping starts over.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    pub scope: Scope,
    /// Exits taken on every path through the block so far
    pub exit_flags: ExitFlags,
    /// Exits taken on at least one path
    pub contains_exit_flags: ExitFlags,
    pub dead_code_reported: bool,
    pub inside_loop: bool,
}

impl BlockContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn child(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            inside_loop: self.inside_loop,
            ..Self::default()
        }
    }

    /// Record an exit unless the block already left
    pub fn mark_exit(&mut self, flag: ExitFlags) {
        if self.exit_flags.is_empty() {
            self.exit_flags |= flag;
            self.contains_exit_flags |= flag;
        }
    }
}

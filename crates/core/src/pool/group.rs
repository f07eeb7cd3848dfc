//! Async groups: the tags deciding which submissions may share a batch.

use std::collections::HashSet;
use uuid::Uuid;

/// Batch-compatibility tag attached to every deferred submission.
///
/// `General` tasks batch freely with other general and individual tasks.
/// `Individual` tasks carry a fresh token per call plus the method name, and
/// refuse to share a batch with another individual task for the same method,
/// so order-sensitive mutations of one kind never race each other. `Named`
/// tags only batch with identical tags. A submission whose tag cannot join
/// the pending batch forces a drain first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AsyncGroup {
    General,
    Individual { token: Uuid, method: String },
    Named(String),
}

impl AsyncGroup {
    /// Individual tag for one call of the given method, with a fresh token.
    pub fn individual(method: impl Into<String>) -> Self {
        Self::Individual {
            token: Uuid::new_v4(),
            method: method.into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Whether a task with this tag may join the pending batch.
    pub fn joins(&self, pending: &HashSet<AsyncGroup>) -> bool {
        if pending.is_empty() {
            return true;
        }
        match self {
            AsyncGroup::Named(_) => pending.iter().all(|group| group == self),
            AsyncGroup::General => pending
                .iter()
                .all(|group| !matches!(group, AsyncGroup::Named(_))),
            AsyncGroup::Individual { method, .. } => pending.iter().all(|group| match group {
                AsyncGroup::Named(_) => false,
                AsyncGroup::General => true,
                AsyncGroup::Individual { method: other, .. } => other != method,
            }),
        }
    }
}

impl std::fmt::Display for AsyncGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsyncGroup::General => write!(f, "general"),
            AsyncGroup::Individual { token, method } => {
                write!(f, "individual_{token}_{method}")
            }
            AsyncGroup::Named(name) => write!(f, "{name}"),
        }
    }
}

//! Error types shared by the merge engine.

use thiserror::Error;

use crate::conflict::Conflict;

/// Errors surfaced by a merge or a list unification.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The merge completed but needed fallbacks somewhere; every recorded
    /// conflict is carried here. The best-effort merged value remains
    /// available on the merger that raised this.
    #[error("conflicts occurred in merge process: {} conflict(s) recorded", .0.len())]
    Conflicts(Vec<Conflict>),

    /// More ambiguous match groups were found than the configured detail
    /// limit allows to report.
    #[error("too many manual-merge conflicts to process: {count} exceeds limit {limit}")]
    ManualMergeLimit {
        /// Number of ambiguous match groups found.
        count: usize,
        /// Configured reporting limit.
        limit: usize,
    },
}

impl MergeError {
    /// The conflicts carried by this error, if any.
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            MergeError::Conflicts(conflicts) => conflicts,
            MergeError::ManualMergeLimit { .. } => &[],
        }
    }
}

/// Convenience alias for fallible merge operations.
pub type MergeResult<T> = std::result::Result<T, MergeError>;

//! Drill error types.

use thiserror::Error;

use crate::executor::QueryFailure;

/// Result type for drill operations.
pub type DrillResult<T> = Result<T, DrillError>;

/// Errors raised by the drill core.
///
/// Query failures only surface here under [`super::FailurePolicy::Abort`];
/// the default policy records them on the affected level instead.
#[derive(Error, Debug)]
pub enum DrillError {
    /// A composite key needs at least one dimension.
    #[error("dimension list is empty: drilling requires at least one dimension")]
    EmptyDimensionList,

    /// Top-N with N = 0 selects nothing.
    #[error("rank depth must be a positive integer, got {0}")]
    InvalidRankDepth(u32),

    /// Asked for a transition the hierarchy does not have.
    #[error("level {level} out of range: hierarchy has {transitions} transition(s)")]
    LevelOutOfRange { level: usize, transitions: usize },

    /// A query failed and the run was configured to abort.
    #[error("query for level {level} ('{label}') failed: {source}")]
    Query {
        level: usize,
        label: String,
        #[source]
        source: QueryFailure,
    },
}

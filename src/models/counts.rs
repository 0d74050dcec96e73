//! Aggregate job counts.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-push job counts by state.
///
/// Superseded jobs are excluded from every state bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobCounts {
    pub unscheduled: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    #[serde(rename = "fixedByCommit")]
    pub fixed_by_commit: usize,
}

/// Board-wide unclassified failure counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnclassifiedCounts {
    #[serde(rename = "allUnclassifiedFailureCount")]
    pub all: usize,
    #[serde(rename = "filteredUnclassifiedFailureCount")]
    pub filtered: usize,
}

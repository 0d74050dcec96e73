//! Platform rows and the job groups inside them.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A cluster of jobs sharing a group symbol and tier on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Group {
    pub name: String,
    /// Group symbol, with the "no group" marker `?` stored as empty
    pub symbol: String,
    pub tier: i64,
    /// Stable key for the group within its push
    pub map_key: String,
    /// Job ids in display order
    pub jobs: Vec<i64>,
    pub visible: bool,
}

/// A platform row: display name plus build option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Platform {
    /// Human-readable platform name
    pub name: String,
    /// Platform identifier as reported by the results service
    pub raw_name: String,
    pub option: String,
    pub title: String,
    pub groups: Vec<Group>,
    pub visible: bool,
}

impl Platform {
    pub fn job_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.groups.iter().flat_map(|group| group.jobs.iter().copied())
    }
}

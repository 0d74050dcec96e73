//! Read-only views of the board handed to clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::counts::{JobCounts, UnclassifiedCounts};
use super::job::Job;
use super::push::{Revision, RevisionTip};

/// Jobs folded into one status count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupCount {
    pub result_status: String,
    pub count: usize,
    /// Most recent job in the count, selected when the count is clicked
    pub last_job_id: i64,
    pub contains_selection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupView {
    pub name: String,
    pub symbol: String,
    pub tier: i64,
    pub map_key: String,
    /// Jobs rendered as individual buttons
    pub buttons: Vec<Job>,
    /// Jobs folded into per-status counts
    pub counts: Vec<GroupCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlatformView {
    pub name: String,
    pub option: String,
    pub title: String,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PushView {
    pub id: i64,
    pub revision: String,
    pub author: String,
    pub push_timestamp: i64,
    pub title: String,
    pub revisions: Vec<Revision>,
    pub collapsed: bool,
    pub jobs_loaded: bool,
    pub runnable_visible: bool,
    pub selected_runnable: Vec<String>,
    pub job_counts: JobCounts,
    /// Visible platforms only
    pub platforms: Vec<PlatformView>,
}

/// Everything a client needs to draw the board.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BoardSnapshot {
    pub repo: String,
    /// Current board query string
    pub query: String,
    pub pushes: Vec<PushView>,
    pub counts: UnclassifiedCounts,
    pub revision_tips: Vec<RevisionTip>,
    pub oldest_push_timestamp: Option<i64>,
    pub all_jobs_loaded: bool,
    pub loading: bool,
    pub selected_job_id: Option<i64>,
    pub pinned_job_ids: Vec<i64>,
}

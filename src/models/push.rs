//! Pushes, their fetch parameters and the page shape returned by the
//! results service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::counts::JobCounts;
use super::job::Job;
use super::platform::Platform;

/// One commit inside a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Revision {
    pub revision: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comments: String,
}

/// A set of commits landed together, plus every job attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Push {
    pub id: i64,
    pub revision: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub revision_count: usize,
    pub push_timestamp: i64,
    #[serde(default)]
    pub repository_id: i64,

    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub job_counts: JobCounts,
    #[serde(default)]
    pub jobs_loaded: bool,
    #[serde(default)]
    pub runnable_visible: bool,
    /// Runnable signatures picked for scheduling, sorted
    #[serde(default)]
    pub selected_runnable: Vec<String>,
    /// Manifest test paths keyed by job type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub test_paths_by_type: Option<HashMap<String, Vec<String>>>,

    #[serde(skip)]
    job_positions: HashMap<i64, usize>,
}

impl Push {
    pub fn new(id: i64, revision: impl Into<String>, push_timestamp: i64) -> Self {
        Self {
            id,
            revision: revision.into(),
            author: String::new(),
            revisions: Vec::new(),
            revision_count: 0,
            push_timestamp,
            repository_id: 0,
            jobs: Vec::new(),
            platforms: Vec::new(),
            job_counts: JobCounts::default(),
            jobs_loaded: false,
            runnable_visible: false,
            selected_runnable: Vec::new(),
            test_paths_by_type: None,
            job_positions: HashMap::new(),
        }
    }

    /// First line of the tip commit message.
    pub fn title(&self) -> String {
        self.revisions
            .first()
            .and_then(|rev| rev.comments.lines().next())
            .unwrap_or_default()
            .to_string()
    }

    pub fn job(&self, id: i64) -> Option<&Job> {
        self.job_positions.get(&id).map(|&pos| &self.jobs[pos])
    }

    pub fn job_mut(&mut self, id: i64) -> Option<&mut Job> {
        match self.job_positions.get(&id) {
            Some(&pos) => self.jobs.get_mut(pos),
            None => None,
        }
    }

    pub fn contains_job(&self, id: i64) -> bool {
        self.job_positions.contains_key(&id)
    }

    /// Rebuild the id to position index after `jobs` was rewritten.
    pub fn reindex_jobs(&mut self) {
        self.job_positions = self
            .jobs
            .iter()
            .enumerate()
            .map(|(pos, job)| (job.id, pos))
            .collect();
    }
}

/// Query parameters accepted by the push list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PushFetchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fromchange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tochange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enddate: Option<String>,
    #[serde(
        rename = "push_timestamp__lte",
        skip_serializing_if = "Option::is_none"
    )]
    pub push_timestamp_lte: Option<i64>,
}

impl PushFetchParams {
    /// Encode as a query string, in a fixed key order.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(count) = self.count {
            pairs.push(("count", count.to_string()));
        }
        let text_keys = [
            ("fromchange", &self.fromchange),
            ("tochange", &self.tochange),
            ("revision", &self.revision),
            ("author", &self.author),
            ("startdate", &self.startdate),
            ("enddate", &self.enddate),
        ];
        for (key, value) in text_keys {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        if let Some(ts) = self.push_timestamp_lte {
            pairs.push(("push_timestamp__lte", ts.to_string()));
        }

        pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A push range requested by the user. Empty fields are left out of the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PushRange {
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub fromchange: Option<String>,
    #[serde(default)]
    pub tochange: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub startdate: Option<String>,
    #[serde(default)]
    pub enddate: Option<String>,
}

impl PushRange {
    pub fn entries(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("revision", self.revision.as_deref()),
            ("fromchange", self.fromchange.as_deref()),
            ("tochange", self.tochange.as_deref()),
            ("author", self.author.as_deref()),
            ("startdate", self.startdate.as_deref()),
            ("enddate", self.enddate.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.entries()
            .iter()
            .all(|(_, value)| value.is_none_or(str::is_empty))
    }
}

/// Tip of a push as shown in the revision picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RevisionTip {
    pub revision: String,
    pub author: String,
    pub title: String,
}

impl From<&Push> for RevisionTip {
    fn from(push: &Push) -> Self {
        Self {
            revision: push.revision.clone(),
            author: push.author.clone(),
            title: push.title(),
        }
    }
}

/// One page of pushes.
#[derive(Debug, Clone, Default)]
pub struct PushPage {
    pub pushes: Vec<Push>,
    pub oldest_push_timestamp: Option<i64>,
    pub revision_tips: Vec<RevisionTip>,
}

impl PushPage {
    pub fn from_pushes(pushes: Vec<Push>) -> Self {
        let oldest_push_timestamp = pushes.iter().map(|push| push.push_timestamp).min();
        let revision_tips = pushes.iter().map(RevisionTip::from).collect();
        Self {
            pushes,
            oldest_push_timestamp,
            revision_tips,
        }
    }
}

//! Job records as delivered by the CI results service, plus the fields the
//! board derives from them.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Results that count as failures.
pub const FAILURE_RESULTS: &[&str] = &["testfailed", "busted", "exception"];

/// Classification ids that still need a sheriff.
pub const UNCLASSIFIED_IDS: &[i64] = &[1, 7];

/// Classification id for "fixed by commit".
pub const FIXED_BY_COMMIT_ID: i64 = 2;

/// State and result carried by runnable (not yet scheduled) jobs.
pub const RUNNABLE: &str = "runnable";

/// Result of a job replaced by a later run.
pub const SUPERSEDED: &str = "superseded";

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unscheduled,
    Pending,
    Running,
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Unscheduled => "unscheduled",
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unscheduled" => Some(JobState::Unscheduled),
            "pending" => Some(JobState::Pending),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single CI job.
///
/// Everything up to `signature` comes from the results service. The fields
/// after it are derived by the normalizer and only ever filled when absent,
/// so re-normalizing a record is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: i64,
    #[serde(default)]
    pub push_id: i64,
    #[serde(default = "unknown", deserialize_with = "null_as_unknown")]
    pub state: String,
    #[serde(default = "unknown", deserialize_with = "null_as_unknown")]
    pub result: String,
    #[serde(default = "default_classification")]
    pub failure_classification_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform_option: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_group_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_group_symbol: String,
    #[serde(default = "default_tier")]
    pub tier: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_type_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job_type_symbol: String,
    #[serde(default)]
    pub submit_timestamp: Option<i64>,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    /// Server-side modification time, `YYYY-MM-DDTHH:MM:SS[.ffffff]`
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub retry_id: i64,
    /// Runnable-job signature (`ref_data_name` upstream)
    #[serde(default, alias = "ref_data_name")]
    pub signature: Option<String>,

    /// Whole minutes, never below one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(
        rename = "searchStr",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub search_str: Option<String>,
    #[serde(
        rename = "hoverText",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hover_text: Option<String>,
    #[serde(
        rename = "resultStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub result_status: Option<String>,
    #[serde(rename = "taskRun", default, skip_serializing_if = "Option::is_none")]
    pub task_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_paths: Option<Vec<String>>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub selected: bool,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            id: 0,
            push_id: 0,
            state: unknown(),
            result: unknown(),
            failure_classification_id: default_classification(),
            platform: String::new(),
            platform_option: String::new(),
            job_group_name: String::new(),
            job_group_symbol: String::new(),
            tier: default_tier(),
            job_type_name: String::new(),
            job_type_symbol: String::new(),
            submit_timestamp: None,
            start_timestamp: None,
            end_timestamp: None,
            last_modified: None,
            task_id: None,
            retry_id: 0,
            signature: None,
            duration: None,
            search_str: None,
            hover_text: None,
            result_status: None,
            task_run: None,
            test_paths: None,
            visible: false,
            selected: false,
        }
    }
}

impl Job {
    pub fn job_state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }

    /// Display status: the result once completed, otherwise the state.
    pub fn status(&self) -> &str {
        if self.state == JobState::Completed.as_str() {
            &self.result
        } else {
            &self.state
        }
    }

    pub fn is_runnable(&self) -> bool {
        self.state == RUNNABLE
    }

    pub fn is_classified(&self) -> bool {
        !UNCLASSIFIED_IDS.contains(&self.failure_classification_id)
    }

    pub fn is_failure(&self) -> bool {
        let status = self.result_status.as_deref().unwrap_or_else(|| self.status());
        FAILURE_RESULTS.contains(&status)
    }

    pub fn is_unclassified_failure(&self) -> bool {
        self.is_failure() && !self.is_classified()
    }

    /// `task_id.retry_id`, when the job ran on a task queue.
    pub fn task_run_key(&self) -> Option<String> {
        self.task_id
            .as_ref()
            .map(|task_id| format!("{}.{}", task_id, self.retry_id))
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

fn default_classification() -> i64 {
    1
}

fn default_tier() -> i64 {
    1
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown))
}

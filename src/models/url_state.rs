//! Query-string state of the board.
//!
//! The URL is the source of truth for the push range, the filters, the
//! selected job and the collapsed pushes. Parameters keep their insertion
//! order and repeated keys, like the browser's `URLSearchParams`.

use serde::{Deserialize, Serialize};

pub const REPO: &str = "repo";
pub const REVISION: &str = "revision";
pub const FROM_CHANGE: &str = "fromchange";
pub const TO_CHANGE: &str = "tochange";
pub const AUTHOR: &str = "author";
pub const START_DATE: &str = "startdate";
pub const END_DATE: &str = "enddate";
pub const SELECTED_JOB: &str = "selectedJob";
pub const SELECTED_TASK_RUN: &str = "selectedTaskRun";
pub const COLLAPSED_PUSHES: &str = "collapsedPushes";

/// Keys carried over to every poll request.
pub const PUSH_POLLING_KEYS: &[&str] = &[TO_CHANGE, END_DATE, REVISION, AUTHOR];

/// Keys carried over to an initial fetch.
pub const PUSH_FETCH_KEYS: &[&str] = &[FROM_CHANGE, TO_CHANGE, START_DATE, END_DATE];

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlState {
    params: Vec<(String, String)>,
}

impl UrlState {
    /// Parse a query string, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { params }
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace every value of `key` with a single value, keeping the
    /// position of the first occurrence.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.params[pos].1 = value;
                let mut seen = false;
                self.params.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.params.push((key.to_string(), value.into()));
    }

    pub fn remove(&mut self, key: &str) {
        self.params.retain(|(k, _)| k != key);
    }

    pub fn repo(&self) -> Option<&str> {
        self.get(REPO)
    }

    pub fn selected_job(&self) -> Option<i64> {
        self.get(SELECTED_JOB).and_then(|id| id.parse().ok())
    }

    pub fn selected_task_run(&self) -> Option<&str> {
        self.get(SELECTED_TASK_RUN)
    }

    /// Write or clear the selected job id and its task run.
    pub fn set_selection(&mut self, job_id: Option<i64>, task_run: Option<&str>) {
        match job_id {
            Some(id) => self.set(SELECTED_JOB, id.to_string()),
            None => self.remove(SELECTED_JOB),
        }
        match task_run {
            Some(run) if job_id.is_some() => self.set(SELECTED_TASK_RUN, run),
            _ => self.remove(SELECTED_TASK_RUN),
        }
    }

    pub fn collapsed_pushes(&self) -> Vec<i64> {
        self.get(COLLAPSED_PUSHES)
            .map(|raw| {
                raw.split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_collapsed_pushes(&mut self, ids: &[i64]) {
        if ids.is_empty() {
            self.remove(COLLAPSED_PUSHES);
        } else {
            let joined = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            self.set(COLLAPSED_PUSHES, joined);
        }
    }

    /// A single-revision view shows exactly one push.
    pub fn is_single_revision(&self) -> bool {
        self.has(REVISION)
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

//! Job filters.
//!
//! The board only needs a `matches` predicate. [`UrlFilterModel`] is the
//! filter the server builds from the board's query string.

use serde::Deserialize;
use utoipa::ToSchema;

use super::grouping::platform_display_name;
use crate::models::url_state::UrlState;
use crate::models::{FAILURE_RESULTS, Job, RUNNABLE};

/// Predicate deciding whether a job passes the active filters.
pub trait JobFilter: Send + Sync {
    fn matches(&self, job: &Job) -> bool;
}

impl<F> JobFilter for F
where
    F: Fn(&Job) -> bool + Send + Sync,
{
    fn matches(&self, job: &Job) -> bool {
        self(job)
    }
}

/// One-step change to the board's filters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterAction {
    /// Switch between the unclassified failures view and the defaults
    ToggleUnclassifiedFailures,
    /// Add or remove one result status
    ToggleResultStatus { status: String },
    /// Back to the default filters
    Reset,
}

/// Passes every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl JobFilter for AcceptAll {
    fn matches(&self, _job: &Job) -> bool {
        true
    }
}

pub const RESULT_STATUS: &str = "resultStatus";
pub const CLASSIFIED_STATE: &str = "classifiedState";
pub const SEARCH_STR: &str = "searchStr";

/// Result statuses shown when the URL does not say otherwise.
pub const DEFAULT_RESULT_STATUS: &[&str] = &[
    "success",
    "testfailed",
    "busted",
    "exception",
    "retry",
    "usercancel",
    "running",
    "pending",
    "runnable",
];

pub const DEFAULT_CLASSIFIED_STATE: &[&str] = &["classified", "unclassified"];

pub const DEFAULT_TIER: &[&str] = &["1", "2"];

/// Legacy prefix on filter parameter names.
const LEGACY_PREFIX: &str = "filter-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchType {
    /// At least one value is a substring of the field
    Substr,
    /// Every value is a substring of the field
    SearchStr,
    /// At least one value equals the field
    Exact,
}

/// Field filters and how they compare.
const FIELD_CHOICES: &[(&str, MatchType)] = &[
    ("job_type_name", MatchType::Substr),
    ("job_type_symbol", MatchType::Exact),
    ("job_group_name", MatchType::Substr),
    ("job_group_symbol", MatchType::Exact),
    ("platform", MatchType::Substr),
    ("tier", MatchType::Exact),
    ("failure_classification_id", MatchType::Exact),
    ("ref_data_name", MatchType::Substr),
    ("task_id", MatchType::Exact),
    ("author", MatchType::Substr),
    (SEARCH_STR, MatchType::SearchStr),
];

/// Filter state parsed from the board URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFilterModel {
    pub result_status: Vec<String>,
    pub classified_state: Vec<String>,
    /// Field filters in `FIELD_CHOICES` order, lower-cased
    pub fields: Vec<(String, Vec<String>)>,
}

impl Default for UrlFilterModel {
    fn default() -> Self {
        Self {
            result_status: to_owned(DEFAULT_RESULT_STATUS),
            classified_state: to_owned(DEFAULT_CLASSIFIED_STATE),
            fields: vec![("tier".to_string(), to_owned(DEFAULT_TIER))],
        }
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Whether `key` (with or without the legacy prefix) is a filter parameter.
pub fn is_filter_param(key: &str) -> bool {
    let key = key.strip_prefix(LEGACY_PREFIX).unwrap_or(key);
    key == RESULT_STATUS
        || key == CLASSIFIED_STATE
        || FIELD_CHOICES.iter().any(|(name, _)| *name == key)
}

impl UrlFilterModel {
    /// Read filters from the URL; absent filters fall back to defaults.
    pub fn from_url(url: &UrlState) -> Self {
        let mut model = Self::default();
        let mut explicit: Vec<(String, Vec<String>)> = Vec::new();

        for (key, raw) in url.iter() {
            let field = key.strip_prefix(LEGACY_PREFIX).unwrap_or(key);
            if !is_filter_param(field) {
                continue;
            }
            let values: Vec<String> = if field == "author" {
                vec![raw.to_lowercase()]
            } else {
                raw.to_lowercase()
                    .split([',', ' '])
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            };
            match explicit.iter_mut().find(|(name, _)| name == field) {
                Some((_, existing)) => existing.extend(values),
                None => explicit.push((field.to_string(), values)),
            }
        }

        for (field, values) in explicit {
            match field.as_str() {
                RESULT_STATUS => model.result_status = values,
                CLASSIFIED_STATE => model.classified_state = values,
                _ => match model.fields.iter_mut().find(|(name, _)| *name == field) {
                    Some((_, existing)) => *existing = values,
                    None => model.fields.push((field, values)),
                },
            }
        }

        model.fields.sort_by_key(|(name, _)| {
            FIELD_CHOICES
                .iter()
                .position(|(choice, _)| choice == name)
                .unwrap_or(usize::MAX)
        });
        model
    }

    /// Rewrite the filter parameters of `url`, omitting values equal to
    /// the defaults. Non-filter parameters are kept.
    pub fn write_to_url(&self, url: &mut UrlState) {
        let stale: Vec<String> = url
            .iter()
            .map(|(key, _)| key.to_string())
            .filter(|key| is_filter_param(key))
            .collect();
        for key in stale {
            url.remove(&key);
        }

        if !same_set(&self.result_status, DEFAULT_RESULT_STATUS) {
            for value in &self.result_status {
                url.append(RESULT_STATUS, value.clone());
            }
        }
        if !same_set(&self.classified_state, DEFAULT_CLASSIFIED_STATE) {
            for value in &self.classified_state {
                url.append(CLASSIFIED_STATE, value.clone());
            }
        }
        for (field, values) in &self.fields {
            if field == "tier" && same_set(values, DEFAULT_TIER) {
                continue;
            }
            for value in values {
                url.append(field, value.clone());
            }
        }
    }

    /// Only unclassified failures are shown.
    pub fn is_unclassified_failures(&self) -> bool {
        same_set(&self.result_status, FAILURE_RESULTS)
            && same_set(&self.classified_state, &["unclassified"])
    }

    /// Switch between the unclassified failures view and the defaults.
    pub fn toggle_unclassified_failures(&mut self) {
        if self.is_unclassified_failures() {
            self.result_status = to_owned(DEFAULT_RESULT_STATUS);
            self.classified_state = to_owned(DEFAULT_CLASSIFIED_STATE);
        } else {
            self.result_status = to_owned(FAILURE_RESULTS);
            self.classified_state = vec!["unclassified".to_string()];
        }
    }

    /// Add or remove one result status.
    pub fn toggle_result_status(&mut self, status: &str) {
        let status = status.to_lowercase();
        match self.result_status.iter().position(|s| *s == status) {
            Some(pos) => {
                self.result_status.remove(pos);
            }
            None => self.result_status.push(status),
        }
    }

    /// Drop every field filter and restore the default statuses.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, action: &FilterAction) {
        match action {
            FilterAction::ToggleUnclassifiedFailures => self.toggle_unclassified_failures(),
            FilterAction::ToggleResultStatus { status } => self.toggle_result_status(status),
            FilterAction::Reset => self.reset(),
        }
    }

    fn classified_state_matches(&self, job: &Job) -> bool {
        let classified = job.is_classified();
        let wants = |state: &str| self.classified_state.iter().any(|s| s == state);
        if classified {
            wants("classified")
        } else {
            wants("unclassified")
        }
    }

    fn field_value(job: &Job, field: &str) -> String {
        match field {
            "job_type_name" => job.job_type_name.clone(),
            "job_type_symbol" => job.job_type_symbol.clone(),
            "job_group_name" => job.job_group_name.clone(),
            "job_group_symbol" => job.job_group_symbol.clone(),
            "platform" => format!(
                "{} {}",
                platform_display_name(&job.platform),
                job.platform_option
            ),
            "tier" if job.is_runnable() => String::new(),
            "tier" => job.tier.to_string(),
            "failure_classification_id" => job.failure_classification_id.to_string(),
            "ref_data_name" => job.signature.clone().unwrap_or_default(),
            "task_id" => job.task_id.clone().unwrap_or_default(),
            SEARCH_STR => job.search_str.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn field_matches(&self, job: &Job) -> bool {
        self.fields.iter().all(|(field, values)| {
            let value = Self::field_value(job, field).to_lowercase();
            // Jobs without the field pass.
            if value.trim().is_empty() {
                return true;
            }
            let match_type = FIELD_CHOICES
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, kind)| *kind)
                .unwrap_or(MatchType::Exact);
            match match_type {
                MatchType::Substr => values.iter().any(|v| value.contains(v.as_str())),
                MatchType::SearchStr => values.iter().all(|v| value.contains(v.as_str())),
                MatchType::Exact => values.iter().any(|v| *v == value),
            }
        })
    }
}

impl JobFilter for UrlFilterModel {
    fn matches(&self, job: &Job) -> bool {
        let status = job.result_status.as_deref().unwrap_or_else(|| job.status());
        // Runnable jobs skip the status and classification checks.
        if status != RUNNABLE {
            if !self.result_status.iter().any(|s| s == status) {
                return false;
            }
            if !self.classified_state_matches(job) {
                return false;
            }
        }
        self.field_matches(job)
    }
}

fn same_set<S: AsRef<str>>(values: &[S], expected: &[&str]) -> bool {
    values.len() == expected.len()
        && expected
            .iter()
            .all(|e| values.iter().any(|v| v.as_ref() == *e))
}

//! Collapses a job group into buttons and per-status counts.
//!
//! A collapsed group shows failures as individual buttons and folds the
//! remaining visible jobs into one count per result status. A count of one
//! is shown as the job itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Group, GroupCount, Job, Push};

/// How duplicates and the selected job are treated when collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalesceRule {
    /// Show every run of a repeated job type as its own button
    pub duplicate_jobs_visible: bool,
    /// Keep the job matching the selected task run out of the counts
    pub keep_selected_expanded: bool,
}

impl Default for CoalesceRule {
    fn default() -> Self {
        Self {
            duplicate_jobs_visible: false,
            keep_selected_expanded: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupSummary {
    /// Job ids shown as individual buttons: failures and kept runs in group
    /// order, then statuses with a single job
    pub buttons: Vec<i64>,
    pub counts: Vec<GroupCount>,
}

/// Summarize the visible jobs of `group`.
pub fn summarize_group(
    group: &Group,
    push: &Push,
    selected_task_run: Option<&str>,
    expanded: bool,
    rule: CoalesceRule,
) -> GroupSummary {
    let jobs: Vec<&Job> = group
        .jobs
        .iter()
        .filter_map(|id| push.job(*id))
        .filter(|job| job.visible)
        .collect();

    if expanded {
        return GroupSummary {
            buttons: jobs.iter().map(|job| job.id).collect(),
            counts: Vec::new(),
        };
    }

    let mut runs_by_symbol: HashMap<&str, usize> = HashMap::new();
    for job in &jobs {
        *runs_by_symbol.entry(job.job_type_symbol.as_str()).or_default() += 1;
    }

    let mut summary = GroupSummary::default();
    let mut folded: Vec<(String, Vec<&Job>)> = Vec::new();

    for job in jobs {
        let duplicate = runs_by_symbol
            .get(job.job_type_symbol.as_str())
            .is_some_and(|runs| *runs > 1);
        let is_selected_run = rule.keep_selected_expanded
            && selected_task_run.is_some()
            && job.task_run.as_deref() == selected_task_run;

        if job.is_failure() || (duplicate && rule.duplicate_jobs_visible) || is_selected_run {
            summary.buttons.push(job.id);
            continue;
        }

        let status = job
            .result_status
            .clone()
            .unwrap_or_else(|| job.status().to_string());
        match folded.iter_mut().find(|(s, _)| *s == status) {
            Some((_, members)) => members.push(job),
            None => folded.push((status, vec![job])),
        }
    }

    for (result_status, members) in folded {
        match members.as_slice() {
            [single] => summary.buttons.push(single.id),
            _ => {
                let last_job_id = members.iter().map(|job| job.id).max().unwrap_or_default();
                summary.counts.push(GroupCount {
                    result_status,
                    count: members.len(),
                    last_job_id,
                    contains_selection: members.iter().any(|job| job.selected),
                });
            }
        }
    }

    summary
}

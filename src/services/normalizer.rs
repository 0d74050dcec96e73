//! Fills in the derived fields of a job record.
//!
//! Each derived field is computed only when it is still empty, which makes
//! normalization idempotent: a job that comes back in a later batch keeps
//! nothing stale because the merge replaces the whole record first.

use chrono::Utc;

use super::grouping::platform_display_name;
use crate::models::Job;

/// Normalize against the current wall clock.
pub fn normalize_job(job: &mut Job) {
    normalize_job_at(job, Utc::now().timestamp());
}

/// Normalize with an explicit "now" in epoch seconds.
pub fn normalize_job_at(job: &mut Job, now: i64) {
    if job.result_status.is_none() {
        job.result_status = Some(job.status().to_string());
    }
    if job.task_run.is_none() {
        job.task_run = job.task_run_key();
    }
    if job.search_str.is_none() {
        job.search_str = Some(search_str(job));
    }
    if job.duration.is_none() {
        job.duration = Some(duration_minutes(job, now));
    }
    if job.hover_text.is_none() {
        job.hover_text = Some(hover_text(job));
    }
}

fn known(ts: Option<i64>) -> Option<i64> {
    ts.filter(|&ts| ts > 0)
}

/// Whole minutes between start and end, or since submission while the job
/// has no end yet. Never below one.
pub fn duration_minutes(job: &Job, now: i64) -> i64 {
    let seconds = match (known(job.start_timestamp), known(job.end_timestamp)) {
        (Some(start), Some(end)) => end - start,
        _ => now - known(job.submit_timestamp).unwrap_or(now),
    };
    ((seconds.max(0) + 30) / 60).max(1)
}

fn search_str(job: &Job) -> String {
    let group_name = if job.job_group_name == "unknown" {
        ""
    } else {
        job.job_group_name.as_str()
    };
    let group_symbol = if job.job_group_symbol == "?" {
        ""
    } else {
        job.job_group_symbol.as_str()
    };
    let symbol = format!("{}({})", group_symbol, job.job_type_symbol);

    [
        platform_display_name(&job.platform),
        job.platform_option.as_str(),
        group_name,
        job.job_type_name.as_str(),
        symbol.as_str(),
    ]
    .iter()
    .filter(|token| !token.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

fn hover_text(job: &Job) -> String {
    let duration = job.duration.unwrap_or(1);
    let unit = if duration == 1 { "min" } else { "mins" };
    let status = job.result_status.as_deref().unwrap_or_else(|| job.status());
    format!("{} - {} - {} {}", job.job_type_name, status, duration, unit)
}

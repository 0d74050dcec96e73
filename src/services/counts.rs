//! Job state tallies and unclassified failure counts.
//!
//! Both are recomputed from scratch on every change; nothing is patched
//! incrementally.

use super::filter::JobFilter;
use crate::models::{FIXED_BY_COMMIT_ID, Job, JobCounts, JobState, SUPERSEDED, UnclassifiedCounts};

/// Tally one push's jobs by state.
pub fn job_counts(jobs: &[Job]) -> JobCounts {
    let mut counts = JobCounts::default();
    for job in jobs {
        if job.failure_classification_id == FIXED_BY_COMMIT_ID {
            counts.fixed_by_commit += 1;
        }
        if job.result == SUPERSEDED {
            continue;
        }
        match job.job_state() {
            Some(JobState::Unscheduled) => counts.unscheduled += 1,
            Some(JobState::Pending) => counts.pending += 1,
            Some(JobState::Running) => counts.running += 1,
            Some(JobState::Completed) => counts.completed += 1,
            None => {}
        }
    }
    counts
}

/// Count unclassified failures across every loaded job.
///
/// `filtered` applies the filter predicate itself, so a selected job that is
/// only visible because it is selected does not count.
pub fn unclassified_counts<'a, I>(jobs: I, filter: &dyn JobFilter) -> UnclassifiedCounts
where
    I: IntoIterator<Item = &'a Job>,
{
    let mut counts = UnclassifiedCounts::default();
    for job in jobs {
        if job.is_unclassified_failure() {
            counts.all += 1;
            if filter.matches(job) {
                counts.filtered += 1;
            }
        }
    }
    counts
}

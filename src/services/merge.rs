//! Merges job batches into a push.
//!
//! The merge is replace-by-id: an incoming job wholesale replaces any loaded
//! job with the same id, never field-by-field. After every merge the push's
//! platform tree and state counts are rebuilt from the full job list, so
//! replaying the same batch yields the same push.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::counts::job_counts;
use super::grouping::group_jobs;
use super::normalizer::normalize_job_at;
use crate::models::{Job, Push};

/// What a merge did to the push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MergeOutcome {
    pub added: usize,
    pub replaced: usize,
    pub total: usize,
}

/// Merge `batch` into `push`, normalizing against `now` (epoch seconds).
pub fn merge_jobs(push: &mut Push, batch: Vec<Job>, now: i64) -> MergeOutcome {
    // Within one batch the last record for an id wins.
    let mut seen = HashSet::new();
    let mut batch: Vec<Job> = batch
        .into_iter()
        .rev()
        .filter(|job| seen.insert(job.id))
        .collect();
    batch.reverse();

    let before = push.jobs.len();
    push.jobs.retain(|job| !seen.contains(&job.id));
    let replaced = before - push.jobs.len();
    let added = batch.len() - replaced;

    push.jobs.extend(batch);
    for job in push.jobs.iter_mut() {
        normalize_job_at(job, now);
        if let Some(paths) = &push.test_paths_by_type {
            job.test_paths = paths.get(&job.job_type_name).cloned();
        }
    }

    rebuild(push);

    MergeOutcome {
        added,
        replaced,
        total: push.jobs.len(),
    }
}

/// Re-run the merge with the push's own jobs, e.g. after its manifest
/// test paths arrived.
pub fn remerge(push: &mut Push, now: i64) -> MergeOutcome {
    let own = std::mem::take(&mut push.jobs);
    push.reindex_jobs();
    merge_jobs(push, own, now)
}

/// Drop every job matching `predicate` and rebuild.
pub fn remove_jobs<P>(push: &mut Push, predicate: P) -> usize
where
    P: Fn(&Job) -> bool,
{
    let before = push.jobs.len();
    push.jobs.retain(|job| !predicate(job));
    let removed = before - push.jobs.len();
    if removed > 0 {
        rebuild(push);
    }
    removed
}

fn rebuild(push: &mut Push) {
    push.reindex_jobs();
    push.platforms = group_jobs(push.id, &push.jobs);
    push.job_counts = job_counts(&push.jobs);
    push.jobs_loaded = true;
}

//! Marks jobs, groups and platforms visible under the active filter.

use std::collections::HashSet;

use super::filter::JobFilter;
use crate::models::Push;

/// Recompute the visible and selected flags for one push.
///
/// A job is visible when it passes the filter or is the selected job.
/// Runnable jobs also need the push's runnable toggle on. A group is visible
/// when any of its jobs is, a platform when any of its groups is.
pub fn apply_visibility(push: &mut Push, filter: &dyn JobFilter, selected_job_id: Option<i64>) {
    let runnable_visible = push.runnable_visible;
    let mut visible_ids = HashSet::new();

    for job in push.jobs.iter_mut() {
        let selected = selected_job_id == Some(job.id);
        let mut visible = selected || filter.matches(job);
        if job.is_runnable() && !runnable_visible {
            visible = false;
        }
        job.visible = visible;
        job.selected = selected;
        if visible {
            visible_ids.insert(job.id);
        }
    }

    for platform in push.platforms.iter_mut() {
        for group in platform.groups.iter_mut() {
            group.visible = group.jobs.iter().any(|id| visible_ids.contains(id));
        }
        platform.visible = platform.groups.iter().any(|group| group.visible);
    }
}

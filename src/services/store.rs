//! In-memory push collection and everything derived from it.
//!
//! `BoardState` is synchronous. The async orchestration in
//! [`crate::services::board`] fetches without holding it and applies results
//! under a write lock. Counts and visibility are always rebuilt from the
//! full collection.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use super::counts::unclassified_counts;
use super::filter::{FilterAction, JobFilter, UrlFilterModel};
use super::group_summary::{CoalesceRule, summarize_group};
use super::merge::{self, MergeOutcome};
use super::runnable::prepare_runnable_jobs;
use super::selection::{PinBoard, SelectionState};
use super::visibility::apply_visibility;
use crate::models::url_state::{self, PUSH_FETCH_KEYS};
use crate::models::{
    BoardSnapshot, GroupView, Job, JobState, PlatformView, Push, PushFetchParams, PushPage,
    PushRange, PushView, RevisionTip, UnclassifiedCounts, UrlState,
};

/// URL key expanding every group when set to `expanded`.
pub const GROUP_STATE: &str = "group_state";

const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Overlap when asking for jobs modified since the newest one loaded.
const NEW_JOBS_OVERLAP_SECS: i64 = 3;

const DECISION_PLATFORM: &str = "gecko-decision";
const DECISION_SYMBOL: &str = "D";

/// The board's push collection.
pub struct BoardState {
    pub(crate) repo: String,
    /// Newest push first
    pub(crate) pushes: Vec<Push>,
    /// Job id to owning push id
    pub(crate) job_index: HashMap<i64, i64>,
    pub(crate) oldest_push_timestamp: Option<i64>,
    pub(crate) revision_tips: Vec<RevisionTip>,
    pub(crate) counts: UnclassifiedCounts,
    pub(crate) url: UrlState,
    pub(crate) filter: Arc<dyn JobFilter>,
    pub(crate) selection: SelectionState,
    pub(crate) pins: PinBoard,
    pub(crate) loading: bool,
    /// Bumped whenever the range is replaced; results fetched under an
    /// older generation are discarded
    pub(crate) generation: u64,
    pub(crate) coalesce: CoalesceRule,
}

impl BoardState {
    pub fn new(query: &str, default_repo: &str, coalesce: CoalesceRule) -> Self {
        let mut url = UrlState::parse(query);
        if url.repo().is_none() {
            url.set(url_state::REPO, default_repo);
        }
        let repo = url.repo().unwrap_or(default_repo).to_string();
        let filter = UrlFilterModel::from_url(&url);

        Self {
            repo,
            pushes: Vec::new(),
            job_index: HashMap::new(),
            oldest_push_timestamp: None,
            revision_tips: Vec::new(),
            counts: UnclassifiedCounts::default(),
            url,
            filter: Arc::new(filter),
            selection: SelectionState::default(),
            pins: PinBoard::default(),
            loading: false,
            generation: 0,
            coalesce,
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn pushes(&self) -> &[Push] {
        &self.pushes
    }

    pub fn push(&self, id: i64) -> Option<&Push> {
        self.pushes.iter().find(|push| push.id == id)
    }

    pub fn url(&self) -> &UrlState {
        &self.url
    }

    pub fn counts(&self) -> UnclassifiedCounts {
        self.counts
    }

    pub fn revision_tips(&self) -> &[RevisionTip] {
        &self.revision_tips
    }

    pub fn oldest_push_timestamp(&self) -> Option<i64> {
        self.oldest_push_timestamp
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// The selected job, if it is loaded. An unknown id in the URL is kept
    /// there but reported as no selection.
    pub fn selected_job_id(&self) -> Option<i64> {
        self.selection.current().filter(|id| self.job_index.contains_key(id))
    }

    pub fn pinned_job_ids(&self) -> &[i64] {
        self.pins.job_ids()
    }

    pub fn job(&self, id: i64) -> Option<&Job> {
        let push_id = self.job_index.get(&id)?;
        self.push(*push_id).and_then(|push| push.job(id))
    }

    pub fn all_jobs(&self) -> impl Iterator<Item = &Job> {
        self.pushes.iter().flat_map(|push| push.jobs.iter())
    }

    pub fn all_jobs_loaded(&self) -> bool {
        self.pushes.iter().all(|push| push.jobs_loaded)
    }

    /// Newest push revision, the lower bound for polling.
    pub fn newest_revision(&self) -> Option<&str> {
        self.pushes.first().map(|push| push.revision.as_str())
    }

    /// Build fetch parameters from the URL keys in `keys`.
    pub fn fetch_params(&self, keys: &[&str], count: usize) -> PushFetchParams {
        let mut params = PushFetchParams {
            count: Some(count),
            ..Default::default()
        };
        for key in keys {
            let Some(value) = self.url.get(key).map(str::to_string) else {
                continue;
            };
            match *key {
                url_state::FROM_CHANGE => params.fromchange = Some(value),
                url_state::TO_CHANGE => params.tochange = Some(value),
                url_state::REVISION => params.revision = Some(value),
                url_state::AUTHOR => params.author = Some(value),
                url_state::START_DATE => params.startdate = Some(value),
                url_state::END_DATE => params.enddate = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Insert pushes not yet present. Returns the ids actually added.
    pub fn add_pushes(&mut self, page: PushPage) -> Vec<i64> {
        let selected = self.selection.current();
        let mut added = Vec::new();

        for mut push in page.pushes {
            if self.pushes.iter().any(|existing| existing.id == push.id) {
                debug!(push_id = push.id, "Push already loaded, skipping");
                continue;
            }
            push.reindex_jobs();
            for job in &push.jobs {
                self.job_index.insert(job.id, push.id);
            }
            apply_visibility(&mut push, self.filter.as_ref(), selected);
            added.push(push.id);
            self.pushes.push(push);
        }

        self.pushes.sort_by_key(|push| Reverse(push.push_timestamp));
        self.oldest_push_timestamp = match (self.oldest_push_timestamp, page.oldest_push_timestamp)
        {
            (Some(current), Some(page_oldest)) => Some(current.min(page_oldest)),
            (current, page_oldest) => current.or(page_oldest),
        };
        self.revision_tips = self.pushes.iter().map(RevisionTip::from).collect();

        if !added.is_empty() {
            self.recompute_counts();
        }
        added
    }

    /// Merge a batch into one push and refresh counts.
    ///
    /// Returns `None` when the push is not in the collection; the batch is
    /// dropped.
    pub fn merge_jobs(&mut self, push_id: i64, batch: Vec<Job>, now: i64) -> Option<MergeOutcome> {
        let outcome = self.merge_into_push(push_id, batch, now)?;
        self.recompute_counts();
        Some(outcome)
    }

    /// Merge jobs spanning several pushes, routed by `push_id`.
    pub fn merge_job_batch(&mut self, jobs: Vec<Job>, now: i64) -> Vec<(i64, MergeOutcome)> {
        let mut by_push: Vec<(i64, Vec<Job>)> = Vec::new();
        for job in jobs {
            match by_push.iter_mut().find(|(id, _)| *id == job.push_id) {
                Some((_, batch)) => batch.push(job),
                None => by_push.push((job.push_id, vec![job])),
            }
        }

        let outcomes: Vec<(i64, MergeOutcome)> = by_push
            .into_iter()
            .filter_map(|(push_id, batch)| {
                self.merge_into_push(push_id, batch, now)
                    .map(|outcome| (push_id, outcome))
            })
            .collect();
        if !outcomes.is_empty() {
            self.recompute_counts();
        }
        outcomes
    }

    fn merge_into_push(&mut self, push_id: i64, batch: Vec<Job>, now: i64) -> Option<MergeOutcome> {
        let selected = self.selection.current();
        let Some(push) = self.pushes.iter_mut().find(|push| push.id == push_id) else {
            debug!(push_id, jobs = batch.len(), "Dropping jobs for a push that is not loaded");
            return None;
        };

        let outcome = merge::merge_jobs(push, batch, now);
        for job in &push.jobs {
            self.job_index.insert(job.id, push_id);
        }
        apply_visibility(push, self.filter.as_ref(), selected);
        Some(outcome)
    }

    pub fn recompute_visibility(&mut self) {
        let selected = self.selection.current();
        for push in self.pushes.iter_mut() {
            apply_visibility(push, self.filter.as_ref(), selected);
        }
    }

    pub fn recompute_counts(&mut self) {
        let jobs = self.pushes.iter().flat_map(|push| push.jobs.iter());
        self.counts = unclassified_counts(jobs, self.filter.as_ref());
    }

    /// Replace the filter parameters from `query` and re-filter.
    pub fn set_filter_query(&mut self, query: &str) {
        let requested = UrlState::parse(query);
        let model = UrlFilterModel::from_url(&requested);
        model.write_to_url(&mut self.url);
        self.set_filter(Arc::new(model));
    }

    /// Apply one filter action on top of the filters in the URL.
    pub fn apply_filter_action(&mut self, action: &FilterAction) {
        let mut model = UrlFilterModel::from_url(&self.url);
        model.apply(action);
        model.write_to_url(&mut self.url);
        self.set_filter(Arc::new(model));
    }

    pub fn set_filter(&mut self, filter: Arc<dyn JobFilter>) {
        self.filter = filter;
        self.recompute_visibility();
        self.recompute_counts();
    }

    /// Drop every push, job and count. Invalidates in-flight fetches.
    pub fn clear(&mut self) {
        self.pushes.clear();
        self.job_index.clear();
        self.oldest_push_timestamp = None;
        self.revision_tips.clear();
        self.counts = UnclassifiedCounts::default();
        self.loading = false;
        self.generation += 1;
    }

    /// Write a new push range into the URL, replacing the old one.
    pub fn set_range(&mut self, range: &PushRange) {
        for (key, _) in range.entries() {
            self.url.remove(key);
        }
        for (key, value) in range.entries() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                self.url.set(key, value);
            }
        }
    }

    /// Narrow the collection to the push for `revision` if it is loaded.
    pub fn retain_revision(&mut self, revision: &str) -> bool {
        if !self.pushes.iter().any(|push| push.revision == revision) {
            return false;
        }
        self.pushes.retain(|push| push.revision == revision);
        self.job_index = self
            .pushes
            .iter()
            .flat_map(|push| push.jobs.iter().map(move |job| (job.id, push.id)))
            .collect();
        self.oldest_push_timestamp = self.pushes.first().map(|push| push.push_timestamp);
        self.revision_tips = self.pushes.iter().map(RevisionTip::from).collect();
        self.generation += 1;
        self.recompute_counts();
        true
    }

    /// Adjust the URL before fetching an older page: a single revision
    /// becomes the upper bound and date bounds are dropped.
    pub fn prepare_older_page(&mut self) {
        if let Some(revision) = self.url.get(url_state::REVISION).map(str::to_string) {
            self.url.remove(url_state::REVISION);
            self.url.set(url_state::TO_CHANGE, revision);
        }
        self.url.remove(url_state::START_DATE);
    }

    /// Record the oldest loaded revision as the range's lower bound.
    pub fn record_oldest_revision(&mut self) {
        if let Some(oldest) = self.pushes.last().map(|push| push.revision.clone()) {
            self.url.set(url_state::FROM_CHANGE, oldest);
        }
    }

    /// Parameters for the next older page.
    pub fn older_page_params(&self, count: usize) -> PushFetchParams {
        let keys: Vec<&str> = PUSH_FETCH_KEYS
            .iter()
            .copied()
            .filter(|key| *key != url_state::FROM_CHANGE && *key != url_state::TO_CHANGE)
            .chain([url_state::AUTHOR])
            .collect();
        let mut params = self.fetch_params(&keys, count);
        params.push_timestamp_lte = self.oldest_push_timestamp;
        params
    }

    /// Cutoff for the incremental job poll.
    pub fn last_modified_cutoff(&self) -> Option<NaiveDateTime> {
        self.all_jobs()
            .filter_map(|job| job.last_modified.as_deref())
            .filter_map(|raw| NaiveDateTime::parse_from_str(raw, LAST_MODIFIED_FORMAT).ok())
            .max()
            .map(|newest| newest - TimeDelta::seconds(NEW_JOBS_OVERLAP_SECS))
    }

    /// The completed decision task of a push, if loaded.
    pub fn decision_task(&self, push_id: i64) -> Option<&Job> {
        self.push(push_id)?.jobs.iter().find(|job| {
            job.platform == DECISION_PLATFORM
                && job.job_state() == Some(JobState::Completed)
                && job.job_type_symbol == DECISION_SYMBOL
        })
    }

    /// Attach manifest test paths and re-run the merge over the push.
    pub fn set_test_paths(
        &mut self,
        push_id: i64,
        paths: HashMap<String, Vec<String>>,
        now: i64,
    ) -> Option<MergeOutcome> {
        let selected = self.selection.current();
        let push = self.pushes.iter_mut().find(|push| push.id == push_id)?;
        push.test_paths_by_type = Some(paths);
        let outcome = merge::remerge(push, now);
        apply_visibility(push, self.filter.as_ref(), selected);
        Some(outcome)
    }

    /// Merge runnable jobs into a push and show them.
    pub fn show_runnable(&mut self, push_id: i64, jobs: Vec<Job>, now: i64) -> Option<MergeOutcome> {
        let push = self.pushes.iter_mut().find(|push| push.id == push_id)?;
        push.runnable_visible = true;
        let stale: Vec<i64> = push
            .jobs
            .iter()
            .filter(|job| job.is_runnable())
            .map(|job| job.id)
            .collect();
        merge::remove_jobs(push, Job::is_runnable);
        for id in stale {
            self.job_index.remove(&id);
        }
        self.merge_jobs(push_id, prepare_runnable_jobs(push_id, jobs), now)
    }

    /// Remove a push's runnable jobs. Returns how many were removed.
    pub fn hide_runnable(&mut self, push_id: i64) -> Option<usize> {
        let selected = self.selection.current();
        let push = self.pushes.iter_mut().find(|push| push.id == push_id)?;
        push.runnable_visible = false;
        push.selected_runnable.clear();
        let removed_ids: Vec<i64> = push
            .jobs
            .iter()
            .filter(|job| job.is_runnable())
            .map(|job| job.id)
            .collect();
        merge::remove_jobs(push, Job::is_runnable);
        apply_visibility(push, self.filter.as_ref(), selected);
        for id in &removed_ids {
            self.job_index.remove(id);
        }

        if selected.is_some_and(|id| removed_ids.contains(&id)) {
            self.clear_selection();
        }
        self.recompute_counts();
        Some(removed_ids.len())
    }

    pub fn is_collapsed(&self, push_id: i64) -> bool {
        self.url.collapsed_pushes().contains(&push_id)
    }

    /// Flip a push between collapsed and expanded. Returns the new state.
    pub fn toggle_collapsed(&mut self, push_id: i64) -> bool {
        let mut collapsed = self.url.collapsed_pushes();
        let now_collapsed = match collapsed.iter().position(|id| *id == push_id) {
            Some(pos) => {
                collapsed.remove(pos);
                false
            }
            None => {
                collapsed.push(push_id);
                true
            }
        };
        self.url.set_collapsed_pushes(&collapsed);
        now_collapsed
    }

    pub fn push_view(&self, push_id: i64) -> Option<PushView> {
        let collapsed = self.url.collapsed_pushes();
        self.push(push_id)
            .map(|push| self.render_push(push, collapsed.contains(&push.id)))
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let collapsed = self.url.collapsed_pushes();
        BoardSnapshot {
            repo: self.repo.clone(),
            query: self.url.to_query_string(),
            pushes: self
                .pushes
                .iter()
                .map(|push| self.render_push(push, collapsed.contains(&push.id)))
                .collect(),
            counts: self.counts,
            revision_tips: self.revision_tips.clone(),
            oldest_push_timestamp: self.oldest_push_timestamp,
            all_jobs_loaded: self.all_jobs_loaded(),
            loading: self.loading,
            selected_job_id: self.selected_job_id(),
            pinned_job_ids: self.pins.job_ids().to_vec(),
        }
    }

    fn render_push(&self, push: &Push, collapsed: bool) -> PushView {
        let expanded = self.url.get(GROUP_STATE) == Some("expanded");
        let selected_task_run = self.url.selected_task_run();

        let platforms = if collapsed {
            Vec::new()
        } else {
            push.platforms
                .iter()
                .filter(|platform| platform.visible)
                .map(|platform| PlatformView {
                    name: platform.name.clone(),
                    option: platform.option.clone(),
                    title: platform.title.clone(),
                    groups: platform
                        .groups
                        .iter()
                        .filter(|group| group.visible)
                        .map(|group| {
                            let summary = summarize_group(
                                group,
                                push,
                                selected_task_run,
                                expanded,
                                self.coalesce,
                            );
                            GroupView {
                                name: group.name.clone(),
                                symbol: group.symbol.clone(),
                                tier: group.tier,
                                map_key: group.map_key.clone(),
                                buttons: summary
                                    .buttons
                                    .iter()
                                    .filter_map(|id| push.job(*id).cloned())
                                    .collect(),
                                counts: summary.counts,
                            }
                        })
                        .collect(),
                })
                .collect()
        };

        PushView {
            id: push.id,
            revision: push.revision.clone(),
            author: push.author.clone(),
            push_timestamp: push.push_timestamp,
            title: push.title(),
            revisions: push.revisions.clone(),
            collapsed,
            jobs_loaded: push.jobs_loaded,
            runnable_visible: push.runnable_visible,
            selected_runnable: push.selected_runnable.clone(),
            job_counts: push.job_counts,
            platforms,
        }
    }
}

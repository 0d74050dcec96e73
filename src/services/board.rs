//! Async orchestration of the push collection.
//!
//! Fetches run without holding the state lock. Results are applied under a
//! write lock, and only if the collection's generation is still the one
//! the fetch started under. A failed fetch leaves the state untouched and
//! raises a notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::event_broadcaster::EventBroadcaster;
use super::filter::FilterAction;
use super::group_summary::CoalesceRule;
use super::merge::MergeOutcome;
use super::notifier::Notifier;
use super::selection::{ClickAction, ClickOutcome, Direction, SelectionChange};
use super::store::BoardState;
use super::upstream::{PushSource, RunnableQuery};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::url_state::{self, PUSH_FETCH_KEYS, PUSH_POLLING_KEYS};
use crate::models::{BoardEvent, BoardSnapshot, Job, PushRange, PushView, Severity};

pub const FETCH_ERROR_MESSAGE: &str = "Error retrieving push data!";
pub const NO_JOBS_MESSAGE: &str = "No jobs to select";

/// Board-wide settings taken from the server configuration.
#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub repo: String,
    /// Page size for the first load and for loading older pushes
    pub push_count: usize,
    /// Page size when the range has a lower bound, and for polls
    pub max_push_count: usize,
    /// Results service base URL, used for log viewer links
    pub upstream_url: String,
    pub coalesce: CoalesceRule,
}

impl BoardSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repo: config.repo.clone(),
            push_count: config.push_count,
            max_push_count: config.max_push_count,
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            coalesce: CoalesceRule {
                duplicate_jobs_visible: config.duplicate_jobs_visible,
                keep_selected_expanded: config.keep_selected_expanded,
            },
        }
    }
}

/// What a poll brought in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PollOutcome {
    pub pushes_added: Vec<i64>,
    pub jobs_merged: usize,
}

/// Clears the in-flight flag when the poll ends, however it ends.
struct PollGuard<'a>(&'a AtomicBool);

impl<'a> PollGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// The live board: state, its upstream source and its subscribers.
pub struct Board {
    state: RwLock<BoardState>,
    source: Arc<dyn PushSource>,
    broadcaster: EventBroadcaster,
    notifier: Notifier,
    settings: BoardSettings,
    polling: AtomicBool,
}

impl Board {
    /// Create a board whose URL state starts from `query`.
    pub fn new(
        query: &str,
        settings: BoardSettings,
        source: Arc<dyn PushSource>,
        broadcaster: EventBroadcaster,
    ) -> Self {
        let state = BoardState::new(query, &settings.repo, settings.coalesce);
        Self {
            state: RwLock::new(state),
            source,
            notifier: Notifier::new(broadcaster.clone()),
            broadcaster,
            settings,
            polling: AtomicBool::new(false),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    /// Read access to the raw state.
    pub async fn state(&self) -> RwLockReadGuard<'_, BoardState> {
        self.state.read().await
    }

    fn report_fetch_error(&self, err: &AppError) {
        warn!(error = %err, "Fetch from results service failed");
        self.notifier.notify(FETCH_ERROR_MESSAGE, Severity::Danger);
    }

    fn page_size(&self, state: &BoardState) -> usize {
        if state.url().has(url_state::FROM_CHANGE) {
            self.settings.max_push_count
        } else {
            self.settings.push_count
        }
    }

    /// Load the newest page of pushes for the current range, then their jobs.
    pub async fn initial_load(&self) -> AppResult<Vec<i64>> {
        let (repo, params, generation) = {
            let mut state = self.state.write().await;
            state.set_loading(true);
            let keys: Vec<&str> = PUSH_FETCH_KEYS
                .iter()
                .copied()
                .chain([url_state::REVISION, url_state::AUTHOR])
                .collect();
            let params = state.fetch_params(&keys, self.page_size(&state));
            (state.repo().to_string(), params, state.generation())
        };

        let result = self.source.fetch_pushes(&repo, &params).await;

        let added = {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                debug!(generation, "Discarding pushes fetched for a replaced range");
                return Ok(Vec::new());
            }
            state.set_loading(false);
            match result {
                Ok(page) => state.add_pushes(page),
                Err(err) => {
                    drop(state);
                    self.report_fetch_error(&err);
                    return Err(err);
                }
            }
        };

        info!(repo = %repo, pushes = added.len(), "Loaded pushes");
        if !added.is_empty() {
            self.broadcaster.send(BoardEvent::pushes_added(added.clone()));
            self.load_jobs(&added, generation).await?;
        }
        Ok(added)
    }

    /// Fetch the full job list of each push concurrently and merge them.
    ///
    /// A push whose fetch fails keeps its previous jobs.
    pub async fn load_jobs(&self, push_ids: &[i64], generation: u64) -> AppResult<usize> {
        let fetches = push_ids.iter().map(|push_id| async move {
            (*push_id, self.source.fetch_jobs_for_push(*push_id).await)
        });
        let results = join_all(fetches).await;

        let mut events = Vec::new();
        let mut merged = 0;
        let mut first_error = None;
        let counts = {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                debug!(generation, "Discarding jobs fetched for a replaced range");
                return Ok(0);
            }
            let now = now();
            for (push_id, result) in results {
                match result {
                    Ok(jobs) => {
                        if let Some(outcome) = state.merge_jobs(push_id, jobs, now) {
                            merged += outcome.added + outcome.replaced;
                            events.push(BoardEvent::jobs_merged(
                                push_id,
                                outcome.added,
                                outcome.replaced,
                            ));
                        }
                    }
                    Err(err) => {
                        warn!(push_id, error = %err, "Failed to load jobs");
                        first_error.get_or_insert(err);
                    }
                }
            }
            state.counts()
        };

        for event in events {
            self.broadcaster.send(event);
        }
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));

        match first_error {
            Some(err) => {
                self.report_fetch_error(&err);
                Err(err)
            }
            None => Ok(merged),
        }
    }

    /// Pick up pushes newer than the newest one loaded and jobs modified
    /// since the last poll. Fails with `Conflict` while another poll runs.
    pub async fn poll(&self) -> AppResult<PollOutcome> {
        let _guard = PollGuard::acquire(&self.polling)
            .ok_or_else(|| AppError::Conflict("A poll is already in flight".to_string()))?;

        let (repo, params, generation, jobs_only, push_ids, since) = {
            let state = self.state.read().await;
            let jobs_only = state.url().is_single_revision() && state.pushes().len() == 1;
            let mut params = state.fetch_params(PUSH_POLLING_KEYS, self.settings.max_push_count);
            params.fromchange = state.newest_revision().map(str::to_string);
            let push_ids: Vec<i64> = state.pushes().iter().map(|push| push.id).collect();
            (
                state.repo().to_string(),
                params,
                state.generation(),
                jobs_only,
                push_ids,
                state.last_modified_cutoff(),
            )
        };

        let mut outcome = PollOutcome::default();

        if !jobs_only && params.fromchange.is_some() {
            let page = self
                .source
                .fetch_pushes(&repo, &params)
                .await
                .inspect_err(|err| self.report_fetch_error(err))?;
            {
                let mut state = self.state.write().await;
                if state.generation() != generation {
                    debug!(generation, "Discarding poll for a replaced range");
                    return Ok(outcome);
                }
                outcome.pushes_added = state.add_pushes(page);
            }
            if !outcome.pushes_added.is_empty() {
                info!(pushes = outcome.pushes_added.len(), "Poll found new pushes");
                self.broadcaster
                    .send(BoardEvent::pushes_added(outcome.pushes_added.clone()));
                outcome.jobs_merged += self.load_jobs(&outcome.pushes_added, generation).await?;
            }
        }

        if let Some(since) = since
            && !push_ids.is_empty()
        {
            let jobs = self
                .source
                .fetch_new_jobs(&push_ids, since)
                .await
                .inspect_err(|err| self.report_fetch_error(err))?;
            outcome.jobs_merged += self.apply_polled_jobs(jobs, generation).await;
        }

        Ok(outcome)
    }

    async fn apply_polled_jobs(&self, jobs: Vec<Job>, generation: u64) -> usize {
        if jobs.is_empty() {
            return 0;
        }

        let (outcomes, counts, reselected) = {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                debug!(generation, "Discarding polled jobs for a replaced range");
                return 0;
            }
            let refreshed_selection = state.url().selected_task_run().and_then(|run| {
                jobs.iter()
                    .find(|job| job.task_run_key().as_deref() == Some(run))
                    .map(|job| job.id)
            });

            let outcomes = state.merge_job_batch(jobs, now());
            let reselected = match refreshed_selection {
                Some(job_id) if state.selected_job_id() != Some(job_id) => {
                    let change = state.select_job(job_id);
                    state.reconcile_selection();
                    Some(change)
                }
                _ => None,
            };
            (outcomes, state.counts(), reselected)
        };

        let mut merged = 0;
        for (push_id, outcome) in outcomes {
            merged += outcome.added + outcome.replaced;
            self.broadcaster.send(BoardEvent::jobs_merged(
                push_id,
                outcome.added,
                outcome.replaced,
            ));
        }
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        if let Some(change) = reselected {
            self.broadcaster
                .send(BoardEvent::selection_changed(change.current));
        }
        merged
    }

    /// Load the page of pushes older than the oldest one loaded.
    pub async fn fetch_next(&self, count: Option<usize>) -> AppResult<Vec<i64>> {
        let count = count.unwrap_or(self.settings.push_count);
        let (repo, params, generation) = {
            let mut state = self.state.write().await;
            state.set_loading(true);
            state.prepare_older_page();
            (
                state.repo().to_string(),
                state.older_page_params(count),
                state.generation(),
            )
        };

        let result = self.source.fetch_pushes(&repo, &params).await;

        let added = {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                debug!(generation, "Discarding older page for a replaced range");
                return Ok(Vec::new());
            }
            state.set_loading(false);
            match result {
                Ok(page) => {
                    let added = state.add_pushes(page);
                    state.record_oldest_revision();
                    added
                }
                Err(err) => {
                    drop(state);
                    self.report_fetch_error(&err);
                    return Err(err);
                }
            }
        };

        info!(pushes = added.len(), "Loaded older pushes");
        if !added.is_empty() {
            self.broadcaster.send(BoardEvent::pushes_added(added.clone()));
            self.load_jobs(&added, generation).await?;
        }
        Ok(added)
    }

    /// Replace the push range and reload.
    ///
    /// A `revision` that is already loaded keeps that push and its jobs.
    pub async fn replace_range(&self, range: PushRange) -> AppResult<Vec<i64>> {
        if range.is_empty() {
            return Err(AppError::InvalidInput(
                "A revision or a from/to range is required".to_string(),
            ));
        }

        let (kept, query, counts, had_selection) = {
            let mut state = self.state.write().await;
            let had_selection = state.selected_job_id().is_some();
            state.clear_selection();
            state.set_range(&range);
            let kept = range
                .revision
                .as_deref()
                .filter(|revision| !revision.is_empty())
                .is_some_and(|revision| state.retain_revision(revision));
            if !kept {
                state.clear();
            }
            (
                kept,
                state.url().to_query_string(),
                state.counts(),
                had_selection,
            )
        };

        info!(query = %query, kept, "Replaced push range");
        self.broadcaster.send(BoardEvent::range_reset(query));
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        if had_selection {
            self.broadcaster.send(BoardEvent::selection_changed(None));
        }

        if kept {
            let state = self.state.read().await;
            return Ok(state.pushes().iter().map(|push| push.id).collect());
        }
        self.initial_load().await
    }

    /// Replace the filter parameters. Returns the new board query string.
    pub async fn apply_filter_query(&self, query: &str) -> String {
        let (query, counts) = {
            let mut state = self.state.write().await;
            state.set_filter_query(query);
            (state.url().to_query_string(), state.counts())
        };
        debug!(query = %query, "Filters updated");
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        query
    }

    /// Apply one filter action. Returns the new board query string.
    pub async fn apply_filter_action(&self, action: &FilterAction) -> String {
        let (query, counts) = {
            let mut state = self.state.write().await;
            state.apply_filter_action(action);
            (state.url().to_query_string(), state.counts())
        };
        debug!(query = %query, action = ?action, "Filter action applied");
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        query
    }

    fn announce_selection(&self, change: SelectionChange) {
        if change.changed() {
            self.broadcaster
                .send(BoardEvent::selection_changed(change.current));
        }
    }

    pub async fn select_job(&self, job_id: i64) -> SelectionChange {
        let change = {
            let mut state = self.state.write().await;
            let change = state.select_job(job_id);
            state.reconcile_selection();
            change
        };
        self.announce_selection(change);
        change
    }

    /// Bring the confirmed selection in line with the URL.
    pub async fn reconcile_selection(&self) -> SelectionChange {
        let change = self.state.write().await.reconcile_selection();
        self.announce_selection(change);
        change
    }

    pub async fn clear_selection(&self) -> SelectionChange {
        let change = self.state.write().await.clear_selection();
        self.announce_selection(change);
        change
    }

    pub async fn click(&self, job_id: i64, action: ClickAction) -> AppResult<ClickOutcome> {
        let outcome = self.state.write().await.handle_click(job_id, action);
        match &outcome {
            Ok(ClickOutcome::Selected { change }) => self.announce_selection(*change),
            Err(AppError::Conflict(message)) => {
                self.notifier.notify(message.clone(), Severity::Warning)
            }
            _ => {}
        }
        outcome
    }

    /// Move the selection. Clears it and raises a notification when no
    /// job qualifies.
    pub async fn select_adjacent(
        &self,
        direction: Direction,
        unclassified_only: bool,
    ) -> Option<SelectionChange> {
        let (change, previous) = {
            let mut state = self.state.write().await;
            let previous = state.selected_job_id();
            (state.select_adjacent(direction, unclassified_only), previous)
        };
        match change {
            Some(change) => self.announce_selection(change),
            None => {
                self.notifier.notify(NO_JOBS_MESSAGE, Severity::Warning);
                self.announce_selection(SelectionChange {
                    previous,
                    current: None,
                });
            }
        }
        change
    }

    pub async fn toggle_pin(&self, job_id: i64) -> AppResult<bool> {
        let result = self.state.write().await.toggle_pin(job_id);
        if let Err(AppError::Conflict(message)) = &result {
            self.notifier.notify(message.clone(), Severity::Warning);
        }
        result
    }

    pub async fn clear_pins(&self) -> usize {
        let cleared = self.state.write().await.clear_pins();
        debug!(cleared, "Pinboard cleared");
        cleared
    }

    /// Fetch and show the runnable jobs of a push.
    pub async fn show_runnable(&self, push_id: i64) -> AppResult<MergeOutcome> {
        let (repo, revision, decision_task_id, generation) = {
            let state = self.state.read().await;
            let push = state
                .push(push_id)
                .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))?;
            let decision_task_id = state
                .decision_task(push_id)
                .and_then(|job| job.task_id.clone());
            (
                state.repo().to_string(),
                push.revision.clone(),
                decision_task_id,
                state.generation(),
            )
        };

        let query = RunnableQuery {
            push_id,
            revision: &revision,
            decision_task_id: decision_task_id.as_deref(),
        };
        let jobs = self
            .source
            .fetch_runnable_jobs(&repo, query)
            .await
            .inspect_err(|err| self.report_fetch_error(err))?;

        let (outcome, counts) = {
            let mut state = self.state.write().await;
            if state.generation() != generation {
                return Err(AppError::Conflict(
                    "The push range changed while loading runnable jobs".to_string(),
                ));
            }
            let outcome = state
                .show_runnable(push_id, jobs, now())
                .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))?;
            (outcome, state.counts())
        };

        debug!(push_id, runnable = outcome.added, "Showing runnable jobs");
        self.broadcaster.send(BoardEvent::jobs_merged(
            push_id,
            outcome.added,
            outcome.replaced,
        ));
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        Ok(outcome)
    }

    pub async fn hide_runnable(&self, push_id: i64) -> AppResult<usize> {
        let (removed, counts, selection) = {
            let mut state = self.state.write().await;
            let previous = state.selected_job_id();
            let removed = state
                .hide_runnable(push_id)
                .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))?;
            let change = SelectionChange {
                previous,
                current: state.selected_job_id(),
            };
            (removed, state.counts(), change)
        };
        self.broadcaster.send(BoardEvent::CountsUpdated(counts));
        self.announce_selection(selection);
        Ok(removed)
    }

    /// Flip a push between collapsed and expanded.
    pub async fn toggle_collapsed(&self, push_id: i64) -> bool {
        self.state.write().await.toggle_collapsed(push_id)
    }

    /// Attach manifest test paths to a push's jobs.
    pub async fn set_test_paths(
        &self,
        push_id: i64,
        paths: HashMap<String, Vec<String>>,
    ) -> AppResult<MergeOutcome> {
        self.state
            .write()
            .await
            .set_test_paths(push_id, paths, now())
            .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))
    }

    /// Reconcile the selection from the URL and render the board.
    pub async fn snapshot(&self) -> BoardSnapshot {
        let mut state = self.state.write().await;
        state.reconcile_selection();
        state.snapshot()
    }

    pub async fn push_view(&self, push_id: i64) -> AppResult<PushView> {
        let mut state = self.state.write().await;
        state.reconcile_selection();
        state
            .push_view(push_id)
            .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))
    }

    /// Log viewer link for a job.
    pub async fn log_viewer_url(&self, job_id: i64) -> AppResult<String> {
        let state = self.state.read().await;
        if state.job(job_id).is_none() {
            return Err(AppError::NotFound(format!("Job {}", job_id)));
        }
        Ok(format!(
            "{}/logviewer?job_id={}&repo={}",
            self.settings.upstream_url,
            job_id,
            urlencoding::encode(state.repo())
        ))
    }
}

//! Job selection, pinning and keyboard navigation.
//!
//! Selection has two phases. A user action records the intent, writes the
//! URL and flips the job flags right away. `reconcile_selection` then reads
//! the URL back and makes the confirmed selection match it. Reconciling is
//! idempotent, so calling it on every read is safe.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::store::BoardState;
use super::visibility::apply_visibility;
use crate::error::{AppError, AppResult};

/// Pinboard capacity.
pub const MAX_PINNED_JOBS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Set by user action, ahead of the URL round trip
    pub(crate) intent: Option<i64>,
    /// Last selection read back from the URL
    pub(crate) confirmed: Option<i64>,
}

impl SelectionState {
    pub fn current(&self) -> Option<i64> {
        self.intent.or(self.confirmed)
    }
}

/// Result of a selection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SelectionChange {
    pub previous: Option<i64>,
    pub current: Option<i64>,
}

impl SelectionChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

/// How a job button was clicked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    /// Plain left click
    #[default]
    Select,
    /// Middle click, opens the log viewer
    Open,
    /// Ctrl/Cmd click, toggles the pinboard
    Pin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Selected { change: SelectionChange },
    OpenLogViewer { job_id: i64 },
    PinToggled { job_id: i64, pinned: bool },
    RunnableToggled { push_id: i64, signature: String, selected: bool },
}

/// Jobs pinned for bulk classification, in pin order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinBoard {
    jobs: Vec<i64>,
}

impl PinBoard {
    pub fn job_ids(&self) -> &[i64] {
        &self.jobs
    }

    pub fn is_pinned(&self, job_id: i64) -> bool {
        self.jobs.contains(&job_id)
    }

    /// Pin or unpin. Returns whether the job is pinned afterwards.
    pub fn toggle(&mut self, job_id: i64) -> AppResult<bool> {
        if self.is_pinned(job_id) {
            self.jobs.retain(|id| *id != job_id);
            return Ok(false);
        }
        if self.jobs.len() >= MAX_PINNED_JOBS {
            return Err(AppError::Conflict(format!(
                "Max pinboard size of {} reached.",
                MAX_PINNED_JOBS
            )));
        }
        self.jobs.push(job_id);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

impl BoardState {
    /// Select a job. Re-selecting the current job changes nothing.
    pub fn select_job(&mut self, job_id: i64) -> SelectionChange {
        let previous = self.selection.current();
        let already_selected = self.selection.intent == Some(job_id)
            && self.job(job_id).is_some_and(|job| job.selected);
        if already_selected {
            return SelectionChange {
                previous,
                current: previous,
            };
        }

        let task_run = self.job(job_id).and_then(|job| job.task_run.clone());
        self.url.set_selection(Some(job_id), task_run.as_deref());

        let mut touched: Vec<i64> = [previous, self.selection.confirmed, Some(job_id)]
            .into_iter()
            .flatten()
            .filter_map(|id| self.job_index.get(&id).copied())
            .collect();
        touched.dedup();
        self.selection.intent = Some(job_id);
        self.refresh_pushes(&touched);

        SelectionChange {
            previous,
            current: Some(job_id),
        }
    }

    /// Clear the selection from both the URL and the job flags.
    pub fn clear_selection(&mut self) -> SelectionChange {
        let previous = self.selection.current();
        self.url.set_selection(None, None);
        self.selection.intent = None;
        let change = self.reconcile_selection();
        SelectionChange {
            previous,
            current: change.current,
        }
    }

    /// Make the confirmed selection match the URL.
    ///
    /// An id in the URL that matches no loaded job stays in the URL but
    /// flags nothing and is not reported as selected. A URL naming only a task run resolves to the loaded
    /// job with that run.
    pub fn reconcile_selection(&mut self) -> SelectionChange {
        let resolved = match self.url.selected_job() {
            Some(_) => None,
            None => self.url.selected_task_run().and_then(|run| {
                self.all_jobs()
                    .find(|job| job.task_run.as_deref() == Some(run))
                    .map(|job| (job.id, run.to_string()))
            }),
        };
        if let Some((job_id, run)) = resolved {
            self.url.set_selection(Some(job_id), Some(&run));
        }

        let previous = self.selection.confirmed;
        let url_selected = self.url.selected_job();
        let settled = self.selection.confirmed == url_selected && self.selection.intent == url_selected;
        self.selection = SelectionState {
            intent: url_selected,
            confirmed: url_selected,
        };
        if !settled {
            self.recompute_visibility();
        }

        SelectionChange {
            previous,
            current: url_selected,
        }
    }

    /// Handle a click on a job button.
    pub fn handle_click(&mut self, job_id: i64, action: ClickAction) -> AppResult<ClickOutcome> {
        let job = self
            .job(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {}", job_id)))?;

        if job.is_runnable() {
            let push_id = job.push_id;
            let signature = job.signature.clone().unwrap_or_default();
            let selected = self.toggle_runnable(push_id, &signature)?;
            return Ok(ClickOutcome::RunnableToggled {
                push_id,
                signature,
                selected,
            });
        }

        match action {
            ClickAction::Open => Ok(ClickOutcome::OpenLogViewer { job_id }),
            ClickAction::Pin => {
                let pinned = self.pins.toggle(job_id)?;
                Ok(ClickOutcome::PinToggled { job_id, pinned })
            }
            ClickAction::Select => {
                let change = self.select_job(job_id);
                self.reconcile_selection();
                Ok(ClickOutcome::Selected { change })
            }
        }
    }

    pub fn toggle_pin(&mut self, job_id: i64) -> AppResult<bool> {
        if self.job(job_id).is_none() {
            return Err(AppError::NotFound(format!("Job {}", job_id)));
        }
        self.pins.toggle(job_id)
    }

    /// Unpin everything. Returns how many jobs were pinned.
    pub fn clear_pins(&mut self) -> usize {
        let cleared = self.pins.job_ids().len();
        self.pins.clear();
        cleared
    }

    /// Toggle a runnable signature for scheduling. Returns whether it is
    /// selected afterwards.
    pub fn toggle_runnable(&mut self, push_id: i64, signature: &str) -> AppResult<bool> {
        let push = self
            .pushes
            .iter_mut()
            .find(|push| push.id == push_id)
            .ok_or_else(|| AppError::NotFound(format!("Push {}", push_id)))?;

        match push.selected_runnable.binary_search_by(|s| s.as_str().cmp(signature)) {
            Ok(pos) => {
                push.selected_runnable.remove(pos);
                Ok(false)
            }
            Err(pos) => {
                push.selected_runnable.insert(pos, signature.to_string());
                Ok(true)
            }
        }
    }

    /// Move the selection to the next or previous visible job, wrapping at
    /// either end. Collapsed pushes are skipped. With `unclassified_only`
    /// only unclassified failures are candidates.
    ///
    /// Clears the selection and returns `None` when there is nothing else
    /// to move to.
    pub fn select_adjacent(
        &mut self,
        direction: Direction,
        unclassified_only: bool,
    ) -> Option<SelectionChange> {
        let current = self.selection.current();
        let collapsed = self.url.collapsed_pushes();

        let candidates: Vec<i64> = self
            .pushes
            .iter()
            .filter(|push| !collapsed.contains(&push.id))
            .flat_map(|push| {
                push.platforms
                    .iter()
                    .flat_map(|platform| platform.groups.iter())
                    .flat_map(|group| group.jobs.iter())
                    .filter_map(move |id| push.job(*id))
            })
            .filter(|job| {
                Some(job.id) == current
                    || (job.visible && (!unclassified_only || job.is_unclassified_failure()))
            })
            .map(|job| job.id)
            .collect();

        let selected_idx = current.and_then(|id| candidates.iter().position(|c| *c == id));
        let target_idx = match (direction, selected_idx) {
            (_, _) if candidates.is_empty() => None,
            (Direction::Next, Some(idx)) => Some((idx + 1) % candidates.len()),
            (Direction::Next, None) => Some(0),
            (Direction::Previous, Some(0)) | (Direction::Previous, None) => {
                Some(candidates.len() - 1)
            }
            (Direction::Previous, Some(idx)) => Some(idx - 1),
        };

        match target_idx {
            Some(idx) if Some(idx) != selected_idx => {
                let change = self.select_job(candidates[idx]);
                self.reconcile_selection();
                Some(change)
            }
            _ => {
                self.clear_selection();
                None
            }
        }
    }

    fn refresh_pushes(&mut self, push_ids: &[i64]) {
        let selected = self.selection.current();
        for push in self.pushes.iter_mut().filter(|push| push_ids.contains(&push.id)) {
            apply_visibility(push, self.filter.as_ref(), selected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Push, PushPage};
    use crate::services::group_summary::CoalesceRule;

    fn job(id: i64, push_id: i64, result: &str, symbol: &str) -> Job {
        Job {
            id,
            push_id,
            state: "completed".into(),
            result: result.into(),
            platform: "linux64".into(),
            platform_option: "opt".into(),
            job_type_name: format!("test-{}", symbol),
            job_type_symbol: symbol.into(),
            task_id: Some(format!("task{}", id)),
            ..Default::default()
        }
    }

    fn loaded_board() -> BoardState {
        let mut board = BoardState::new("repo=autoland", "autoland", CoalesceRule::default());
        board.add_pushes(PushPage::from_pushes(vec![
            Push::new(2, "newer", 200),
            Push::new(1, "older", 100),
        ]));
        board.merge_jobs(
            2,
            vec![
                job(20, 2, "success", "A"),
                job(21, 2, "testfailed", "B"),
                job(22, 2, "superseded", "C"),
            ],
            0,
        );
        board.merge_jobs(
            1,
            vec![job(10, 1, "busted", "A"), job(11, 1, "success", "B")],
            0,
        );
        board
    }

    fn selected_flags(board: &BoardState) -> Vec<i64> {
        board.all_jobs().filter(|job| job.selected).map(|job| job.id).collect()
    }

    #[test]
    fn test_at_most_one_job_selected() {
        let mut board = loaded_board();
        board.select_job(20);
        board.reconcile_selection();
        board.select_job(11);
        board.reconcile_selection();

        assert_eq!(selected_flags(&board), vec![11]);
        assert_eq!(board.selected_job_id(), Some(11));
        assert_eq!(board.url().selected_job(), Some(11));
        assert_eq!(board.url().selected_task_run(), Some("task11.0"));
    }

    #[test]
    fn test_reselect_is_a_no_op() {
        let mut board = loaded_board();
        board.select_job(21);
        board.reconcile_selection();
        let query = board.url().to_query_string();

        let change = board.select_job(21);
        assert!(!change.changed());
        assert_eq!(board.url().to_query_string(), query);
        assert_eq!(selected_flags(&board), vec![21]);
    }

    #[test]
    fn test_optimistic_flags_before_reconcile() {
        let mut board = loaded_board();
        board.select_job(20);
        assert_eq!(board.selection.intent, Some(20));
        assert_eq!(board.selection.confirmed, None);
        assert_eq!(selected_flags(&board), vec![20]);

        let change = board.reconcile_selection();
        assert_eq!(change.current, Some(20));
        assert_eq!(board.selection.confirmed, Some(20));

        let again = board.reconcile_selection();
        assert_eq!(again.previous, again.current);
    }

    #[test]
    fn test_selection_forces_filtered_job_visible() {
        let mut board = loaded_board();
        let job = board.job(22).unwrap();
        assert!(!job.visible);

        board.select_job(22);
        board.reconcile_selection();
        assert!(board.job(22).is_some_and(|job| job.visible && job.selected));

        board.clear_selection();
        assert!(board.job(22).is_some_and(|job| !job.visible && !job.selected));
        assert_eq!(board.selected_job_id(), None);
    }

    #[test]
    fn test_unknown_url_selection_flags_nothing() {
        let mut board = BoardState::new(
            "repo=autoland&selectedJob=999",
            "autoland",
            CoalesceRule::default(),
        );
        board.add_pushes(PushPage::from_pushes(vec![Push::new(1, "older", 100)]));
        board.merge_jobs(1, vec![job(10, 1, "success", "A")], 0);

        board.reconcile_selection();
        assert!(selected_flags(&board).is_empty());
        assert_eq!(board.selected_job_id(), None);
        assert_eq!(board.snapshot().selected_job_id, None);
        assert_eq!(board.url().selected_job(), Some(999));
        assert!(board.snapshot().query.contains("selectedJob=999"));

        // Becomes the selection once the job arrives.
        board.merge_jobs(1, vec![job(999, 1, "testfailed", "B")], 0);
        board.reconcile_selection();
        assert_eq!(board.selected_job_id(), Some(999));
        assert_eq!(selected_flags(&board), vec![999]);
    }

    #[test]
    fn test_task_run_in_url_resolves_to_job() {
        let mut board = BoardState::new(
            "repo=autoland&selectedTaskRun=task10.0",
            "autoland",
            CoalesceRule::default(),
        );
        board.add_pushes(PushPage::from_pushes(vec![Push::new(1, "older", 100)]));
        board.merge_jobs(1, vec![job(10, 1, "success", "A")], 0);

        board.reconcile_selection();
        assert_eq!(board.selected_job_id(), Some(10));
        assert_eq!(selected_flags(&board), vec![10]);
    }

    #[test]
    fn test_task_run_resolves_only_without_job_id() {
        let mut board = BoardState::new(
            "repo=autoland&selectedTaskRun=task20.0",
            "autoland",
            CoalesceRule::default(),
        );
        board.add_pushes(PushPage::from_pushes(vec![Push::new(1, "older", 100)]));
        board.reconcile_selection();
        assert_eq!(board.selected_job_id(), None);
        assert_eq!(board.url().selected_task_run(), Some("task20.0"));

        board.merge_jobs(1, vec![job(10, 1, "success", "A"), job(20, 1, "busted", "B")], 0);
        board.reconcile_selection();
        assert_eq!(board.url().selected_job(), Some(20));
        assert_eq!(selected_flags(&board), vec![20]);

        let mut named = BoardState::new(
            "repo=autoland&selectedJob=10&selectedTaskRun=task20.0",
            "autoland",
            CoalesceRule::default(),
        );
        named.add_pushes(PushPage::from_pushes(vec![Push::new(1, "older", 100)]));
        named.merge_jobs(1, vec![job(10, 1, "success", "A"), job(20, 1, "busted", "B")], 0);
        named.reconcile_selection();
        assert_eq!(named.selected_job_id(), Some(10));
        assert_eq!(selected_flags(&named), vec![10]);
    }

    #[test]
    fn test_select_adjacent_walks_and_wraps() {
        let mut board = loaded_board();
        // Visible order: push 2 (20, 21), push 1 (10, 11); 22 is filtered out.
        let first = board.select_adjacent(Direction::Next, false).unwrap();
        assert_eq!(first.current, Some(20));
        board.select_adjacent(Direction::Next, false);
        board.select_adjacent(Direction::Next, false);
        board.select_adjacent(Direction::Next, false);
        assert_eq!(board.selected_job_id(), Some(11));

        let wrapped = board.select_adjacent(Direction::Next, false).unwrap();
        assert_eq!(wrapped.current, Some(20));

        let back = board.select_adjacent(Direction::Previous, false).unwrap();
        assert_eq!(back.current, Some(11));
    }

    #[test]
    fn test_select_adjacent_unclassified_only() {
        let mut board = loaded_board();
        board.select_adjacent(Direction::Next, true);
        assert_eq!(board.selected_job_id(), Some(21));
        board.select_adjacent(Direction::Next, true);
        assert_eq!(board.selected_job_id(), Some(10));
    }

    #[test]
    fn test_select_adjacent_with_nothing_else_clears() {
        let mut board = BoardState::new("repo=autoland", "autoland", CoalesceRule::default());
        board.add_pushes(PushPage::from_pushes(vec![Push::new(1, "older", 100)]));
        board.merge_jobs(1, vec![job(10, 1, "testfailed", "A")], 0);

        board.select_job(10);
        board.reconcile_selection();
        assert!(board.select_adjacent(Direction::Next, true).is_none());
        assert_eq!(board.selected_job_id(), None);
        assert!(selected_flags(&board).is_empty());
    }

    #[test]
    fn test_collapsed_push_is_skipped() {
        let mut board = loaded_board();
        board.toggle_collapsed(2);
        board.select_adjacent(Direction::Next, false);
        assert_eq!(board.selected_job_id(), Some(10));
    }

    #[test]
    fn test_click_actions() {
        let mut board = loaded_board();

        let outcome = board.handle_click(21, ClickAction::Pin).unwrap();
        assert_eq!(
            outcome,
            ClickOutcome::PinToggled {
                job_id: 21,
                pinned: true
            }
        );
        assert_eq!(board.selected_job_id(), None);
        assert_eq!(board.pinned_job_ids(), &[21]);

        let outcome = board.handle_click(21, ClickAction::Open).unwrap();
        assert_eq!(outcome, ClickOutcome::OpenLogViewer { job_id: 21 });

        match board.handle_click(21, ClickAction::Select).unwrap() {
            ClickOutcome::Selected { change } => assert_eq!(change.current, Some(21)),
            other => panic!("unexpected outcome {:?}", other),
        }

        assert!(matches!(
            board.handle_click(12345, ClickAction::Select),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_pinboard_capacity() {
        let mut pins = PinBoard::default();
        for id in 0..MAX_PINNED_JOBS as i64 {
            assert!(pins.toggle(id).unwrap());
        }
        let err = pins.toggle(10_000).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: Max pinboard size of 500 reached."
        );
        assert!(!pins.toggle(0).unwrap());
        assert!(pins.toggle(10_000).unwrap());
    }

    #[test]
    fn test_clear_pins_empties_pinboard() {
        let mut board = loaded_board();
        assert!(board.toggle_pin(10).unwrap());
        assert!(board.toggle_pin(21).unwrap());
        assert_eq!(board.pinned_job_ids(), &[10, 21]);

        assert_eq!(board.clear_pins(), 2);
        assert!(board.pinned_job_ids().is_empty());
        assert_eq!(board.clear_pins(), 0);
        assert!(board.toggle_pin(10).unwrap());
    }

    #[test]
    fn test_runnable_click_toggles_signature() {
        let mut board = loaded_board();
        let runnable = Job {
            signature: Some("test-linux64/opt-reftest".into()),
            job_type_name: "test-linux64/opt-reftest".into(),
            job_type_symbol: "R".into(),
            platform: "linux64".into(),
            platform_option: "opt".into(),
            ..Default::default()
        };
        board.show_runnable(1, vec![runnable], 0);
        let runnable_id = board
            .push(1)
            .and_then(|push| push.jobs.iter().find(|job| job.is_runnable()))
            .map(|job| job.id)
            .unwrap();

        let outcome = board.handle_click(runnable_id, ClickAction::Select).unwrap();
        assert_eq!(
            outcome,
            ClickOutcome::RunnableToggled {
                push_id: 1,
                signature: "test-linux64/opt-reftest".into(),
                selected: true
            }
        );
        assert_eq!(
            board.push(1).unwrap().selected_runnable,
            vec!["test-linux64/opt-reftest".to_string()]
        );
        assert_eq!(board.selected_job_id(), None);
    }
}

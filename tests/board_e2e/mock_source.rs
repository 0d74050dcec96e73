//! Scripted in-memory results service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use pushboard_lib::error::{AppError, AppResult};
use pushboard_lib::models::{Job, Push, PushFetchParams, PushPage};
use pushboard_lib::services::{PushSource, RunnableQuery};

/// Serves whatever pushes and jobs the test put in it.
#[derive(Default)]
pub struct MockPushSource {
    pushes: Mutex<Vec<Push>>,
    jobs: Mutex<HashMap<i64, Vec<Job>>>,
    runnable: Mutex<Vec<Job>>,
    fail: AtomicBool,
    push_requests: Mutex<Vec<PushFetchParams>>,
    runnable_requests: AtomicUsize,
}

impl MockPushSource {
    pub fn new(pushes: Vec<Push>) -> Self {
        Self {
            pushes: Mutex::new(pushes),
            ..Default::default()
        }
    }

    pub fn set_pushes(&self, pushes: Vec<Push>) {
        *self.pushes.lock().unwrap() = pushes;
    }

    pub fn set_jobs(&self, push_id: i64, jobs: Vec<Job>) {
        self.jobs.lock().unwrap().insert(push_id, jobs);
    }

    pub fn set_runnable(&self, jobs: Vec<Job>) {
        *self.runnable.lock().unwrap() = jobs;
    }

    /// Make every following request fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn push_requests(&self) -> Vec<PushFetchParams> {
        self.push_requests.lock().unwrap().clone()
    }

    pub fn runnable_requests(&self) -> usize {
        self.runnable_requests.load(Ordering::SeqCst)
    }

    fn check(&self) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(AppError::Upstream("503 Service Unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PushSource for MockPushSource {
    async fn fetch_pushes(&self, _repo: &str, params: &PushFetchParams) -> AppResult<PushPage> {
        self.push_requests.lock().unwrap().push(params.clone());
        self.check()?;
        let pushes: Vec<Push> = self
            .pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|push| {
                params
                    .push_timestamp_lte
                    .is_none_or(|lte| push.push_timestamp <= lte)
            })
            .filter(|push| {
                params
                    .revision
                    .as_ref()
                    .is_none_or(|revision| &push.revision == revision)
            })
            .cloned()
            .collect();
        Ok(PushPage::from_pushes(pushes))
    }

    async fn fetch_jobs_for_push(&self, push_id: i64) -> AppResult<Vec<Job>> {
        self.check()?;
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&push_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_runnable_jobs(
        &self,
        _repo: &str,
        _query: RunnableQuery<'_>,
    ) -> AppResult<Vec<Job>> {
        self.runnable_requests.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.runnable.lock().unwrap().clone())
    }

    async fn fetch_new_jobs(&self, push_ids: &[i64], _since: NaiveDateTime) -> AppResult<Vec<Job>> {
        self.check()?;
        let jobs = self.jobs.lock().unwrap();
        Ok(push_ids
            .iter()
            .filter_map(|id| jobs.get(id))
            .flatten()
            .cloned()
            .collect())
    }
}

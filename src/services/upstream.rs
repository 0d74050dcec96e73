//! Client for the CI results service.
//!
//! [`PushSource`] is the seam the board fetches through. [`HttpPushSource`]
//! talks to the results service's REST API; tests script their own source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Job, Push, PushFetchParams, PushPage, RUNNABLE};

/// Page size requested from the jobs endpoint.
const JOBS_PAGE_SIZE: usize = 2000;

/// Upper bound on followed `next` links for one job listing.
const MAX_JOB_PAGES: usize = 50;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Format of `last_modified__gt`.
const LAST_MODIFIED_PARAM_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Where to look up runnable jobs for a push.
#[derive(Debug, Clone, Copy)]
pub struct RunnableQuery<'a> {
    pub push_id: i64,
    pub revision: &'a str,
    /// Task id of the push's decision task, when loaded
    pub decision_task_id: Option<&'a str>,
}

/// Source of pushes and jobs.
#[async_trait]
pub trait PushSource: Send + Sync {
    /// One page of pushes for `repo`.
    async fn fetch_pushes(&self, repo: &str, params: &PushFetchParams) -> AppResult<PushPage>;

    /// Every job of one push, all pages.
    async fn fetch_jobs_for_push(&self, push_id: i64) -> AppResult<Vec<Job>>;

    /// Jobs that could be scheduled on a push but have not been.
    async fn fetch_runnable_jobs(&self, repo: &str, query: RunnableQuery<'_>) -> AppResult<Vec<Job>>;

    /// Jobs of `push_ids` modified after `since`.
    ///
    /// The default refetches every push in full; the merge makes the
    /// overlap harmless.
    async fn fetch_new_jobs(&self, push_ids: &[i64], since: NaiveDateTime) -> AppResult<Vec<Job>> {
        debug!(pushes = push_ids.len(), %since, "Polling jobs with full per-push fetches");
        let mut jobs = Vec::new();
        for push_id in push_ids {
            jobs.extend(self.fetch_jobs_for_push(*push_id).await?);
        }
        Ok(jobs)
    }
}

#[derive(Deserialize)]
struct PushListResponse {
    #[serde(default)]
    results: Vec<Push>,
}

#[derive(Deserialize)]
struct JobListResponse {
    #[serde(default)]
    results: Vec<Value>,
    /// Present when rows are arrays instead of objects
    #[serde(default)]
    job_property_names: Option<Vec<String>>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct RunnableListResponse {
    #[serde(default)]
    results: Vec<RunnableRecord>,
}

#[derive(Deserialize)]
struct RunnableRecord {
    #[serde(default)]
    build_platform: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    platform_option: Option<String>,
    #[serde(default)]
    job_group_name: Option<String>,
    #[serde(default)]
    job_group_symbol: Option<String>,
    #[serde(default)]
    job_type_name: Option<String>,
    #[serde(default)]
    job_type_symbol: Option<String>,
    #[serde(default)]
    ref_data_name: Option<String>,
}

impl RunnableRecord {
    fn into_job(self, push_id: i64) -> Job {
        Job {
            push_id,
            state: RUNNABLE.to_string(),
            result: RUNNABLE.to_string(),
            platform: self.build_platform.or(self.platform).unwrap_or_default(),
            platform_option: self.platform_option.unwrap_or_default(),
            job_group_name: self.job_group_name.unwrap_or_default(),
            job_group_symbol: self.job_group_symbol.unwrap_or_default(),
            job_type_name: self.job_type_name.clone().unwrap_or_default(),
            job_type_symbol: self.job_type_symbol.unwrap_or_default(),
            signature: self.ref_data_name.or(self.job_type_name),
            ..Default::default()
        }
    }
}

/// Turn a jobs response page into records. Array rows are zipped with
/// `job_property_names`.
fn decode_job_rows(rows: Vec<Value>, property_names: Option<&[String]>) -> AppResult<Vec<Job>> {
    rows.into_iter()
        .map(|row| {
            let row = match (row, property_names) {
                (Value::Array(values), Some(names)) => Value::Object(
                    names.iter().cloned().zip(values).collect::<serde_json::Map<_, _>>(),
                ),
                (Value::Array(_), None) => {
                    return Err(AppError::Decode(
                        "job rows are arrays but job_property_names is missing".to_string(),
                    ));
                }
                (row, _) => row,
            };
            Ok(serde_json::from_value::<Job>(row)?)
        })
        .collect()
}

/// [`PushSource`] over the results service's REST API.
#[derive(Clone)]
pub struct HttpPushSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpPushSource {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        debug!(%url, "GET");
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Results service returned an error");
            return Err(AppError::Upstream(format!("{} returned {}", url, status)));
        }
        Ok(response.json::<T>().await?)
    }

    async fn fetch_job_pages(&self, first_url: String) -> AppResult<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: JobListResponse = self.get_json(&url).await?;
            jobs.extend(decode_job_rows(
                page.results,
                page.job_property_names.as_deref(),
            )?);
            pages += 1;
            if pages >= MAX_JOB_PAGES {
                warn!(%url, pages, "Stopping job pagination early");
                break;
            }
            next = page.next.filter(|n| !n.is_empty());
        }
        Ok(jobs)
    }
}

#[async_trait]
impl PushSource for HttpPushSource {
    async fn fetch_pushes(&self, repo: &str, params: &PushFetchParams) -> AppResult<PushPage> {
        let url = format!(
            "{}/api/project/{}/push/?{}",
            self.base_url,
            urlencoding::encode(repo),
            params.to_query_string()
        );
        let response: PushListResponse = self.get_json(&url).await?;
        Ok(PushPage::from_pushes(response.results))
    }

    async fn fetch_jobs_for_push(&self, push_id: i64) -> AppResult<Vec<Job>> {
        let url = format!(
            "{}/api/jobs/?push_id={}&count={}",
            self.base_url, push_id, JOBS_PAGE_SIZE
        );
        self.fetch_job_pages(url).await
    }

    async fn fetch_runnable_jobs(&self, repo: &str, query: RunnableQuery<'_>) -> AppResult<Vec<Job>> {
        let selector = match query.decision_task_id {
            Some(task_id) => format!("decision_task_id={}", urlencoding::encode(task_id)),
            None => format!("revision={}", urlencoding::encode(query.revision)),
        };
        let url = format!(
            "{}/api/project/{}/runnable_jobs/?{}",
            self.base_url,
            urlencoding::encode(repo),
            selector
        );
        let response: RunnableListResponse = self.get_json(&url).await?;
        Ok(response
            .results
            .into_iter()
            .map(|record| record.into_job(query.push_id))
            .collect())
    }

    async fn fetch_new_jobs(&self, push_ids: &[i64], since: NaiveDateTime) -> AppResult<Vec<Job>> {
        if push_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = push_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/api/jobs/?push_id__in={}&last_modified__gt={}&count={}",
            self.base_url,
            urlencoding::encode(&ids),
            urlencoding::encode(&since.format(LAST_MODIFIED_PARAM_FORMAT).to_string()),
            JOBS_PAGE_SIZE
        );
        self.fetch_job_pages(url).await
    }
}

//! Selection API handlers: selecting, clicking and keyboard navigation.

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::services::{Board, ClickAction, ClickOutcome, Direction, SelectionChange};

/// Current selection.
#[derive(Debug, Serialize, ToSchema)]
pub struct SelectionResponse {
    pub job_id: Option<i64>,
    pub task_run: Option<String>,
    pub pinned_job_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectJobRequest {
    pub job_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
}

/// A click on a job button.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClickRequest {
    #[serde(default)]
    pub button: MouseButton,
    /// Ctrl or Cmd held
    #[serde(default)]
    pub modifier: bool,
}

impl ClickRequest {
    fn action(&self) -> ClickAction {
        match (self.button, self.modifier) {
            (MouseButton::Middle, _) => ClickAction::Open,
            (MouseButton::Left, true) => ClickAction::Pin,
            (MouseButton::Left, false) => ClickAction::Select,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClickResponse {
    pub outcome: ClickOutcome,
    /// Set when the click opens the log viewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_viewer_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjacentQuery {
    /// Only stop on unclassified failures
    #[serde(default)]
    pub unclassified_only: bool,
}

/// Result of moving the selection. `change` is absent when no job qualified.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdjacentResponse {
    pub change: Option<SelectionChange>,
}

async fn current_selection(board: &Board) -> SelectionResponse {
    let state = board.state().await;
    SelectionResponse {
        job_id: state.selected_job_id(),
        task_run: state.url().selected_task_run().map(str::to_string),
        pinned_job_ids: state.pinned_job_ids().to_vec(),
    }
}

/// Get the current selection.
#[utoipa::path(
    get,
    path = "/api/v1/selection",
    tag = "Selection",
    responses(
        (status = 200, description = "Selected job and pinned jobs", body = SelectionResponse),
    )
)]
pub async fn get_selection(board: web::Data<Board>) -> AppResult<HttpResponse> {
    board.reconcile_selection().await;
    Ok(HttpResponse::Ok().json(current_selection(&board).await))
}

/// Select a job.
#[utoipa::path(
    put,
    path = "/api/v1/selection",
    tag = "Selection",
    request_body = SelectJobRequest,
    responses(
        (status = 200, description = "Selection change", body = SelectionChange),
    )
)]
pub async fn select_job(
    board: web::Data<Board>,
    body: web::Json<SelectJobRequest>,
) -> AppResult<HttpResponse> {
    let change = board.select_job(body.job_id).await;
    Ok(HttpResponse::Ok().json(change))
}

/// Clear the selection.
#[utoipa::path(
    delete,
    path = "/api/v1/selection",
    tag = "Selection",
    responses(
        (status = 200, description = "Selection change", body = SelectionChange),
    )
)]
pub async fn clear_selection(board: web::Data<Board>) -> AppResult<HttpResponse> {
    let change = board.clear_selection().await;
    Ok(HttpResponse::Ok().json(change))
}

/// Unpin every job.
#[utoipa::path(
    delete,
    path = "/api/v1/pins",
    tag = "Selection",
    responses(
        (status = 200, description = "Selection with an empty pinboard", body = SelectionResponse),
    )
)]
pub async fn clear_pins(board: web::Data<Board>) -> AppResult<HttpResponse> {
    board.clear_pins().await;
    Ok(HttpResponse::Ok().json(current_selection(&board).await))
}

/// Click a job button.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job_id}/click",
    tag = "Selection",
    params(
        ("job_id" = i64, Path, description = "Job id")
    ),
    request_body = ClickRequest,
    responses(
        (status = 200, description = "What the click did", body = ClickResponse),
        (status = 404, description = "Job not loaded", body = crate::error::ErrorResponse),
        (status = 409, description = "Pinboard full", body = crate::error::ErrorResponse),
    )
)]
pub async fn click_job(
    board: web::Data<Board>,
    path: web::Path<i64>,
    body: Option<web::Json<ClickRequest>>,
) -> AppResult<HttpResponse> {
    let job_id = path.into_inner();
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let outcome = board.click(job_id, request.action()).await?;
    let log_viewer_url = match &outcome {
        ClickOutcome::OpenLogViewer { job_id } => Some(board.log_viewer_url(*job_id).await?),
        _ => None,
    };
    Ok(HttpResponse::Ok().json(ClickResponse {
        outcome,
        log_viewer_url,
    }))
}

async fn select_adjacent(
    board: &Board,
    direction: Direction,
    query: &AdjacentQuery,
) -> AppResult<HttpResponse> {
    let change = board
        .select_adjacent(direction, query.unclassified_only)
        .await;
    Ok(HttpResponse::Ok().json(AdjacentResponse { change }))
}

/// Select the next visible job.
#[utoipa::path(
    post,
    path = "/api/v1/selection/next",
    tag = "Selection",
    params(
        ("unclassified_only" = Option<bool>, Query, description = "Only stop on unclassified failures")
    ),
    responses(
        (status = 200, description = "Selection change", body = AdjacentResponse),
    )
)]
pub async fn select_next(
    board: web::Data<Board>,
    query: web::Query<AdjacentQuery>,
) -> AppResult<HttpResponse> {
    select_adjacent(&board, Direction::Next, &query).await
}

/// Select the previous visible job.
#[utoipa::path(
    post,
    path = "/api/v1/selection/previous",
    tag = "Selection",
    params(
        ("unclassified_only" = Option<bool>, Query, description = "Only stop on unclassified failures")
    ),
    responses(
        (status = 200, description = "Selection change", body = AdjacentResponse),
    )
)]
pub async fn select_previous(
    board: web::Data<Board>,
    query: web::Query<AdjacentQuery>,
) -> AppResult<HttpResponse> {
    select_adjacent(&board, Direction::Previous, &query).await
}

/// Configure selection routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/selection")
            .route(web::get().to(get_selection))
            .route(web::put().to(select_job))
            .route(web::delete().to(clear_selection)),
    )
    .service(web::resource("/selection/next").route(web::post().to(select_next)))
    .service(web::resource("/selection/previous").route(web::post().to(select_previous)))
    .service(web::resource("/jobs/{job_id}/click").route(web::post().to(click_job)))
    .service(web::resource("/pins").route(web::delete().to(clear_pins)));
}

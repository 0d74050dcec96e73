//! Board API handlers: the push tree, loading, polling, ranges and filters.

use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::AppResult;
use crate::models::{BoardSnapshot, Notification, PushRange, PushView};
use crate::services::{Board, FilterAction};
use crate::services::merge::MergeOutcome;

/// Query for loading older pushes.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FetchNextQuery {
    /// Number of pushes to load (default: the configured page size)
    pub count: Option<usize>,
}

/// Pushes added by a load.
#[derive(Debug, Serialize, ToSchema)]
pub struct PushesLoadedResponse {
    pub push_ids: Vec<i64>,
}

/// New filter parameters, as a query string.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FiltersRequest {
    /// e.g. `resultStatus=testfailed,busted&classifiedState=unclassified`
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FiltersResponse {
    /// Full board query string after the update
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CollapseResponse {
    pub push_id: i64,
    pub collapsed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunnableHiddenResponse {
    pub push_id: i64,
    pub removed: usize,
}

/// Manifest test paths keyed by job type name.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TestPathsRequest {
    #[schema(value_type = Object)]
    pub paths: HashMap<String, Vec<String>>,
}

/// Get the whole board.
#[utoipa::path(
    get,
    path = "/api/v1/board",
    tag = "Board",
    responses(
        (status = 200, description = "Visible push tree, counts and URL state", body = BoardSnapshot),
    )
)]
pub async fn get_board(board: web::Data<Board>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(board.snapshot().await))
}

/// Get one push.
#[utoipa::path(
    get,
    path = "/api/v1/pushes/{push_id}",
    tag = "Board",
    params(
        ("push_id" = i64, Path, description = "Push id")
    ),
    responses(
        (status = 200, description = "Push with its visible platforms", body = PushView),
        (status = 404, description = "Push not loaded", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_push(board: web::Data<Board>, path: web::Path<i64>) -> AppResult<HttpResponse> {
    let view = board.push_view(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Load the next page of older pushes.
#[utoipa::path(
    post,
    path = "/api/v1/pushes/next",
    tag = "Board",
    params(
        ("count" = Option<usize>, Query, description = "Number of pushes to load")
    ),
    responses(
        (status = 200, description = "Pushes added", body = PushesLoadedResponse),
        (status = 502, description = "Results service failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn fetch_next(
    board: web::Data<Board>,
    query: web::Query<FetchNextQuery>,
) -> AppResult<HttpResponse> {
    let push_ids = board.fetch_next(query.count).await?;
    Ok(HttpResponse::Ok().json(PushesLoadedResponse { push_ids }))
}

/// Poll for new pushes and modified jobs now.
#[utoipa::path(
    post,
    path = "/api/v1/pushes/poll",
    tag = "Board",
    responses(
        (status = 200, description = "Poll result", body = crate::services::PollOutcome),
        (status = 409, description = "A poll is already running", body = crate::error::ErrorResponse),
        (status = 502, description = "Results service failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn poll(board: web::Data<Board>) -> AppResult<HttpResponse> {
    let outcome = board.poll().await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Replace the push range.
#[utoipa::path(
    post,
    path = "/api/v1/range",
    tag = "Board",
    request_body = PushRange,
    responses(
        (status = 200, description = "Pushes in the new range", body = PushesLoadedResponse),
        (status = 400, description = "Empty range", body = crate::error::ErrorResponse),
        (status = 502, description = "Results service failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn replace_range(
    board: web::Data<Board>,
    body: web::Json<PushRange>,
) -> AppResult<HttpResponse> {
    let range = body.into_inner();
    info!(range = ?range, "Replacing push range");
    let push_ids = board.replace_range(range).await?;
    Ok(HttpResponse::Ok().json(PushesLoadedResponse { push_ids }))
}

/// Replace the filter parameters.
#[utoipa::path(
    put,
    path = "/api/v1/filters",
    tag = "Board",
    request_body = FiltersRequest,
    responses(
        (status = 200, description = "Filters applied", body = FiltersResponse),
    )
)]
pub async fn update_filters(
    board: web::Data<Board>,
    body: web::Json<FiltersRequest>,
) -> AppResult<HttpResponse> {
    let query = board.apply_filter_query(&body.query).await;
    Ok(HttpResponse::Ok().json(FiltersResponse { query }))
}

/// Apply one filter action, e.g. toggling the unclassified failures view.
#[utoipa::path(
    post,
    path = "/api/v1/filters/actions",
    tag = "Board",
    request_body = FilterAction,
    responses(
        (status = 200, description = "Filters applied", body = FiltersResponse),
    )
)]
pub async fn apply_filter_action(
    board: web::Data<Board>,
    body: web::Json<FilterAction>,
) -> AppResult<HttpResponse> {
    let query = board.apply_filter_action(&body).await;
    Ok(HttpResponse::Ok().json(FiltersResponse { query }))
}

/// Collapse or expand a push.
#[utoipa::path(
    post,
    path = "/api/v1/pushes/{push_id}/collapse",
    tag = "Board",
    params(
        ("push_id" = i64, Path, description = "Push id")
    ),
    responses(
        (status = 200, description = "New collapsed state", body = CollapseResponse),
    )
)]
pub async fn toggle_collapse(
    board: web::Data<Board>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let push_id = path.into_inner();
    let collapsed = board.toggle_collapsed(push_id).await;
    Ok(HttpResponse::Ok().json(CollapseResponse { push_id, collapsed }))
}

/// Fetch and show a push's runnable jobs.
#[utoipa::path(
    post,
    path = "/api/v1/pushes/{push_id}/runnable",
    tag = "Board",
    params(
        ("push_id" = i64, Path, description = "Push id")
    ),
    responses(
        (status = 200, description = "Runnable jobs merged", body = MergeOutcome),
        (status = 404, description = "Push not loaded", body = crate::error::ErrorResponse),
        (status = 502, description = "Results service failed", body = crate::error::ErrorResponse),
    )
)]
pub async fn show_runnable(
    board: web::Data<Board>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let outcome = board.show_runnable(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Hide a push's runnable jobs.
#[utoipa::path(
    delete,
    path = "/api/v1/pushes/{push_id}/runnable",
    tag = "Board",
    params(
        ("push_id" = i64, Path, description = "Push id")
    ),
    responses(
        (status = 200, description = "Runnable jobs removed", body = RunnableHiddenResponse),
        (status = 404, description = "Push not loaded", body = crate::error::ErrorResponse),
    )
)]
pub async fn hide_runnable(
    board: web::Data<Board>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let push_id = path.into_inner();
    let removed = board.hide_runnable(push_id).await?;
    Ok(HttpResponse::Ok().json(RunnableHiddenResponse { push_id, removed }))
}

/// Attach manifest test paths to a push.
#[utoipa::path(
    put,
    path = "/api/v1/pushes/{push_id}/test-paths",
    tag = "Board",
    params(
        ("push_id" = i64, Path, description = "Push id")
    ),
    request_body = TestPathsRequest,
    responses(
        (status = 200, description = "Jobs re-merged", body = MergeOutcome),
        (status = 404, description = "Push not loaded", body = crate::error::ErrorResponse),
    )
)]
pub async fn set_test_paths(
    board: web::Data<Board>,
    path: web::Path<i64>,
    body: web::Json<TestPathsRequest>,
) -> AppResult<HttpResponse> {
    let outcome = board
        .set_test_paths(path.into_inner(), body.into_inner().paths)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Recent notifications, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Board",
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
    )
)]
pub async fn list_notifications(board: web::Data<Board>) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(board.notifier().recent()))
}

/// Configure board routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/board").route(web::get().to(get_board)))
        .service(web::resource("/pushes/next").route(web::post().to(fetch_next)))
        .service(web::resource("/pushes/poll").route(web::post().to(poll)))
        .service(web::resource("/pushes/{push_id}").route(web::get().to(get_push)))
        .service(
            web::resource("/pushes/{push_id}/collapse").route(web::post().to(toggle_collapse)),
        )
        .service(
            web::resource("/pushes/{push_id}/runnable")
                .route(web::post().to(show_runnable))
                .route(web::delete().to(hide_runnable)),
        )
        .service(
            web::resource("/pushes/{push_id}/test-paths").route(web::put().to(set_test_paths)),
        )
        .service(web::resource("/range").route(web::post().to(replace_range)))
        .service(web::resource("/filters").route(web::put().to(update_filters)))
        .service(web::resource("/filters/actions").route(web::post().to(apply_filter_action)))
        .service(web::resource("/notifications").route(web::get().to(list_notifications)));
}

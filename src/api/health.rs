//! Liveness and readiness checks.

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ErrorResponse;
use crate::services::Board;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

/// Board readiness: pushes are in and no load is running.
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    status: &'static str,
    repo: String,
    pushes: usize,
    all_jobs_loaded: bool,
    /// Connected board event streams
    subscribers: usize,
}

/// Process liveness. Always 200.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Board readiness.
///
/// 503 until the first page of pushes has been loaded, and while a load
/// or range replace is in progress.
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Board has pushes", body = ReadyResponse),
        (status = 503, description = "Board is still loading", body = ErrorResponse)
    )
)]
#[get("/ready")]
pub async fn ready(board: web::Data<Board>) -> HttpResponse {
    let state = board.state().await;
    let pushes = state.pushes().len();
    if state.is_loading() || pushes == 0 {
        return HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "NOT_READY".to_string(),
            message: format!("Board for {} has not finished loading", state.repo()),
        });
    }
    HttpResponse::Ok().json(ReadyResponse {
        status: "ready",
        repo: state.repo().to_string(),
        pushes,
        all_jobs_loaded: state.all_jobs_loaded(),
        subscribers: board.broadcaster().receiver_count(),
    })
}

/// Configure health routes.
pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}

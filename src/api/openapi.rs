//! OpenAPI documentation configuration.

use actix_web::{HttpResponse, web};
use utoipa::OpenApi;

use crate::{api, error, models, services};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Push Board Server",
        version = "0.1.0",
        description = "Live CI push and job board: grouping, filtering, counts and URL-backed selection over a results service"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Board endpoints
        api::board::get_board,
        api::board::get_push,
        api::board::fetch_next,
        api::board::poll,
        api::board::replace_range,
        api::board::update_filters,
        api::board::apply_filter_action,
        api::board::toggle_collapse,
        api::board::show_runnable,
        api::board::hide_runnable,
        api::board::set_test_paths,
        api::board::list_notifications,
        // Selection endpoints
        api::selection::get_selection,
        api::selection::select_job,
        api::selection::clear_selection,
        api::selection::click_job,
        api::selection::clear_pins,
        api::selection::select_next,
        api::selection::select_previous,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Board
            models::Job,
            models::JobState,
            models::JobCounts,
            models::UnclassifiedCounts,
            models::Revision,
            models::RevisionTip,
            models::PushRange,
            models::GroupCount,
            models::GroupView,
            models::PlatformView,
            models::PushView,
            models::BoardSnapshot,
            models::Notification,
            models::Severity,
            services::PollOutcome,
            services::merge::MergeOutcome,
            api::board::FetchNextQuery,
            api::board::PushesLoadedResponse,
            api::board::FiltersRequest,
            services::FilterAction,
            api::board::FiltersResponse,
            api::board::CollapseResponse,
            api::board::RunnableHiddenResponse,
            api::board::TestPathsRequest,
            // Selection
            services::SelectionChange,
            services::ClickAction,
            services::ClickOutcome,
            services::Direction,
            api::selection::SelectionResponse,
            api::selection::SelectJobRequest,
            api::selection::MouseButton,
            api::selection::ClickRequest,
            api::selection::ClickResponse,
            api::selection::AdjacentQuery,
            api::selection::AdjacentResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Board", description = "Push tree, loading, polling, ranges and filters"),
        (name = "Selection", description = "Job selection, clicks and navigation")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document.
pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Configure the OpenAPI route.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/openapi.json").route(web::get().to(openapi_json)));
}

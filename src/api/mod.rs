//! API endpoint modules.

pub mod board;
pub mod health;
pub mod openapi;
pub mod selection;
pub mod websocket;

pub use board::configure_routes as configure_board_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use openapi::configure_routes as configure_openapi_routes;
pub use selection::configure_routes as configure_selection_routes;
pub use websocket::configure_routes as configure_websocket_routes;

use actix_web::web;

/// Mount every `/api/v1` route.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health_routes)
        .configure(configure_board_routes)
        .configure(configure_selection_routes)
        .configure(configure_websocket_routes)
        .configure(configure_openapi_routes);
}

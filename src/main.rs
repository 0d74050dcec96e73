//! Push board server - main entry point.
//!
//! Loads the board, starts the poller and serves the API.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use pushboard_lib::api;
use pushboard_lib::config::Config;
use pushboard_lib::middleware;
use pushboard_lib::services::{
    Board, BoardSettings, EventBroadcaster, HttpPushSource, PollerConfig, PushSource,
    start_poll_task,
};

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    if std::env::args().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, PB_UPSTREAM_URL must be set to an https URL");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Push Board Server");
    info!("  Environment: {}", config.environment);
    info!("  Repository: {}", config.repo);
    info!("  Upstream: {}", config.upstream_url);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let source: Arc<dyn PushSource> = match HttpPushSource::new(
        &config.upstream_url,
        Duration::from_secs(config.http_timeout_secs),
    ) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let broadcaster = EventBroadcaster::new();
    let initial_query = format!("repo={}", urlencoding::encode(&config.repo));
    let board = Arc::new(Board::new(
        &initial_query,
        BoardSettings::from_config(&config),
        source,
        broadcaster,
    ));

    // A failed first load is already a notification; the poller and
    // clients can retry.
    match board.initial_load().await {
        Ok(pushes) => info!("Initial load complete ({} pushes)", pushes.len()),
        Err(e) => warn!("Initial load failed: {}", e),
    }

    start_poll_task(
        board.clone(),
        PollerConfig {
            interval_secs: config.poll_interval_secs,
        },
    );
    info!("Poller started (interval: {} seconds)", config.poll_interval_secs);

    let bind_address = config.bind_address();
    let is_development = config.is_development();

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!("Starting server at http://{} ({} workers)", bind_address, cpus);
        cpus
    };

    let board_data = web::Data::from(board);

    let server = HttpServer::new(move || {
        let cors = if is_development {
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        App::new()
            // CORS must wrap before other middleware
            .wrap(cors)
            .wrap(middleware::RequestLogger)
            .app_data(board_data.clone())
            .service(web::scope("/api/v1").configure(api::configure_api))
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}

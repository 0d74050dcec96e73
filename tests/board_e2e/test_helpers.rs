//! Shared test helpers for board E2E tests.

use std::sync::Arc;

use actix_web::{App, dev::ServiceResponse, test, web};
use pushboard_lib::models::{Job, Push};
use pushboard_lib::services::{Board, BoardSettings, CoalesceRule, EventBroadcaster};
use serde_json::Value;

use super::mock_source::MockPushSource;

pub const TEST_REPO: &str = "autoland";
pub const TEST_UPSTREAM: &str = "https://ci.example.com";

pub fn test_settings() -> BoardSettings {
    BoardSettings {
        repo: TEST_REPO.to_string(),
        push_count: 10,
        max_push_count: 100,
        upstream_url: TEST_UPSTREAM.to_string(),
        coalesce: CoalesceRule::default(),
    }
}

/// A completed job on linux64/opt with a unique symbol.
pub fn completed_job(id: i64, push_id: i64, result: &str) -> Job {
    Job {
        id,
        push_id,
        state: "completed".into(),
        result: result.into(),
        platform: "linux64".into(),
        platform_option: "opt".into(),
        job_type_name: format!("test-linux64/opt-suite-{}", id),
        job_type_symbol: format!("s{}", id),
        task_id: Some(format!("task{}", id)),
        last_modified: Some("2024-05-01T10:00:00".into()),
        ..Default::default()
    }
}

/// Two pushes: push 2 (newest) with one busted job, push 1 with a
/// failure and a success.
pub fn seeded_source() -> Arc<MockPushSource> {
    let source = Arc::new(MockPushSource::new(vec![
        Push::new(2, "bbbbbbbbbbbb", 1_714_557_600),
        Push::new(1, "aaaaaaaaaaaa", 1_714_554_000),
    ]));
    source.set_jobs(2, vec![completed_job(20, 2, "busted")]);
    source.set_jobs(
        1,
        vec![completed_job(10, 1, "testfailed"), completed_job(11, 1, "success")],
    );
    source
}

/// Build a board over `source` with the given starting query.
pub fn create_board(source: Arc<MockPushSource>, query: &str) -> Arc<Board> {
    Arc::new(Board::new(
        query,
        test_settings(),
        source,
        EventBroadcaster::new(),
    ))
}

/// Build and load a board over the seeded source.
pub async fn loaded_board() -> (Arc<Board>, Arc<MockPushSource>) {
    let source = seeded_source();
    let board = create_board(source.clone(), "repo=autoland");
    board.initial_load().await.unwrap();
    (board, source)
}

/// Create a test app serving the whole API for `board`.
pub async fn create_test_app(
    board: Arc<Board>,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(web::Data::from(board))
            .service(web::scope("/api/v1").configure(pushboard_lib::api::configure_api)),
    )
    .await
}

/// Send a request and return the status code with the JSON body.
pub async fn send<S>(app: &S, req: test::TestRequest) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

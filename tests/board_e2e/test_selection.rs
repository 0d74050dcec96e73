//! E2E tests: selection, clicks, pins and keyboard navigation.

use actix_web::test;
use pushboard_lib::models::BoardEvent;
use serde_json::{Value, json};

use super::test_helpers::*;

async fn selection<S>(app: &S) -> Value
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let (status, body) = send(app, test::TestRequest::get().uri("/api/v1/selection")).await;
    assert_eq!(status, 200);
    body
}

#[actix_rt::test]
async fn test_select_and_clear_job() {
    let (board, _) = loaded_board().await;
    let mut events = board.broadcaster().subscribe();
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/selection")
            .set_json(json!({ "job_id": 10 })),
    )
    .await;
    assert_eq!(status, 200, "Select should succeed: {:?}", body);
    assert_eq!(body["previous"], Value::Null);
    assert_eq!(body["current"], 10);

    let body = selection(&app).await;
    assert_eq!(body["job_id"], 10);
    assert_eq!(body["task_run"], "task10.0");

    let (_, board_body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(board_body["selected_job_id"], 10);
    assert!(board_body["query"].as_str().unwrap().contains("selectedJob=10"));

    let message = events.try_recv().unwrap();
    assert!(matches!(message.event, BoardEvent::SelectionChanged(_)));

    let (status, body) = send(&app, test::TestRequest::delete().uri("/api/v1/selection")).await;
    assert_eq!(status, 200);
    assert_eq!(body["previous"], 10);
    assert_eq!(body["current"], Value::Null);
    assert_eq!(selection(&app).await["job_id"], Value::Null);
}

#[actix_rt::test]
async fn test_task_run_in_url_resolves_to_job() {
    let source = seeded_source();
    let board = create_board(source, "repo=autoland&selectedTaskRun=task11.0");
    board.initial_load().await.unwrap();
    let app = create_test_app(board).await;

    let body = selection(&app).await;
    assert_eq!(body["job_id"], 11);
}

#[actix_rt::test]
async fn test_unknown_job_in_url_selects_nothing() {
    let source = seeded_source();
    let board = create_board(source, "repo=autoland&selectedJob=4242");
    board.initial_load().await.unwrap();
    let app = create_test_app(board).await;

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(body["selected_job_id"], Value::Null);
    assert!(body["query"].as_str().unwrap().contains("selectedJob=4242"));

    let body = selection(&app).await;
    assert_eq!(body["job_id"], Value::Null);
}

#[actix_rt::test]
async fn test_click_without_body_selects() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/jobs/11/click"),
    )
    .await;
    assert_eq!(status, 200, "Click should succeed: {:?}", body);
    assert_eq!(body["outcome"]["outcome"], "selected");
    assert_eq!(body["outcome"]["change"]["current"], 11);
    assert!(body.get("log_viewer_url").is_none());
}

#[actix_rt::test]
async fn test_middle_click_opens_log_viewer() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/jobs/10/click")
            .set_json(json!({ "button": "middle" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"]["outcome"], "open_log_viewer");
    assert_eq!(
        body["log_viewer_url"],
        "https://ci.example.com/logviewer?job_id=10&repo=autoland"
    );
    // Opening the log does not move the selection
    assert_eq!(selection(&app).await["job_id"], Value::Null);
}

#[actix_rt::test]
async fn test_modifier_click_pins_and_unpins() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let pin = || {
        test::TestRequest::post()
            .uri("/api/v1/jobs/11/click")
            .set_json(json!({ "modifier": true }))
    };

    let (_, body) = send(&app, pin()).await;
    assert_eq!(body["outcome"]["outcome"], "pin_toggled");
    assert_eq!(body["outcome"]["pinned"], true);
    assert_eq!(selection(&app).await["pinned_job_ids"], json!([11]));

    let (_, body) = send(&app, pin()).await;
    assert_eq!(body["outcome"]["pinned"], false);
    assert_eq!(selection(&app).await["pinned_job_ids"], json!([]));
}

#[actix_rt::test]
async fn test_clear_pins_empties_pinboard() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    for job_id in [10, 11] {
        send(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/jobs/{}/click", job_id))
                .set_json(json!({ "modifier": true })),
        )
        .await;
    }
    assert_eq!(selection(&app).await["pinned_job_ids"], json!([10, 11]));

    let (status, body) = send(&app, test::TestRequest::delete().uri("/api/v1/pins")).await;
    assert_eq!(status, 200);
    assert_eq!(body["pinned_job_ids"], json!([]));
    assert_eq!(selection(&app).await["pinned_job_ids"], json!([]));
}

#[actix_rt::test]
async fn test_click_unknown_job_is_not_found() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/jobs/4242/click"),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_rt::test]
async fn test_next_unclassified_walks_and_wraps() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;
    let next = || test::TestRequest::post().uri("/api/v1/selection/next?unclassified_only=true");

    let (_, body) = send(&app, next()).await;
    assert_eq!(body["change"]["current"], 20);

    let (_, body) = send(&app, next()).await;
    assert_eq!(body["change"]["current"], 10);

    let (_, body) = send(&app, next()).await;
    assert_eq!(body["change"]["current"], 20);

    let (_, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/selection/previous?unclassified_only=true"),
    )
    .await;
    assert_eq!(body["change"]["current"], 10);
}

#[actix_rt::test]
async fn test_next_with_no_candidates_warns() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    send(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/filters")
            .set_json(json!({ "query": "resultStatus=success" })),
    )
    .await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/selection/next?unclassified_only=true"),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["change"], Value::Null);

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/notifications")).await;
    let last = body.as_array().unwrap().last().unwrap();
    assert_eq!(last["message"], "No jobs to select");
    assert_eq!(last["severity"], "warning");
}

//! E2E tests: loading, polling, ranges, filters and failures.

use std::time::Duration;

use actix_web::test;
use pushboard_lib::models::Push;
use pushboard_lib::services::{PollerConfig, start_poll_task};
use serde_json::json;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_board_lists_pushes_newest_first() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(status, 200, "Board should load: {:?}", body);

    let ids: Vec<i64> = body["pushes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|push| push["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(body["repo"], "autoland");
    assert_eq!(body["all_jobs_loaded"], true);
    assert_eq!(body["counts"]["allUnclassifiedFailureCount"], 2);
    assert_eq!(body["counts"]["filteredUnclassifiedFailureCount"], 2);
}

#[actix_rt::test]
async fn test_ready_waits_for_pushes() {
    let source = seeded_source();
    let board = create_board(source, "repo=autoland");
    let app = create_test_app(board.clone()).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/ready")).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "NOT_READY");

    board.initial_load().await.unwrap();
    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/ready")).await;
    assert_eq!(status, 200);
    assert_eq!(body["pushes"], 2);
    assert_eq!(body["subscribers"], 0);

    let _events = board.broadcaster().subscribe();
    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/ready")).await;
    assert_eq!(body["subscribers"], 1);

    let (status, _) = send(&app, test::TestRequest::get().uri("/api/v1/health")).await;
    assert_eq!(status, 200);
}

#[actix_rt::test]
async fn test_unknown_push_is_not_found() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/pushes/999")).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/pushes/1")).await;
    assert_eq!(status, 200);
    assert_eq!(body["revision"], "aaaaaaaaaaaa");
    assert_eq!(body["job_counts"]["completed"], 2);
}

#[actix_rt::test]
async fn test_filters_change_filtered_count_only() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/filters")
            .set_json(json!({ "query": "resultStatus=success" })),
    )
    .await;
    assert_eq!(status, 200);
    assert!(
        body["query"].as_str().unwrap().contains("resultStatus=success"),
        "Query should carry the filter: {:?}",
        body
    );

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(body["counts"]["allUnclassifiedFailureCount"], 2);
    assert_eq!(body["counts"]["filteredUnclassifiedFailureCount"], 0);
}

#[actix_rt::test]
async fn test_filter_actions_toggle_and_reset() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let action = |body: serde_json::Value| {
        test::TestRequest::post()
            .uri("/api/v1/filters/actions")
            .set_json(body)
    };

    let (status, body) = send(&app, action(json!({ "action": "toggle_unclassified_failures" }))).await;
    assert_eq!(status, 200, "Action should apply: {:?}", body);
    assert!(body["query"].as_str().unwrap().contains("classifiedState=unclassified"));
    let (_, board_body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(board_body["counts"]["filteredUnclassifiedFailureCount"], 2);

    send(
        &app,
        action(json!({ "action": "toggle_result_status", "status": "busted" })),
    )
    .await;
    let (_, board_body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(board_body["counts"]["allUnclassifiedFailureCount"], 2);
    assert_eq!(board_body["counts"]["filteredUnclassifiedFailureCount"], 1);

    let (_, body) = send(&app, action(json!({ "action": "reset" }))).await;
    let query = body["query"].as_str().unwrap();
    assert!(!query.contains("resultStatus"), "Reset should drop filters: {}", query);
    assert!(!query.contains("classifiedState"), "Reset should drop filters: {}", query);
    let (_, board_body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(board_body["counts"]["filteredUnclassifiedFailureCount"], 2);
}

#[actix_rt::test]
async fn test_poll_adds_new_pushes_once() {
    let (board, source) = loaded_board().await;
    let app = create_test_app(board).await;

    source.set_pushes(vec![
        Push::new(3, "cccccccccccc", 1_714_561_200),
        Push::new(2, "bbbbbbbbbbbb", 1_714_557_600),
        Push::new(1, "aaaaaaaaaaaa", 1_714_554_000),
    ]);
    source.set_jobs(3, vec![completed_job(30, 3, "exception")]);

    let (status, body) = send(&app, test::TestRequest::post().uri("/api/v1/pushes/poll")).await;
    assert_eq!(status, 200, "Poll should succeed: {:?}", body);
    assert_eq!(body["pushes_added"], json!([3]));

    let (_, body) = send(&app, test::TestRequest::post().uri("/api/v1/pushes/poll")).await;
    assert_eq!(body["pushes_added"], json!([]));

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(body["pushes"].as_array().unwrap().len(), 3);
    assert_eq!(body["counts"]["allUnclassifiedFailureCount"], 3);
}

#[actix_rt::test]
async fn test_fetch_failure_reports_and_keeps_board() {
    let (board, source) = loaded_board().await;
    let app = create_test_app(board).await;

    source.fail(true);
    let (status, body) = send(&app, test::TestRequest::post().uri("/api/v1/pushes/next")).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"], "UPSTREAM_ERROR");

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/notifications")).await;
    let last = body.as_array().unwrap().last().unwrap();
    assert_eq!(last["message"], "Error retrieving push data!");

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(body["pushes"].as_array().unwrap().len(), 2);
    assert_eq!(body["loading"], false);
}

#[actix_rt::test]
async fn test_fetch_next_asks_for_older_pushes() {
    let (board, source) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/next?count=5"),
    )
    .await;
    assert_eq!(status, 200, "Next page should load: {:?}", body);
    assert_eq!(body["push_ids"], json!([]));

    let request = source.push_requests().last().cloned().unwrap();
    assert_eq!(request.count, Some(5));
    assert!(request.push_timestamp_lte.is_some());
}

#[actix_rt::test]
async fn test_empty_range_is_rejected() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/range").set_json(json!({})),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_range_to_loaded_revision_keeps_push() {
    let (board, source) = loaded_board().await;
    let app = create_test_app(board).await;
    let requests = source.push_requests().len();

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/range")
            .set_json(json!({ "revision": "bbbbbbbbbbbb" })),
    )
    .await;
    assert_eq!(status, 200, "Range should apply: {:?}", body);
    assert_eq!(body["push_ids"], json!([2]));
    assert_eq!(source.push_requests().len(), requests);

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert!(body["query"].as_str().unwrap().contains("revision=bbbbbbbbbbbb"));
}

#[actix_rt::test]
async fn test_collapse_toggles() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (_, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/1/collapse"),
    )
    .await;
    assert_eq!(body["collapsed"], true);

    let (_, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/1/collapse"),
    )
    .await;
    assert_eq!(body["collapsed"], false);
}

#[actix_rt::test]
async fn test_openapi_document_is_served() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/v1/openapi.json")).await;
    assert_eq!(status, 200);
    assert_eq!(body["info"]["title"], "Push Board Server");
}

#[actix_rt::test]
async fn test_background_poller_picks_up_pushes() {
    let (board, source) = loaded_board().await;
    source.set_pushes(vec![
        Push::new(3, "cccccccccccc", 1_714_561_200),
        Push::new(2, "bbbbbbbbbbbb", 1_714_557_600),
        Push::new(1, "aaaaaaaaaaaa", 1_714_554_000),
    ]);

    let handle = start_poll_task(board.clone(), PollerConfig { interval_secs: 1 });
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    handle.abort();

    let state = board.state().await;
    assert_eq!(state.pushes().len(), 3);
    assert_eq!(state.pushes()[0].id, 3);
}

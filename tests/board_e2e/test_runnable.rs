//! E2E tests: runnable jobs and manifest test paths.

use actix_web::test;
use pushboard_lib::models::Job;
use serde_json::json;

use super::test_helpers::*;

fn runnable(name: &str, symbol: &str) -> Job {
    Job {
        signature: Some(name.into()),
        job_type_name: name.into(),
        job_type_symbol: symbol.into(),
        platform: "linux64".into(),
        platform_option: "opt".into(),
        state: "runnable".into(),
        result: "runnable".into(),
        ..Default::default()
    }
}

#[actix_rt::test]
async fn test_show_and_hide_runnable_jobs() {
    let (board, source) = loaded_board().await;
    source.set_runnable(vec![
        runnable("test-linux64/opt-mochitest-1", "m1"),
        runnable("test-linux64/opt-mochitest-2", "m2"),
    ]);
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/1/runnable"),
    )
    .await;
    assert_eq!(status, 200, "Runnable jobs should load: {:?}", body);
    assert_eq!(body["added"], 2);

    let (_, push) = send(&app, test::TestRequest::get().uri("/api/v1/pushes/1")).await;
    assert_eq!(push["runnable_visible"], true);

    // Runnable jobs never count as failures
    let (_, board_body) = send(&app, test::TestRequest::get().uri("/api/v1/board")).await;
    assert_eq!(board_body["counts"]["allUnclassifiedFailureCount"], 2);

    let (status, body) = send(
        &app,
        test::TestRequest::delete().uri("/api/v1/pushes/1/runnable"),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["removed"], 2);

    let (_, push) = send(&app, test::TestRequest::get().uri("/api/v1/pushes/1")).await;
    assert_eq!(push["runnable_visible"], false);
    assert_eq!(source.runnable_requests(), 1);
}

#[actix_rt::test]
async fn test_runnable_for_unknown_push_is_not_found() {
    let (board, source) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/999/runnable"),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "NOT_FOUND");
    assert_eq!(source.runnable_requests(), 0);
}

#[actix_rt::test]
async fn test_runnable_fetch_failure_notifies() {
    let (board, source) = loaded_board().await;
    source.fail(true);
    let app = create_test_app(board).await;

    let (status, _) = send(
        &app,
        test::TestRequest::post().uri("/api/v1/pushes/1/runnable"),
    )
    .await;
    assert_eq!(status, 502);

    let (_, body) = send(&app, test::TestRequest::get().uri("/api/v1/notifications")).await;
    let last = body.as_array().unwrap().last().unwrap();
    assert_eq!(last["message"], "Error retrieving push data!");
    assert_eq!(last["severity"], "danger");
}

#[actix_rt::test]
async fn test_test_paths_attach_to_push() {
    let (board, _) = loaded_board().await;
    let app = create_test_app(board).await;

    let (status, body) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/pushes/1/test-paths")
            .set_json(json!({
                "paths": { "test-linux64/opt-suite-10": ["dom/tests/mochitest.toml"] }
            })),
    )
    .await;
    assert_eq!(status, 200, "Test paths should apply: {:?}", body);
    assert_eq!(body["total"], 2);

    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/v1/pushes/999/test-paths")
            .set_json(json!({ "paths": {} })),
    )
    .await;
    assert_eq!(status, 404);
}

//! Action results served through a controller.

use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::stream;
use serde_json::json;

use route_controller::{ActionResult, BoxError, Dispatcher, MetadataRegistry};

mod common;
use common::get;

const TEST_FILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/assets/test.txt");

/// Resolved against the working directory, which cargo sets to the package root.
const RELATIVE_TEST_FILE: &str = "tests/assets/test.txt";

#[derive(Default)]
struct Results;

fn results() -> Dispatcher {
    let mut registry = MetadataRegistry::new();
    registry
        .controller::<Results>()
        .get("/partial", "partial", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::status(206))
        })
        .get("/teapot", "teapot", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::status(418))
        })
        .get("/missing", "missing", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::not_found().with_message("User not found"))
        })
        .get("/moved", "moved", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::redirect("/api/results/partial"))
        })
        .get("/gone", "gone", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::permanent_redirect("/api/results/teapot"))
        })
        .get("/download", "download", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::download(TEST_FILE, "text/plain", None))
        })
        .get("/file", "file", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::file(TEST_FILE, "text/plain"))
        })
        .get("/relative-file", "relative_file", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::file(RELATIVE_TEST_FILE, "text/plain"))
        })
        .get("/relative-download", "relative_download", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::download(
                RELATIVE_TEST_FILE,
                "text/plain",
                Some("greeting.txt".to_string()),
            ))
        })
        .post("/created", "created", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::created(&json!({ "id": 7 }), "/api/results/7"))
        })
        .get("/bytes", "bytes", |_this, _ctx| async {
            Ok::<_, BoxError>(ActionResult::bytes(vec![1u8, 2, 3], "application/octet-stream"))
        })
        .get("/stream", "stream", |_this, _ctx| async {
            let chunks = stream::iter(vec![
                Ok::<_, std::io::Error>(Bytes::from("chunk-1,")),
                Ok(Bytes::from("chunk-2")),
            ]);
            Ok::<_, BoxError>(ActionResult::stream(chunks, "text/plain"))
        });
    Dispatcher::build::<Results>(&registry, "results").unwrap()
}

#[tokio::test]
async fn test_status_results_use_reason_phrase() {
    let dispatcher = results();

    let res = get(&dispatcher, "/api/results/partial").await;
    assert_eq!(res.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.body, "Partial Content");

    let res = get(&dispatcher, "/api/results/teapot").await;
    assert_eq!(res.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(res.body, "I'm a teapot");
}

#[tokio::test]
async fn test_status_with_message() {
    let res = get(&results(), "/api/results/missing").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, "User not found");
}

#[tokio::test]
async fn test_redirects() {
    let dispatcher = results();

    let res = get(&dispatcher, "/api/results/moved").await;
    assert_eq!(res.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.header("location"), Some("/api/results/partial"));

    let res = get(&dispatcher, "/api/results/gone").await;
    assert_eq!(res.status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.header("location"), Some("/api/results/teapot"));
}

#[tokio::test]
async fn test_download_sets_attachment() {
    let res = get(&results(), "/api/results/download").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "Hello World!");
    assert_eq!(res.header("content-type"), Some("text/plain"));
    assert_eq!(res.header("content-disposition"), Some("attachment; filename=test.txt"));
}

#[tokio::test]
async fn test_file_is_inline() {
    let res = get(&results(), "/api/results/file").await;
    assert_eq!(res.body, "Hello World!");
    assert_eq!(res.header("content-disposition"), None);
}

#[tokio::test]
async fn test_relative_paths_resolve_from_working_directory() {
    let dispatcher = results();

    let res = get(&dispatcher, "/api/results/relative-file").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "Hello World!");

    let res = get(&dispatcher, "/api/results/relative-download").await;
    assert_eq!(res.body, "Hello World!");
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=greeting.txt")
    );
}

#[tokio::test]
async fn test_created() {
    let res = common::send(&results(), axum::http::Method::POST, "/api/results/created", "").await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.header("location"), Some("/api/results/7"));
    assert_eq!(res.json(), json!({ "id": 7 }));
}

#[tokio::test]
async fn test_bytes_and_stream() {
    let dispatcher = results();

    let res = get(&dispatcher, "/api/results/bytes").await;
    assert_eq!(res.header("content-type"), Some("application/octet-stream"));
    assert_eq!(res.body.as_bytes(), &[1u8, 2, 3]);

    let res = get(&dispatcher, "/api/results/stream").await;
    assert_eq!(res.body, "chunk-1,chunk-2");
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use route_controller::observability::logging;
use route_controller::Dispatcher;

/// Status, headers and body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Route crate logs to the test harness output. Safe to call from every test.
#[allow(dead_code)]
pub fn init_logging() {
    logging::try_init_tracing("route_controller=debug");
}

/// Send one request through the dispatcher's router.
#[allow(dead_code)]
pub async fn send(dispatcher: &Dispatcher, method: Method, uri: &str, body: &str) -> TestResponse {
    init_logging();
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = dispatcher.router().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

#[allow(dead_code)]
pub async fn get(dispatcher: &Dispatcher, uri: &str) -> TestResponse {
    send(dispatcher, Method::GET, uri, "").await
}

/// Serve `router` on an ephemeral local port.
#[allow(dead_code)]
pub async fn start_server(router: Router) -> SocketAddr {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

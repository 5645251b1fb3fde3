//! HTTP server setup.
//!
//! # Responsibilities
//! - Expose a `Dispatcher` as a tower `Service` and an axum `Router`
//! - Buffer request bodies up to the configured limit
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind the server and shut down gracefully on Ctrl+C
//!
//! # Design Decisions
//! - One axum route set per controller, mounted at its base path
//! - The body is read fully before dispatch; handlers see `Bytes`
//! - A response left unfinished by the controller is still returned as is

use std::convert::Infallible;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, Response, StatusCode},
    Router,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;
use tokio::net::TcpListener;
use tower::Service;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

impl Dispatcher {
    /// Run one hyper request through the controller.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let limit = self.body_limit();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE);
        }

        let body = match axum::body::to_bytes(body, limit).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return error_response(StatusCode::BAD_REQUEST);
            }
        };

        let req = ApiRequest::from_parts(parts, body);
        let res = ApiResponse::new();
        self.handle(req, res.clone()).await;

        if !res.writable_ended() {
            tracing::warn!(
                controller = self.controller_name(),
                "Controller returned without finalizing the response"
            );
        }
        res.into_http()
    }

    /// Axum routes for this controller, mounted at its base path.
    pub fn router(&self) -> Router {
        let base = self.base_path();
        if base.is_empty() {
            return Router::new().fallback_service(self.clone());
        }

        // `{*rest}` does not match an empty remainder, so `{base}/` is mounted on its own.
        Router::new()
            .route_service(base, self.clone())
            .route_service(&format!("{base}/"), self.clone())
            .route_service(&format!("{base}/{{*rest}}"), self.clone())
    }
}

impl Service<Request<Body>> for Dispatcher {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let dispatcher = self.clone();
        async move { Ok(dispatcher.serve(request).await) }.boxed()
    }
}

fn error_response(status: StatusCode) -> Response<Body> {
    let message = status.canonical_reason().unwrap_or_default();
    let body = json!({ "message": message }).to_string();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Request IDs as random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// HTTP server hosting a set of controllers.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig, dispatchers: &[Dispatcher]) -> Self {
        let router = Self::build_router(&config, dispatchers);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ServerConfig, dispatchers: &[Dispatcher]) -> Router {
        let router = dispatchers
            .iter()
            .fold(Router::new(), |router, dispatcher| {
                tracing::info!(
                    controller = dispatcher.controller_name(),
                    base_path = %dispatcher.base_path(),
                    routes = dispatcher.routes().len(),
                    "Controller mounted"
                );
                router.merge(dispatcher.router())
            });

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

//! Response handle written by middlewares, handlers and results.
//!
//! # Responsibilities
//! - Accumulate status, headers and body for one request
//! - Track whether the response has been finalized (`writable_ended`)
//! - Convert into an `http::Response` for the host runtime
//!
//! # Design Decisions
//! - Cheap to clone: every clone writes to the same response
//! - Finalizing is one-way; writes after the end are dropped with a warning
//!   instead of failing, so late writers never corrupt a sent response
//! - Streaming bodies are handed to the host as-is, never buffered

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::TryStream;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::error::BoxError;

pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Failure to set a response header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error(transparent)]
    InvalidName(#[from] InvalidHeaderName),

    #[error(transparent)]
    InvalidValue(#[from] InvalidHeaderValue),
}

#[derive(Default)]
enum ResponseBody {
    #[default]
    Empty,
    Buffered(BytesMut),
    Streaming(Body),
}

struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    ended: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            ended: false,
        }
    }
}

/// Outgoing response.
#[derive(Clone, Default)]
pub struct ApiResponse {
    inner: Arc<Mutex<ResponseState>>,
}

impl ApiResponse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the status code. Codes outside 100..=999 are ignored.
    pub fn status(&self, code: u16) -> &Self {
        match StatusCode::from_u16(code) {
            Ok(status) => {
                let mut state = self.state();
                if state.ended {
                    warn!(status = code, "status change after response ended ignored");
                } else {
                    state.status = status;
                }
            }
            Err(_) => warn!(status = code, "invalid status code ignored"),
        }
        self
    }

    pub fn status_code(&self) -> u16 {
        self.state().status.as_u16()
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<&Self, HeaderError> {
        let name = HeaderName::try_from(name)?;
        let value = HeaderValue::try_from(value)?;
        Ok(self.insert_header(name, value))
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        let mut state = self.state();
        if state.ended {
            warn!(header = %name, "header set after response ended ignored");
        } else {
            state.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Append a chunk to the body without finalizing.
    pub fn write(&self, chunk: impl Into<Bytes>) -> &Self {
        let chunk = chunk.into();
        let mut state = self.state();
        if state.ended {
            warn!(bytes = chunk.len(), "write after response ended ignored");
            return self;
        }

        if let ResponseBody::Empty = state.body {
            state.body = ResponseBody::Buffered(BytesMut::with_capacity(chunk.len()));
        }
        match &mut state.body {
            ResponseBody::Buffered(buf) => buf.extend_from_slice(&chunk),
            _ => warn!("write to a streaming response ignored"),
        }
        self
    }

    /// Send a body and finalize. Defaults the content type to UTF-8 text.
    pub fn send(&self, body: impl Into<Bytes>) {
        if self.writable_ended() {
            warn!("send after response ended ignored");
            return;
        }
        self.default_content_type(TEXT_PLAIN_UTF8);
        self.write(body);
        self.end();
    }

    /// Serialize `value` as the JSON body and finalize.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        if self.writable_ended() {
            warn!("json after response ended ignored");
            return Ok(());
        }
        self.default_content_type(APPLICATION_JSON);
        self.write(body);
        self.end();
        Ok(())
    }

    /// Drop any unsent body and its content type. No effect once ended.
    pub(crate) fn discard_body(&self) {
        let mut state = self.state();
        if !state.ended {
            state.body = ResponseBody::Empty;
            state.headers.remove(header::CONTENT_TYPE);
        }
    }

    /// Finalize the response.
    pub fn end(&self) {
        self.state().ended = true;
    }

    /// Redirect to `uri` with the given status and finalize.
    pub fn redirect(&self, code: u16, uri: &str) -> Result<(), HeaderError> {
        let location = HeaderValue::try_from(uri)?;
        self.status(code).insert_header(header::LOCATION, location);
        self.end();
        Ok(())
    }

    /// Use `stream` as the body and finalize.
    pub fn pipe<S>(&self, stream: S)
    where
        S: TryStream + Send + 'static,
        S::Ok: Into<Bytes>,
        S::Error: Into<BoxError>,
    {
        let mut state = self.state();
        if state.ended {
            warn!("pipe after response ended ignored");
            return;
        }
        state.body = ResponseBody::Streaming(Body::from_stream(stream));
        state.ended = true;
    }

    pub fn writable_ended(&self) -> bool {
        self.state().ended
    }

    /// Take the accumulated response for the host runtime.
    pub fn into_http(&self) -> Response<Body> {
        let mut state = self.state();
        let body = match mem::take(&mut state.body) {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Buffered(buf) => Body::from(buf.freeze()),
            ResponseBody::Streaming(body) => body,
        };

        let mut response = Response::new(body);
        *response.status_mut() = state.status;
        *response.headers_mut() = mem::take(&mut state.headers);
        response
    }

    fn default_content_type(&self, value: &'static str) {
        let mut state = self.state();
        if !state.headers.contains_key(header::CONTENT_TYPE) {
            state
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }
}

impl std::fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ApiResponse")
            .field("status", &state.status)
            .field("ended", &state.ended)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(res: &ApiResponse) -> String {
        let bytes = axum::body::to_bytes(res.into_http().into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_send_sets_text_content_type() {
        let res = ApiResponse::new();
        res.status(201).send("hello");

        assert!(res.writable_ended());
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("content-type").as_deref(), Some(TEXT_PLAIN_UTF8));
        assert_eq!(body_text(&res).await, "hello");
    }

    #[tokio::test]
    async fn test_json_keeps_explicit_content_type() {
        let res = ApiResponse::new();
        res.set_header("content-type", "application/vnd.api+json").unwrap();
        res.json(&serde_json::json!({"ok": true})).unwrap();

        assert_eq!(
            res.header("content-type").as_deref(),
            Some("application/vnd.api+json")
        );
        assert_eq!(body_text(&res).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_writes_after_end_are_ignored() {
        let res = ApiResponse::new();
        res.send("first");
        res.status(500).send("second");
        res.write("third");

        assert_eq!(res.status_code(), 200);
        assert_eq!(body_text(&res).await, "first");
    }

    #[tokio::test]
    async fn test_write_accumulates_until_end() {
        let res = ApiResponse::new();
        res.write("Hello ").write("World");
        assert!(!res.writable_ended());
        res.end();
        assert_eq!(body_text(&res).await, "Hello World");
    }

    #[test]
    fn test_redirect_sets_location() {
        let res = ApiResponse::new();
        res.redirect(307, "/api/login").unwrap();

        assert_eq!(res.status_code(), 307);
        assert_eq!(res.header("location").as_deref(), Some("/api/login"));
        assert!(res.writable_ended());
    }

    #[test]
    fn test_invalid_header_name_is_an_error() {
        let res = ApiResponse::new();
        assert!(res.set_header("bad header", "x").is_err());
    }

    #[tokio::test]
    async fn test_pipe_streams_body() {
        let res = ApiResponse::new();
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);
        res.pipe(chunks);

        assert!(res.writable_ended());
        assert_eq!(body_text(&res).await, "abcd");
    }
}

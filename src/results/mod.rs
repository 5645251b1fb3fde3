//! Results: values a handler returns to describe the response.
//!
//! # Data Flow
//! ```text
//! handler → Reply (reply.rs)
//!     → Null / Undefined      → configured status code, empty body
//!     → Text / Json           → 200 with body
//!     → Result(ActionResult)  → ActionResult::resolve writes the response
//! ```
//!
//! # Design Decisions
//! - Every variant resolves against the response exactly once (consumes self)
//! - Status results without a custom message are pre-rendered and cached
//!   per code in a process-wide map
//! - Files are streamed in chunks, never read fully into memory
//! - Reason phrases come from the `http` crate's canonical table

pub mod reply;

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use axum::http::header::{self, HeaderValue};
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, Stream};
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::BoxError;
use crate::http::response::{ApiResponse, TEXT_PLAIN_UTF8};

pub use reply::Reply;

const FILE_CHUNK_SIZE: usize = 64 * 1024;

pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;
pub type ResolveFn = Box<dyn FnOnce(ApiResponse) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Standard reason phrase for a status code.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    StatusCode::from_u16(code).ok()?.canonical_reason()
}

/// A status code with a plain-text body.
#[derive(Debug, Clone)]
pub struct StatusResult {
    code: u16,
    body: Option<Bytes>,
}

impl StatusResult {
    fn new(code: u16, message: Option<String>) -> Self {
        let body = match message {
            Some(message) => Some(Bytes::from(message)),
            None if code == 204 || code == 304 => None,
            None => reason_phrase(code).map(|phrase| Bytes::from_static(phrase.as_bytes())),
        };
        Self { code, body }
    }

    fn cached(code: u16) -> Self {
        static CACHE: OnceLock<DashMap<u16, StatusResult>> = OnceLock::new();

        if reason_phrase(code).is_none() {
            return Self::new(code, None);
        }

        CACHE
            .get_or_init(DashMap::new)
            .entry(code)
            .or_insert_with(|| Self::new(code, None))
            .clone()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    fn resolve(self, res: &ApiResponse) {
        res.status(self.code);
        match self.body {
            Some(body) => {
                res.insert_header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
                res.send(body);
            }
            None => res.end(),
        }
    }
}

/// Describes how to write the response.
pub enum ActionResult {
    Status(StatusResult),
    Created { data: Value, uri: String },
    File { path: PathBuf, content_type: String },
    Download { path: PathBuf, content_type: String, file_name: Option<String> },
    Bytes { bytes: Bytes, content_type: String },
    Stream { stream: ByteStream, content_type: String },
    Redirect { uri: String, permanent: bool },
    Function(ResolveFn),
}

impl ActionResult {
    pub fn status(code: u16) -> Self {
        ActionResult::Status(StatusResult::cached(code))
    }

    /// Replace the default reason phrase of a status result. Other variants
    /// are returned unchanged.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            ActionResult::Status(status) => {
                ActionResult::Status(StatusResult::new(status.code, Some(message.into())))
            }
            other => other,
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn accepted() -> Self {
        Self::status(202)
    }

    pub fn no_content() -> Self {
        Self::status(204)
    }

    pub fn bad_request() -> Self {
        Self::status(400)
    }

    pub fn unauthorized() -> Self {
        Self::status(401)
    }

    pub fn forbidden() -> Self {
        Self::status(403)
    }

    pub fn not_found() -> Self {
        Self::status(404)
    }

    pub fn internal_server_error() -> Self {
        Self::status(500)
    }

    /// 201 with a `Location` header and `data` as JSON.
    pub fn created<T: Serialize + ?Sized>(data: &T, uri: impl Into<String>) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => ActionResult::Created {
                data,
                uri: uri.into(),
            },
            Err(e) => Self::failed(e),
        }
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self::from_fn(move |res: ApiResponse| async move {
                res.json(&value)?;
                Ok::<(), BoxError>(())
            }),
            Err(e) => Self::failed(e),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |res: ApiResponse| async move {
            res.send(text);
            Ok::<(), BoxError>(())
        })
    }

    /// Stream a file, relative to the working directory.
    pub fn file(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Self {
        ActionResult::File {
            path: path.into(),
            content_type: content_type.into(),
        }
    }

    /// Like [`ActionResult::file`], sent as an attachment. The file name
    /// defaults to the last path component.
    pub fn download(
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
        file_name: Option<String>,
    ) -> Self {
        ActionResult::Download {
            path: path.into(),
            content_type: content_type.into(),
            file_name,
        }
    }

    pub fn bytes(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        ActionResult::Bytes {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn stream<S, E>(stream: S, content_type: impl Into<String>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        ActionResult::Stream {
            stream: stream.map_err(|e| -> BoxError { e.into() }).boxed(),
            content_type: content_type.into(),
        }
    }

    /// Temporary redirect (307).
    pub fn redirect(uri: impl Into<String>) -> Self {
        ActionResult::Redirect {
            uri: uri.into(),
            permanent: false,
        }
    }

    /// Permanent redirect (308).
    pub fn permanent_redirect(uri: impl Into<String>) -> Self {
        ActionResult::Redirect {
            uri: uri.into(),
            permanent: true,
        }
    }

    /// Custom resolution with direct access to the response.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(ApiResponse) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        ActionResult::Function(Box::new(move |res: ApiResponse| f(res).boxed()))
    }

    fn failed(error: impl Into<BoxError>) -> Self {
        let error = error.into();
        Self::from_fn(move |_res: ApiResponse| async move { Err::<(), BoxError>(error) })
    }

    /// Write this result to `res`.
    pub async fn resolve(self, res: &ApiResponse) -> Result<(), BoxError> {
        match self {
            ActionResult::Status(status) => status.resolve(res),
            ActionResult::Created { data, uri } => {
                res.set_header(header::LOCATION.as_str(), &uri)?;
                res.status(201);
                res.json(&data)?;
            }
            ActionResult::File { path, content_type } => {
                send_file(res, &path, &content_type, None).await?;
            }
            ActionResult::Download {
                path,
                content_type,
                file_name,
            } => {
                let file_name = file_name.unwrap_or_else(|| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });
                send_file(res, &path, &content_type, Some(&file_name)).await?;
            }
            ActionResult::Bytes {
                bytes,
                content_type,
            } => {
                res.set_header(header::CONTENT_TYPE.as_str(), &content_type)?;
                res.status(200).write(bytes);
                res.end();
            }
            ActionResult::Stream {
                stream,
                content_type,
            } => {
                res.set_header(header::CONTENT_TYPE.as_str(), &content_type)?;
                res.status(200).pipe(stream);
            }
            ActionResult::Redirect { uri, permanent } => {
                res.redirect(if permanent { 308 } else { 307 }, &uri)?;
            }
            ActionResult::Function(f) => f(res.clone()).await?,
        }
        Ok(())
    }
}

impl fmt::Debug for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionResult::Status(status) => f.debug_tuple("Status").field(&status.code).finish(),
            ActionResult::Created { uri, .. } => f.debug_struct("Created").field("uri", uri).finish(),
            ActionResult::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
            ActionResult::Download { path, .. } => {
                f.debug_struct("Download").field("path", path).finish()
            }
            ActionResult::Bytes { bytes, .. } => {
                f.debug_struct("Bytes").field("len", &bytes.len()).finish()
            }
            ActionResult::Stream { content_type, .. } => f
                .debug_struct("Stream")
                .field("content_type", content_type)
                .finish(),
            ActionResult::Redirect { uri, permanent } => f
                .debug_struct("Redirect")
                .field("uri", uri)
                .field("permanent", permanent)
                .finish(),
            ActionResult::Function(_) => f.write_str("Function(..)"),
        }
    }
}

async fn send_file(
    res: &ApiResponse,
    path: &Path,
    content_type: &str,
    attachment: Option<&str>,
) -> Result<(), BoxError> {
    let full_path = std::env::current_dir()?.join(path);
    let file = File::open(&full_path).await?;

    if let Some(file_name) = attachment {
        res.set_header(
            header::CONTENT_DISPOSITION.as_str(),
            &format!("attachment; filename={file_name}"),
        )?;
    }
    res.set_header(header::CONTENT_TYPE.as_str(), content_type)?;
    res.status(200).pipe(file_chunks(file));
    Ok(())
}

fn file_chunks(file: File) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(FILE_CHUNK_SIZE);
        if file.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some((buf.freeze(), file)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolved(result: ActionResult) -> (u16, Option<String>, String) {
        let res = ApiResponse::new();
        result.resolve(&res).await.unwrap();
        let status = res.status_code();
        let content_type = res.header("content-type");
        let body = axum::body::to_bytes(res.into_http().into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(206), Some("Partial Content"));
        assert_eq!(reason_phrase(302), Some("Found"));
        assert_eq!(reason_phrase(418), Some("I'm a teapot"));
        assert_eq!(reason_phrase(501), Some("Not Implemented"));
        assert_eq!(reason_phrase(599), None);
    }

    #[tokio::test]
    async fn test_status_uses_reason_phrase() {
        let (status, content_type, body) = resolved(ActionResult::not_found()).await;
        assert_eq!(status, 404);
        assert_eq!(content_type.as_deref(), Some(TEXT_PLAIN_UTF8));
        assert_eq!(body, "Not Found");
    }

    #[tokio::test]
    async fn test_status_with_message() {
        let (status, _, body) =
            resolved(ActionResult::not_found().with_message("User not found")).await;
        assert_eq!(status, 404);
        assert_eq!(body, "User not found");
    }

    #[tokio::test]
    async fn test_no_content_has_no_body() {
        let (status, content_type, body) = resolved(ActionResult::no_content()).await;
        assert_eq!(status, 204);
        assert!(content_type.is_none());
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_without_message() {
        let (status, _, body) = resolved(ActionResult::status(599)).await;
        assert_eq!(status, 599);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_created() {
        let res = ApiResponse::new();
        ActionResult::created(&serde_json::json!({"id": 3}), "/api/users/3")
            .resolve(&res)
            .await
            .unwrap();

        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("location").as_deref(), Some("/api/users/3"));
        assert_eq!(res.header("content-type").as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_bytes() {
        let (status, content_type, body) =
            resolved(ActionResult::bytes(&b"raw"[..], "application/octet-stream")).await;
        assert_eq!(status, 200);
        assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(body, "raw");
    }

    #[tokio::test]
    async fn test_redirects() {
        let res = ApiResponse::new();
        ActionResult::redirect("/a").resolve(&res).await.unwrap();
        assert_eq!(res.status_code(), 307);

        let res = ApiResponse::new();
        ActionResult::permanent_redirect("/b").resolve(&res).await.unwrap();
        assert_eq!(res.status_code(), 308);
        assert_eq!(res.header("location").as_deref(), Some("/b"));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let res = ApiResponse::new();
        let result = ActionResult::file("does/not/exist.txt", "text/plain")
            .resolve(&res)
            .await;
        assert!(result.is_err());
        assert!(!res.writable_ended());
    }
}

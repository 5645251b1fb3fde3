//! Error handling, no-match handling and reply normalization.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;
use tracing::error;

use crate::error::BoxError;
use crate::http::context::HttpContext;
use crate::http::response::ApiResponse;
use crate::registry::ControllerConfig;
use crate::results::{reason_phrase, Reply};

/// Controller-level error handler, set through `ControllerConfig::on_error`.
///
/// Implemented for closures `Fn(BoxError, HttpContext) -> Future` and for
/// any type that implements it directly.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_error(&self, error: BoxError, ctx: HttpContext) -> BoxFuture<'static, Result<Reply, BoxError>>;
}

impl<F, Fut, R> ErrorHandler for F
where
    F: Fn(BoxError, HttpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
    R: Into<Reply>,
{
    fn on_error(&self, error: BoxError, ctx: HttpContext) -> BoxFuture<'static, Result<Reply, BoxError>> {
        let fut = self(error, ctx);
        async move { fut.await.map(Into::into) }.boxed()
    }
}

/// Log the error and answer 500 with `{"message": ...}`.
pub fn default_on_error(error: &(dyn std::error::Error + Send + Sync), res: &ApiResponse) {
    error!(error = %error, "Unhandled controller error");

    if res.writable_ended() {
        return;
    }

    let message = error.to_string();
    let message = if message.is_empty() {
        reason_phrase(500).unwrap_or_default().to_string()
    } else {
        message
    };
    res.discard_body();
    send_message(res, 500, &message);
}

/// Answer 404 with `{"message": "Not Found"}`.
pub fn default_on_no_match(res: &ApiResponse) {
    if !res.writable_ended() {
        send_message(res, 404, reason_phrase(404).unwrap_or_default());
    }
}

fn send_message(res: &ApiResponse, status: u16, message: &str) {
    if let Err(e) = res.status(status).json(&json!({ "message": message })) {
        error!(error = %e, "Failed to serialize error body");
    }
}

/// Write `reply` to `res` unless the response has already been finalized.
pub async fn send_response(
    res: &ApiResponse,
    reply: Reply,
    config: &ControllerConfig,
) -> Result<(), BoxError> {
    if res.writable_ended() {
        return Ok(());
    }

    match reply {
        Reply::Null => {
            res.status(config.status_code_on_null);
            res.end();
        }
        Reply::Undefined => {
            res.status(config.status_code_on_undefined);
            res.end();
        }
        Reply::Json(value) => res.json(&value)?,
        Reply::Text(text) => res.send(text),
        Reply::Result(result) => result.resolve(res).await?,
    }
    Ok(())
}

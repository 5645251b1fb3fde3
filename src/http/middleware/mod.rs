//! Controller middlewares.
//!
//! # Data Flow
//! ```text
//! Dispatcher (route matched)
//!     → chain.rs: controller-wide middlewares, in registration order
//!     → chain.rs: route middlewares, in registration order
//!     → ChainOutcome::Completed → handler runs
//!     → ChainOutcome::Halted    → dispatcher stops, response left as written
//!     → ChainOutcome::Failed(e) → controller error handler
//! ```
//!
//! # Design Decisions
//! - A middleware signals continuation through `Next`, exactly once;
//!   dropping `Next` without calling it halts the chain
//! - Two explicit variants replace argument-count inspection: `Standard`
//!   middlewares never see errors, `ErrorAware` ones receive the pending one
//! - Returning `Err` is the same as calling `next.fail(err)`

pub mod chain;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::error::BoxError;
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

pub use chain::{run_middlewares, ChainOutcome};

pub type MiddlewareFuture = BoxFuture<'static, Result<(), BoxError>>;

type StandardFn = dyn Fn(ApiRequest, ApiResponse, Next) -> MiddlewareFuture + Send + Sync;
type ErrorAwareFn =
    dyn Fn(Option<BoxError>, ApiRequest, ApiResponse, Next) -> MiddlewareFuture + Send + Sync;

pub(crate) enum Continuation {
    Proceed,
    Fail(BoxError),
}

/// Continuation handed to a middleware.
pub struct Next {
    tx: oneshot::Sender<Continuation>,
}

impl Next {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Continuation>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Continue with the next middleware (clears a pending error).
    pub fn run(self) {
        let _ = self.tx.send(Continuation::Proceed);
    }

    /// Abort the chain and hand `error` to the error handling.
    pub fn fail(self, error: impl Into<BoxError>) {
        let _ = self.tx.send(Continuation::Fail(error.into()));
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A middleware registered on a controller or a route.
#[derive(Clone)]
pub enum Middleware {
    Standard(Arc<StandardFn>),
    ErrorAware(Arc<ErrorAwareFn>),
}

impl Middleware {
    /// `(request, response, next)` middleware.
    pub fn standard<F, Fut>(f: F) -> Self
    where
        F: Fn(ApiRequest, ApiResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Middleware::Standard(Arc::new(
            move |req: ApiRequest, res: ApiResponse, next: Next| f(req, res, next).boxed(),
        ))
    }

    /// `(error, request, response, next)` middleware. Also runs when no
    /// error is pending, with `None`.
    pub fn error_aware<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<BoxError>, ApiRequest, ApiResponse, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Middleware::ErrorAware(Arc::new(
            move |error: Option<BoxError>, req: ApiRequest, res: ApiResponse, next: Next| {
                f(error, req, res, next).boxed()
            },
        ))
    }

    pub fn is_error_aware(&self) -> bool {
        matches!(self, Middleware::ErrorAware(_))
    }

    pub(crate) fn call(
        &self,
        error: Option<BoxError>,
        req: ApiRequest,
        res: ApiResponse,
        next: Next,
    ) -> MiddlewareFuture {
        match self {
            Middleware::Standard(f) => f(req, res, next),
            Middleware::ErrorAware(f) => f(error, req, res, next),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Middleware::Standard(_) => f.write_str("Middleware::Standard"),
            Middleware::ErrorAware(_) => f.write_str("Middleware::ErrorAware"),
        }
    }
}

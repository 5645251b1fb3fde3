//! Sequential middleware execution with an optional per-middleware timeout.
//!
//! # Responsibilities
//! - Run middlewares one at a time, in order
//! - Track the pending error and route it to error-aware middlewares
//! - Bound each middleware by a deadline so a stuck one cannot hang dispatch
//!
//! # Design Decisions
//! - With a timeout, each middleware runs as its own tokio task; the task is
//!   not cancelled when the deadline passes, the chain just stops waiting
//! - A continuation signaled before the deadline is honored even if the
//!   middleware future itself is still running
//! - A timeout halts the chain without an error to avoid a second response

use std::time::Duration;

use tokio::sync::oneshot::Receiver;
use tracing::{debug, warn};

use super::{Continuation, Middleware, Next};
use crate::error::BoxError;
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::observability::metrics;

/// Result of running a middleware chain.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every middleware continued; dispatch proceeds.
    Completed,
    /// A middleware did not continue; it is assumed to own the response.
    Halted,
    /// An error was signaled and not cleared by an error-aware middleware.
    Failed(BoxError),
}

impl ChainOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainOutcome::Completed)
    }
}

/// Run `middlewares` against one request.
pub async fn run_middlewares(
    middlewares: &[Middleware],
    req: &ApiRequest,
    res: &ApiResponse,
    timeout: Option<Duration>,
    controller: &'static str,
) -> ChainOutcome {
    let mut pending: Option<BoxError> = None;

    for (index, middleware) in middlewares.iter().enumerate() {
        if pending.is_some() && !middleware.is_error_aware() {
            debug!(controller, index, "skipping middleware while an error is pending");
            continue;
        }

        let (next, mut rx) = Next::channel();
        let future = middleware.call(pending.take(), req.clone(), res.clone(), next);

        let returned = match timeout {
            None => future.await,
            Some(limit) => match tokio::time::timeout(limit, tokio::spawn(future)).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(BoxError::from(format!(
                    "middleware task failed: {join_error}"
                ))),
                Err(_) => match signaled(&mut rx) {
                    Some(continuation) => {
                        apply(continuation, &mut pending);
                        continue;
                    }
                    None => {
                        warn!(
                            controller,
                            index,
                            timeout_ms = limit.as_millis() as u64,
                            "middleware timed out without calling next"
                        );
                        metrics::record_middleware_timeout(controller);
                        return ChainOutcome::Halted;
                    }
                },
            },
        };

        if let Err(error) = returned {
            pending = Some(error);
            continue;
        }

        match signaled(&mut rx) {
            Some(continuation) => apply(continuation, &mut pending),
            None => {
                debug!(controller, index, "middleware halted the chain");
                return ChainOutcome::Halted;
            }
        }
    }

    match pending {
        Some(error) => ChainOutcome::Failed(error),
        None => ChainOutcome::Completed,
    }
}

fn signaled(rx: &mut Receiver<Continuation>) -> Option<Continuation> {
    rx.try_recv().ok()
}

fn apply(continuation: Continuation, pending: &mut Option<BoxError>) {
    *pending = match continuation {
        Continuation::Proceed => None,
        Continuation::Fail(error) => Some(error),
    };
}

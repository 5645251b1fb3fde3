//! Per-request context handed to handlers and hooks.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;

/// Controller state as seen by one request: either the controller's shared
/// value or a fresh value produced for this request.
#[derive(Clone)]
pub struct ControllerState(Arc<dyn Any + Send + Sync>);

impl ControllerState {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(())
    }
}

impl std::fmt::Debug for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ControllerState(..)")
    }
}

/// Everything a handler needs for the current request.
#[derive(Clone, Debug)]
pub struct HttpContext {
    pub request: ApiRequest,
    pub response: ApiResponse,
    state: ControllerState,
}

impl HttpContext {
    pub fn new(request: ApiRequest, response: ApiResponse, state: ControllerState) -> Self {
        Self {
            request,
            response,
            state,
        }
    }

    /// The controller state, if it has type `T`.
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    pub fn controller_state(&self) -> &ControllerState {
        &self.state
    }
}

/// Controller field receiving the current request's context.
///
/// The slot holds the context of the most recent request to enter the
/// controller. With concurrent requests on one controller, a handler may
/// observe another request's context; prefer the `HttpContext` argument
/// when requests can overlap.
#[derive(Default)]
pub struct ContextSlot(ArcSwapOption<HttpContext>);

impl ContextSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<HttpContext>> {
        self.0.load_full()
    }

    pub fn set(&self, ctx: HttpContext) {
        self.0.store(Some(Arc::new(ctx)));
    }

    pub fn clear(&self) {
        self.0.store(None);
    }
}

impl std::fmt::Debug for ContextSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContextSlot")
            .field(&self.0.load().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use bytes::Bytes;

    fn context(path: &str, state: ControllerState) -> HttpContext {
        let request = ApiRequest::new(
            Method::GET,
            path.parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        HttpContext::new(request, ApiResponse::new(), state)
    }

    #[test]
    fn test_state_downcast() {
        let ctx = context("/", ControllerState::new(7u32));
        assert_eq!(ctx.state::<u32>(), Some(&7));
        assert!(ctx.state::<String>().is_none());
    }

    #[test]
    fn test_slot_holds_latest_context() {
        let slot = ContextSlot::new();
        assert!(slot.get().is_none());

        slot.set(context("/first", ControllerState::default()));
        slot.set(context("/second", ControllerState::default()));
        assert_eq!(slot.get().unwrap().request.path(), "/second");

        slot.clear();
        assert!(slot.get().is_none());
    }
}

//! Metadata records attached to controller types.
//!
//! # Responsibilities
//! - Describe controllers, actions, middlewares, context injections and
//!   lifecycle hooks independently of any dispatcher
//! - Hold type-erased handler functions bound to a controller type
//! - Define the controller-level configuration and state sources
//!
//! # Design Decisions
//! - Handlers are stored erased (`Arc<dyn Any>` instance in, future out) so
//!   one registry can hold every controller type; the concrete type is
//!   recovered by downcasting, which only fails on a wiring bug
//! - State sources are explicit variants instead of runtime inspection of
//!   "value, promise or function"

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use tokio::sync::OnceCell;

use crate::dispatcher::ErrorHandler;
use crate::error::{BoxError, DispatchError};
use crate::http::context::{ControllerState, HttpContext};
use crate::http::middleware::Middleware;
use crate::results::Reply;
use crate::routing::{ActionMethod, RoutePattern};

/// A controller instance with its type erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub type RouteFn =
    Arc<dyn Fn(Instance, HttpContext) -> BoxFuture<'static, Result<Reply, BoxError>> + Send + Sync>;
pub type HookFn =
    Arc<dyn Fn(Instance, HttpContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
pub type ErrorFn = Arc<
    dyn Fn(Instance, BoxError, HttpContext) -> BoxFuture<'static, Result<Reply, BoxError>>
        + Send
        + Sync,
>;
pub type InjectFn = Arc<dyn Fn(&Instance, &HttpContext) + Send + Sync>;
pub type UpcastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

type StateInit = Arc<dyn Fn() -> BoxFuture<'static, ControllerState> + Send + Sync>;

/// Identity of a controller type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ControllerType {
    pub fn of<C: Any>() -> Self {
        let full = type_name::<C>();
        let name = full.split('<').next().unwrap_or(full);
        Self {
            id: TypeId::of::<C>(),
            name: name.rsplit("::").next().unwrap_or(name),
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Where a controller's state comes from.
#[derive(Clone)]
pub enum StateSource {
    /// One value shared by every request.
    Shared(ControllerState),
    /// Produced once by an async initializer, then shared.
    Deferred {
        cell: Arc<OnceCell<ControllerState>>,
        init: StateInit,
    },
    /// Produced fresh for every request.
    PerRequest(StateInit),
}

impl StateSource {
    pub async fn resolve(&self) -> ControllerState {
        match self {
            StateSource::Shared(state) => state.clone(),
            StateSource::Deferred { cell, init } => cell.get_or_init(|| init()).await.clone(),
            StateSource::PerRequest(init) => init().await,
        }
    }
}

impl Default for StateSource {
    fn default() -> Self {
        StateSource::Shared(ControllerState::default())
    }
}

impl fmt::Debug for StateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateSource::Shared(_) => f.write_str("Shared"),
            StateSource::Deferred { cell, .. } => f
                .debug_struct("Deferred")
                .field("initialized", &cell.initialized())
                .finish(),
            StateSource::PerRequest(_) => f.write_str("PerRequest"),
        }
    }
}

/// Controller-level configuration.
#[derive(Clone)]
pub struct ControllerConfig {
    /// Status sent when a handler returns `Reply::Null`.
    pub status_code_on_null: u16,
    /// Status sent when a handler returns `Reply::Undefined`.
    pub status_code_on_undefined: u16,
    pub state: StateSource,
    /// Takes precedence over an `on_error` hook method.
    pub on_error: Option<Arc<dyn ErrorHandler>>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            status_code_on_null: 404,
            status_code_on_undefined: 404,
            state: StateSource::default(),
            on_error: None,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code_on_null(mut self, code: u16) -> Self {
        self.status_code_on_null = code;
        self
    }

    pub fn status_code_on_undefined(mut self, code: u16) -> Self {
        self.status_code_on_undefined = code;
        self
    }

    /// Share `value` across all requests.
    pub fn state<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.state = StateSource::Shared(ControllerState::new(value));
        self
    }

    /// Initialize the shared state on first use.
    pub fn deferred_state<F, Fut, T>(mut self, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Any + Send + Sync,
    {
        self.state = StateSource::Deferred {
            cell: Arc::new(OnceCell::new()),
            init: erase_state(init),
        };
        self
    }

    /// Produce a fresh state for every request.
    pub fn state_factory<F, Fut, T>(mut self, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Any + Send + Sync,
    {
        self.state = StateSource::PerRequest(erase_state(init));
        self
    }

    pub fn on_error(mut self, handler: impl ErrorHandler) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("status_code_on_null", &self.status_code_on_null)
            .field("status_code_on_undefined", &self.status_code_on_undefined)
            .field("state", &self.state)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ControllerMetadata {
    pub target: ControllerType,
    pub config: ControllerConfig,
}

#[derive(Debug, Clone)]
pub struct ActionMetadata {
    pub target: ControllerType,
    pub pattern: RoutePattern,
    pub method: ActionMethod,
    pub method_name: String,
}

impl ActionMetadata {
    /// Same method and pattern. Used for conflicts and inheritance overlay.
    pub fn same_route(&self, other: &ActionMetadata) -> bool {
        self.method == other.method && self.pattern == other.pattern
    }
}

/// A middleware; `method_name: None` applies to every route of the controller.
#[derive(Debug, Clone)]
pub struct MiddlewareMetadata {
    pub target: ControllerType,
    pub method_name: Option<String>,
    pub handler: Middleware,
}

#[derive(Clone)]
pub struct ContextInjectionMetadata {
    pub target: ControllerType,
    pub property_name: String,
    pub(crate) inject: InjectFn,
}

impl fmt::Debug for ContextInjectionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInjectionMetadata")
            .field("target", &self.target)
            .field("property_name", &self.property_name)
            .finish()
    }
}

/// Single-entry lifecycle hook (error, no-match, before/after request).
#[derive(Clone)]
pub struct HookMetadata<F> {
    pub target: ControllerType,
    pub method_name: String,
    pub(crate) handler: F,
}

impl<F> fmt::Debug for HookMetadata<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMetadata")
            .field("target", &self.target)
            .field("method_name", &self.method_name)
            .finish()
    }
}

/// Parent link declared with `extends`.
#[derive(Clone)]
pub(crate) struct ParentLink {
    pub target: ControllerType,
    pub upcast: UpcastFn,
}

pub(crate) fn downcast<C: Any + Send + Sync>(instance: Instance) -> Result<Arc<C>, BoxError> {
    instance.downcast::<C>().map_err(|_| {
        BoxError::from(DispatchError::InstanceMismatch {
            expected: type_name::<C>(),
        })
    })
}

pub(crate) fn erase_route<C, F, Fut, R>(handler: F) -> RouteFn
where
    C: Any + Send + Sync,
    F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(move |instance: Instance, ctx: HttpContext| match downcast::<C>(instance) {
        Ok(this) => {
            let fut = handler(this, ctx);
            async move { fut.await.map(Into::into) }.boxed()
        }
        Err(e) => future::ready(Err(e)).boxed(),
    })
}

pub(crate) fn erase_hook<C, F, Fut>(hook: F) -> HookFn
where
    C: Any + Send + Sync,
    F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |instance: Instance, ctx: HttpContext| match downcast::<C>(instance) {
        Ok(this) => hook(this, ctx).boxed(),
        Err(e) => future::ready(Err(e)).boxed(),
    })
}

pub(crate) fn erase_error<C, F, Fut, R>(handler: F) -> ErrorFn
where
    C: Any + Send + Sync,
    F: Fn(Arc<C>, BoxError, HttpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
    R: Into<Reply>,
{
    Arc::new(
        move |instance: Instance, error: BoxError, ctx: HttpContext| match downcast::<C>(instance)
        {
            Ok(this) => {
                let fut = handler(this, error, ctx);
                async move { fut.await.map(Into::into) }.boxed()
            }
            Err(e) => future::ready(Err(e)).boxed(),
        },
    )
}

fn erase_state<F, Fut, T>(init: F) -> StateInit
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Any + Send + Sync,
{
    Arc::new(move || init().map(ControllerState::new).boxed())
}

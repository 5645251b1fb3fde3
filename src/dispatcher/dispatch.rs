//! Per-controller request dispatch.
//!
//! # Responsibilities
//! - Bind a controller instance to its registered routes, middlewares and hooks
//! - Match each incoming request against the controller's base path and routes
//! - Run middlewares, hooks and the handler in order
//! - Convert handler output into a response and route failures to the error handler
//!
//! # Data Flow
//! ```text
//! request → state → context → query decode → base path → inject contexts
//!         → route lookup → controller middlewares → route middlewares
//!         → before hook → handler → send_response → after hook
//! ```
//!
//! # Design Decisions
//! - All metadata is resolved once in `build`; a request only reads it
//! - The dispatcher holds no lock; controller state synchronizes itself
//! - A failing error handler falls back to the default one

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info_span, Instrument};

use crate::dispatcher::base_path::strip_base;
use crate::dispatcher::handlers::{default_on_error, default_on_no_match, send_response, ErrorHandler};
use crate::dispatcher::options::DispatcherOptions;
use crate::error::{BoxError, ConfigError};
use crate::http::context::HttpContext;
use crate::http::middleware::{run_middlewares, ChainOutcome, Middleware};
use crate::http::request::ApiRequest;
use crate::http::response::ApiResponse;
use crate::observability::metrics;
use crate::registry::metadata::{ErrorFn, HookFn, InjectFn, Instance, RouteFn};
use crate::registry::{ControllerConfig, ControllerType, MetadataRegistry};
use crate::routing::{ActionMethod, Route, RoutePattern, RouteTable};

/// A registered method bound to the instance that defines it.
#[derive(Clone)]
struct Bound<F> {
    handler: F,
    instance: Instance,
}

/// A route target: the handler plus the route-level middlewares.
#[derive(Clone)]
struct RouteAction {
    handler: Bound<RouteFn>,
    middlewares: Vec<Middleware>,
}

enum ErrorTarget {
    Config(Arc<dyn ErrorHandler>),
    Method(Bound<ErrorFn>),
    Default,
}

struct DispatcherInner {
    controller: ControllerType,
    base_path: String,
    config: ControllerConfig,
    routes: RouteTable<RouteAction>,
    middlewares: Vec<Middleware>,
    contexts: Vec<Bound<InjectFn>>,
    on_error: ErrorTarget,
    on_no_match: Option<Bound<RouteFn>>,
    before_request: Option<Bound<HookFn>>,
    after_request: Option<Bound<HookFn>>,
    decode_query_params: bool,
    middleware_timeout: Option<Duration>,
    body_limit: usize,
}

/// Summary of a compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: ActionMethod,
    pub pattern: RoutePattern,
    pub method_name: String,
}

/// Request handler for one controller. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Build a dispatcher around a default-constructed `C`.
    pub fn build<C>(
        registry: &MetadataRegistry,
        options: impl Into<DispatcherOptions>,
    ) -> Result<Self, ConfigError>
    where
        C: Default + Any + Send + Sync,
    {
        Self::with_instance(registry, Arc::new(C::default()), options)
    }

    /// Build a dispatcher around an existing instance of `C`.
    pub fn with_instance<C>(
        registry: &MetadataRegistry,
        instance: Arc<C>,
        options: impl Into<DispatcherOptions>,
    ) -> Result<Self, ConfigError>
    where
        C: Any + Send + Sync,
    {
        let options = options.into();
        let controller = ControllerType::of::<C>();

        if let Some(error) = registry.error_for(controller.id) {
            return Err(error.clone());
        }

        let base_path = options.base_path.resolve()?;
        let root: Instance = instance;
        let instances = registry.instances(controller, root.clone())?;
        let instance_of = |id: TypeId| -> Instance {
            instances.get(&id).cloned().unwrap_or_else(|| root.clone())
        };

        let config = registry
            .get_controller(controller.id)
            .map(|meta| meta.config.clone())
            .unwrap_or_default();

        let middlewares = registry.get_middlewares(controller.id);
        let controller_middlewares = middlewares
            .iter()
            .filter(|meta| meta.method_name.is_none())
            .map(|meta| meta.handler.clone())
            .collect();

        let mut routes = Vec::new();
        for action in registry.get_actions(controller.id) {
            let (owner, handler) = registry
                .resolve_method(controller.id, &action.method_name)
                .ok_or_else(|| ConfigError::MissingMethod {
                    controller: controller.name,
                    method_name: action.method_name.clone(),
                })?;

            let route_middlewares = middlewares
                .iter()
                .filter(|meta| meta.method_name.as_deref() == Some(action.method_name.as_str()))
                .map(|meta| meta.handler.clone())
                .collect();

            let target = RouteAction {
                handler: Bound {
                    handler,
                    instance: instance_of(owner),
                },
                middlewares: route_middlewares,
            };
            routes.push(Route::new(
                &action.pattern,
                action.method,
                action.method_name.clone(),
                target,
            )?);
        }

        let contexts = registry
            .get_contexts(controller.id)
            .into_iter()
            .map(|meta| Bound {
                handler: meta.inject,
                instance: instance_of(meta.target.id),
            })
            .collect();

        let on_error = match (&config.on_error, registry.get_error_handler(controller.id)) {
            (Some(handler), _) => ErrorTarget::Config(handler.clone()),
            (None, Some(hook)) => ErrorTarget::Method(Bound {
                handler: hook.handler.clone(),
                instance: instance_of(hook.target.id),
            }),
            (None, None) => ErrorTarget::Default,
        };

        let on_no_match = registry
            .get_no_match_handler(controller.id)
            .map(|hook| Bound {
                handler: hook.handler.clone(),
                instance: instance_of(hook.target.id),
            });
        let before_request = registry
            .get_before_request(controller.id)
            .map(|hook| Bound {
                handler: hook.handler.clone(),
                instance: instance_of(hook.target.id),
            });
        let after_request = registry
            .get_after_request(controller.id)
            .map(|hook| Bound {
                handler: hook.handler.clone(),
                instance: instance_of(hook.target.id),
            });

        let routes = RouteTable::new(routes);
        debug!(
            controller = controller.name,
            base_path = %base_path,
            routes = routes.len(),
            "Controller dispatcher built"
        );

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                controller,
                base_path,
                config,
                routes,
                middlewares: controller_middlewares,
                contexts,
                on_error,
                on_no_match,
                before_request,
                after_request,
                decode_query_params: options.decode_query_params,
                middleware_timeout: options.middleware_timeout,
                body_limit: options.body_limit,
            }),
        })
    }

    /// Resolved base path; `""` when mounted at the root.
    pub fn base_path(&self) -> &str {
        &self.inner.base_path
    }

    pub fn controller_name(&self) -> &'static str {
        self.inner.controller.name
    }

    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner
            .routes
            .iter()
            .map(|route| RouteInfo {
                method: route.method,
                pattern: route.pattern().clone(),
                method_name: route.method_name.clone(),
            })
            .collect()
    }

    /// Serve one request. Every outcome, including failures, is written to
    /// `res`.
    pub async fn handle(&self, req: ApiRequest, res: ApiResponse) {
        let start = Instant::now();
        let method = req.method().clone();
        let span = info_span!(
            "dispatch",
            controller = self.inner.controller.name,
            method = %method,
            path = %req.path(),
            request_id = %req.request_id(),
        );

        self.process(req, res.clone()).instrument(span).await;

        metrics::record_request(
            self.inner.controller.name,
            method.as_str(),
            res.status_code(),
            start,
        );
    }

    async fn process(&self, req: ApiRequest, res: ApiResponse) {
        let inner = &*self.inner;

        let state = inner.config.state.resolve().await;
        let ctx = HttpContext::new(req.clone(), res.clone(), state);

        if inner.decode_query_params {
            req.decode_query();
        }

        let Some(path) = strip_base(&inner.base_path, req.path()) else {
            self.no_match(&ctx).await;
            return;
        };

        for context in &inner.contexts {
            (context.handler)(&context.instance, &ctx);
        }

        let Some((route, params)) = inner.routes.find(req.method(), path) else {
            self.no_match(&ctx).await;
            return;
        };
        debug!(route = %route.pattern(), method_name = %route.method_name, "Route matched");
        req.set_params(params);

        if let Err(error) = self.run_route(&route.target, &ctx).await {
            self.fail(error, &ctx).await;
        }
    }

    async fn run_route(&self, action: &RouteAction, ctx: &HttpContext) -> Result<(), BoxError> {
        let inner = &*self.inner;

        for chain in [&inner.middlewares, &action.middlewares] {
            if chain.is_empty() {
                continue;
            }
            match run_middlewares(
                chain,
                &ctx.request,
                &ctx.response,
                inner.middleware_timeout,
                inner.controller.name,
            )
            .await
            {
                ChainOutcome::Completed => {}
                ChainOutcome::Halted => return Ok(()),
                ChainOutcome::Failed(error) => return Err(error),
            }
            if ctx.response.writable_ended() {
                return Ok(());
            }
        }

        if let Some(hook) = &inner.before_request {
            (hook.handler)(hook.instance.clone(), ctx.clone()).await?;
        }

        let handler = &action.handler;
        let reply = (handler.handler)(handler.instance.clone(), ctx.clone()).await?;
        send_response(&ctx.response, reply, &inner.config).await?;

        if let Some(hook) = &inner.after_request {
            (hook.handler)(hook.instance.clone(), ctx.clone()).await?;
        }
        Ok(())
    }

    async fn fail(&self, error: BoxError, ctx: &HttpContext) {
        let inner = &*self.inner;
        metrics::record_error(inner.controller.name);

        let reply = match &inner.on_error {
            ErrorTarget::Config(handler) => handler.on_error(error, ctx.clone()).await,
            ErrorTarget::Method(hook) => {
                (hook.handler)(hook.instance.clone(), error, ctx.clone()).await
            }
            ErrorTarget::Default => {
                default_on_error(error.as_ref(), &ctx.response);
                return;
            }
        };

        let sent = match reply {
            Ok(reply) => send_response(&ctx.response, reply, &inner.config).await,
            Err(handler_error) => Err(handler_error),
        };
        if let Err(handler_error) = sent {
            error!(error = %handler_error, "Error handler failed");
            default_on_error(handler_error.as_ref(), &ctx.response);
        }
    }

    async fn no_match(&self, ctx: &HttpContext) {
        let inner = &*self.inner;
        metrics::record_no_match(inner.controller.name);
        debug!("No route matched");

        let Some(hook) = &inner.on_no_match else {
            default_on_no_match(&ctx.response);
            return;
        };

        let sent = match (hook.handler)(hook.instance.clone(), ctx.clone()).await {
            Ok(reply) => send_response(&ctx.response, reply, &inner.config).await,
            Err(error) => Err(error),
        };
        if let Err(error) = sent {
            self.fail(error, ctx).await;
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("controller", &self.inner.controller.name)
            .field("base_path", &self.inner.base_path)
            .field("routes", &self.inner.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method, Uri};
    use bytes::Bytes;

    #[derive(Default)]
    struct Hello;

    fn request(method: Method, uri: &str) -> ApiRequest {
        ApiRequest::new(method, uri.parse::<Uri>().unwrap(), HeaderMap::new(), Bytes::new())
    }

    async fn body(res: &ApiResponse) -> String {
        let bytes = axum::body::to_bytes(res.into_http().into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn hello_registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .controller::<Hello>()
            .get("/", "index", |_this, _ctx| async { Ok::<_, BoxError>("Hello World") })
            .get("/:name", "greet", |_this, ctx: HttpContext| async move {
                let name = ctx.request.param("name").unwrap_or_default();
                Ok::<_, BoxError>(format!("Hello {name}"))
            });
        registry
    }

    #[tokio::test]
    async fn test_dispatch_matches_route() {
        let dispatcher = Dispatcher::build::<Hello>(&hello_registry(), "hello").unwrap();
        assert_eq!(dispatcher.base_path(), "/api/hello");

        let res = ApiResponse::new();
        dispatcher.handle(request(Method::GET, "/api/hello/Ada"), res.clone()).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(body(&res).await, "Hello Ada");
    }

    #[tokio::test]
    async fn test_base_path_mismatch_is_no_match() {
        let dispatcher = Dispatcher::build::<Hello>(&hello_registry(), "hello").unwrap();

        let res = ApiResponse::new();
        dispatcher.handle(request(Method::GET, "/api/helloworld"), res.clone()).await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(body(&res).await, r#"{"message":"Not Found"}"#);
    }

    #[tokio::test]
    async fn test_handler_error_uses_default_handler() {
        let mut registry = MetadataRegistry::new();
        registry.controller::<Hello>().get("/", "index", |_this, _ctx| async {
            Err::<(), BoxError>("something broke".into())
        });
        let dispatcher = Dispatcher::build::<Hello>(&registry, "hello").unwrap();

        let res = ApiResponse::new();
        dispatcher.handle(request(Method::GET, "/api/hello"), res.clone()).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(body(&res).await, r#"{"message":"something broke"}"#);
    }

    #[tokio::test]
    async fn test_failing_error_handler_falls_back() {
        let mut registry = MetadataRegistry::new();
        registry
            .controller::<Hello>()
            .get("/", "index", |_this, _ctx| async { Err::<(), BoxError>("first".into()) })
            .on_error("on_error", |_this, _error, _ctx| async {
                Err::<(), BoxError>("second".into())
            });
        let dispatcher = Dispatcher::build::<Hello>(&registry, "hello").unwrap();

        let res = ApiResponse::new();
        dispatcher.handle(request(Method::GET, "/api/hello"), res.clone()).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(body(&res).await, r#"{"message":"second"}"#);
    }

    #[test]
    fn test_missing_method_is_reported() {
        let mut registry = MetadataRegistry::new();
        registry
            .controller::<Hello>()
            .route(ActionMethod::Get, "/", "undefined_method");

        let error = Dispatcher::build::<Hello>(&registry, "hello").unwrap_err();
        assert!(matches!(error, ConfigError::MissingMethod { .. }));
    }

    #[test]
    fn test_routes_lists_registration_order() {
        let dispatcher = Dispatcher::build::<Hello>(&hello_registry(), "hello").unwrap();
        let names: Vec<_> = dispatcher
            .routes()
            .into_iter()
            .map(|route| route.method_name)
            .collect();
        assert_eq!(names, ["index", "greet"]);
    }
}

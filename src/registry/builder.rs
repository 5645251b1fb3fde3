//! Fluent registration of a controller's routes, middlewares and hooks.
//!
//! ```ignore
//! registry
//!     .controller::<Users>()
//!     .config(ControllerConfig::new().state(UserStore::default()))
//!     .use_middleware(log_requests())
//!     .get("/", "list", |this, ctx| async move { this.list(ctx).await })
//!     .get("/:id", "get_by_id", |this, ctx| async move { this.get_by_id(ctx).await })
//!     .on_error("on_error", |_this, err, _ctx| async move { Ok(format!("{err}")) });
//! ```

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::BoxError;
use crate::http::context::{ContextSlot, HttpContext};
use crate::http::middleware::Middleware;
use crate::registry::metadata::{
    erase_error, erase_hook, erase_route, ActionMetadata, ContextInjectionMetadata,
    ControllerConfig, ControllerMetadata, ControllerType, HookMetadata, Instance, MiddlewareMetadata,
};
use crate::registry::storage::MetadataRegistry;
use crate::results::Reply;
use crate::routing::{ActionMethod, RoutePattern};

impl MetadataRegistry {
    /// Start registering metadata for controller type `C`.
    pub fn controller<C: Any + Send + Sync>(&mut self) -> ControllerBuilder<'_, C> {
        ControllerBuilder {
            registry: self,
            target: ControllerType::of::<C>(),
            _controller: PhantomData,
        }
    }
}

/// Registers metadata for controller type `C`. Configuration mistakes are
/// recorded in the registry and reported when the dispatcher is built.
pub struct ControllerBuilder<'r, C> {
    registry: &'r mut MetadataRegistry,
    target: ControllerType,
    _controller: PhantomData<fn() -> C>,
}

macro_rules! verb {
    ($($(#[$doc:meta])* $name:ident => $method:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name<F, Fut, R>(
                &mut self,
                pattern: impl Into<RoutePattern>,
                method_name: &str,
                handler: F,
            ) -> &mut Self
            where
                F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
                R: Into<Reply>,
            {
                self.action(ActionMethod::$method, pattern, method_name, handler)
            }
        )*
    };
}

impl<'r, C: Any + Send + Sync> ControllerBuilder<'r, C> {
    pub fn target(&self) -> ControllerType {
        self.target
    }

    pub fn config(&mut self, config: ControllerConfig) -> &mut Self {
        self.registry.add_controller(ControllerMetadata {
            target: self.target,
            config,
        });
        self
    }

    verb! {
        /// Matches every request method, with the lowest priority.
        all => All,
        get => Get,
        post => Post,
        put => Put,
        delete => Delete,
        patch => Patch,
        head => Head,
        options => Options,
        connect => Connect,
        trace => Trace,
    }

    /// Define `method_name` and route `method` + `pattern` to it.
    pub fn action<F, Fut, R>(
        &mut self,
        method: ActionMethod,
        pattern: impl Into<RoutePattern>,
        method_name: &str,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<Reply>,
    {
        self.method(method_name, handler);
        self.route(method, pattern, method_name)
    }

    /// Route to a method by name. The method may be defined later, or by an
    /// ancestor.
    pub fn route(
        &mut self,
        method: ActionMethod,
        pattern: impl Into<RoutePattern>,
        method_name: &str,
    ) -> &mut Self {
        let metadata = ActionMetadata {
            target: self.target,
            pattern: pattern.into(),
            method,
            method_name: method_name.to_string(),
        };
        if let Err(error) = self.registry.add_action(metadata) {
            self.registry.record_error(self.target, error);
        }
        self
    }

    /// Define or override a method without adding a route.
    pub fn method<F, Fut, R>(&mut self, method_name: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<Reply>,
    {
        self.registry
            .add_method(self.target, method_name, erase_route::<C, _, _, _>(handler));
        self
    }

    /// Middleware for every route of the controller.
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.registry.add_middleware(MiddlewareMetadata {
            target: self.target,
            method_name: None,
            handler: middleware,
        });
        self
    }

    /// Middleware for the routes bound to `method_name`.
    pub fn use_route_middleware(&mut self, method_name: &str, middleware: Middleware) -> &mut Self {
        self.registry.add_middleware(MiddlewareMetadata {
            target: self.target,
            method_name: Some(method_name.to_string()),
            handler: middleware,
        });
        self
    }

    /// Have the dispatcher store each request's context in the slot
    /// returned by `accessor`.
    pub fn inject_context<A>(&mut self, property_name: &str, accessor: A) -> &mut Self
    where
        A: Fn(&C) -> &ContextSlot + Send + Sync + 'static,
    {
        let inject = Arc::new(move |instance: &Instance, ctx: &HttpContext| {
            if let Some(controller) = (**instance).downcast_ref::<C>() {
                accessor(controller).set(ctx.clone());
            }
        });
        self.registry.add_context(ContextInjectionMetadata {
            target: self.target,
            property_name: property_name.to_string(),
            inject,
        });
        self
    }

    /// Runs before the route handler, after the middlewares.
    pub fn before_request<F, Fut>(&mut self, method_name: &str, hook: F) -> &mut Self
    where
        F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.registry.set_before_request(HookMetadata {
            target: self.target,
            method_name: method_name.to_string(),
            handler: erase_hook::<C, _, _>(hook),
        });
        self
    }

    /// Runs after the response was sent, only when no error occurred.
    pub fn after_request<F, Fut>(&mut self, method_name: &str, hook: F) -> &mut Self
    where
        F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.registry.set_after_request(HookMetadata {
            target: self.target,
            method_name: method_name.to_string(),
            handler: erase_hook::<C, _, _>(hook),
        });
        self
    }

    pub fn on_error<F, Fut, R>(&mut self, method_name: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<C>, BoxError, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<Reply>,
    {
        self.registry.set_error_handler(HookMetadata {
            target: self.target,
            method_name: method_name.to_string(),
            handler: erase_error::<C, _, _, _>(handler),
        });
        self
    }

    pub fn on_no_match<F, Fut, R>(&mut self, method_name: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<C>, HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<Reply>,
    {
        self.registry.set_no_match_handler(HookMetadata {
            target: self.target,
            method_name: method_name.to_string(),
            handler: erase_route::<C, _, _, _>(handler),
        });
        self
    }

    /// Declare `P` as the parent controller. `upcast` returns the parent
    /// instance embedded in a `C`.
    pub fn extends<P, U>(&mut self, upcast: U) -> &mut Self
    where
        P: Any + Send + Sync,
        U: Fn(&C) -> Arc<P> + Send + Sync + 'static,
    {
        let upcast = Arc::new(move |instance: &Instance| -> Option<Instance> {
            let child = (**instance).downcast_ref::<C>()?;
            let parent: Instance = upcast(child);
            Some(parent)
        });
        self.registry
            .set_parent(self.target, ControllerType::of::<P>(), upcast);
        self
    }
}

//! Controller-based HTTP routing.
//!
//! Controllers register their routes, middlewares and hooks in a
//! [`MetadataRegistry`]; a [`Dispatcher`] binds one controller instance to
//! that metadata and serves requests under the controller's base path.
//!
//! ```text
//! MetadataRegistry ──build──▶ Dispatcher ──router()──▶ axum::Router
//!                                  │
//!         request ─▶ base path ─▶ route ─▶ middlewares ─▶ handler ─▶ Reply
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod observability;
pub mod registry;
pub mod results;
pub mod routing;

pub use config::schema::ServerConfig;
pub use dispatcher::{BasePath, Dispatcher, DispatcherOptions, ErrorHandler};
pub use error::{BoxError, ConfigError, DispatchError};
pub use http::{ApiRequest, ApiResponse, ContextSlot, HttpContext, HttpServer, Middleware, Next};
pub use registry::{ControllerConfig, MetadataRegistry};
pub use results::{ActionResult, Reply};
pub use routing::{ActionMethod, RoutePattern};

//! HTTP surface seen by controllers.
//!
//! # Data Flow
//! ```text
//! hyper request (axum)
//!     → server.rs (body buffered, Dispatcher as tower Service)
//!     → request.rs (ApiRequest: params, query, extensions)
//!     → middleware/ (controller chain, route chain)
//!     → response.rs (ApiResponse: status, headers, body)
//!     → Response<Body> back to axum
//! ```

pub mod context;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use context::{ContextSlot, ControllerState, HttpContext};
pub use middleware::{Middleware, Next};
pub use request::{ApiRequest, Query, QueryValue, X_REQUEST_ID};
pub use response::{ApiResponse, HeaderError};
pub use server::HttpServer;

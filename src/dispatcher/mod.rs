//! Controller dispatch.
//!
//! # Data Flow
//! ```text
//! MetadataRegistry + controller instance + DispatcherOptions
//!     → Dispatcher::build (routes compiled, hooks bound)
//!     → Dispatcher::handle (per request)
//!     → handlers.rs (send_response, default error/no-match replies)
//! ```

pub mod base_path;
pub mod dispatch;
pub mod handlers;
pub mod options;

pub use base_path::BasePath;
pub use dispatch::{Dispatcher, RouteInfo};
pub use handlers::{default_on_error, default_on_no_match, send_response, ErrorHandler};
pub use options::DispatcherOptions;

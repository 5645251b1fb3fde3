//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (when a dispatcher is built):
//!     ActionMetadata[] (ancestors first, overridden by pattern)
//!     → matcher.rs (compile each pattern to an anchored regex)
//!     → router.rs (freeze as immutable RouteTable)
//!
//! Incoming Request (method, base-relative path)
//!     → router.rs (scan routes in order)
//!     → matcher.rs (evaluate pattern, extract params)
//!     → Return: matched Route + Params, or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Deterministic: same input always matches same route
//! - Method-specific routes take precedence over `ALL` routes

pub mod matcher;
pub mod method;
pub mod router;

pub use matcher::{Params, RouteMatcher, RoutePattern, WILDCARD_KEY};
pub use method::ActionMethod;
pub use router::{Route, RouteTable};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, middleware chain, handlers produce:
//!     → logging.rs (structured tracing events, one `dispatch` span per request)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout via the fmt layer, filtered by RUST_LOG
//!     → Prometheus scrape endpoint (installed by the binary)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and exporters is left
//!   to the binary so embedding applications keep control
//! - Request ID flows through the dispatch span
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

//! Controller metadata registry.
//!
//! # Data Flow
//! ```text
//! Application startup:
//!     builder.rs (ControllerBuilder: get/post/.../use_middleware/on_error)
//!     → storage.rs (MetadataRegistry, per controller type)
//!
//! Dispatcher construction:
//!     storage.rs lookups (own + ancestor metadata)
//!     → metadata.rs records (actions, middlewares, hooks, config)
//!     → compiled into an immutable Dispatcher
//! ```
//!
//! # Design Decisions
//! - Explicit registration calls replace annotations
//! - Inheritance is composition: a child declares its parent and how to
//!   reach the parent instance it embeds
//! - The registry is only read after startup

pub mod builder;
pub mod metadata;
pub mod storage;

pub use builder::ControllerBuilder;
pub use metadata::{
    ActionMetadata, ContextInjectionMetadata, ControllerConfig, ControllerMetadata,
    ControllerType, HookMetadata, Instance, MiddlewareMetadata, StateSource,
};
pub use storage::MetadataRegistry;

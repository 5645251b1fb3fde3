//! Error types.
//!
//! # Design Decisions
//! - Configuration errors are fatal and surface while a dispatcher is built,
//!   never while a request is served
//! - Handler and middleware failures are type-erased (`BoxError`) so any
//!   application error can flow to the controller's error handler

use std::path::PathBuf;

use thiserror::Error;

use crate::routing::ActionMethod;

/// Type-erased error raised by handlers, middlewares and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal misconfiguration of a controller or dispatcher.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("conflicting route path on {controller}: {method} \"{pattern}\"")]
    ConflictingRoute {
        controller: &'static str,
        method: ActionMethod,
        pattern: String,
    },

    #[error("route pattern must start with \"/\": {0}")]
    InvalidPrefix(String),

    #[error("invalid route pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid parameter name \"{name}\" in route pattern {pattern}")]
    InvalidParamName { pattern: String, name: String },

    #[error("method {method_name} not found on {controller}")]
    MissingMethod {
        controller: &'static str,
        method_name: String,
    },

    #[error("{child} declares parent {parent} but the instance could not be projected onto it")]
    MissingParent {
        child: &'static str,
        parent: &'static str,
    },

    #[error("can not find \"api/\" folder: {0}")]
    MissingApiFolder(PathBuf),

    #[error("invalid base path: {0}")]
    InvalidBasePath(String),
}

/// Failure inside the dispatch machinery itself.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("controller instance is not a {expected}")]
    InstanceMismatch { expected: &'static str },
}

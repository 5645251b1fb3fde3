//! Dispatcher construction options.

use std::time::Duration;

use crate::config::DispatcherConfig;
use crate::dispatcher::base_path::BasePath;

pub const DEFAULT_MIDDLEWARE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub base_path: BasePath,
    /// Percent-decode query values before handlers see them.
    pub decode_query_params: bool,
    /// Per-middleware deadline; `None` waits indefinitely.
    pub middleware_timeout: Option<Duration>,
    /// Maximum buffered request body when served through the tower service.
    pub body_limit: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            base_path: BasePath::default(),
            decode_query_params: true,
            middleware_timeout: Some(DEFAULT_MIDDLEWARE_TIMEOUT),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl DispatcherOptions {
    pub fn new(base_path: impl Into<BasePath>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Options from the `[dispatcher]` config section.
    pub fn from_config(base_path: impl Into<BasePath>, config: &DispatcherConfig) -> Self {
        Self {
            base_path: base_path.into(),
            decode_query_params: config.decode_query_params,
            middleware_timeout: match config.middleware_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            body_limit: config.body_limit_bytes,
        }
    }

    pub fn decode_query_params(mut self, decode: bool) -> Self {
        self.decode_query_params = decode;
        self
    }

    pub fn middleware_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.middleware_timeout = timeout;
        self
    }

    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

impl From<BasePath> for DispatcherOptions {
    fn from(base_path: BasePath) -> Self {
        Self::new(base_path)
    }
}

impl From<&str> for DispatcherOptions {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DispatcherOptions {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

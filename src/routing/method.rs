//! HTTP methods an action can be registered for.

use std::fmt;

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// The method an action answers to. `All` matches every request method
/// but loses against a more specific match for the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionMethod {
    All,
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl ActionMethod {
    /// Upper-case name, as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMethod::All => "ALL",
            ActionMethod::Get => "GET",
            ActionMethod::Post => "POST",
            ActionMethod::Put => "PUT",
            ActionMethod::Delete => "DELETE",
            ActionMethod::Patch => "PATCH",
            ActionMethod::Head => "HEAD",
            ActionMethod::Options => "OPTIONS",
            ActionMethod::Connect => "CONNECT",
            ActionMethod::Trace => "TRACE",
        }
    }

    /// Returns true if a request with `method` can be served by this action.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            ActionMethod::All => true,
            other => other.as_str() == method.as_str(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, ActionMethod::All)
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Base path resolution and matching.

use std::path::{Component, PathBuf};

use crate::error::ConfigError;

/// Where a controller is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasePath {
    /// `/api/{name}`; an empty name mounts at `/api`.
    Api(String),
    /// Derived from a directory: everything from its `api` segment on.
    Dir(PathBuf),
    /// Used as given. Must start with `/`.
    Exact(String),
}

impl Default for BasePath {
    fn default() -> Self {
        BasePath::Api(String::new())
    }
}

impl BasePath {
    /// Resolve to a path without trailing slash. The root resolves to `""`.
    pub fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            BasePath::Api(name) => {
                let name = name.trim_matches('/');
                if name.is_empty() {
                    Ok("/api".to_string())
                } else {
                    Ok(format!("/api/{name}"))
                }
            }
            BasePath::Dir(dir) => {
                let segments: Vec<String> = dir
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();

                match segments.iter().position(|s| s == "api") {
                    Some(index) => Ok(format!("/{}", segments[index..].join("/"))),
                    None if segments.last().map(String::as_str) == Some("pages") => {
                        Ok("/api".to_string())
                    }
                    None => Err(ConfigError::MissingApiFolder(dir.clone())),
                }
            }
            BasePath::Exact(path) => {
                if !path.starts_with('/') {
                    return Err(ConfigError::InvalidBasePath(path.clone()));
                }
                Ok(path.trim_end_matches('/').to_string())
            }
        }
    }
}

impl From<&str> for BasePath {
    fn from(name: &str) -> Self {
        BasePath::Api(name.to_string())
    }
}

impl From<String> for BasePath {
    fn from(name: String) -> Self {
        BasePath::Api(name)
    }
}

/// Remove `base` from `path` on a segment boundary. The result always
/// starts with `/`.
pub(crate) fn strip_base<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

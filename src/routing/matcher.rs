//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile a route pattern into an immutable matcher at startup
//! - Match a request path (base path already removed) against it
//! - Extract named parameters
//!
//! # Supported Patterns
//! - Literal paths: `/users`
//! - Named parameters: `/users/:id`
//! - Optional parameters: `/hello/:name?`
//! - Wildcards: `/any/*` (exposed as the `wild` parameter)
//! - Suffix-constrained parameters: `/:title.(mp3|mp4|jpg)`
//! - Raw regular expressions with named capture groups
//!
//! # Design Decisions
//! - Matching is anchored to the whole path; partial matches never count
//! - Path patterns are case-insensitive and tolerate one trailing slash
//! - Parameters are always extracted by capture-group name, so suffix groups
//!   inside a pattern never shift parameter positions

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use regex::Regex;
use serde::Serialize;

use crate::error::ConfigError;

/// Name of the parameter holding the text matched by `*`.
pub const WILDCARD_KEY: &str = "wild";

/// A route pattern as registered on an action.
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Path(String),
    Regex(Regex),
}

impl RoutePattern {
    /// Display form: the path, or the regex source between slashes.
    pub fn key(&self) -> String {
        match self {
            RoutePattern::Path(path) => path.clone(),
            RoutePattern::Regex(re) => format!("/{}/", re.as_str()),
        }
    }
}

impl Default for RoutePattern {
    fn default() -> Self {
        RoutePattern::Path("/".to_string())
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RoutePattern::Path(a), RoutePattern::Path(b)) => a == b,
            (RoutePattern::Regex(a), RoutePattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for RoutePattern {}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<&str> for RoutePattern {
    fn from(path: &str) -> Self {
        RoutePattern::Path(path.to_string())
    }
}

impl From<String> for RoutePattern {
    fn from(path: String) -> Self {
        RoutePattern::Path(path)
    }
}

impl From<Regex> for RoutePattern {
    fn from(re: Regex) -> Self {
        RoutePattern::Regex(re)
    }
}

/// Path parameters extracted by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A compiled, immutable route pattern.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    pattern: RoutePattern,
    regex: Regex,
    keys: Vec<String>,
}

impl RouteMatcher {
    /// Compile a pattern. Path patterns must start with `/`.
    pub fn compile(pattern: &RoutePattern) -> Result<Self, ConfigError> {
        let (source, keys) = match pattern {
            RoutePattern::Path(path) => compile_path(path)?,
            RoutePattern::Regex(re) => {
                let keys = re.capture_names().flatten().map(str::to_string).collect();
                (format!("^(?:{})$", re.as_str()), keys)
            }
        };

        let regex = Regex::new(&source).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.key(),
            source,
        })?;

        Ok(Self {
            pattern: pattern.clone(),
            regex,
            keys,
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Parameter names this pattern can produce.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Match `path`, returning the extracted parameters or `None`.
    /// Optional parameters that did not participate are absent.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();

        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                params.insert(name, value.as_str());
            }
        }

        Some(params)
    }
}

fn compile_path(input: &str) -> Result<(String, Vec<String>), ConfigError> {
    if !input.starts_with('/') {
        return Err(ConfigError::InvalidPrefix(input.to_string()));
    }

    let mut keys = Vec::new();
    let mut source = String::from("(?i)^");

    for segment in input.split('/').filter(|s| !s.is_empty()) {
        if let Some(rest) = segment.strip_prefix('*') {
            keys.push(WILDCARD_KEY.to_string());
            if rest.starts_with('?') {
                let _ = write!(source, "(?:/(?P<{WILDCARD_KEY}>.*))?");
            } else {
                let _ = write!(source, "/(?P<{WILDCARD_KEY}>.*)");
            }
        } else if let Some(param) = segment.strip_prefix(':') {
            let optional = param.find('?');
            let suffix = param.find('.');
            let name = &param[..optional.or(suffix).unwrap_or(param.len())];

            if !is_valid_name(name) {
                return Err(ConfigError::InvalidParamName {
                    pattern: input.to_string(),
                    name: name.to_string(),
                });
            }
            keys.push(name.to_string());

            if optional.is_some() && suffix.is_none() {
                let _ = write!(source, "(?:/(?P<{name}>[^/]+?))?");
            } else {
                let _ = write!(source, "/(?P<{name}>[^/]+?)");
            }

            // The suffix is kept as written: `.(mp3|mp4)` becomes `\.(mp3|mp4)`
            if let Some(at) = suffix {
                if optional.is_some() {
                    source.push('?');
                }
                source.push('\\');
                source.push_str(&param[at..]);
            }
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
        }
    }

    source.push_str("/?$");
    Ok((source, keys))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pattern: &str) -> RouteMatcher {
        RouteMatcher::compile(&RoutePattern::from(pattern)).unwrap()
    }

    fn regex_matcher(re: &str) -> RouteMatcher {
        RouteMatcher::compile(&RoutePattern::from(Regex::new(re).unwrap())).unwrap()
    }

    #[test]
    fn test_literal_path() {
        let m = matcher("/users");
        assert!(m.matches("/users").is_some());
        assert!(m.matches("/users/").is_some());
        assert!(m.matches("/USERS").is_some());
        assert!(m.matches("/users/1").is_none());
        assert!(m.matches("/user").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let m = matcher("/");
        assert!(m.matches("/").is_some());
        assert!(m.matches("").is_some());
        assert!(m.matches("/x").is_none());
    }

    #[test]
    fn test_named_param() {
        let params = matcher("/hello/:name").matches("/hello/John").unwrap();
        assert_eq!(params.get("name"), Some("John"));
        assert!(matcher("/hello/:name").matches("/hello").is_none());
        assert!(matcher("/hello/:name").matches("/hello/John/Doe").is_none());
    }

    #[test]
    fn test_optional_param() {
        let m = matcher("/hello/:name?");

        let absent = m.matches("/hello").unwrap();
        assert!(!absent.contains("name"));

        let present = m.matches("/hello/X").unwrap();
        assert_eq!(present.get("name"), Some("X"));
    }

    #[test]
    fn test_wildcard_matches_any_depth() {
        let m = matcher("/any/*");
        assert_eq!(m.matches("/any/x").unwrap().get(WILDCARD_KEY), Some("x"));
        assert_eq!(m.matches("/any/x/y").unwrap().get(WILDCARD_KEY), Some("x/y"));
        assert!(m.matches("/any/x/y/z").is_some());
        assert!(m.matches("/other/x").is_none());
    }

    #[test]
    fn test_suffix_constrained_param() {
        let m = matcher("/media/:title.(mp3|mp4|jpg)");
        for file in ["/media/hello.mp3", "/media/hello.mp4", "/media/hello.jpg"] {
            assert_eq!(m.matches(file).unwrap().get("title"), Some("hello"));
        }
        assert!(m.matches("/media/hello.svg").is_none());
    }

    #[test]
    fn test_multiple_params() {
        let params = matcher("/users/:user_id/posts/:post_id")
            .matches("/users/7/posts/42")
            .unwrap();
        assert_eq!(params.get("user_id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("42"));
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let m = matcher("/v1.0/items");
        assert!(m.matches("/v1.0/items").is_some());
        assert!(m.matches("/v1x0/items").is_none());
    }

    #[test]
    fn test_raw_regex_is_anchored() {
        let m = regex_matcher(r"/triple/(?<number>(\d+))");
        assert_eq!(m.matches("/triple/3").unwrap().get("number"), Some("3"));
        assert!(m.matches("/triple/xyz").is_none());
        assert!(m.matches("/prefix/triple/3").is_none());
    }

    #[test]
    fn test_raw_regex_similar_endpoints() {
        let even = regex_matcher(r"[/]even[/](?<number>(\d+)*[02468])");
        let odd = regex_matcher(r"[/]even[/](?<number>(\d+)*[13579])");

        assert!(even.matches("/even/4").is_some());
        assert!(even.matches("/even/3").is_none());
        assert_eq!(odd.matches("/even/13").unwrap().get("number"), Some("13"));
        assert!(odd.matches("/even/abc").is_none());
    }

    #[test]
    fn test_regex_without_named_groups_yields_no_params() {
        let m = regex_matcher(r"/plain/(\d+)");
        let params = m.matches("/plain/12").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_pattern_must_start_with_slash() {
        let err = RouteMatcher::compile(&RoutePattern::from("users")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrefix(_)));
    }

    #[test]
    fn test_invalid_param_name() {
        let err = RouteMatcher::compile(&RoutePattern::from("/users/:1d")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParamName { .. }));
    }

    #[test]
    fn test_duplicate_param_name_is_rejected() {
        let err = RouteMatcher::compile(&RoutePattern::from("/:id/:id")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_pattern_identity() {
        assert_eq!(RoutePattern::default(), RoutePattern::from("/"));
        assert_ne!(RoutePattern::from("/a"), RoutePattern::from("/b"));
        assert_eq!(
            RoutePattern::from(Regex::new("/x").unwrap()),
            RoutePattern::from(Regex::new("/x").unwrap())
        );
        assert_ne!(
            RoutePattern::from("/x"),
            RoutePattern::from(Regex::new("/x").unwrap())
        );
    }
}

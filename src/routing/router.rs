//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Select the route serving a request (method + base-relative path)
//! - Return the extracted parameters alongside the route
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes (acceptable for per-controller route counts)
//! - A later match overrides an earlier one, except that an `ALL` route
//!   never displaces a method-specific match already found
//! - Explicit `None` rather than a silent default

use axum::http::Method;

use crate::error::ConfigError;
use crate::routing::matcher::{Params, RouteMatcher, RoutePattern};
use crate::routing::method::ActionMethod;

/// A compiled route, carrying whatever the caller needs to invoke it.
#[derive(Debug, Clone)]
pub struct Route<H> {
    pub matcher: RouteMatcher,
    pub method: ActionMethod,
    pub method_name: String,
    pub target: H,
}

impl<H> Route<H> {
    pub fn new(
        pattern: &RoutePattern,
        method: ActionMethod,
        method_name: impl Into<String>,
        target: H,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher: RouteMatcher::compile(pattern)?,
            method,
            method_name: method_name.into(),
            target,
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        self.matcher.pattern()
    }
}

/// Ordered, immutable set of routes.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouteTable<H> {
    pub fn new(routes: Vec<Route<H>>) -> Self {
        Self { routes }
    }

    /// Find the route for `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&Route<H>, Params)> {
        let mut found: Option<(&Route<H>, Params)> = None;

        for route in &self.routes {
            if !route.method.accepts(method) {
                continue;
            }

            if route.method.is_all() {
                if let Some((current, _)) = &found {
                    if !current.method.is_all() {
                        continue;
                    }
                }
            }

            if let Some(params) = route.matcher.matches(path) {
                found = Some((route, params));
            }
        }

        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: ActionMethod, pattern: &str, name: &'static str) -> Route<&'static str> {
        Route::new(&RoutePattern::from(pattern), method, name, name).unwrap()
    }

    #[test]
    fn test_specific_route_beats_later_all() {
        let table = RouteTable::new(vec![
            route(ActionMethod::Get, "/bye", "bye"),
            route(ActionMethod::All, "/*", "any"),
        ]);

        let (found, _) = table.find(&Method::GET, "/bye").unwrap();
        assert_eq!(found.target, "bye");

        let (found, params) = table.find(&Method::GET, "/bye/123").unwrap();
        assert_eq!(found.target, "any");
        assert_eq!(params.get("wild"), Some("bye/123"));
    }

    #[test]
    fn test_specific_route_overrides_earlier_all() {
        let table = RouteTable::new(vec![
            route(ActionMethod::All, "/*", "any"),
            route(ActionMethod::Get, "/bye", "bye"),
        ]);

        let (found, _) = table.find(&Method::GET, "/bye").unwrap();
        assert_eq!(found.target, "bye");
    }

    #[test]
    fn test_last_specific_match_wins() {
        let table = RouteTable::new(vec![
            route(ActionMethod::Get, "/items/:id", "by_id"),
            route(ActionMethod::Get, "/items/latest", "latest"),
        ]);

        let (found, _) = table.find(&Method::GET, "/items/latest").unwrap();
        assert_eq!(found.target, "latest");

        let (found, params) = table.find(&Method::GET, "/items/7").unwrap();
        assert_eq!(found.target, "by_id");
        assert_eq!(params.get("id"), Some("7"));
    }

    #[test]
    fn test_method_mismatch_is_no_match() {
        let table = RouteTable::new(vec![route(ActionMethod::Post, "/users", "create")]);

        assert!(table.find(&Method::GET, "/users").is_none());
        assert!(table.find(&Method::POST, "/users").is_some());
    }

    #[test]
    fn test_empty_table() {
        let table: RouteTable<()> = RouteTable::default();
        assert!(table.is_empty());
        assert!(table.find(&Method::GET, "/").is_none());
    }
}

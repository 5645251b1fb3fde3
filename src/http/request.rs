//! Request handle passed to middlewares and handlers.
//!
//! # Responsibilities
//! - Expose method, url, headers and the buffered body
//! - Parse and optionally percent-decode the query string
//! - Carry route parameters attached by the dispatcher
//! - Carry typed extensions set by middlewares
//!
//! # Design Decisions
//! - Cheap to clone: all clones share one underlying request
//! - Immutable parts are read without locking; only the values the
//!   dispatcher and middlewares attach live behind a mutex
//! - Request ID is taken from `x-request-id` when the host set it

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::{request::Parts, HeaderMap, Method, Uri};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::routing::Params;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A query string value. Repeated keys collect into `Multiple`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multiple(Vec<String>),
}

impl QueryValue {
    /// First value for the key.
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(value) => value,
            QueryValue::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(value) => vec![value.as_str()],
            QueryValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Multiple(vec![first, value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }

    fn map(&mut self, f: impl Fn(&str) -> String) {
        match self {
            QueryValue::Single(value) => *value = f(value),
            QueryValue::Multiple(values) => {
                for value in values.iter_mut() {
                    *value = f(value);
                }
            }
        }
    }
}

/// Parsed query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Query(BTreeMap<String, QueryValue>);

impl Query {
    /// Parse a raw query string (without the leading `?`). Values are kept
    /// exactly as sent.
    pub fn parse(raw: &str) -> Self {
        let mut entries: BTreeMap<String, QueryValue> = BTreeMap::new();

        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match entries.get_mut(key) {
                Some(existing) => existing.push(value.to_string()),
                None => {
                    entries.insert(key.to_string(), QueryValue::Single(value.to_string()));
                }
            }
        }

        Self(entries)
    }

    /// Percent-decode every value. Values that do not decode are kept raw.
    pub fn decode(&mut self) {
        for value in self.0.values_mut() {
            value.map(|raw| {
                urlencoding::decode(raw)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| raw.to_string())
            });
        }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Default)]
struct RequestState {
    query: Query,
    params: Params,
    extensions: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

struct RequestInner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    state: Mutex<RequestState>,
}

/// Incoming request as seen by controllers.
#[derive(Clone)]
pub struct ApiRequest {
    inner: Arc<RequestInner>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let query = Query::parse(uri.query().unwrap_or(""));
        Self {
            inner: Arc::new(RequestInner {
                method,
                uri,
                headers,
                body,
                state: Mutex::new(RequestState {
                    query,
                    ..RequestState::default()
                }),
            }),
        }
    }

    /// Build from the parts of an `http::Request` and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    fn state(&self) -> MutexGuard<'_, RequestState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Path and query, as originally requested.
    pub fn url(&self) -> &str {
        self.inner
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.inner.uri.path())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.inner.body)
    }

    pub fn query(&self) -> Query {
        self.state().query.clone()
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.state().query.get(key).map(|v| v.first().to_string())
    }

    pub fn params(&self) -> Params {
        self.state().params.clone()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.state().params.get(name).map(str::to_string)
    }

    pub(crate) fn set_params(&self, params: Params) {
        self.state().params = params;
    }

    pub(crate) fn decode_query(&self) {
        self.state().query.decode();
    }

    /// Attach a typed value, replacing any previous value of the same type.
    pub fn insert_extension<T: Any + Send + Sync>(&self, value: T) {
        self.state()
            .extensions
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn extension<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.state()
            .extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Correlation ID from `x-request-id`, or "unknown".
    pub fn request_id(&self) -> &str {
        self.header(X_REQUEST_ID).unwrap_or("unknown")
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.inner.method)
            .field("uri", &self.inner.uri)
            .finish_non_exhaustive()
    }
}

//! Transport contract consumed by the resource layer and the execution pool.
//!
//! The core never talks HTTP directly: it issues [`ApiRequest`]s against a
//! [`Transport`] implementation. `tessera-sdk` provides the reqwest-backed
//! implementation; tests provide an in-memory one.

use crate::error::{TesseraError, TesseraResult};
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Sentinel organization id used when running against a local playground
/// instead of the hosted service.
pub const PLAYGROUND_ORGANIZATION_ID: Uuid = Uuid::nil();

/// HTTP method for an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// One request against the Tessera API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Issues one network request at a time given method/endpoint/params.
///
/// Implementations must hold a [`RequestLimiter`] permit for the duration of
/// each request so the pool can bound in-flight concurrency per drain cycle.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and return the decoded JSON body (`Value::Null` for
    /// empty responses).
    async fn request(&self, req: ApiRequest) -> TesseraResult<Value>;

    /// The concurrency limiter bounding in-flight requests.
    fn limiter(&self) -> &RequestLimiter;

    /// Whether this transport points at a local playground. When set, the
    /// client resolves the organization to [`PLAYGROUND_ORGANIZATION_ID`]
    /// instead of performing a real lookup.
    fn playground(&self) -> bool {
        false
    }
}

/// Counting semaphore bounding concurrent in-flight requests.
///
/// The execution pool resets the limiter to its full permit count at the
/// start of every drain cycle, so one misbehaving batch cannot starve the
/// next one of permits.
#[derive(Debug)]
pub struct RequestLimiter {
    max_permits: usize,
    semaphore: Mutex<Arc<Semaphore>>,
}

impl RequestLimiter {
    /// Create a limiter with the given maximum number of concurrent permits.
    pub fn new(max_permits: usize) -> Self {
        let max_permits = max_permits.max(1);
        Self {
            max_permits,
            semaphore: Mutex::new(Arc::new(Semaphore::new(max_permits))),
        }
    }

    /// The configured maximum permit count.
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Acquire one permit, waiting if the limit is reached. The permit is
    /// released on drop.
    pub async fn acquire(&self) -> TesseraResult<OwnedSemaphorePermit> {
        let semaphore = self.semaphore.lock().unwrap().clone();
        semaphore
            .acquire_owned()
            .await
            .map_err(|_| TesseraError::Transport("request limiter closed".to_string()))
    }

    /// Replace the semaphore with a fresh one holding the full permit count.
    pub fn reset(&self) {
        let mut guard = self.semaphore.lock().unwrap();
        *guard = Arc::new(Semaphore::new(self.max_permits));
    }
}

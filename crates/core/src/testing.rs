//! In-memory transport for exercising the resource, cache, and pool layers.

use crate::error::{TesseraError, TesseraResult};
use crate::transport::{ApiRequest, Method, RequestLimiter, Transport};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&ApiRequest) -> TesseraResult<Value> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    responder: Responder,
}

/// Scripted transport: exact method + path routes, recorded requests, and an
/// in-flight gauge for concurrency assertions. Unrouted requests come back
/// `NotFound`, which doubles as the 404 path.
pub(crate) struct MockTransport {
    limiter: RequestLimiter,
    latency: Option<Duration>,
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new(max_permits: usize) -> Self {
        Self {
            limiter: RequestLimiter::new(max_permits),
            latency: None,
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every request open for this long, so tests can force overlap.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a responder for an exact method + path.
    pub(crate) fn on(
        &self,
        method: Method,
        path: impl Into<String>,
        responder: impl Fn(&ApiRequest) -> TesseraResult<Value> + Send + Sync + 'static,
    ) {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.into(),
            responder: Box::new(responder),
        });
    }

    /// Every request seen so far, in admission order.
    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Highest number of requests in flight at the same time.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, req: &ApiRequest) -> TesseraResult<Value> {
        let routes = self.routes.lock().unwrap();
        for route in routes.iter() {
            if route.method == req.method && route.path == req.path {
                return (route.responder)(req);
            }
        }
        Err(TesseraError::NotFound(format!(
            "no route for {} {}",
            req.method, req.path
        )))
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn request(&self, req: ApiRequest) -> TesseraResult<Value> {
        let _permit = self.limiter.acquire().await?;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self.respond(&req);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }
}

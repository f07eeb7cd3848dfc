//! Configuration types for the Tessera SDK.

use std::time::Duration;
use tessera_core::RuntimeMode;
use url::Url;
use uuid::Uuid;

/// Configuration for the Tessera client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Tessera API.
    pub base_url: Url,
    /// Access token for authentication.
    pub access_token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
    /// Maximum in-flight requests per drain cycle.
    pub concurrency_limit: usize,
    /// Target a local playground instead of the hosted service.
    pub playground: bool,
    /// How deferred calls are executed.
    pub mode: RuntimeMode,
    /// Organization this client operates in.
    pub organization_id: Option<Uuid>,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            access_token: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            concurrency_limit: 8,
            playground: false,
            mode: RuntimeMode::Batched,
            organization_id: None,
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// HTTP status codes to retry on.
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_on_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, self.max_backoff)
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status_codes.contains(&status)
    }
}

//! HTTP transport layer for the Tessera SDK.

use crate::config::ClientConfig;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;
use tessera_core::transport::{ApiRequest, Method, RequestLimiter, Transport};
use tessera_core::{TesseraError, TesseraResult};
use tracing::{debug, warn};

/// reqwest-backed [`Transport`] with retries, auth headers, and the
/// concurrency limiter the execution pool resets per drain cycle.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
    limiter: RequestLimiter,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> TesseraResult<Self> {
        let mut headers = header::HeaderMap::new();

        if let Some(ref token) = config.access_token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    TesseraError::Config("invalid access token format".to_string())
                })?,
            );
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(transport_error)?;
        let limiter = RequestLimiter::new(config.concurrency_limit);

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    /// Build a URL for the given path.
    fn build_url(&self, path: &str) -> TesseraResult<url::Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| TesseraError::Config(format!("invalid URL for path {path}: {e}")))
    }

    /// Execute a request with retries.
    async fn execute_with_retry(&self, request_builder: RequestBuilder) -> TesseraResult<Response> {
        let retry_config = &self.config.retry_config;
        let mut attempts = 0;

        loop {
            let request = request_builder
                .try_clone()
                .ok_or_else(|| TesseraError::Config("request cannot be cloned".to_string()))?;

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if response.status().is_success() {
                        return Ok(response);
                    }

                    if attempts < retry_config.max_retries
                        && retry_config.should_retry_status(status)
                    {
                        let backoff = retry_config.backoff_for_attempt(attempts);
                        warn!(
                            status = status,
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis(),
                            "request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(TesseraError::from_response(status, &body));
                }
                Err(e) => {
                    if attempts < retry_config.max_retries && e.is_timeout() {
                        let backoff = retry_config.backoff_for_attempt(attempts);
                        warn!(
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis(),
                            "request timed out, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }
                    return Err(transport_error(e));
                }
            }
        }
    }
}

/// reqwest errors are captured as strings so the resulting error stays
/// cloneable for singleflight waiters.
fn transport_error(e: reqwest::Error) -> TesseraError {
    TesseraError::Transport(e.to_string())
}

async fn decode_body(response: Response) -> TesseraResult<Value> {
    let text = response.text().await.map_err(transport_error)?;
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn request(&self, req: ApiRequest) -> TesseraResult<Value> {
        let _permit = self.limiter.acquire().await?;
        let url = self.build_url(&req.path)?;
        debug!(method = %req.method, url = %url, "api request");

        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let response = self.execute_with_retry(builder).await?;
        decode_body(response).await
    }

    fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    fn playground(&self) -> bool {
        self.config.playground
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::json;
    use std::time::Duration;
    use tessera_core::RuntimeMode;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_config(base_url: &str) -> Arc<ClientConfig> {
        Arc::new(ClientConfig {
            base_url: url::Url::parse(base_url).unwrap(),
            access_token: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::no_retry(),
            concurrency_limit: 4,
            playground: false,
            mode: RuntimeMode::Batched,
            organization_id: None,
        })
    }

    fn create_config_with_auth(base_url: &str, token: &str) -> Arc<ClientConfig> {
        let mut config = ClientConfig::new(url::Url::parse(base_url).unwrap());
        config.access_token = Some(token.to_string());
        config.retry_config = RetryConfig::no_retry();
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_get_request_decodes_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/workspaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "w1", "name": "sales"}],
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let value = transport
            .request(ApiRequest::get("/api/workspaces"))
            .await
            .unwrap();
        assert_eq!(value["items"][0]["name"], json!("sales"));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/actions"))
            .and(body_json(json!({"name": "sync"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "a1", "name": "sync"})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let value = transport
            .request(ApiRequest::post("/api/actions", json!({"name": "sync"})))
            .await
            .unwrap();
        assert_eq!(value["id"], json!("a1"));
    }

    #[tokio::test]
    async fn test_patch_request() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/boards/b1"))
            .and(body_json(json!({"order": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order": 3})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let value = transport
            .request(ApiRequest::patch("/api/boards/b1", json!({"order": 3})))
            .await
            .unwrap();
        assert_eq!(value["order"], json!(3));
    }

    #[tokio::test]
    async fn test_delete_with_empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/boards/b1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let value = transport
            .request(ApiRequest::delete("/api/boards/b1"))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_query_parameters_forwarded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/workspaces"))
            .and(query_param("nextToken", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let value = transport
            .request(ApiRequest::get("/api/workspaces").with_query("nextToken", "t2"))
            .await
            .unwrap();
        assert_eq!(value["items"], json!([]));
    }

    #[tokio::test]
    async fn test_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/organizations"))
            .and(header("Authorization", "Bearer tsk-test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(create_config_with_auth(&server.uri(), "tsk-test-token")).unwrap();
        let value = transport
            .request(ApiRequest::get("/api/organizations"))
            .await
            .unwrap();
        assert_eq!(value["items"], json!([]));
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/actions/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "no such action"})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let err = transport
            .request(ApiRequest::get("/api/actions/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conflict_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/workspaces"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"error": "already exists", "details": "name: sales"})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let err = transport
            .request(ApiRequest::post("/api/workspaces", json!({"name": "sales"})))
            .await
            .unwrap_err();
        match err {
            TesseraError::Api {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 409);
                assert_eq!(message, "already exists");
                assert_eq!(details.as_deref(), Some("name: sales"));
            }
            other => panic!("expected Api error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_on_503_then_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/workspaces"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/workspaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let mut config = ClientConfig::new(url::Url::parse(&server.uri()).unwrap());
        config.retry_config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let transport = HttpTransport::new(Arc::new(config)).unwrap();
        let value = transport
            .request(ApiRequest::get("/api/workspaces"))
            .await
            .unwrap();
        assert_eq!(value["items"], json!([]));
    }

    #[tokio::test]
    async fn test_no_retry_exhausts_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/workspaces"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(create_config(&server.uri())).unwrap();
        let err = transport
            .request(ApiRequest::get("/api/workspaces"))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_build_url() {
        let transport = HttpTransport::new(create_config("http://localhost:8000")).unwrap();
        let url = transport.build_url("/api/actions").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/actions");
    }
}

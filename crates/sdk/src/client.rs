//! Main client for the Tessera SDK.

use crate::api::{ActionsApi, BoardsApi, DataSetsApi, MenuPathsApi, WorkspacesApi};
use crate::config::{ClientConfig, RetryConfig};
use crate::transport::HttpTransport;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{
    ExecutionPool, Resource, ResourceKind, RuntimeMode, TesseraError, TesseraResult, Transport,
    PLAYGROUND_ORGANIZATION_ID,
};
use url::Url;
use uuid::Uuid;

/// Main client for interacting with the Tessera API.
///
/// Cloning is cheap and clones share the same batch, cache, and scope.
#[derive(Clone)]
pub struct TesseraClient {
    pool: Arc<ExecutionPool>,
    organization: Arc<Resource>,
    actions: ActionsApi,
    workspaces: WorkspacesApi,
    boards: BoardsApi,
    menu_paths: MenuPathsApi,
    data_sets: DataSetsApi,
}

impl std::fmt::Debug for TesseraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseraClient")
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}

impl TesseraClient {
    /// Create a new client builder.
    pub fn builder() -> TesseraClientBuilder {
        TesseraClientBuilder::new()
    }

    /// Create a client from configuration.
    fn from_config(config: ClientConfig) -> TesseraResult<Self> {
        let mode = config.mode;
        let configured_id = config.organization_id;
        let transport = Arc::new(HttpTransport::new(Arc::new(config))?);
        let organization_id = match configured_id {
            Some(id) => id,
            None if transport.playground() => PLAYGROUND_ORGANIZATION_ID,
            None => {
                return Err(TesseraError::Config(
                    "organization is required".to_string(),
                ))
            }
        };
        let pool = Arc::new(ExecutionPool::new(transport.clone(), mode));
        let organization = Resource::root(
            ResourceKind::Organization,
            transport,
            organization_id,
            Map::new(),
        );

        Ok(Self {
            actions: ActionsApi::new(organization.clone(), pool.clone()),
            workspaces: WorkspacesApi::new(organization.clone(), pool.clone()),
            boards: BoardsApi::new(organization.clone(), pool.clone()),
            menu_paths: MenuPathsApi::new(organization.clone(), pool.clone()),
            data_sets: DataSetsApi::new(organization.clone(), pool.clone()),
            pool,
            organization,
        })
    }

    /// Get the actions API.
    pub fn actions(&self) -> &ActionsApi {
        &self.actions
    }

    /// Get the workspaces API.
    pub fn workspaces(&self) -> &WorkspacesApi {
        &self.workspaces
    }

    /// Get the boards API.
    pub fn boards(&self) -> &BoardsApi {
        &self.boards
    }

    /// Get the menu paths API.
    pub fn menu_paths(&self) -> &MenuPathsApi {
        &self.menu_paths
    }

    /// Get the data sets API.
    pub fn data_sets(&self) -> &DataSetsApi {
        &self.data_sets
    }

    /// Select the workspace that boards, menu paths, and datasets operate
    /// in. Calls already queued keep the workspace they were submitted
    /// under.
    pub fn set_workspace(&self, workspace: Uuid) {
        self.boards.set_workspace(workspace);
        self.menu_paths.set_workspace(workspace);
        self.data_sets.set_workspace(workspace);
    }

    /// Select the menu path that datasets operate under.
    pub fn set_menu_path(&self, name: impl Into<String>) {
        self.data_sets.set_menu_path(name.into());
    }

    /// Drop the menu path selection.
    pub fn clear_menu_path(&self) {
        self.data_sets.clear_menu_path();
    }

    /// Run the pending batch and return the task results in submission
    /// order.
    pub async fn run(&self) -> TesseraResult<Vec<Value>> {
        self.pool.drain().await
    }

    /// Blocking [`run`](TesseraClient::run). Safe to call from inside an
    /// async runtime and from plain synchronous code.
    pub fn run_blocking(&self) -> TesseraResult<Vec<Value>> {
        self.pool.drain_blocking()
    }

    /// Names of the queued tasks, in submission order.
    pub async fn pending_tasks(&self) -> Vec<String> {
        self.pool.pending_tasks().await
    }

    /// Serialize the organization and everything cached beneath it into a
    /// plain value tree. Useful for debugging what the client has seen.
    pub async fn organization_snapshot(&self) -> Value {
        self.organization.cascade().await
    }
}

/// Builder for creating a TesseraClient.
pub struct TesseraClientBuilder {
    base_url: Option<String>,
    access_token: Option<String>,
    organization: Option<String>,
    timeout: Duration,
    retry_config: RetryConfig,
    concurrency_limit: usize,
    playground: bool,
    mode: RuntimeMode,
}

impl TesseraClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            access_token: None,
            organization: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            concurrency_limit: 8,
            playground: false,
            mode: RuntimeMode::Batched,
        }
    }

    /// Set the base URL of the Tessera API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the access token for authentication.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the organization to operate in, as a uuid string.
    pub fn organization(mut self, id: impl Into<String>) -> Self {
        self.organization = Some(id.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Cap the number of in-flight requests per drain cycle.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Target a local playground instance. The base URL defaults to
    /// `http://localhost:8000` and the organization to the playground
    /// sentinel, so neither has to be supplied.
    pub fn playground(mut self) -> Self {
        self.playground = true;
        self
    }

    /// Set how deferred calls are executed.
    pub fn mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the client. No network traffic happens here; the first request
    /// goes out when a call runs.
    pub fn build(self) -> TesseraResult<TesseraClient> {
        let base_url_str = match self.base_url {
            Some(url) => url,
            None if self.playground => "http://localhost:8000".to_string(),
            None => {
                return Err(TesseraError::Config("base_url is required".to_string()))
            }
        };
        let base_url = Url::parse(&base_url_str)
            .map_err(|e| TesseraError::Config(format!("invalid base_url: {e}")))?;

        let organization_id = self
            .organization
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| TesseraError::Config(format!("invalid organization id: {e}")))?;

        let config = ClientConfig {
            base_url,
            access_token: self.access_token,
            timeout: self.timeout,
            retry_config: self.retry_config,
            concurrency_limit: self.concurrency_limit,
            playground: self.playground,
            mode: self.mode,
            organization_id,
        };

        TesseraClient::from_config(config)
    }
}

impl Default for TesseraClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

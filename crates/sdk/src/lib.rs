//! # Tessera SDK
//!
//! Rust SDK for Tessera - hosted dashboards, datasets, and actions.
//!
//! Write calls are batched: they queue locally and [`TesseraClient::run`]
//! flushes the whole batch in one concurrent wave, returning results in
//! submission order. Read calls run immediately, draining the batch first so
//! they always observe their own writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tessera_sdk::{ActionSpec, BoardSpec, TesseraClient, TesseraResult};
//!
//! #[tokio::main]
//! async fn main() -> TesseraResult<()> {
//!     // Build client
//!     let client = TesseraClient::builder()
//!         .base_url("https://api.tessera.example.com")
//!         .access_token("tsk-your-access-token")
//!         .organization("8f9c1d2e-5a4b-4c3d-9e8f-7a6b5c4d3e2f")
//!         .build()?;
//!
//!     // Scope to a workspace
//!     let sales = client.workspaces().get_workspace(None, Some("sales")).await?;
//!     client.set_workspace(sales.id);
//!
//!     // These queue locally
//!     client
//!         .boards()
//!         .create_board(BoardSpec {
//!             name: "KPIs".to_string(),
//!             description: None,
//!             order: None,
//!         })
//!         .await?;
//!     client
//!         .actions()
//!         .create_action(ActionSpec {
//!             name: "refresh-kpis".to_string(),
//!             code: Some("print('refreshing')".to_string()),
//!             description: None,
//!         })
//!         .await?;
//!
//!     // One wave of concurrent requests
//!     let results = client.run().await?;
//!     println!("ran {} tasks", results.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Blocking contexts
//!
//! [`TesseraClient::run_blocking`] drains the batch without `.await`, from
//! plain synchronous code or from inside another async runtime:
//!
//! ```rust,no_run
//! use tessera_sdk::TesseraClient;
//!
//! # fn flush(client: &TesseraClient) -> tessera_sdk::TesseraResult<()> {
//! let results = client.run_blocking()?;
//! println!("ran {} tasks", results.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod transport;

// Re-export main client
pub use client::{TesseraClient, TesseraClientBuilder};
pub use config::{ClientConfig, RetryConfig};

// Re-export the API surface
pub use api::{
    ActionSpec, ActionSummary, ActionTemplateSummary, ActionsApi, AppendReceipt, BoardPatch,
    BoardSpec, BoardSummary, BoardsApi, DataSetSpec, DataSetSummary, DataSetsApi, MenuPathPatch,
    MenuPathSummary, MenuPathsApi, RoleSpec, RoleSummary, WorkspacePatch, WorkspaceSpec,
    WorkspaceSummary, WorkspacesApi,
};

// Re-export core types for convenience
pub use tessera_core::{
    Alias, AsyncGroup, ResourceKind, RuntimeMode, Submitted, TesseraError, TesseraResult,
    PLAYGROUND_ORGANIZATION_ID,
};

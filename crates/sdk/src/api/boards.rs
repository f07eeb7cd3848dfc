//! Boards API endpoints.

use crate::api::{
    child_lookup, exactly_one, lookup_args, no_workspace, resolve_child, spec_params, summarize,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;
use tessera_core::{
    Alias, AsyncDispatcher, AsyncGroup, CallSpec, ExecutionPool, Layer, Preflight, Resource,
    ResourceKind, Submitted, TesseraResult,
};
use uuid::Uuid;

/// Scope state behind [`BoardsApi`]: boards live under the selected
/// workspace.
#[derive(Clone)]
pub struct Boards {
    organization: Arc<Resource>,
    workspace: Option<Uuid>,
}

impl Boards {
    fn require_workspace(&self) -> TesseraResult<Uuid> {
        self.workspace.ok_or_else(no_workspace)
    }

    async fn workspace_resource(&self) -> TesseraResult<Arc<Resource>> {
        let uuid = self.require_workspace()?;
        resolve_child(&self.organization, ResourceKind::Workspace, Some(uuid), None).await
    }
}

impl Layer for Boards {
    fn layer_name(&self) -> &'static str {
        "boards"
    }

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        Some(self)
    }
}

impl Preflight for Boards {
    fn check(&self, call: &CallSpec) -> TesseraResult<()> {
        if self.workspace.is_none() {
            return Err(no_workspace());
        }
        match call.method {
            "get_board" | "delete_board" => exactly_one(call, "uuid", "name"),
            _ => Ok(()),
        }
    }
}

/// Boards API: dashboards inside the selected workspace.
#[derive(Clone)]
pub struct BoardsApi {
    dispatcher: Arc<AsyncDispatcher<Boards>>,
}

impl BoardsApi {
    pub(crate) fn new(organization: Arc<Resource>, pool: Arc<ExecutionPool>) -> Self {
        let layer = Boards {
            organization,
            workspace: None,
        };
        Self {
            dispatcher: Arc::new(AsyncDispatcher::new(layer, pool)),
        }
    }

    pub(crate) fn set_workspace(&self, workspace: Uuid) {
        self.dispatcher.mutate(|layer| layer.workspace = Some(workspace));
    }

    /// Create a board, or adopt an existing one with the same name. Batched;
    /// the workspace in scope at submission time is the one used.
    pub async fn create_board(&self, spec: BoardSpec) -> TesseraResult<Submitted> {
        let call = CallSpec::new("boards", "create_board").with_args(json!({"name": spec.name}));
        let alias = Alias::name(spec.name.clone());
        let params = spec_params(&spec)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let board = workspace
                    .get_or_create_child(ResourceKind::Board, alias, params)
                    .await?;
                let summary: BoardSummary = summarize(&board)?;
                Ok(summary)
            })
            .await
    }

    /// Fetch one board by uuid or name.
    pub async fn get_board(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<BoardSummary> {
        let call = CallSpec::new("boards", "get_board").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let board = resolve_child(&workspace, ResourceKind::Board, uuid, name).await?;
                summarize(&board)
            })
            .await
    }

    /// List every board in the selected workspace.
    pub async fn list_boards(&self) -> TesseraResult<Vec<BoardSummary>> {
        let call = CallSpec::new("boards", "list_boards");
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let boards = workspace.get_children(ResourceKind::Board).await?;
                boards.iter().map(|board| summarize(board)).collect()
            })
            .await
    }

    /// Patch a board. Batched with an individual tag.
    pub async fn update_board(&self, uuid: Uuid, patch: BoardPatch) -> TesseraResult<Submitted> {
        let call = CallSpec::new("boards", "update_board")
            .with_group(AsyncGroup::individual("update_board"))
            .with_args(json!({"uuid": uuid}));
        let params = spec_params(&patch)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let board = workspace
                    .update_child(ResourceKind::Board, uuid.into(), params)
                    .await?;
                let summary: BoardSummary = summarize(&board)?;
                Ok(summary)
            })
            .await
    }

    /// Delete a board. Deleting one that does not exist is `Ok(false)`.
    pub async fn delete_board(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<bool> {
        let call = CallSpec::new("boards", "delete_board").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let lookup = child_lookup(ResourceKind::Board, uuid, name)?;
                workspace.delete_child(ResourceKind::Board, lookup).await
            })
            .await
    }

    /// Set the display order of the workspace's boards. Registered as an
    /// ending task: it runs once per drain, after the main batch, and a
    /// later call replaces a pending one instead of stacking.
    pub async fn set_board_order(&self, order: Vec<Uuid>) -> TesseraResult<()> {
        let layer = self.dispatcher.snapshot();
        layer.require_workspace()?;
        let future = async move {
            let workspace = layer.workspace_resource().await?;
            let ids: Vec<String> = order.iter().map(Uuid::to_string).collect();
            let mut patch = Map::new();
            patch.insert("boardOrder".to_string(), json!(ids));
            workspace.update(patch).await
        }
        .boxed();
        self.dispatcher
            .pool()
            .add_ending_task("boards.set_board_order", future)
            .await;
        Ok(())
    }
}

/// Parameters for creating a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Fields of a board that can be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// One board, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

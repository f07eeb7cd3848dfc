//! Menu paths API endpoints.

use crate::api::{no_workspace, resolve_child, spec_params, summarize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;
use tessera_core::{
    Alias, AsyncDispatcher, AsyncGroup, CallSpec, ExecutionPool, Layer, Preflight, Resource,
    ResourceKind, Submitted, TesseraResult,
};
use uuid::Uuid;

/// Scope state behind [`MenuPathsApi`].
#[derive(Clone)]
pub struct MenuPaths {
    organization: Arc<Resource>,
    workspace: Option<Uuid>,
}

impl MenuPaths {
    async fn workspace_resource(&self) -> TesseraResult<Arc<Resource>> {
        let uuid = self.workspace.ok_or_else(no_workspace)?;
        resolve_child(&self.organization, ResourceKind::Workspace, Some(uuid), None).await
    }
}

impl Layer for MenuPaths {
    fn layer_name(&self) -> &'static str {
        "menu_paths"
    }

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        Some(self)
    }
}

impl Preflight for MenuPaths {
    fn check(&self, _call: &CallSpec) -> TesseraResult<()> {
        if self.workspace.is_none() {
            return Err(no_workspace());
        }
        Ok(())
    }
}

/// Menu paths API: the navigation folders reports and datasets publish
/// under, inside the selected workspace.
#[derive(Clone)]
pub struct MenuPathsApi {
    dispatcher: Arc<AsyncDispatcher<MenuPaths>>,
}

impl MenuPathsApi {
    pub(crate) fn new(organization: Arc<Resource>, pool: Arc<ExecutionPool>) -> Self {
        let layer = MenuPaths {
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

    /// Fetch a menu path by name, creating it on the server if it does not
    /// exist yet.
    pub async fn get_menu_path(&self, name: &str) -> TesseraResult<MenuPathSummary> {
        let call = CallSpec::new("menu_paths", "get_menu_path").with_args(json!({"name": name}));
        let alias = Alias::name(name);
        let mut params = Map::new();
        params.insert("name".to_string(), json!(name));
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let menu_path = workspace
                    .get_or_create_child(ResourceKind::MenuPath, alias, params)
                    .await?;
                summarize(&menu_path)
            })
            .await
    }

    /// List every menu path in the selected workspace.
    pub async fn list_menu_paths(&self) -> TesseraResult<Vec<MenuPathSummary>> {
        let call = CallSpec::new("menu_paths", "list_menu_paths");
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let menu_paths = workspace.get_children(ResourceKind::MenuPath).await?;
                menu_paths.iter().map(|mp| summarize(mp)).collect()
            })
            .await
    }

    /// Patch a menu path addressed by name. Batched with an individual tag.
    /// Patching a path that does not exist fails with `NotFound`.
    pub async fn update_menu_path(
        &self,
        name: &str,
        patch: MenuPathPatch,
    ) -> TesseraResult<Submitted> {
        let call = CallSpec::new("menu_paths", "update_menu_path")
            .with_group(AsyncGroup::individual("update_menu_path"))
            .with_args(json!({"name": name}));
        let alias = Alias::name(name);
        let params = spec_params(&patch)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let menu_path = workspace
                    .update_child(ResourceKind::MenuPath, alias.into(), params)
                    .await?;
                let summary: MenuPathSummary = summarize(&menu_path)?;
                Ok(summary)
            })
            .await
    }

    /// Delete a menu path by name. Deleting a missing one is `Ok(false)`.
    pub async fn delete_menu_path(&self, name: &str) -> TesseraResult<bool> {
        let call =
            CallSpec::new("menu_paths", "delete_menu_path").with_args(json!({"name": name}));
        let alias = Alias::name(name);
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                workspace
                    .delete_child(ResourceKind::MenuPath, alias.into())
                    .await
            })
            .await
    }

    /// Remove every report published under a menu path, returning how many
    /// were deleted. Batched with an individual tag so it cannot race a
    /// sibling clear of the same kind.
    pub async fn delete_all_reports(&self, menu_path: &str) -> TesseraResult<Submitted> {
        let call = CallSpec::new("menu_paths", "delete_all_reports")
            .with_group(AsyncGroup::individual("delete_all_reports"))
            .with_args(json!({"menuPath": menu_path}));
        let name = menu_path.to_owned();
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let workspace = layer.workspace_resource().await?;
                let menu_path =
                    resolve_child(&workspace, ResourceKind::MenuPath, None, Some(name)).await?;
                let reports = menu_path.get_children(ResourceKind::Report).await?;
                let mut removed = 0usize;
                for report in reports {
                    let Some(uuid) = report.uuid() else { continue };
                    if menu_path
                        .delete_child(ResourceKind::Report, uuid.into())
                        .await?
                    {
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await
    }
}

/// Fields of a menu path that can be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuPathPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One menu path, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuPathSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

//! Workspaces API endpoints.

use crate::api::{child_lookup, exactly_one, lookup_args, resolve_child, spec_params, summarize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tessera_core::{
    Alias, AsyncDispatcher, AsyncGroup, CallSpec, ExecutionPool, Layer, Preflight, Resource,
    ResourceKind, Submitted, TesseraResult,
};
use uuid::Uuid;

/// Scope state behind [`WorkspacesApi`].
#[derive(Clone)]
pub struct Workspaces {
    organization: Arc<Resource>,
}

impl Layer for Workspaces {
    fn layer_name(&self) -> &'static str {
        "workspaces"
    }

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        Some(self)
    }
}

impl Preflight for Workspaces {
    fn check(&self, call: &CallSpec) -> TesseraResult<()> {
        match call.method {
            "get_workspace" | "delete_workspace" => exactly_one(call, "uuid", "name"),
            _ => Ok(()),
        }
    }
}

/// Workspaces API: top-level containers for boards and menu paths, plus the
/// access roles granted on them.
#[derive(Clone)]
pub struct WorkspacesApi {
    dispatcher: Arc<AsyncDispatcher<Workspaces>>,
}

impl WorkspacesApi {
    pub(crate) fn new(organization: Arc<Resource>, pool: Arc<ExecutionPool>) -> Self {
        Self {
            dispatcher: Arc::new(AsyncDispatcher::new(Workspaces { organization }, pool)),
        }
    }

    /// Create a workspace. A workspace with the same name already existing
    /// is a conflict, not an adoption.
    pub async fn create_workspace(&self, spec: WorkspaceSpec) -> TesseraResult<WorkspaceSummary> {
        let call =
            CallSpec::new("workspaces", "create_workspace").with_args(json!({"name": spec.name}));
        let params = spec_params(&spec)?;
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace = layer
                    .organization
                    .create_child(ResourceKind::Workspace, params)
                    .await?;
                summarize(&workspace)
            })
            .await
    }

    /// Fetch one workspace by uuid or name.
    pub async fn get_workspace(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<WorkspaceSummary> {
        let call =
            CallSpec::new("workspaces", "get_workspace").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let workspace =
                    resolve_child(&layer.organization, ResourceKind::Workspace, uuid, name)
                        .await?;
                summarize(&workspace)
            })
            .await
    }

    /// List every workspace in the organization.
    pub async fn list_workspaces(&self) -> TesseraResult<Vec<WorkspaceSummary>> {
        let call = CallSpec::new("workspaces", "list_workspaces");
        self.dispatcher
            .call(call, move |layer| async move {
                let workspaces = layer
                    .organization
                    .get_children(ResourceKind::Workspace)
                    .await?;
                workspaces.iter().map(|ws| summarize(ws)).collect()
            })
            .await
    }

    /// Patch a workspace. Batched with an individual tag: a second pending
    /// update forces the first one out before queueing.
    pub async fn update_workspace(
        &self,
        uuid: Uuid,
        patch: WorkspacePatch,
    ) -> TesseraResult<Submitted> {
        let call = CallSpec::new("workspaces", "update_workspace")
            .with_group(AsyncGroup::individual("update_workspace"))
            .with_args(json!({"uuid": uuid}));
        let params = spec_params(&patch)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let workspace = layer
                    .organization
                    .update_child(ResourceKind::Workspace, uuid.into(), params)
                    .await?;
                let summary: WorkspaceSummary = summarize(&workspace)?;
                Ok(summary)
            })
            .await
    }

    /// Delete a workspace. Deleting one that does not exist is `Ok(false)`.
    pub async fn delete_workspace(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<bool> {
        let call =
            CallSpec::new("workspaces", "delete_workspace").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let lookup = child_lookup(ResourceKind::Workspace, uuid, name)?;
                layer
                    .organization
                    .delete_child(ResourceKind::Workspace, lookup)
                    .await
            })
            .await
    }

    /// Grant a role on a workspace, adopting an existing grant with the same
    /// name. Batched.
    pub async fn create_role(&self, workspace: Uuid, spec: RoleSpec) -> TesseraResult<Submitted> {
        let call = CallSpec::new("workspaces", "create_role")
            .with_args(json!({"workspace": workspace, "name": spec.name}));
        let alias = Alias::name(spec.name.clone());
        let params = spec_params(&spec)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let ws = resolve_child(
                    &layer.organization,
                    ResourceKind::Workspace,
                    Some(workspace),
                    None,
                )
                .await?;
                let role = ws
                    .get_or_create_child(ResourceKind::Role, alias, params)
                    .await?;
                let summary: RoleSummary = summarize(&role)?;
                Ok(summary)
            })
            .await
    }

    /// Fetch one role on a workspace by name.
    pub async fn get_role(&self, workspace: Uuid, name: &str) -> TesseraResult<RoleSummary> {
        let call = CallSpec::new("workspaces", "get_role")
            .with_args(json!({"workspace": workspace, "name": name}));
        let name = name.to_owned();
        self.dispatcher
            .call(call, move |layer| async move {
                let ws = resolve_child(
                    &layer.organization,
                    ResourceKind::Workspace,
                    Some(workspace),
                    None,
                )
                .await?;
                let role = resolve_child(&ws, ResourceKind::Role, None, Some(name)).await?;
                summarize(&role)
            })
            .await
    }

    /// List the roles granted on a workspace.
    pub async fn list_roles(&self, workspace: Uuid) -> TesseraResult<Vec<RoleSummary>> {
        let call =
            CallSpec::new("workspaces", "list_roles").with_args(json!({"workspace": workspace}));
        self.dispatcher
            .call(call, move |layer| async move {
                let ws = resolve_child(
                    &layer.organization,
                    ResourceKind::Workspace,
                    Some(workspace),
                    None,
                )
                .await?;
                let roles = ws.get_children(ResourceKind::Role).await?;
                roles.iter().map(|role| summarize(role)).collect()
            })
            .await
    }

    /// Revoke a role by name. Revoking a missing role is `Ok(false)`.
    pub async fn delete_role(&self, workspace: Uuid, name: &str) -> TesseraResult<bool> {
        let call = CallSpec::new("workspaces", "delete_role")
            .with_args(json!({"workspace": workspace, "name": name}));
        let name = name.to_owned();
        self.dispatcher
            .call(call, move |layer| async move {
                let ws = resolve_child(
                    &layer.organization,
                    ResourceKind::Workspace,
                    Some(workspace),
                    None,
                )
                .await?;
                ws.delete_child(ResourceKind::Role, Alias::name(name).into())
                    .await
            })
            .await
    }
}

/// Parameters for creating a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Fields of a workspace that can be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One workspace, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Parameters for granting a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

/// One role grant, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

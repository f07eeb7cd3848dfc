//! Data sets API endpoints.

use crate::api::{no_workspace, resolve_child, spec_params, summarize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tessera_core::{
    Alias, AsyncDispatcher, CallSpec, ExecutionPool, Layer, Loggable, Preflight, Resource,
    ResourceKind, Submitted, TesseraError, TesseraResult,
};
use uuid::Uuid;

fn no_menu_path() -> TesseraError {
    TesseraError::State("no menu path selected; call set_menu_path first".to_string())
}

/// Scope state behind [`DataSetsApi`]: datasets live under the selected
/// menu path of the selected workspace.
#[derive(Clone)]
pub struct DataSets {
    organization: Arc<Resource>,
    workspace: Option<Uuid>,
    menu_path: Option<String>,
}

impl DataSets {
    fn require_scope(&self) -> TesseraResult<(Uuid, String)> {
        let workspace = self.workspace.ok_or_else(no_workspace)?;
        let menu_path = self.menu_path.clone().ok_or_else(no_menu_path)?;
        Ok((workspace, menu_path))
    }

    /// The selected menu path, created on the server if missing. Used by the
    /// write paths so a publish never fails on an absent folder.
    async fn menu_path_ensure(&self) -> TesseraResult<Arc<Resource>> {
        let (workspace, menu_path) = self.require_scope()?;
        let ws = resolve_child(
            &self.organization,
            ResourceKind::Workspace,
            Some(workspace),
            None,
        )
        .await?;
        let mut params = Map::new();
        params.insert("name".to_string(), json!(menu_path));
        ws.get_or_create_child(ResourceKind::MenuPath, Alias::name(menu_path), params)
            .await
    }

    /// The selected menu path, strictly resolved. Read paths do not create
    /// folders as a side effect.
    async fn menu_path_lookup(&self) -> TesseraResult<Arc<Resource>> {
        let (workspace, menu_path) = self.require_scope()?;
        let ws = resolve_child(
            &self.organization,
            ResourceKind::Workspace,
            Some(workspace),
            None,
        )
        .await?;
        resolve_child(&ws, ResourceKind::MenuPath, None, Some(menu_path)).await
    }
}

impl Layer for DataSets {
    fn layer_name(&self) -> &'static str {
        "data_sets"
    }

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        Some(self)
    }

    fn as_loggable(&self) -> Option<&dyn Loggable> {
        Some(self)
    }
}

impl Preflight for DataSets {
    fn check(&self, _call: &CallSpec) -> TesseraResult<()> {
        if self.workspace.is_none() {
            return Err(no_workspace());
        }
        if self.menu_path.is_none() {
            return Err(no_menu_path());
        }
        Ok(())
    }
}

impl Loggable for DataSets {}

/// Data sets API: tabular data published under the selected menu path.
#[derive(Clone)]
pub struct DataSetsApi {
    dispatcher: Arc<AsyncDispatcher<DataSets>>,
}

impl DataSetsApi {
    pub(crate) fn new(organization: Arc<Resource>, pool: Arc<ExecutionPool>) -> Self {
        let layer = DataSets {
            organization,
            workspace: None,
            menu_path: None,
        };
        Self {
            dispatcher: Arc::new(AsyncDispatcher::new(layer, pool)),
        }
    }

    pub(crate) fn set_workspace(&self, workspace: Uuid) {
        self.dispatcher.mutate(|layer| layer.workspace = Some(workspace));
    }

    pub(crate) fn set_menu_path(&self, name: String) {
        self.dispatcher.mutate(|layer| layer.menu_path = Some(name));
    }

    pub(crate) fn clear_menu_path(&self) {
        self.dispatcher.mutate(|layer| layer.menu_path = None);
    }

    /// Create a dataset, or adopt an existing one with the same name.
    /// Batched; the menu path is created on the way if missing.
    pub async fn create_data_set(&self, spec: DataSetSpec) -> TesseraResult<Submitted> {
        let call =
            CallSpec::new("data_sets", "create_data_set").with_args(json!({"name": spec.name}));
        let alias = Alias::name(spec.name.clone());
        let params = spec_params(&spec)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let menu_path = layer.menu_path_ensure().await?;
                let data_set = menu_path
                    .get_or_create_child(ResourceKind::DataSet, alias, params)
                    .await?;
                let summary: DataSetSummary = summarize(&data_set)?;
                Ok(summary)
            })
            .await
    }

    /// Append rows to a dataset, creating the dataset (and its menu path) if
    /// needed. Rows must be JSON objects. Batched; rows travel in one bulk
    /// request per call.
    pub async fn append_data(&self, name: &str, rows: Vec<Value>) -> TesseraResult<Submitted> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Value::Object(map) => items.push(map),
                _ => {
                    return Err(TesseraError::InvalidInput(
                        "data rows must be JSON objects".to_string(),
                    ))
                }
            }
        }
        let call = CallSpec::new("data_sets", "append_data")
            .with_args(json!({"name": name, "rows": items.len()}));
        let alias = Alias::name(name);
        let name = name.to_owned();
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let menu_path = layer.menu_path_ensure().await?;
                let mut params = Map::new();
                params.insert("name".to_string(), json!(name));
                let data_set = menu_path
                    .get_or_create_child(ResourceKind::DataSet, alias, params)
                    .await?;
                let appended = data_set
                    .create_children(ResourceKind::Data, items)
                    .await?;
                Ok(AppendReceipt {
                    data_set: name,
                    rows: appended.len(),
                })
            })
            .await
    }

    /// Fetch one dataset by name.
    pub async fn get_data_set(&self, name: &str) -> TesseraResult<DataSetSummary> {
        let call = CallSpec::new("data_sets", "get_data_set").with_args(json!({"name": name}));
        let name = name.to_owned();
        self.dispatcher
            .call(call, move |layer| async move {
                let menu_path = layer.menu_path_lookup().await?;
                let data_set =
                    resolve_child(&menu_path, ResourceKind::DataSet, None, Some(name)).await?;
                summarize(&data_set)
            })
            .await
    }

    /// List every dataset under the selected menu path.
    pub async fn list_data_sets(&self) -> TesseraResult<Vec<DataSetSummary>> {
        let call = CallSpec::new("data_sets", "list_data_sets");
        self.dispatcher
            .call(call, move |layer| async move {
                let menu_path = layer.menu_path_lookup().await?;
                let data_sets = menu_path.get_children(ResourceKind::DataSet).await?;
                data_sets.iter().map(|ds| summarize(ds)).collect()
            })
            .await
    }

    /// Delete a dataset by name. A missing dataset, or a menu path that was
    /// never created, is `Ok(false)`.
    pub async fn delete_data_set(&self, name: &str) -> TesseraResult<bool> {
        let call =
            CallSpec::new("data_sets", "delete_data_set").with_args(json!({"name": name}));
        let name = name.to_owned();
        self.dispatcher
            .call(call, move |layer| async move {
                let menu_path = match layer.menu_path_lookup().await {
                    Ok(menu_path) => menu_path,
                    Err(TesseraError::NotFound(_)) => return Ok(false),
                    Err(e) => return Err(e),
                };
                menu_path
                    .delete_child(ResourceKind::DataSet, Alias::name(name).into())
                    .await
            })
            .await
    }
}

/// Parameters for creating a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Column definitions, passed through to the server untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Value>,
}

/// One dataset, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of an [`append_data`](DataSetsApi::append_data) call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendReceipt {
    pub data_set: String,
    pub rows: usize,
}

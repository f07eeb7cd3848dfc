//! API layers: thin facades over the dispatcher and the resource tree.
//!
//! Each layer couples a scope snapshot (organization, selected workspace,
//! selected menu path) with facade methods that route through an
//! [`AsyncDispatcher`](tessera_core::AsyncDispatcher). Bulk-friendly creates
//! and appends defer into the shared batch; reads and deletes run
//! immediately; order-sensitive mutations carry an individual batch tag.

pub mod actions;
pub mod boards;
pub mod data_sets;
pub mod menu_paths;
pub mod workspaces;

pub use actions::{ActionSpec, ActionSummary, ActionTemplateSummary, ActionsApi};
pub use boards::{BoardPatch, BoardSpec, BoardSummary, BoardsApi};
pub use data_sets::{AppendReceipt, DataSetSpec, DataSetSummary, DataSetsApi};
pub use menu_paths::{MenuPathPatch, MenuPathSummary, MenuPathsApi};
pub use workspaces::{
    RoleSpec, RoleSummary, WorkspacePatch, WorkspaceSpec, WorkspaceSummary, WorkspacesApi,
};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tessera_core::{Alias, CallSpec, ChildLookup, Resource, ResourceKind, TesseraError, TesseraResult};
use uuid::Uuid;

/// Serialize a spec/patch struct into the parameter map a resource carries.
pub(crate) fn spec_params<T: Serialize>(spec: &T) -> TesseraResult<Map<String, Value>> {
    match serde_json::to_value(spec)? {
        Value::Object(map) => Ok(map),
        _ => Err(TesseraError::InvalidInput(
            "parameters must serialize to a JSON object".to_string(),
        )),
    }
}

/// Deserialize a layer response type from a resource's `{id + params}` view.
pub(crate) fn summarize<T: DeserializeOwned>(resource: &Resource) -> TesseraResult<T> {
    Ok(serde_json::from_value(resource.to_value())?)
}

/// Uuid/name lookup arguments as they appear in a [`CallSpec`].
pub(crate) fn lookup_args(uuid: Option<Uuid>, name: Option<&str>) -> Value {
    json!({ "uuid": uuid, "name": name })
}

/// Preflight rule shared by the lookup methods: the caller must address the
/// resource by uuid or by name, not both and not neither.
pub(crate) fn exactly_one(call: &CallSpec, a: &str, b: &str) -> TesseraResult<()> {
    let has = |field: &str| call.args.get(field).is_some_and(|v| !v.is_null());
    if has(a) == has(b) {
        return Err(TesseraError::InvalidInput(format!(
            "{} requires exactly one of {a} or {b}",
            call.name()
        )));
    }
    Ok(())
}

pub(crate) fn no_workspace() -> TesseraError {
    TesseraError::State("no workspace selected; call set_workspace first".to_string())
}

/// Build a [`ChildLookup`] from the uuid/name pair the facades accept.
pub(crate) fn child_lookup(
    kind: ResourceKind,
    uuid: Option<Uuid>,
    name: Option<String>,
) -> TesseraResult<ChildLookup> {
    match (uuid, name) {
        (Some(uuid), _) => Ok(ChildLookup::Uuid(uuid)),
        (None, Some(name)) => Ok(ChildLookup::Alias(Alias::name(name))),
        (None, None) => Err(TesseraError::InvalidInput(format!(
            "a uuid or name is required to address a {}",
            kind.schema().singular
        ))),
    }
}

/// Resolve one child by uuid or name. A miss is `NotFound` here, unlike the
/// core's alias lookup, because the facade caller asked for a specific one.
pub(crate) async fn resolve_child(
    parent: &Resource,
    kind: ResourceKind,
    uuid: Option<Uuid>,
    name: Option<String>,
) -> TesseraResult<Arc<Resource>> {
    let lookup = child_lookup(kind, uuid, name.clone())?;
    let found = parent.get_child(kind, lookup).await?;
    found.ok_or_else(|| match name {
        Some(name) => {
            TesseraError::NotFound(format!("no {} named {name}", kind.schema().singular))
        }
        None => TesseraError::NotFound(format!("{} not found", kind.schema().singular)),
    })
}

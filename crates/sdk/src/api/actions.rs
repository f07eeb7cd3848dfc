//! Actions API endpoints.

use crate::api::{
    child_lookup, exactly_one, lookup_args, resolve_child, spec_params, summarize,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tessera_core::{
    Alias, AsyncDispatcher, CallSpec, ExecutionPool, Layer, Preflight, Resource, ResourceKind,
    Submitted, TesseraError, TesseraResult,
};
use uuid::Uuid;

/// Scope state behind [`ActionsApi`]: actions hang off the organization.
#[derive(Clone)]
pub struct Actions {
    organization: Arc<Resource>,
}

impl Layer for Actions {
    fn layer_name(&self) -> &'static str {
        "actions"
    }

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        Some(self)
    }
}

impl Preflight for Actions {
    fn check(&self, call: &CallSpec) -> TesseraResult<()> {
        match call.method {
            "get_action" | "get_action_code" | "delete_action" => {
                exactly_one(call, "uuid", "name")
            }
            _ => Ok(()),
        }
    }
}

/// Actions API for organization-scoped automation actions and their
/// published templates.
#[derive(Clone)]
pub struct ActionsApi {
    dispatcher: Arc<AsyncDispatcher<Actions>>,
}

impl ActionsApi {
    pub(crate) fn new(organization: Arc<Resource>, pool: Arc<ExecutionPool>) -> Self {
        Self {
            dispatcher: Arc::new(AsyncDispatcher::new(Actions { organization }, pool)),
        }
    }

    /// Create an action, or adopt an existing one with the same name.
    /// Batched: the result surfaces at the next [`run`](crate::TesseraClient::run).
    pub async fn create_action(&self, spec: ActionSpec) -> TesseraResult<Submitted> {
        let call =
            CallSpec::new("actions", "create_action").with_args(json!({"name": spec.name}));
        let alias = Alias::name(spec.name.clone());
        let params = spec_params(&spec)?;
        self.dispatcher
            .call_deferred(call, move |layer| async move {
                let action = layer
                    .organization
                    .get_or_create_child(ResourceKind::Action, alias, params)
                    .await?;
                let summary: ActionSummary = summarize(&action)?;
                Ok(summary)
            })
            .await
    }

    /// Fetch one action by uuid or name.
    pub async fn get_action(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<ActionSummary> {
        let call = CallSpec::new("actions", "get_action").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let action =
                    resolve_child(&layer.organization, ResourceKind::Action, uuid, name).await?;
                summarize(&action)
            })
            .await
    }

    /// Fetch the source code of one action, hydrating it from the server if
    /// the listed payload did not carry the code field.
    pub async fn get_action_code(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<String> {
        let call =
            CallSpec::new("actions", "get_action_code").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let action =
                    resolve_child(&layer.organization, ResourceKind::Action, uuid, name).await?;
                if !action.params().contains_key("code") {
                    action.hydrate().await?;
                }
                action
                    .params()
                    .get("code")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        TesseraError::Json("action payload has no code field".to_string())
                    })
            })
            .await
    }

    /// List every action in the organization.
    pub async fn list_actions(&self) -> TesseraResult<Vec<ActionSummary>> {
        let call = CallSpec::new("actions", "list_actions");
        self.dispatcher
            .call(call, move |layer| async move {
                let actions = layer.organization.get_children(ResourceKind::Action).await?;
                actions.iter().map(|action| summarize(action)).collect()
            })
            .await
    }

    /// Delete an action. Deleting one that does not exist is `Ok(false)`.
    pub async fn delete_action(
        &self,
        uuid: Option<Uuid>,
        name: Option<&str>,
    ) -> TesseraResult<bool> {
        let call = CallSpec::new("actions", "delete_action").with_args(lookup_args(uuid, name));
        let name = name.map(str::to_owned);
        self.dispatcher
            .call(call, move |layer| async move {
                let lookup = child_lookup(ResourceKind::Action, uuid, name)?;
                layer
                    .organization
                    .delete_child(ResourceKind::Action, lookup)
                    .await
            })
            .await
    }

    /// Fetch a published action template by name, optionally pinned to a
    /// version. With several versions present and no version given, the
    /// lookup is ambiguous.
    pub async fn get_action_template(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> TesseraResult<ActionTemplateSummary> {
        let call = CallSpec::new("actions", "get_action_template")
            .with_args(json!({"name": name, "version": version}));
        let mut alias = Alias::name(name);
        if let Some(version) = version {
            alias = alias.with("version", version);
        }
        let name = name.to_owned();
        self.dispatcher
            .call(call, move |layer| async move {
                let found = layer
                    .organization
                    .get_child(ResourceKind::ActionTemplate, alias.into())
                    .await?;
                let template = found.ok_or_else(|| {
                    TesseraError::NotFound(format!("no action template named {name}"))
                })?;
                summarize(&template)
            })
            .await
    }
}

/// Parameters for creating an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One action, as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One published action template version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

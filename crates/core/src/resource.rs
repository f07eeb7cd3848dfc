//! The resource base contract: lifecycle, CRUD, and the parent/child
//! hierarchy every domain resource builds on.
//!
//! A [`Resource`] is a local proxy for one server entity. It starts
//! [`Lifecycle::Unbound`], becomes [`Lifecycle::Bound`] once the server
//! assigns it a uuid (via [`Resource::create`] or hydration from a payload),
//! and ends [`Lifecycle::Deleted`]. Children are reached through per-kind
//! [`ResourceCache`]s owned by the parent.

use crate::cache::ResourceCache;
use crate::error::{TesseraError, TesseraResult};
use crate::transport::{ApiRequest, Transport};
use crate::types::{schema, Alias, ResourceKind, ResourceSchema};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Where a resource is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed locally, no server identity yet.
    Unbound,
    /// Backed by a server entity with this uuid.
    Bound(Uuid),
    /// Removed from the server. Terminal: every operation fails from here.
    Deleted,
}

/// Value copy identifying a resource's parent. Carrying kind, uuid, and path
/// instead of a pointer keeps the tree free of ownership cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub kind: ResourceKind,
    pub uuid: Uuid,
    /// Entity path of the parent, e.g. `/api/organizations/<uuid>`.
    pub path: String,
}

/// How to address one child: by server id or by alias components.
#[derive(Debug, Clone)]
pub enum ChildLookup {
    Uuid(Uuid),
    Alias(Alias),
}

impl From<Uuid> for ChildLookup {
    fn from(uuid: Uuid) -> Self {
        Self::Uuid(uuid)
    }
}

impl From<Alias> for ChildLookup {
    fn from(alias: Alias) -> Self {
        Self::Alias(alias)
    }
}

/// Local proxy for one server entity.
pub struct Resource {
    schema: &'static ResourceSchema,
    transport: Arc<dyn Transport>,
    state: RwLock<Lifecycle>,
    params: RwLock<Map<String, Value>>,
    parent: Option<ParentLink>,
    children: HashMap<ResourceKind, ResourceCache>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.schema.kind)
            .field("state", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl Resource {
    fn base(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        parent: Option<ParentLink>,
        state: Lifecycle,
        params: Map<String, Value>,
    ) -> Self {
        let schema = schema(kind);
        let children = schema
            .children
            .iter()
            .map(|child| (*child, ResourceCache::new(*child, transport.clone())))
            .collect();
        Self {
            schema,
            transport,
            state: RwLock::new(state),
            params: RwLock::new(params),
            parent,
            children,
        }
    }

    /// Root resource bound to a known entity (the client's organization).
    pub fn root(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        uuid: Uuid,
        params: Map<String, Value>,
    ) -> Arc<Self> {
        Arc::new(Self::base(kind, transport, None, Lifecycle::Bound(uuid), params))
    }

    /// Locally constructed resource not yet on the server.
    pub fn unbound(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        parent: Option<ParentLink>,
        params: Map<String, Value>,
    ) -> Arc<Self> {
        Arc::new(Self::base(kind, transport, parent, Lifecycle::Unbound, params))
    }

    /// Resource adopted from a server payload, already bound.
    pub(crate) fn hydrated(
        kind: ResourceKind,
        transport: Arc<dyn Transport>,
        parent: Option<ParentLink>,
        uuid: Uuid,
        params: Map<String, Value>,
    ) -> Arc<Self> {
        Arc::new(Self::base(kind, transport, parent, Lifecycle::Bound(uuid), params))
    }

    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    pub fn kind(&self) -> ResourceKind {
        self.schema.kind
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.state.read().unwrap()
    }

    /// The server-assigned uuid, if bound.
    pub fn uuid(&self) -> Option<Uuid> {
        match self.lifecycle() {
            Lifecycle::Bound(uuid) => Some(uuid),
            _ => None,
        }
    }

    /// Snapshot of the parameter map.
    pub fn params(&self) -> Map<String, Value> {
        self.params.read().unwrap().clone()
    }

    /// The full alias of this resource, if its kind has one and every alias
    /// field is populated.
    pub fn alias(&self) -> Option<Alias> {
        Alias::of(self.schema, &self.params.read().unwrap())
    }

    pub(crate) fn matches_alias(&self, alias: &Alias) -> bool {
        alias.matches(&self.params.read().unwrap())
    }

    /// Collection endpoint this resource belongs to: `/api/{plural}` at the
    /// root, `{parent_path}/{plural}` under a parent.
    pub fn collection_endpoint(&self) -> String {
        match &self.parent {
            Some(link) => format!("{}/{}", link.path, self.schema.plural),
            None => format!("/api/{}", self.schema.plural),
        }
    }

    /// Entity path. Requires the resource to be bound.
    pub fn path(&self) -> TesseraResult<String> {
        let uuid = self.uuid().ok_or_else(|| {
            TesseraError::State(format!(
                "{} has no server identity yet",
                self.schema.singular
            ))
        })?;
        Ok(format!("{}/{}", self.collection_endpoint(), uuid))
    }

    /// Parent link for children of this resource.
    pub(crate) fn link(&self) -> TesseraResult<ParentLink> {
        let uuid = self.uuid().ok_or_else(|| {
            TesseraError::State(format!(
                "{} must be created before it can hold children",
                self.schema.singular
            ))
        })?;
        Ok(ParentLink {
            kind: self.schema.kind,
            uuid,
            path: self.path()?,
        })
    }

    fn require_bound(&self, op: &str) -> TesseraResult<Uuid> {
        match self.lifecycle() {
            Lifecycle::Bound(uuid) => Ok(uuid),
            Lifecycle::Unbound => Err(TesseraError::State(format!(
                "cannot {op} a {} that has not been created",
                self.schema.singular
            ))),
            Lifecycle::Deleted => Err(TesseraError::State(format!(
                "cannot {op} a deleted {}",
                self.schema.singular
            ))),
        }
    }

    /// POST this resource to its collection and adopt the server-assigned id.
    ///
    /// Only valid while [`Lifecycle::Unbound`]; creating twice is a state
    /// error because it would mint a second server entity.
    pub async fn create(&self) -> TesseraResult<Uuid> {
        match self.lifecycle() {
            Lifecycle::Unbound => {}
            Lifecycle::Bound(_) => {
                return Err(TesseraError::State(format!(
                    "{} is already created",
                    self.schema.singular
                )))
            }
            Lifecycle::Deleted => {
                return Err(TesseraError::State(format!(
                    "cannot create a deleted {}",
                    self.schema.singular
                )))
            }
        }
        let body = Value::Object(self.params.read().unwrap().clone());
        let response = self
            .transport
            .request(ApiRequest::post(self.collection_endpoint(), body))
            .await?;
        let mut payload = expect_object(response, self.schema)?;
        let uuid = take_id(&mut payload, self.schema)?;
        {
            let mut params = self.params.write().unwrap();
            for (key, value) in payload {
                params.insert(key, value);
            }
        }
        *self.state.write().unwrap() = Lifecycle::Bound(uuid);
        debug!(kind = self.schema.singular, %uuid, "created resource");
        Ok(uuid)
    }

    /// GET the entity and replace the local parameter set with the server's.
    pub async fn hydrate(&self) -> TesseraResult<()> {
        self.require_bound("hydrate")?;
        let response = self.transport.request(ApiRequest::get(self.path()?)).await?;
        let mut payload = expect_object(response, self.schema)?;
        payload.remove("id");
        *self.params.write().unwrap() = payload;
        Ok(())
    }

    /// PATCH the entity, merging the patch (and any fields the server echoes
    /// back) into the local parameters.
    pub async fn update(&self, patch: Map<String, Value>) -> TesseraResult<()> {
        self.require_bound("update")?;
        let response = self
            .transport
            .request(ApiRequest::patch(self.path()?, Value::Object(patch.clone())))
            .await?;
        let mut params = self.params.write().unwrap();
        for (key, value) in patch {
            params.insert(key, value);
        }
        if let Value::Object(echo) = response {
            for (key, value) in echo {
                if key != "id" {
                    params.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// DELETE the entity and transition to [`Lifecycle::Deleted`].
    pub async fn delete(&self) -> TesseraResult<()> {
        self.require_bound("delete")?;
        self.transport
            .request(ApiRequest::delete(self.path()?))
            .await?;
        self.mark_deleted();
        debug!(kind = self.schema.singular, "deleted resource");
        Ok(())
    }

    pub(crate) fn mark_deleted(&self) {
        *self.state.write().unwrap() = Lifecycle::Deleted;
    }

    fn child_cache(&self, kind: ResourceKind) -> TesseraResult<&ResourceCache> {
        self.children.get(&kind).ok_or_else(|| {
            TesseraError::InvalidInput(format!(
                "{} does not hold {} children",
                self.schema.singular,
                kind.schema().plural
            ))
        })
    }

    /// All children of a kind, fetching the collection on first use.
    pub async fn get_children(&self, kind: ResourceKind) -> TesseraResult<Vec<Arc<Resource>>> {
        self.child_cache(kind)?.list(self).await
    }

    /// Strict create: an existing child with the same alias is a conflict.
    pub async fn create_child(
        &self,
        kind: ResourceKind,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        self.child_cache(kind)?.create(self, params).await
    }

    /// Fetch-or-create under the singleflight guarantee: concurrent callers
    /// with the same alias share one flight and one server create at most.
    pub async fn get_or_create_child(
        &self,
        kind: ResourceKind,
        alias: Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        self.child_cache(kind)?.get_or_create(self, alias, params).await
    }

    /// Bulk child creation in a single request.
    pub async fn create_children(
        &self,
        kind: ResourceKind,
        items: Vec<Map<String, Value>>,
    ) -> TesseraResult<Vec<Arc<Resource>>> {
        self.child_cache(kind)?.create_many(self, items).await
    }

    /// Look up one child. A uuid miss is `NotFound`; an alias miss is
    /// `Ok(None)`.
    pub async fn get_child(
        &self,
        kind: ResourceKind,
        lookup: ChildLookup,
    ) -> TesseraResult<Option<Arc<Resource>>> {
        let cache = self.child_cache(kind)?;
        match lookup {
            ChildLookup::Uuid(uuid) => cache.get_by_uuid(self, uuid).await.map(Some),
            ChildLookup::Alias(alias) => cache.find_by_alias(self, &alias).await,
        }
    }

    /// Resolve one child and PATCH it. Missing children are `NotFound` for
    /// both lookup forms, since there is nothing to patch.
    pub async fn update_child(
        &self,
        kind: ResourceKind,
        lookup: ChildLookup,
        patch: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        let cache = self.child_cache(kind)?;
        let child = match lookup {
            ChildLookup::Uuid(uuid) => cache.get_by_uuid(self, uuid).await?,
            ChildLookup::Alias(alias) => {
                let found = cache.find_by_alias(self, &alias).await?;
                found.ok_or_else(|| {
                    TesseraError::NotFound(format!(
                        "no {} matching {alias}",
                        kind.schema().singular
                    ))
                })?
            }
        };
        child.update(patch).await?;
        Ok(child)
    }

    /// Tolerant delete: removing a child that does not exist is `Ok(false)`,
    /// a real removal is `Ok(true)`.
    pub async fn delete_child(
        &self,
        kind: ResourceKind,
        lookup: ChildLookup,
    ) -> TesseraResult<bool> {
        let cache = self.child_cache(kind)?;
        match lookup {
            ChildLookup::Uuid(uuid) => cache.delete_by_uuid(self, uuid).await,
            ChildLookup::Alias(alias) => cache.delete_by_alias(self, &alias).await,
        }
    }

    /// Flat `{ id, ...params }` view, the shape layer response types
    /// deserialize from.
    pub fn to_value(&self) -> Value {
        let mut obj = self.params.read().unwrap().clone();
        if let Some(uuid) = self.uuid() {
            obj.insert("id".to_string(), json!(uuid.to_string()));
        }
        Value::Object(obj)
    }

    /// Serialize this resource and its cached descendants into a plain value
    /// tree (`{kind, id, params, children}`). Only data copies cross the
    /// boundary, so the result carries no live identity and cannot cycle.
    pub fn cascade(&self) -> BoxFuture<'_, Value> {
        async move {
            let mut node = Map::new();
            node.insert("kind".to_string(), json!(self.schema.singular));
            if let Some(uuid) = self.uuid() {
                node.insert("id".to_string(), json!(uuid.to_string()));
            }
            node.insert(
                "params".to_string(),
                Value::Object(self.params.read().unwrap().clone()),
            );
            let mut children = Map::new();
            for kind in self.schema.children {
                let Some(cache) = self.children.get(kind) else {
                    continue;
                };
                let mut cached = cache.cached().await;
                if cached.is_empty() {
                    continue;
                }
                cached.sort_by_key(|child| child.uuid());
                let mut nodes = Vec::with_capacity(cached.len());
                for child in cached {
                    nodes.push(child.cascade().await);
                }
                children.insert(kind.schema().plural.to_string(), Value::Array(nodes));
            }
            if !children.is_empty() {
                node.insert("children".to_string(), Value::Object(children));
            }
            Value::Object(node)
        }
        .boxed()
    }
}

/// Decode a payload that must be a JSON object.
pub(crate) fn expect_object(
    value: Value,
    schema: &ResourceSchema,
) -> TesseraResult<Map<String, Value>> {
    match value {
        Value::Object(obj) => Ok(obj),
        _ => Err(TesseraError::Json(format!(
            "expected an object payload for {}",
            schema.singular
        ))),
    }
}

/// Pull the server-assigned `id` out of a payload.
pub(crate) fn take_id(
    obj: &mut Map<String, Value>,
    schema: &ResourceSchema,
) -> TesseraResult<Uuid> {
    let raw = obj.remove("id").ok_or_else(|| {
        TesseraError::Json(format!("{} payload is missing an id", schema.singular))
    })?;
    let text = raw.as_str().ok_or_else(|| {
        TesseraError::Json(format!("{} id is not a string", schema.singular))
    })?;
    Uuid::parse_str(text)
        .map_err(|e| TesseraError::Json(format!("invalid {} id: {e}", schema.singular)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn org_root(transport: Arc<MockTransport>, uuid: Uuid) -> Arc<Resource> {
        Resource::root(
            ResourceKind::Organization,
            transport,
            uuid,
            params(json!({"name": "acme"})),
        )
    }

    #[tokio::test]
    async fn test_create_binds_and_rejects_second_create() {
        let org = Uuid::from_u128(1);
        let action = Uuid::from_u128(2);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            crate::transport::Method::Post,
            format!("/api/organizations/{org}/actions"),
            move |_| Ok(json!({"id": action.to_string(), "name": "sync"})),
        );

        let parent = org_root(transport.clone(), org);
        let resource = Resource::unbound(
            ResourceKind::Action,
            transport.clone(),
            Some(parent.link().unwrap()),
            params(json!({"name": "sync"})),
        );

        assert_eq!(resource.lifecycle(), Lifecycle::Unbound);
        let uuid = resource.create().await.unwrap();
        assert_eq!(uuid, action);
        assert_eq!(resource.lifecycle(), Lifecycle::Bound(action));

        let err = resource.create().await.unwrap_err();
        assert!(matches!(err, TesseraError::State(_)));
    }

    #[tokio::test]
    async fn test_deleted_is_terminal() {
        let org = Uuid::from_u128(1);
        let action = Uuid::from_u128(2);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            crate::transport::Method::Delete,
            format!("/api/organizations/{org}/actions/{action}"),
            |_| Ok(Value::Null),
        );

        let parent = org_root(transport.clone(), org);
        let resource = Resource::hydrated(
            ResourceKind::Action,
            transport.clone(),
            Some(parent.link().unwrap()),
            action,
            params(json!({"name": "sync"})),
        );

        resource.delete().await.unwrap();
        assert_eq!(resource.lifecycle(), Lifecycle::Deleted);

        assert!(matches!(
            resource.update(params(json!({"name": "x"}))).await.unwrap_err(),
            TesseraError::State(_)
        ));
        assert!(matches!(
            resource.hydrate().await.unwrap_err(),
            TesseraError::State(_)
        ));
        assert!(matches!(
            resource.delete().await.unwrap_err(),
            TesseraError::State(_)
        ));
    }

    #[tokio::test]
    async fn test_update_requires_bound() {
        let transport = Arc::new(MockTransport::new(4));
        let resource = Resource::unbound(
            ResourceKind::Action,
            transport,
            None,
            params(json!({"name": "sync"})),
        );
        let err = resource.update(params(json!({"name": "x"}))).await.unwrap_err();
        assert!(matches!(err, TesseraError::State(_)));
    }

    #[test]
    fn test_endpoint_construction() {
        let org = Uuid::from_u128(1);
        let transport = Arc::new(MockTransport::new(4));
        let parent = org_root(transport.clone(), org);
        assert_eq!(parent.collection_endpoint(), "/api/organizations");
        assert_eq!(parent.path().unwrap(), format!("/api/organizations/{org}"));

        let workspace = Uuid::from_u128(7);
        let child = Resource::hydrated(
            ResourceKind::Workspace,
            transport,
            Some(parent.link().unwrap()),
            workspace,
            params(json!({"name": "sales"})),
        );
        assert_eq!(
            child.collection_endpoint(),
            format!("/api/organizations/{org}/workspaces")
        );
        assert_eq!(
            child.path().unwrap(),
            format!("/api/organizations/{org}/workspaces/{workspace}")
        );
    }

    #[tokio::test]
    async fn test_undeclared_child_kind_is_invalid() {
        let transport = Arc::new(MockTransport::new(4));
        let org = org_root(transport, Uuid::from_u128(1));
        let err = org
            .get_children(ResourceKind::Report)
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cascade_serializes_cached_children() {
        let org = Uuid::from_u128(1);
        let workspace = Uuid::from_u128(7);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            crate::transport::Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| Ok(json!({"id": workspace.to_string(), "name": "sales"})),
        );
        transport.on(
            crate::transport::Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |_| Ok(json!({"items": []})),
        );

        let root = org_root(transport, org);
        root.get_or_create_child(
            ResourceKind::Workspace,
            Alias::name("sales"),
            params(json!({"name": "sales"})),
        )
        .await
        .unwrap();

        let tree = root.cascade().await;
        assert_eq!(tree["kind"], json!("organization"));
        assert_eq!(tree["id"], json!(org.to_string()));
        assert_eq!(tree["params"]["name"], json!("acme"));
        let workspaces = tree["children"]["workspaces"].as_array().unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0]["kind"], json!("workspace"));
        assert_eq!(workspaces[0]["params"]["name"], json!("sales"));
    }

    #[test]
    fn test_to_value_includes_id() {
        let transport = Arc::new(MockTransport::new(4));
        let uuid = Uuid::from_u128(9);
        let resource = Resource::hydrated(
            ResourceKind::Board,
            transport,
            None,
            uuid,
            params(json!({"name": "kpis", "order": 2})),
        );
        let value = resource.to_value();
        assert_eq!(value["id"], json!(uuid.to_string()));
        assert_eq!(value["name"], json!("kpis"));
        assert_eq!(value["order"], json!(2));
    }
}

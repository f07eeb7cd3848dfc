//! Per-parent, per-kind resource cache with singleflight request coalescing.
//!
//! Every lookup or get-or-create that has to touch the network is installed
//! in the cache as a shared flight. Concurrent callers for the same key await
//! the same flight, so at most one request per key is in flight at a time and
//! every caller receives the same `Arc<Resource>`. A flight finalizes the
//! cache (inserting its result and removing itself) before it resolves, so
//! waiters always wake to a consistent cache.

use crate::error::{TesseraError, TesseraResult};
use crate::resource::{expect_object, take_id, ParentLink, Resource};
use crate::transport::{ApiRequest, Transport};
use crate::types::{schema, Alias, ResourceKind, ResourceSchema};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

type ResourceFlight = Shared<BoxFuture<'static, TesseraResult<Arc<Resource>>>>;
type ListFlight = Shared<BoxFuture<'static, TesseraResult<()>>>;

/// Key under which a flight is installed. Strict creates and get-or-creates
/// keep separate key spaces: their outcomes differ for the same alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FlightKey {
    Uuid(Uuid),
    Alias(Alias),
    Create(Alias),
}

#[derive(Default)]
struct CacheState {
    by_uuid: HashMap<Uuid, Arc<Resource>>,
    /// Set once the full collection has been fetched.
    listed: bool,
    flights: HashMap<FlightKey, ResourceFlight>,
    list_flight: Option<ListFlight>,
}

/// Owned context a flight needs to run without borrowing the cache.
#[derive(Clone)]
struct FlightContext {
    schema: &'static ResourceSchema,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<CacheState>>,
    parent: ParentLink,
    collection: String,
}

/// Cache of one kind of child under one parent resource.
pub struct ResourceCache {
    schema: &'static ResourceSchema,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<CacheState>>,
}

impl ResourceCache {
    pub fn new(kind: ResourceKind, transport: Arc<dyn Transport>) -> Self {
        Self {
            schema: schema(kind),
            transport,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    fn context(&self, parent: &Resource) -> TesseraResult<FlightContext> {
        let link = parent.link()?;
        let collection = format!("{}/{}", link.path, self.schema.plural);
        Ok(FlightContext {
            schema: self.schema,
            transport: self.transport.clone(),
            state: self.state.clone(),
            parent: link,
            collection,
        })
    }

    /// Cached entry or a singleflighted GET of the entity. A miss is
    /// `NotFound`.
    pub async fn get_by_uuid(&self, parent: &Resource, uuid: Uuid) -> TesseraResult<Arc<Resource>> {
        let ctx = self.context(parent)?;
        let flight = {
            let mut state = self.state.lock().await;
            if let Some(hit) = state.by_uuid.get(&uuid) {
                return Ok(hit.clone());
            }
            let key = FlightKey::Uuid(uuid);
            match state.flights.get(&key) {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Self::run_fetch(ctx, uuid).boxed().shared();
                    state.flights.insert(key, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Alias lookup over the (once-fetched) collection. Zero matches is
    /// `Ok(None)`; more than one is `Ambiguous`.
    pub async fn find_by_alias(
        &self,
        parent: &Resource,
        alias: &Alias,
    ) -> TesseraResult<Option<Arc<Resource>>> {
        if alias.is_empty() {
            // an empty alias would match every cached entry
            return Err(TesseraError::InvalidInput(format!(
                "empty alias in {} lookup",
                self.schema.singular
            )));
        }
        let ctx = self.context(parent)?;
        Self::ensure_listed(&ctx).await?;
        let state = self.state.lock().await;
        let mut matches = Self::find_matches(&state, alias);
        if matches.len() > 1 {
            return Err(ambiguous(self.schema, alias, matches.len()));
        }
        Ok(matches.pop())
    }

    /// Fetch-or-create as one singleflight unit per alias: the lookup, the
    /// conditional create, and the cache insert all happen inside the flight,
    /// so concurrent callers cause at most one create request.
    pub async fn get_or_create(
        &self,
        parent: &Resource,
        alias: Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        if !alias.is_complete_for(self.schema) {
            return Err(TesseraError::InvalidInput(format!(
                "get-or-create of a {} requires a full alias ({})",
                self.schema.singular,
                self.schema.alias_fields.join(", ")
            )));
        }
        let ctx = self.context(parent)?;
        let flight = {
            let mut state = self.state.lock().await;
            if state.listed {
                let mut matches = Self::find_matches(&state, &alias);
                if matches.len() > 1 {
                    return Err(ambiguous(self.schema, &alias, matches.len()));
                }
                if let Some(found) = matches.pop() {
                    return Ok(found);
                }
            }
            let key = FlightKey::Alias(alias.clone());
            match state.flights.get(&key) {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Self::run_get_or_create(ctx, alias, params).boxed().shared();
                    state.flights.insert(key, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Strict create: an existing child with the same alias is a `Conflict`.
    /// Concurrent identical creates coalesce onto one flight; a sequential
    /// duplicate conflicts.
    pub async fn create(
        &self,
        parent: &Resource,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        let ctx = self.context(parent)?;
        let Some(alias) = Alias::of(self.schema, &params) else {
            // nothing to collide on
            let resource = Self::create_remote(&ctx, params).await?;
            let mut state = self.state.lock().await;
            if let Some(uuid) = resource.uuid() {
                state.by_uuid.insert(uuid, resource.clone());
            }
            return Ok(resource);
        };
        let flight = {
            let mut state = self.state.lock().await;
            if !Self::find_matches(&state, &alias).is_empty() {
                return Err(conflict(self.schema, &alias));
            }
            let key = FlightKey::Create(alias.clone());
            match state.flights.get(&key) {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Self::run_create(ctx, alias, params).boxed().shared();
                    state.flights.insert(key, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Bulk creation in a single `{"items": [...]}` POST.
    pub async fn create_many(
        &self,
        parent: &Resource,
        items: Vec<Map<String, Value>>,
    ) -> TesseraResult<Vec<Arc<Resource>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let ctx = self.context(parent)?;
        let response = ctx
            .transport
            .request(ApiRequest::post(&ctx.collection, json!({ "items": items })))
            .await?;
        let mut page = expect_object(response, self.schema)?;
        let Some(Value::Array(rows)) = page.remove("items") else {
            return Err(TesseraError::Json(format!(
                "bulk {} create returned no items",
                self.schema.singular
            )));
        };
        let mut created = Vec::with_capacity(rows.len());
        {
            let mut state = self.state.lock().await;
            for row in rows {
                let mut obj = expect_object(row, self.schema)?;
                let uuid = take_id(&mut obj, self.schema)?;
                let resource = Resource::hydrated(
                    self.schema.kind,
                    ctx.transport.clone(),
                    Some(ctx.parent.clone()),
                    uuid,
                    obj,
                );
                state.by_uuid.insert(uuid, resource.clone());
                created.push(resource);
            }
        }
        debug!(
            kind = self.schema.singular,
            count = created.len(),
            "bulk-created children"
        );
        Ok(created)
    }

    /// Tolerant delete by uuid: `Ok(false)` if the entity does not exist.
    pub async fn delete_by_uuid(&self, parent: &Resource, uuid: Uuid) -> TesseraResult<bool> {
        let target = match self.get_by_uuid(parent, uuid).await {
            Ok(found) => found,
            Err(TesseraError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.remove(target).await
    }

    /// Tolerant delete by alias: `Ok(false)` if nothing matches. An
    /// ambiguous alias is still an error.
    pub async fn delete_by_alias(&self, parent: &Resource, alias: &Alias) -> TesseraResult<bool> {
        match self.find_by_alias(parent, alias).await? {
            Some(found) => self.remove(found).await,
            None => Ok(false),
        }
    }

    /// The full child collection: fetched once (following pagination), then
    /// served from memory merged with locally-created entries.
    pub async fn list(&self, parent: &Resource) -> TesseraResult<Vec<Arc<Resource>>> {
        let ctx = self.context(parent)?;
        Self::ensure_listed(&ctx).await?;
        let state = self.state.lock().await;
        Ok(state
            .by_uuid
            .values()
            .filter(|r| r.uuid().is_some())
            .cloned()
            .collect())
    }

    /// Entries already in memory, without touching the network.
    pub(crate) async fn cached(&self) -> Vec<Arc<Resource>> {
        let state = self.state.lock().await;
        state
            .by_uuid
            .values()
            .filter(|r| r.uuid().is_some())
            .cloned()
            .collect()
    }

    async fn remove(&self, target: Arc<Resource>) -> TesseraResult<bool> {
        // capture before delete(): a deleted resource no longer reports one
        let uuid = target.uuid();
        let deleted = match target.delete().await {
            Ok(()) => true,
            // removed out from under us; settle for the same end state
            Err(TesseraError::NotFound(_)) => {
                target.mark_deleted();
                false
            }
            Err(e) => return Err(e),
        };
        if let Some(uuid) = uuid {
            self.state.lock().await.by_uuid.remove(&uuid);
        }
        Ok(deleted)
    }

    fn find_matches(state: &CacheState, alias: &Alias) -> Vec<Arc<Resource>> {
        state
            .by_uuid
            .values()
            .filter(|r| r.uuid().is_some() && r.matches_alias(alias))
            .cloned()
            .collect()
    }

    async fn ensure_listed(ctx: &FlightContext) -> TesseraResult<()> {
        let flight = {
            let mut state = ctx.state.lock().await;
            if state.listed {
                return Ok(());
            }
            match &state.list_flight {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Self::run_list(ctx.clone()).boxed().shared();
                    state.list_flight = Some(flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    async fn run_list(ctx: FlightContext) -> TesseraResult<()> {
        let result = Self::fetch_collection(&ctx).await;
        let mut state = ctx.state.lock().await;
        state.list_flight = None;
        let fetched = result?;
        for resource in fetched {
            if let Some(uuid) = resource.uuid() {
                // locally-created entries win so identity stays stable
                state.by_uuid.entry(uuid).or_insert(resource);
            }
        }
        state.listed = true;
        Ok(())
    }

    async fn fetch_collection(ctx: &FlightContext) -> TesseraResult<Vec<Arc<Resource>>> {
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = ApiRequest::get(&ctx.collection);
            if let Some(token) = &next_token {
                request = request.with_query("nextToken", token);
            }
            let page = ctx.transport.request(request).await?;
            let Value::Object(mut page) = page else {
                break;
            };
            next_token = page
                .get("nextToken")
                .and_then(Value::as_str)
                .map(String::from);
            if let Some(Value::Array(items)) = page.remove("items") {
                for item in items {
                    let mut obj = expect_object(item, ctx.schema)?;
                    let uuid = take_id(&mut obj, ctx.schema)?;
                    resources.push(Resource::hydrated(
                        ctx.schema.kind,
                        ctx.transport.clone(),
                        Some(ctx.parent.clone()),
                        uuid,
                        obj,
                    ));
                }
            }
            if next_token.is_none() {
                break;
            }
        }
        debug!(
            kind = ctx.schema.singular,
            count = resources.len(),
            "fetched collection"
        );
        Ok(resources)
    }

    async fn run_fetch(ctx: FlightContext, uuid: Uuid) -> TesseraResult<Arc<Resource>> {
        let result = Self::fetch_one(&ctx, uuid).await;
        let mut state = ctx.state.lock().await;
        state.flights.remove(&FlightKey::Uuid(uuid));
        let resource = result?;
        Ok(state.by_uuid.entry(uuid).or_insert(resource).clone())
    }

    async fn fetch_one(ctx: &FlightContext, uuid: Uuid) -> TesseraResult<Arc<Resource>> {
        let path = format!("{}/{uuid}", ctx.collection);
        let response = ctx.transport.request(ApiRequest::get(path)).await?;
        let mut obj = expect_object(response, ctx.schema)?;
        obj.remove("id");
        Ok(Resource::hydrated(
            ctx.schema.kind,
            ctx.transport.clone(),
            Some(ctx.parent.clone()),
            uuid,
            obj,
        ))
    }

    async fn run_get_or_create(
        ctx: FlightContext,
        alias: Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        let result = Self::resolve_or_create(&ctx, &alias, params).await;
        let mut state = ctx.state.lock().await;
        state.flights.remove(&FlightKey::Alias(alias));
        let resource = result?;
        match resource.uuid() {
            Some(uuid) => Ok(state
                .by_uuid
                .entry(uuid)
                .or_insert_with(|| resource.clone())
                .clone()),
            None => Ok(resource),
        }
    }

    async fn resolve_or_create(
        ctx: &FlightContext,
        alias: &Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        Self::ensure_listed(ctx).await?;
        {
            let state = ctx.state.lock().await;
            let mut matches = Self::find_matches(&state, alias);
            if matches.len() > 1 {
                return Err(ambiguous(ctx.schema, alias, matches.len()));
            }
            if let Some(found) = matches.pop() {
                debug!(kind = ctx.schema.singular, %alias, "get-or-create hit");
                return Ok(found);
            }
        }
        Self::create_remote(ctx, params).await
    }

    async fn run_create(
        ctx: FlightContext,
        alias: Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        let result = Self::strict_create(&ctx, &alias, params).await;
        let mut state = ctx.state.lock().await;
        state.flights.remove(&FlightKey::Create(alias));
        let resource = result?;
        if let Some(uuid) = resource.uuid() {
            state.by_uuid.insert(uuid, resource.clone());
        }
        Ok(resource)
    }

    async fn strict_create(
        ctx: &FlightContext,
        alias: &Alias,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        Self::ensure_listed(ctx).await?;
        {
            let state = ctx.state.lock().await;
            if !Self::find_matches(&state, alias).is_empty() {
                return Err(conflict(ctx.schema, alias));
            }
        }
        Self::create_remote(ctx, params).await
    }

    async fn create_remote(
        ctx: &FlightContext,
        params: Map<String, Value>,
    ) -> TesseraResult<Arc<Resource>> {
        let resource = Resource::unbound(
            ctx.schema.kind,
            ctx.transport.clone(),
            Some(ctx.parent.clone()),
            params,
        );
        resource.create().await?;
        Ok(resource)
    }
}

fn ambiguous(schema: &'static ResourceSchema, alias: &Alias, matches: usize) -> TesseraError {
    TesseraError::Ambiguous {
        kind: schema.singular,
        alias: alias.to_string(),
        matches,
    }
}

fn conflict(schema: &'static ResourceSchema, alias: &Alias) -> TesseraError {
    TesseraError::Conflict {
        kind: schema.singular,
        alias: alias.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ChildLookup;
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

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
    async fn test_concurrent_get_or_create_issues_one_create() {
        let org = Uuid::from_u128(1);
        let workspace = Uuid::from_u128(7);
        let creates = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(
            MockTransport::new(8).with_latency(Duration::from_millis(5)),
        );
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |_| Ok(json!({"items": []})),
        );
        let counter = creates.clone();
        transport.on(
            Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"id": workspace.to_string(), "name": "sales"}))
            },
        );

        let root = org_root(transport.clone(), org);
        let calls = (0..8).map(|_| {
            let root = root.clone();
            async move {
                root.get_or_create_child(
                    ResourceKind::Workspace,
                    Alias::name("sales"),
                    params(json!({"name": "sales"})),
                )
                .await
            }
        });
        let results = join_all(calls).await;

        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            let resource = result.as_ref().unwrap();
            assert!(Arc::ptr_eq(resource, &first));
        }
        assert_eq!(creates.load(Ordering::SeqCst), 1);
        assert_eq!(first.uuid(), Some(workspace));
    }

    #[tokio::test]
    async fn test_repeat_get_or_create_served_from_cache() {
        let org = Uuid::from_u128(1);
        let workspace = Uuid::from_u128(7);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |_| Ok(json!({"items": []})),
        );
        transport.on(
            Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| Ok(json!({"id": workspace.to_string(), "name": "sales"})),
        );

        let root = org_root(transport.clone(), org);
        let first = root
            .get_or_create_child(
                ResourceKind::Workspace,
                Alias::name("sales"),
                params(json!({"name": "sales"})),
            )
            .await
            .unwrap();
        let requests_after_first = transport.request_count();

        let second = root
            .get_or_create_child(
                ResourceKind::Workspace,
                Alias::name("sales"),
                params(json!({"name": "sales"})),
            )
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.request_count(), requests_after_first);
    }

    #[tokio::test]
    async fn test_failed_flight_shares_error_then_clears() {
        let org = Uuid::from_u128(1);
        let workspace = Uuid::from_u128(7);
        let attempts = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(
            MockTransport::new(8).with_latency(Duration::from_millis(5)),
        );
        let counter = attempts.clone();
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TesseraError::Api {
                        status: 500,
                        message: "boom".to_string(),
                        details: None,
                    })
                } else {
                    Ok(json!({"items": []}))
                }
            },
        );
        transport.on(
            Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| Ok(json!({"id": workspace.to_string(), "name": "sales"})),
        );

        let root = org_root(transport.clone(), org);
        let calls = (0..2).map(|_| {
            let root = root.clone();
            async move {
                root.get_or_create_child(
                    ResourceKind::Workspace,
                    Alias::name("sales"),
                    params(json!({"name": "sales"})),
                )
                .await
            }
        });
        let results = join_all(calls).await;
        for result in results {
            assert!(matches!(result, Err(TesseraError::Api { status: 500, .. })));
        }

        // the failed flight is gone; a retry goes back to the network
        let retried = root
            .get_or_create_child(
                ResourceKind::Workspace,
                Alias::name("sales"),
                params(json!({"name": "sales"})),
            )
            .await
            .unwrap();
        assert_eq!(retried.uuid(), Some(workspace));
    }

    #[tokio::test]
    async fn test_ambiguous_alias() {
        let org = Uuid::from_u128(1);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |_| {
                Ok(json!({"items": [
                    {"id": Uuid::from_u128(21).to_string(), "name": "dup"},
                    {"id": Uuid::from_u128(22).to_string(), "name": "dup"},
                ]}))
            },
        );

        let root = org_root(transport, org);
        let err = root
            .get_child(ResourceKind::Workspace, ChildLookup::Alias(Alias::name("dup")))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::Ambiguous { matches: 2, .. }));
    }

    #[tokio::test]
    async fn test_alias_miss_is_none_uuid_miss_is_not_found() {
        let org = Uuid::from_u128(1);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |_| Ok(json!({"items": []})),
        );

        let root = org_root(transport, org);
        let by_alias = root
            .get_child(ResourceKind::Workspace, ChildLookup::Alias(Alias::name("nope")))
            .await
            .unwrap();
        assert!(by_alias.is_none());

        let err = root
            .get_child(
                ResourceKind::Workspace,
                ChildLookup::Uuid(Uuid::from_u128(99)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_alias_is_rejected_before_the_network() {
        let transport = Arc::new(MockTransport::new(4));
        let root = org_root(transport.clone(), Uuid::from_u128(1));

        let err = root
            .get_child(
                ResourceKind::Workspace,
                ChildLookup::Alias(Alias::new(Vec::new())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidInput(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let org = Uuid::from_u128(1);
        let workspace = Uuid::from_u128(7);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            move |_| {
                Ok(json!({"items": [
                    {"id": workspace.to_string(), "name": "temp"},
                ]}))
            },
        );
        transport.on(
            Method::Delete,
            format!("/api/organizations/{org}/workspaces/{workspace}"),
            |_| Ok(Value::Null),
        );

        let root = org_root(transport.clone(), org);
        let first = root
            .delete_child(ResourceKind::Workspace, ChildLookup::Alias(Alias::name("temp")))
            .await
            .unwrap();
        assert!(first);

        let deletes_so_far = transport.request_count();
        let second = root
            .delete_child(ResourceKind::Workspace, ChildLookup::Alias(Alias::name("temp")))
            .await
            .unwrap();
        assert!(!second);
        // no second DELETE went out
        assert_eq!(transport.request_count(), deletes_so_far);
    }

    #[tokio::test]
    async fn test_list_merges_local_creations() {
        let org = Uuid::from_u128(1);
        let existing = Uuid::from_u128(21);
        let fresh = Uuid::from_u128(22);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            move |_| {
                Ok(json!({"items": [
                    {"id": existing.to_string(), "name": "sales"},
                ]}))
            },
        );
        transport.on(
            Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| Ok(json!({"id": fresh.to_string(), "name": "ops"})),
        );

        let root = org_root(transport.clone(), org);
        root.get_or_create_child(
            ResourceKind::Workspace,
            Alias::name("ops"),
            params(json!({"name": "ops"})),
        )
        .await
        .unwrap();

        let children = root.get_children(ResourceKind::Workspace).await.unwrap();
        assert_eq!(children.len(), 2);
        let mut uuids: Vec<_> = children.iter().filter_map(|c| c.uuid()).collect();
        uuids.sort();
        assert_eq!(uuids, vec![existing, fresh]);
    }

    #[tokio::test]
    async fn test_list_follows_pagination() {
        let org = Uuid::from_u128(1);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            |req| {
                let page_two = req
                    .query
                    .iter()
                    .any(|(k, v)| k == "nextToken" && v == "t2");
                if page_two {
                    Ok(json!({"items": [
                        {"id": Uuid::from_u128(23).to_string(), "name": "c"},
                    ]}))
                } else {
                    Ok(json!({
                        "items": [
                            {"id": Uuid::from_u128(21).to_string(), "name": "a"},
                            {"id": Uuid::from_u128(22).to_string(), "name": "b"},
                        ],
                        "nextToken": "t2",
                    }))
                }
            },
        );

        let root = org_root(transport.clone(), org);
        let children = root.get_children(ResourceKind::Workspace).await.unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(transport.request_count(), 2);

        // second list is memory only
        let again = root.get_children(ResourceKind::Workspace).await.unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_strict_create_conflicts_on_existing_alias() {
        let org = Uuid::from_u128(1);
        let existing = Uuid::from_u128(21);
        let fresh = Uuid::from_u128(22);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Get,
            format!("/api/organizations/{org}/workspaces"),
            move |_| {
                Ok(json!({"items": [
                    {"id": existing.to_string(), "name": "sales"},
                ]}))
            },
        );
        transport.on(
            Method::Post,
            format!("/api/organizations/{org}/workspaces"),
            move |_| Ok(json!({"id": fresh.to_string(), "name": "ops"})),
        );

        let root = org_root(transport, org);
        let err = root
            .create_child(ResourceKind::Workspace, params(json!({"name": "sales"})))
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::Conflict { .. }));

        let created = root
            .create_child(ResourceKind::Workspace, params(json!({"name": "ops"})))
            .await
            .unwrap();
        assert_eq!(created.uuid(), Some(fresh));
    }

    #[tokio::test]
    async fn test_create_many_bulk_posts_once() {
        let data_set = Uuid::from_u128(5);
        let transport = Arc::new(MockTransport::new(4));
        transport.on(
            Method::Post,
            format!("/api/data-sets/{data_set}/data"),
            |req| {
                let items = req.body.as_ref().unwrap()["items"].as_array().unwrap();
                let rows: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let mut row = item.as_object().cloned().unwrap();
                        row.insert(
                            "id".to_string(),
                            json!(Uuid::from_u128(100 + i as u128).to_string()),
                        );
                        Value::Object(row)
                    })
                    .collect();
                Ok(json!({ "items": rows }))
            },
        );

        let parent = Resource::hydrated(
            ResourceKind::DataSet,
            transport.clone(),
            None,
            data_set,
            params(json!({"name": "metrics"})),
        );
        let rows = vec![
            params(json!({"value": 1})),
            params(json!({"value": 2})),
            params(json!({"value": 3})),
        ];
        let created = parent
            .create_children(ResourceKind::Data, rows)
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(created[1].params()["value"], json!(2));
    }
}

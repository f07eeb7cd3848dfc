//! Auto-async dispatch for API layers.
//!
//! A layer is a small bundle of scope state (organization, selected
//! workspace, menu path) whose facade methods all funnel through here: the
//! immediate path drains the batch and returns a typed result, the deferred
//! path queues a future built over a snapshot clone of the layer. Snapshots
//! make scope mutation safe: a queued call keeps the scope it was submitted
//! under.

use crate::error::TesseraResult;
use crate::pool::{AsyncGroup, ExecutionPool, Submitted};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// One facade call about to be dispatched.
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub layer: &'static str,
    pub method: &'static str,
    /// Batch tag for the deferred path. `None` means [`AsyncGroup::General`].
    pub group: Option<AsyncGroup>,
    /// Arguments as given by the caller, for validation and logging.
    pub args: Value,
}

impl CallSpec {
    pub fn new(layer: &'static str, method: &'static str) -> Self {
        Self {
            layer,
            method,
            group: None,
            args: Value::Null,
        }
    }

    pub fn with_group(mut self, group: AsyncGroup) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Task name as it appears in pool listings and task errors.
    pub fn name(&self) -> String {
        format!("{}.{}", self.layer, self.method)
    }
}

/// Argument validation run before a call is queued or executed. Rejections
/// never reach the pool.
pub trait Preflight {
    fn check(&self, call: &CallSpec) -> TesseraResult<()>;
}

/// Opt-in announcement of every dispatched call.
pub trait Loggable {
    fn announce(&self, call: &CallSpec) {
        info!(layer = call.layer, method = call.method, "dispatching call");
    }
}

/// A dispatchable API layer.
///
/// Capabilities are explicit queries: a layer that wants validation or call
/// logging returns itself from the corresponding accessor. The dispatcher
/// never probes for anything beyond these two.
pub trait Layer: Send + Sync {
    fn layer_name(&self) -> &'static str;

    fn as_preflight(&self) -> Option<&dyn Preflight> {
        None
    }

    fn as_loggable(&self) -> Option<&dyn Loggable> {
        None
    }
}

/// Wraps a layer's scope state and routes its calls through the pool.
pub struct AsyncDispatcher<T> {
    inner: RwLock<T>,
    pool: Arc<ExecutionPool>,
}

impl<T: Layer + Clone> AsyncDispatcher<T> {
    pub fn new(layer: T, pool: Arc<ExecutionPool>) -> Self {
        Self {
            inner: RwLock::new(layer),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<ExecutionPool> {
        &self.pool
    }

    /// Snapshot clone of the current layer state.
    pub fn snapshot(&self) -> T {
        self.inner.read().unwrap().clone()
    }

    /// Mutate the layer scope (e.g. select a workspace). Already-queued
    /// calls are unaffected; they hold their own snapshots.
    pub fn mutate(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.write().unwrap());
    }

    fn before_dispatch(&self, call: &CallSpec) -> TesseraResult<T> {
        let layer = self.inner.read().unwrap();
        debug!(layer = layer.layer_name(), method = call.method, "dispatching");
        if let Some(preflight) = layer.as_preflight() {
            preflight.check(call)?;
        }
        if let Some(loggable) = layer.as_loggable() {
            loggable.announce(call);
        }
        Ok(layer.clone())
    }

    /// Immediate path: validate, snapshot, drain the pending batch, run the
    /// call as its own batch, and return its typed result.
    pub async fn call<Out, Fut>(
        &self,
        call: CallSpec,
        make: impl FnOnce(T) -> Fut,
    ) -> TesseraResult<Out>
    where
        Fut: Future<Output = TesseraResult<Out>> + Send,
    {
        let snapshot = self.before_dispatch(&call)?;
        self.pool.execute_now(call.name(), make(snapshot)).await
    }

    /// Deferred path: validate, snapshot, and queue a future resolving to
    /// the call's serialized result.
    pub async fn call_deferred<Out, Fut>(
        &self,
        call: CallSpec,
        make: impl FnOnce(T) -> Fut,
    ) -> TesseraResult<Submitted>
    where
        Out: serde::Serialize,
        Fut: Future<Output = TesseraResult<Out>> + Send + 'static,
    {
        let snapshot = self.before_dispatch(&call)?;
        let name = call.name();
        let group = call.group.unwrap_or(AsyncGroup::General);
        let future = make(snapshot);
        let wrapped = async move {
            let out = future.await?;
            Ok(serde_json::to_value(out)?)
        }
        .boxed();
        self.pool.enqueue(name, group, wrapped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TesseraError;
    use crate::pool::RuntimeMode;
    use crate::testing::MockTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct ScopedLayer {
        workspace: String,
        announces: Arc<AtomicUsize>,
    }

    impl Layer for ScopedLayer {
        fn layer_name(&self) -> &'static str {
            "scoped"
        }

        fn as_preflight(&self) -> Option<&dyn Preflight> {
            Some(self)
        }

        fn as_loggable(&self) -> Option<&dyn Loggable> {
            Some(self)
        }
    }

    impl Preflight for ScopedLayer {
        fn check(&self, call: &CallSpec) -> TesseraResult<()> {
            if call.method == "lookup" {
                let has_uuid = call.args.get("uuid").is_some();
                let has_name = call.args.get("name").is_some();
                if has_uuid == has_name {
                    return Err(TesseraError::InvalidInput(
                        "exactly one of uuid or name is required".to_string(),
                    ));
                }
            }
            Ok(())
        }
    }

    impl Loggable for ScopedLayer {
        fn announce(&self, _call: &CallSpec) {
            self.announces.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixture() -> (Arc<ExecutionPool>, AsyncDispatcher<ScopedLayer>, Arc<AtomicUsize>) {
        let transport = Arc::new(MockTransport::new(4));
        let pool = Arc::new(ExecutionPool::new(transport, RuntimeMode::Batched));
        let announces = Arc::new(AtomicUsize::new(0));
        let layer = ScopedLayer {
            workspace: "alpha".to_string(),
            announces: announces.clone(),
        };
        let dispatcher = AsyncDispatcher::new(layer, pool.clone());
        (pool, dispatcher, announces)
    }

    #[test]
    fn test_call_spec_name() {
        let call = CallSpec::new("actions", "get_action");
        assert_eq!(call.name(), "actions.get_action");
    }

    #[tokio::test]
    async fn test_preflight_rejects_before_anything_is_queued() {
        let (pool, dispatcher, _) = fixture();
        let call = CallSpec::new("scoped", "lookup")
            .with_args(json!({"uuid": "u", "name": "n"}));
        let err = dispatcher
            .call_deferred(call, |_layer| async move { Ok(json!(null)) })
            .await
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidInput(_)));
        assert!(pool.pending_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_immediate_call_returns_typed_result() {
        let (_pool, dispatcher, _) = fixture();
        let call = CallSpec::new("scoped", "whoami");
        let out: String = dispatcher
            .call(call, |layer| async move { Ok(layer.workspace) })
            .await
            .unwrap();
        assert_eq!(out, "alpha");
    }

    #[tokio::test]
    async fn test_queued_call_keeps_its_snapshot() {
        let (pool, dispatcher, _) = fixture();
        dispatcher
            .call_deferred(CallSpec::new("scoped", "emit"), |layer| async move {
                Ok(layer.workspace)
            })
            .await
            .unwrap();

        // mutating the scope after submission must not affect the queued call
        dispatcher.mutate(|layer| layer.workspace = "beta".to_string());

        let results = pool.drain().await.unwrap();
        assert_eq!(results, vec![json!("alpha")]);
        assert_eq!(dispatcher.snapshot().workspace, "beta");
    }

    #[tokio::test]
    async fn test_loggable_announces_each_dispatch() {
        let (pool, dispatcher, announces) = fixture();
        dispatcher
            .call_deferred(CallSpec::new("scoped", "emit"), |_layer| async move {
                Ok(json!(1))
            })
            .await
            .unwrap();
        dispatcher
            .call(CallSpec::new("scoped", "whoami"), |layer| async move {
                Ok(layer.workspace)
            })
            .await
            .unwrap();
        assert_eq!(announces.load(Ordering::SeqCst), 2);
        pool.drain().await.unwrap();
    }
}

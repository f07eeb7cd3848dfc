//! The call-batching execution pool.
//!
//! Deferred submissions accumulate in a shared batch until something forces a
//! drain: an immediate call, an incompatible [`AsyncGroup`], or an explicit
//! flush. A drain snapshots the batch, runs every task concurrently under a
//! fresh limiter budget, then runs the ending-task wave, and reports results
//! in submission order.

pub mod dispatcher;
mod group;
mod worker;

pub use group::AsyncGroup;

use crate::error::{TesseraError, TesseraResult};
use crate::transport::Transport;
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use worker::IsolatedWorker;

/// How the pool treats deferred submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    /// Queue deferred calls and run them together on the next drain.
    #[default]
    Batched,
    /// Run every submission inline, in submission order. Useful for
    /// debugging and for hosts that cannot tolerate background batches.
    Sequential,
}

/// Outcome of a deferred submission.
#[derive(Debug, Clone)]
pub enum Submitted {
    /// Queued into the pending batch; the result surfaces at the next drain.
    Queued { task: String },
    /// Ran inline (sequential mode) and produced this value.
    Completed(Value),
}

impl Submitted {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submitted::Queued { .. })
    }

    /// The completed value, when the call ran inline.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Submitted::Completed(value) => Some(value),
            Submitted::Queued { .. } => None,
        }
    }
}

struct PoolTask {
    name: String,
    future: BoxFuture<'static, TesseraResult<Value>>,
}

struct EndingTask {
    name: String,
    future: BoxFuture<'static, TesseraResult<()>>,
}

#[derive(Default)]
struct PoolState {
    tasks: Vec<PoolTask>,
    pending_groups: HashSet<AsyncGroup>,
    ending_tasks: Vec<EndingTask>,
}

/// Shared batch of deferred calls plus the machinery to run them.
pub struct ExecutionPool {
    transport: Arc<dyn Transport>,
    mode: RuntimeMode,
    state: Mutex<PoolState>,
    worker: std::sync::Mutex<Option<IsolatedWorker>>,
}

impl ExecutionPool {
    pub fn new(transport: Arc<dyn Transport>, mode: RuntimeMode) -> Self {
        Self {
            transport,
            mode,
            state: Mutex::new(PoolState::default()),
            worker: std::sync::Mutex::new(None),
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Submit a deferred call. In batched mode the future joins the pending
    /// batch if its group allows, otherwise the batch is drained first and
    /// the call starts a new one. In sequential mode the future runs inline.
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        group: AsyncGroup,
        future: BoxFuture<'static, TesseraResult<Value>>,
    ) -> TesseraResult<Submitted> {
        let name = name.into();
        if self.mode == RuntimeMode::Sequential {
            let value = future.await.map_err(|e| e.in_task(&name))?;
            return Ok(Submitted::Completed(value));
        }
        loop {
            {
                let mut state = self.state.lock().await;
                if group.joins(&state.pending_groups) {
                    debug!(task = %name, group = %group, "queued task");
                    state.pending_groups.insert(group);
                    state.tasks.push(PoolTask {
                        name: name.clone(),
                        future,
                    });
                    return Ok(Submitted::Queued { task: name });
                }
            }
            // incompatible group: flush what is pending, then try again
            self.drain().await?;
        }
    }

    /// Run one call immediately as its own batch: drain whatever is pending,
    /// then execute the future and return its typed result. Errors carry the
    /// task name.
    pub async fn execute_now<T>(
        &self,
        name: impl Into<String>,
        future: impl Future<Output = TesseraResult<T>> + Send,
    ) -> TesseraResult<T> {
        let name = name.into();
        self.drain().await?;
        self.transport.limiter().reset();
        debug!(task = %name, "executing immediately");
        future.await.map_err(|e| e.in_task(&name))
    }

    /// Flush the pending batch.
    ///
    /// The batch is snapshotted atomically, the limiter gets a fresh permit
    /// budget, and every task runs to completion concurrently; a failing
    /// task never cancels its siblings. The ending-task wave runs after the
    /// main batch whether or not it failed. Returns the task results in
    /// submission order, or the first (submission-order) error, with main
    /// batch errors taking precedence over ending-task errors.
    pub async fn drain(&self) -> TesseraResult<Vec<Value>> {
        let (tasks, ending) = {
            let mut state = self.state.lock().await;
            if state.tasks.is_empty() && state.ending_tasks.is_empty() {
                return Ok(Vec::new());
            }
            state.pending_groups.clear();
            (
                std::mem::take(&mut state.tasks),
                std::mem::take(&mut state.ending_tasks),
            )
        };

        self.transport.limiter().reset();
        info!(tasks = tasks.len(), ending = ending.len(), "draining batch");

        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let results = join_all(tasks.into_iter().map(|t| t.future)).await;

        let mut failure: Option<TesseraError> = None;
        let mut values = Vec::with_capacity(results.len());
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(value) => values.push(value),
                Err(e) => {
                    warn!(task = %name, error = %e, "task failed");
                    if failure.is_none() {
                        failure = Some(e.in_task(name));
                    }
                }
            }
        }

        let ending_names: Vec<String> = ending.iter().map(|t| t.name.clone()).collect();
        let ending_results = join_all(ending.into_iter().map(|t| t.future)).await;
        for (name, result) in ending_names.iter().zip(ending_results) {
            if let Err(e) = result {
                warn!(task = %name, error = %e, "ending task failed");
                if failure.is_none() {
                    failure = Some(e.in_task(name));
                }
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(values),
        }
    }

    /// Register a named cleanup/flush future to run after the main batch on
    /// the next drain. Registering an existing name replaces the pending
    /// future, so repeated registrations flush once.
    pub async fn add_ending_task(
        &self,
        name: impl Into<String>,
        future: BoxFuture<'static, TesseraResult<()>>,
    ) {
        let name = name.into();
        let mut state = self.state.lock().await;
        if let Some(existing) = state.ending_tasks.iter_mut().find(|t| t.name == name) {
            existing.future = future;
        } else {
            state.ending_tasks.push(EndingTask { name, future });
        }
    }

    /// Names of the queued tasks, in submission order.
    pub async fn pending_tasks(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    fn worker(&self) -> TesseraResult<IsolatedWorker> {
        let mut guard = self.worker.lock().unwrap();
        if let Some(worker) = guard.as_ref() {
            return Ok(worker.clone());
        }
        let worker = IsolatedWorker::spawn()?;
        *guard = Some(worker.clone());
        Ok(worker)
    }

    /// Blocking [`ExecutionPool::drain`], via the isolated worker. Safe to
    /// call from inside a running runtime and from plain synchronous code.
    pub fn drain_blocking(self: &Arc<Self>) -> TesseraResult<Vec<Value>> {
        let pool = self.clone();
        self.worker()?.run(async move { pool.drain().await })?
    }

    /// Blocking [`ExecutionPool::execute_now`], via the isolated worker.
    pub fn execute_blocking<T>(
        self: &Arc<Self>,
        name: impl Into<String>,
        future: impl Future<Output = TesseraResult<T>> + Send + 'static,
    ) -> TesseraResult<T>
    where
        T: Send + 'static,
    {
        let pool = self.clone();
        let name = name.into();
        self.worker()?
            .run(async move { pool.execute_now(name, future).await })?
    }
}

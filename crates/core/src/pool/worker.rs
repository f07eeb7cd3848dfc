//! Dedicated runtime thread backing the blocking entry points.
//!
//! `Runtime::block_on` panics when called from inside a running tokio
//! runtime, so the blocking APIs never block in place. Instead they hand the
//! future to a lazily-spawned thread that owns its own current-thread
//! runtime, and block the calling thread on a reply channel. That works from
//! plain synchronous code and from inside an async context alike.

use crate::error::{TesseraError, TesseraResult};
use std::future::Future;
use std::sync::mpsc;
use tracing::debug;

type Job = Box<dyn FnOnce(&tokio::runtime::Runtime) + Send>;

/// Handle to the isolated runtime thread. Cheap to clone; the thread exits
/// once every handle is dropped.
#[derive(Clone)]
pub(crate) struct IsolatedWorker {
    tx: mpsc::Sender<Job>,
}

impl IsolatedWorker {
    pub(crate) fn spawn() -> TesseraResult<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                TesseraError::Worker(format!("failed to build isolated runtime: {e}"))
            })?;
        std::thread::Builder::new()
            .name("tessera-isolated".to_string())
            .spawn(move || {
                debug!("isolated worker started");
                while let Ok(job) = rx.recv() {
                    job(&runtime);
                }
                debug!("isolated worker stopped");
            })
            .map_err(|e| {
                TesseraError::Worker(format!("failed to spawn isolated worker: {e}"))
            })?;
        Ok(Self { tx })
    }

    /// Run a future to completion on the worker's runtime, blocking the
    /// calling thread until the result comes back.
    pub(crate) fn run<T>(
        &self,
        future: impl Future<Output = T> + Send + 'static,
    ) -> TesseraResult<T>
    where
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |runtime| {
            let result = runtime.block_on(future);
            let _ = reply_tx.send(result);
        });
        self.tx
            .send(job)
            .map_err(|_| TesseraError::Worker("isolated worker is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| TesseraError::Worker("isolated worker dropped the reply".to_string()))
    }
}

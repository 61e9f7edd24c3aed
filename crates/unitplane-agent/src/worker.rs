//! In-process worker queue.
//!
//! Commands are cast onto a bounded channel and the caller returns as soon as
//! the command is queued. The worker loop spawns one task per command, so a
//! long transition on one unit never holds up another.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use unitplane_core::{HostId, RequestContext};
use unitplane_store::Unit;

use crate::error::{AgentError, Result};
use crate::manager::LifecycleManager;
use crate::types::{CreateUnitRequest, UnitCommand};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Sending side of a worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<UnitCommand>,
    manager: Arc<LifecycleManager>,
}

impl WorkerHandle {
    /// The host the worker owns units for.
    #[must_use]
    pub fn host(&self) -> &HostId {
        self.manager.host()
    }

    /// Queue a command without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::QueueFull` if the queue has no room and
    /// `AgentError::QueueClosed` if the worker loop has stopped.
    pub fn cast(&self, command: UnitCommand) -> Result<()> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AgentError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AgentError::QueueClosed,
        })?;

        tracing::debug!(
            unit_id = %command.unit_id,
            action = %command.action,
            "Queued unit command"
        );
        Ok(())
    }

    /// Create a unit and wait for the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the mediator rejects the record.
    pub async fn create(&self, ctx: &RequestContext, req: CreateUnitRequest) -> Result<Unit> {
        self.manager.create_unit(ctx, req).await
    }
}

/// Receiving side of a worker.
pub struct Worker {
    rx: mpsc::Receiver<UnitCommand>,
    manager: Arc<LifecycleManager>,
}

impl Worker {
    /// Create a worker and its handle.
    #[must_use]
    pub fn new(manager: Arc<LifecycleManager>, capacity: usize) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = WorkerHandle {
            tx,
            manager: Arc::clone(&manager),
        };
        (Self { rx, manager }, handle)
    }

    /// Create a worker and run it on the current runtime.
    #[must_use]
    pub fn spawn(manager: Arc<LifecycleManager>, capacity: usize) -> (WorkerHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(manager, capacity);
        (handle, tokio::spawn(worker.run()))
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(host = %self.manager.host(), "Worker started");

        while let Some(command) = self.rx.recv().await {
            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                if let Err(e) = manager.execute(command).await {
                    tracing::error!(
                        unit_id = %command.unit_id,
                        action = %command.action,
                        error = %e,
                        "Unit command failed"
                    );
                }
            });
        }

        tracing::info!(host = %self.manager.host(), "Worker stopped");
    }
}

// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The orchestrator talks to a `JobExecutor` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`runner`].

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::BatchEvent;
use crate::errors::{Error, Result};
use crate::types::JobName;

use super::runner::spawn_executor;

/// Everything the executor needs to run one job, detached from the `Job`
/// entity itself: the orchestrator keeps ownership of its jobs and hands the
/// executor only this value.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub name: JobName,
    /// The fully composed `&&`-chain to run under `bash -c`.
    pub command: String,
    pub work_dir: PathBuf,
    pub log_path: PathBuf,
    /// Environment bindings applied to the child process.
    pub env: BTreeMap<String, String>,
}

/// Trait abstracting how spawn requests are executed.
///
/// Production code uses [`RealJobExecutor`]; tests can provide their own
/// implementation that records requests and directly emits `JobCompleted`
/// events.
pub trait JobExecutor: Send {
    /// Dispatch the given jobs for execution. Fire-and-forget: every
    /// dispatched job must eventually produce exactly one
    /// `BatchEvent::JobCompleted`.
    fn spawn_jobs(
        &mut self,
        jobs: Vec<SpawnRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor used in production.
///
/// Internally this wraps the background loop in [`spawn_executor`]: requests
/// are forwarded over an mpsc channel and each job runs in its own tokio
/// task, so all jobs may be in flight concurrently.
pub struct RealJobExecutor {
    tx: mpsc::Sender<SpawnRequest>,
}

impl RealJobExecutor {
    /// Create a new real executor, wiring it to the given batch event
    /// sender. This spawns the background executor loop immediately.
    pub fn new(events_tx: mpsc::Sender<BatchEvent>) -> Self {
        let tx = spawn_executor(events_tx);
        Self { tx }
    }
}

impl JobExecutor for RealJobExecutor {
    fn spawn_jobs(
        &mut self,
        jobs: Vec<SpawnRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for job in jobs {
                tx.send(job)
                    .await
                    .map_err(|e| Error::msg(e.to_string()))?;
            }
            Ok(())
        })
    }
}

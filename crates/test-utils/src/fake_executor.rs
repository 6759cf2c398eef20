use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use diagrun::engine::BatchEvent;
use diagrun::errors::Result;
use diagrun::exec::{JobExecutor, SpawnRequest};
use diagrun::types::JobStatus;

/// A fake executor that:
/// - records every spawn request it receives
/// - immediately reports a completion for each dispatched job, with a
///   per-job configurable status (default `Success`).
pub struct FakeJobExecutor {
    events_tx: mpsc::Sender<BatchEvent>,
    pub spawned: Arc<Mutex<Vec<SpawnRequest>>>,
    outcomes: HashMap<String, JobStatus>,
}

impl FakeJobExecutor {
    pub fn new(
        events_tx: mpsc::Sender<BatchEvent>,
        spawned: Arc<Mutex<Vec<SpawnRequest>>>,
    ) -> Self {
        Self {
            events_tx,
            spawned,
            outcomes: HashMap::new(),
        }
    }

    /// Report `status` instead of `Success` when the named job completes.
    pub fn with_outcome(mut self, job: &str, status: JobStatus) -> Self {
        self.outcomes.insert(job.to_string(), status);
        self
    }
}

impl JobExecutor for FakeJobExecutor {
    fn spawn_jobs(
        &mut self,
        jobs: Vec<SpawnRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.events_tx.clone();
        let spawned = Arc::clone(&self.spawned);
        let outcomes: HashMap<String, JobStatus> = jobs
            .iter()
            .map(|j| {
                let status = self
                    .outcomes
                    .get(&j.name)
                    .copied()
                    .unwrap_or(JobStatus::Success);
                (j.name.clone(), status)
            })
            .collect();

        Box::pin(async move {
            for job in jobs {
                let status = outcomes[&job.name];
                let name = job.name.clone();
                {
                    let mut guard = spawned.lock().unwrap();
                    guard.push(job);
                }

                tx.send(BatchEvent::JobCompleted { job: name, status })
                    .await
                    .map_err(|e| anyhow::Error::msg(e.to_string()))?;
            }
            Ok(())
        })
    }
}

// src/exec/runner.rs

//! Background executor loop and individual job process handling.

use std::fs::File;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::BatchEvent;
use crate::exec::backend::SpawnRequest;
use crate::types::JobStatus;

/// Spawn the background executor loop.
///
/// The returned sender is what [`RealJobExecutor`](super::RealJobExecutor)
/// forwards spawn requests to. Each request is executed in its own tokio
/// task, so the whole batch can be in flight concurrently.
pub fn spawn_executor(events_tx: mpsc::Sender<BatchEvent>) -> mpsc::Sender<SpawnRequest> {
    let (tx, mut rx) = mpsc::channel::<SpawnRequest>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        while let Some(request) = rx.recv().await {
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                run_job(request, events_tx).await;
            });
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run a single job process and emit exactly one `JobCompleted` event.
///
/// Every failure mode is converted into a completion status here — nothing
/// propagates across job boundaries.
async fn run_job(request: SpawnRequest, events_tx: mpsc::Sender<BatchEvent>) {
    let name = request.name.clone();
    let status = run_job_inner(&request).await;

    let _ = events_tx
        .send(BatchEvent::JobCompleted { job: name, status })
        .await;
}

async fn run_job_inner(request: &SpawnRequest) -> JobStatus {
    info!(job = %request.name, cmd = %request.command, "starting job process");

    // The log file captures stdout and stderr interleaved; it is owned by
    // the child once handed to Stdio, so both handles close on every path.
    let log = match File::create(&request.log_path) {
        Ok(f) => f,
        Err(e) => {
            error!(job = %request.name, log = ?request.log_path, error = %e, "cannot create log file");
            return JobStatus::SpawnFailed;
        }
    };
    let log_err = match log.try_clone() {
        Ok(f) => f,
        Err(e) => {
            error!(job = %request.name, error = %e, "cannot duplicate log handle");
            return JobStatus::SpawnFailed;
        }
    };

    // bash, not sh: `conda activate` sources environment state that a POSIX
    // shell can't.
    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(&request.command)
        .current_dir(&request.work_dir)
        .envs(request.env.iter())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(job = %request.name, error = %e, "failed to spawn job process");
            return JobStatus::SpawnFailed;
        }
    };

    let exit = match child.wait().await {
        Ok(status) => status,
        Err(e) => {
            warn!(job = %request.name, error = %e, "error waiting for job process");
            return JobStatus::Failed(-1);
        }
    };

    let code = exit.code().unwrap_or(-1);
    info!(
        job = %request.name,
        exit_code = code,
        success = exit.success(),
        "job process exited"
    );

    if exit.success() {
        JobStatus::Success
    } else {
        JobStatus::Failed(code)
    }
}

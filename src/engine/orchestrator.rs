// src/engine/orchestrator.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::deps::{resolve, DataContext};
use crate::engine::{BatchContext, BatchEvent, BatchOptions};
use crate::env::EnvironmentManager;
use crate::errors::Result;
use crate::exec::{JobExecutor, SpawnRequest};
use crate::finalize::Finalizer;
use crate::fs::FileSystem;
use crate::job::command::{compose_chain, run_command, test_mode_command, validate_command};
use crate::job::state::{Job, JobPhase};
use crate::types::{EnvName, JobStatus};

/// Per-job entry in the batch report.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub name: String,
    pub status: JobStatus,
    pub log_path: PathBuf,
    /// Populated for jobs skipped over missing inputs.
    pub missing_files: Vec<PathBuf>,
}

/// What the batch produced, one entry per job in batch order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.jobs
            .iter()
            .all(|j| matches!(j.status, JobStatus::Success | JobStatus::SkippedMissingData))
    }
}

/// Drives the whole batch through the job lifecycle.
///
/// Owns the job collection and the environment manager exclusively; the
/// executor is generic so tests can substitute one that never spawns OS
/// processes.
pub struct Orchestrator<E: JobExecutor> {
    jobs: Vec<Job>,
    env_manager: Box<dyn EnvironmentManager>,
    finalizer: Box<dyn Finalizer>,
    fs: Arc<dyn FileSystem>,
    ctx: BatchContext,
    options: BatchOptions,
    executor: E,
    events_rx: mpsc::Receiver<BatchEvent>,
}

impl<E: JobExecutor> Orchestrator<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Vec<Job>,
        env_manager: Box<dyn EnvironmentManager>,
        finalizer: Box<dyn Finalizer>,
        fs: Arc<dyn FileSystem>,
        ctx: BatchContext,
        options: BatchOptions,
        executor: E,
        events_rx: mpsc::Receiver<BatchEvent>,
    ) -> Self {
        Self {
            jobs,
            env_manager,
            finalizer,
            fs,
            ctx,
            options,
            executor,
            events_rx,
        }
    }

    /// Run the full batch and return the per-job report.
    ///
    /// Every job reaches `Finalized` with a terminal status no matter where
    /// in the lifecycle it dropped out.
    pub async fn run(mut self) -> Result<BatchReport> {
        info!(jobs = self.jobs.len(), "starting batch");

        self.configure_jobs();
        let ensured = self.bind_environments().await;
        self.resolve_dependencies();
        let expected = self.launch_runnable_jobs().await?;
        self.collect_completions(expected).await;
        self.finalize_jobs();
        self.teardown_environments(&ensured).await;

        Ok(self.build_report())
    }

    /// Phase 1: working directories and driver discovery. Configuration
    /// errors are fatal for the job, not the batch.
    fn configure_jobs(&mut self) {
        for job in self.jobs.iter_mut() {
            if let Err(e) = configure_job(self.fs.as_ref(), job) {
                error!(job = %job.spec.name, error = %e, "job setup failed");
                job.status = Some(JobStatus::SetupFailed);
            }
        }
    }

    /// Phase 2: resolve every pending job's environment name, then ensure
    /// each distinct name exactly once. A failed ensure fails every job
    /// bound to that environment; other environments are unaffected.
    ///
    /// Environments are created up front so a shared environment is ready
    /// before any of its jobs launch; the per-job `EnvironmentBound` phase
    /// transition happens at launch, after dependency gating, so that a
    /// skipped job never enters it.
    async fn bind_environments(&mut self) -> BTreeSet<EnvName> {
        let mut distinct = BTreeSet::new();
        for job in self.jobs.iter_mut().filter(|j| j.is_pending()) {
            job.env = self.env_manager.resolve_environment(&job.spec);
            debug!(job = %job.spec.name, env = %job.env, "environment resolved");
            distinct.insert(job.env.clone());
        }

        let mut ensured = BTreeSet::new();
        for env in distinct {
            let result = self.env_manager.ensure_environment(&env).await;
            match result {
                Ok(()) => {
                    ensured.insert(env);
                }
                Err(e) => {
                    error!(env = %env, error = %e, "environment creation failed");
                    for job in self
                        .jobs
                        .iter_mut()
                        .filter(|j| j.is_pending() && j.env == env)
                    {
                        job.status = Some(JobStatus::EnvironmentFailed);
                    }
                }
            }
        }
        ensured
    }

    /// Phase 3: gate each pending job on its input data.
    fn resolve_dependencies(&mut self) {
        let ctx = DataContext {
            case_name: &self.ctx.case_name,
            data_dir: &self.ctx.data_dir,
        };
        for job in self.jobs.iter_mut().filter(|j| j.is_pending()) {
            let resolution = resolve(self.fs.as_ref(), &job.spec.varlist, &ctx);
            job.set_phase(JobPhase::DependenciesResolved);
            job.found_files = resolution.found;
            job.missing_files = resolution.missing;
            if !job.missing_files.is_empty() {
                warn!(
                    job = %job.spec.name,
                    missing = ?job.missing_files,
                    "skipping job: required input files missing"
                );
                job.status = Some(JobStatus::SkippedMissingData);
            }
        }
    }

    /// Phase 4: compose each runnable job's command chain and dispatch it.
    /// Returns how many jobs were dispatched.
    async fn launch_runnable_jobs(&mut self) -> Result<usize> {
        let mut requests = Vec::new();
        for job in self.jobs.iter_mut().filter(|j| j.is_pending()) {
            let activate = self.env_manager.activate_command(job);
            let validate = validate_command(&job.spec, &self.ctx.validate_script);
            let mut run = run_command(&job.spec);
            if self.options.test_mode {
                run = test_mode_command(&run);
            }
            let deactivate = self.env_manager.deactivate_command(job);

            let command = compose_chain(&[activate, validate, run, deactivate]);
            info!(job = %job.spec.name, env = %job.env, cmd = %command, "launching job");

            job.set_phase(JobPhase::EnvironmentBound);
            requests.push(SpawnRequest {
                name: job.spec.name.clone(),
                command,
                work_dir: job.dirs.work_dir.clone(),
                log_path: job.log_path.clone(),
                env: job.runtime_env(&self.ctx.case_name, &self.ctx.data_dir),
            });
            job.set_phase(JobPhase::Executing);
        }

        let expected = requests.len();
        if expected > 0 {
            self.executor.spawn_jobs(requests).await?;
        }
        Ok(expected)
    }

    /// Phase 5: the single join point — block until every dispatched job has
    /// reported a completion.
    async fn collect_completions(&mut self, expected: usize) {
        let mut remaining = expected;
        while remaining > 0 {
            match self.events_rx.recv().await {
                Some(BatchEvent::JobCompleted { job, status }) => {
                    remaining -= 1;
                    match self.jobs.iter_mut().find(|j| j.spec.name == job) {
                        Some(j) => {
                            debug!(job = %job, %status, "job completed");
                            j.status = Some(status);
                            j.set_phase(JobPhase::Completed);
                        }
                        None => warn!(job = %job, "completion for unknown job; ignoring"),
                    }
                }
                None => {
                    // Executor gone; mark whatever never reported.
                    error!("executor channel closed with {remaining} jobs outstanding");
                    for j in self
                        .jobs
                        .iter_mut()
                        .filter(|j| j.phase == JobPhase::Executing && j.is_pending())
                    {
                        j.status = Some(JobStatus::Failed(-1));
                        j.set_phase(JobPhase::Completed);
                    }
                    break;
                }
            }
        }
    }

    /// Phase 6: finalization runs for every job in the batch regardless of
    /// status, so downstream reporting is complete.
    fn finalize_jobs(&mut self) {
        for job in self.jobs.iter_mut() {
            let status = job.status.unwrap_or(JobStatus::Failed(-1));
            if let Err(e) = self.finalizer.finalize(job, status) {
                warn!(job = %job.spec.name, error = %e, "finalization error");
            }
            job.set_phase(JobPhase::Finalized);
        }
    }

    /// Phase 7: release every environment that was successfully ensured.
    async fn teardown_environments(&mut self, ensured: &BTreeSet<EnvName>) {
        for env in ensured {
            self.env_manager.teardown_environment(env).await;
        }
    }

    fn build_report(&self) -> BatchReport {
        BatchReport {
            jobs: self
                .jobs
                .iter()
                .map(|job| JobReport {
                    name: job.spec.name.clone(),
                    status: job.status.unwrap_or(JobStatus::Failed(-1)),
                    log_path: job.log_path.clone(),
                    missing_files: job.missing_files.clone(),
                })
                .collect(),
        }
    }
}

fn configure_job(fs: &dyn FileSystem, job: &mut Job) -> Result<()> {
    job.setup_directories(fs)?;
    let code_dir = job.dirs.code_dir.clone();
    job.spec.resolve_driver(fs, &code_dir)
}

// tests/orchestrator_batch.rs

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use diagrun::config::VarRequirement;
use diagrun::engine::{BatchContext, BatchEvent, BatchOptions, Orchestrator};
use diagrun::env::conda::PYTHON_ENV;
use diagrun::env::{CondaEnvironmentManager, EnvironmentManager, NoEnvironmentManager};
use diagrun::errors::{DiagrunError, Result};
use diagrun::finalize::Finalizer;
use diagrun::fs::mock::MockFileSystem;
use diagrun::job::state::Job;
use diagrun::job::JobSpec;
use diagrun::paths::PathContext;
use diagrun::types::{EnvName, JobStatus};
use diagrun_test_utils::builders::{var_req, JobConfigBuilder};
use diagrun_test_utils::fake_executor::FakeJobExecutor;
use diagrun_test_utils::{init_tracing, with_timeout};

fn path_context() -> PathContext {
    PathContext::from_config(&diagrun::config::PathsSection {
        code_root: "/code".to_string(),
        obs_data_root: "/obs".to_string(),
        model_data_root: "/model".to_string(),
        working_dir: "/work".to_string(),
        output_dir: "/out".to_string(),
    })
}

fn batch_context() -> BatchContext {
    let paths = path_context();
    BatchContext {
        case_name: "testcase".to_string(),
        data_dir: paths.model_data_dir("testcase"),
        validate_script: paths.validate_script(),
    }
}

/// Create a job whose code/obs dirs and driver script exist in the mock tree.
fn make_job(
    fs: &MockFileSystem,
    name: &str,
    required_programs: &[&str],
    vars: Vec<VarRequirement>,
) -> Job {
    let paths = path_context();
    let dirs = paths.job_dirs("testcase", name);
    fs.add_dir(&dirs.code_dir);
    fs.add_dir(&dirs.obs_data_dir);
    fs.add_file(dirs.code_dir.join(format!("{name}.py")), "#!driver");

    let mut builder = JobConfigBuilder::new();
    for p in required_programs {
        builder = builder.required_program(p);
    }
    for v in vars {
        builder = builder.var(v);
    }
    Job::new(JobSpec::from_config(name, &builder.build()), dirs)
}

/// Add the canonical data file for a daily variable of the test case.
fn add_daily_data(fs: &MockFileSystem, name: &str) {
    fs.add_file(
        format!("/model/testcase/day/testcase.{name}.day.nc"),
        "netcdf",
    );
}

/// Environment manager that counts `ensure_environment` calls per name and
/// can be told to fail specific environments.
struct CountingEnvManager {
    ensure_calls: Arc<Mutex<HashMap<EnvName, usize>>>,
    failing: Vec<EnvName>,
}

impl CountingEnvManager {
    fn new(ensure_calls: Arc<Mutex<HashMap<EnvName, usize>>>) -> Self {
        Self {
            ensure_calls,
            failing: Vec::new(),
        }
    }

    fn failing(mut self, env: &str) -> Self {
        self.failing.push(env.to_string());
        self
    }
}

impl EnvironmentManager for CountingEnvManager {
    fn resolve_environment(&self, spec: &JobSpec) -> EnvName {
        // First required program names the environment; ambient otherwise.
        spec.required_programs.first().cloned().unwrap_or_default()
    }

    fn ensure_environment<'a>(
        &'a self,
        env: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            *self
                .ensure_calls
                .lock()
                .unwrap()
                .entry(env.to_string())
                .or_insert(0) += 1;
            if self.failing.iter().any(|e| e == env) {
                return Err(DiagrunError::Environment {
                    env: env.to_string(),
                    reason: "configured to fail".to_string(),
                });
            }
            Ok(())
        })
    }

    fn activate_command(&self, job: &Job) -> String {
        format!("activate {}", job.env)
    }

    fn deactivate_command(&self, _job: &Job) -> String {
        String::new()
    }

    fn teardown_environment<'a>(
        &'a self,
        _env: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

/// Finalizer that records which jobs it saw and with what status.
struct RecordingFinalizer {
    seen: Arc<Mutex<Vec<(String, JobStatus)>>>,
}

impl Finalizer for RecordingFinalizer {
    fn finalize(&self, job: &Job, status: JobStatus) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((job.spec.name.clone(), status));
        Ok(())
    }
}

struct Harness {
    fs: MockFileSystem,
    spawned: Arc<Mutex<Vec<diagrun::exec::SpawnRequest>>>,
    finalized: Arc<Mutex<Vec<(String, JobStatus)>>>,
    events_tx: mpsc::Sender<BatchEvent>,
    events_rx: mpsc::Receiver<BatchEvent>,
}

impl Harness {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        Self {
            fs: MockFileSystem::new(),
            spawned: Arc::new(Mutex::new(Vec::new())),
            finalized: Arc::new(Mutex::new(Vec::new())),
            events_tx,
            events_rx,
        }
    }

    fn executor(&self) -> FakeJobExecutor {
        FakeJobExecutor::new(self.events_tx.clone(), Arc::clone(&self.spawned))
    }

    fn finalizer(&self) -> Box<dyn Finalizer> {
        Box::new(RecordingFinalizer {
            seen: Arc::clone(&self.finalized),
        })
    }

    fn orchestrator(
        self,
        jobs: Vec<Job>,
        env_manager: Box<dyn EnvironmentManager>,
        executor: FakeJobExecutor,
    ) -> Orchestrator<FakeJobExecutor> {
        self.orchestrator_with_options(jobs, env_manager, executor, BatchOptions::default())
    }

    fn orchestrator_with_options(
        self,
        jobs: Vec<Job>,
        env_manager: Box<dyn EnvironmentManager>,
        executor: FakeJobExecutor,
        options: BatchOptions,
    ) -> Orchestrator<FakeJobExecutor> {
        let finalizer = self.finalizer();
        Orchestrator::new(
            jobs,
            env_manager,
            finalizer,
            Arc::new(self.fs),
            batch_context(),
            options,
            executor,
            self.events_rx,
        )
    }
}

#[tokio::test]
async fn shared_environment_is_ensured_exactly_once() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![
        make_job(&harness.fs, "alpha", &["python"], vec![]),
        make_job(&harness.fs, "beta", &["python"], vec![]),
        make_job(&harness.fs, "gamma", &["python"], vec![]),
    ];

    let ensure_calls = Arc::new(Mutex::new(HashMap::new()));
    let manager = Box::new(CountingEnvManager::new(Arc::clone(&ensure_calls)));
    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);

    let report = with_timeout(harness.orchestrator(jobs, manager, executor).run())
        .await
        .expect("batch runs");

    assert_eq!(ensure_calls.lock().unwrap().get("python"), Some(&1));
    assert_eq!(spawned.lock().unwrap().len(), 3);
    assert!(report.jobs.iter().all(|j| j.status == JobStatus::Success));
}

#[tokio::test]
async fn environment_failure_only_affects_its_own_jobs() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![
        make_job(&harness.fs, "alpha", &["envA"], vec![]),
        make_job(&harness.fs, "beta", &["envA"], vec![]),
        make_job(&harness.fs, "gamma", &["envB"], vec![]),
    ];

    let ensure_calls = Arc::new(Mutex::new(HashMap::new()));
    let manager = Box::new(CountingEnvManager::new(Arc::clone(&ensure_calls)).failing("envB"));
    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);
    let finalized = Arc::clone(&harness.finalized);

    let report = with_timeout(harness.orchestrator(jobs, manager, executor).run())
        .await
        .expect("batch survives a failed environment");

    let status_of = |name: &str| {
        report
            .jobs
            .iter()
            .find(|j| j.name == name)
            .map(|j| j.status)
            .unwrap()
    };
    assert_eq!(status_of("alpha"), JobStatus::Success);
    assert_eq!(status_of("beta"), JobStatus::Success);
    assert_eq!(status_of("gamma"), JobStatus::EnvironmentFailed);

    // gamma never reached the executor but was still finalized.
    let spawned_names: Vec<String> =
        spawned.lock().unwrap().iter().map(|r| r.name.clone()).collect();
    assert_eq!(spawned_names, vec!["alpha", "beta"]);
    assert!(finalized
        .lock()
        .unwrap()
        .iter()
        .any(|(name, status)| name == "gamma" && *status == JobStatus::EnvironmentFailed));
}

#[tokio::test]
async fn conda_env_with_missing_spec_fails_its_jobs_end_to_end() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![
        make_job(&harness.fs, "alpha", &["python"], vec![]),
        make_job(&harness.fs, "beta", &["python"], vec![]),
        make_job(&harness.fs, "gamma", &["Rscript"], vec![]),
    ];

    // The python environment already exists in the pool; the R environment
    // does not, and its spec file is absent, so creation fails.
    harness.fs.add_dir("/conda/envs");
    harness.fs.add_dir(format!("/conda/envs/{PYTHON_ENV}"));
    let manager = Box::new(
        CondaEnvironmentManager::new(
            "/conda/envs",
            &path_context(),
            Arc::new(harness.fs.clone()),
        )
        .expect("pool root exists"),
    );

    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);

    let report = with_timeout(harness.orchestrator(jobs, manager, executor).run())
        .await
        .expect("batch survives a failed environment");

    let status_of = |name: &str| {
        report
            .jobs
            .iter()
            .find(|j| j.name == name)
            .map(|j| j.status)
            .unwrap()
    };
    assert_eq!(status_of("alpha"), JobStatus::Success);
    assert_eq!(status_of("beta"), JobStatus::Success);
    assert_eq!(status_of("gamma"), JobStatus::EnvironmentFailed);

    // The two python jobs activate the shared existing environment.
    for request in spawned.lock().unwrap().iter() {
        assert!(request
            .command
            .starts_with(&format!(
                "source /code/src/conda_init.sh && conda activate /conda/envs/{PYTHON_ENV}"
            )));
    }
    assert_eq!(spawned.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_required_data_skips_the_job_but_still_finalizes_it() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![
        make_job(
            &harness.fs,
            "alpha",
            &[],
            vec![var_req("pr", diagrun::types::Frequency::Daily, true, &[])],
        ),
        make_job(&harness.fs, "beta", &[], vec![]),
    ];
    // No data file for `pr` anywhere.

    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);
    let finalized = Arc::clone(&harness.finalized);

    let report = with_timeout(
        harness
            .orchestrator(jobs, Box::new(NoEnvironmentManager), executor)
            .run(),
    )
    .await
    .expect("batch continues past a skipped job");

    let alpha = report.jobs.iter().find(|j| j.name == "alpha").unwrap();
    assert_eq!(alpha.status, JobStatus::SkippedMissingData);
    assert_eq!(
        alpha.missing_files,
        vec![std::path::PathBuf::from(
            "/model/testcase/day/testcase.pr.day.nc"
        )]
    );

    let spawned_names: Vec<String> =
        spawned.lock().unwrap().iter().map(|r| r.name.clone()).collect();
    assert_eq!(spawned_names, vec!["beta"]);

    let finalized = finalized.lock().unwrap();
    assert!(finalized
        .iter()
        .any(|(n, s)| n == "alpha" && *s == JobStatus::SkippedMissingData));
    assert!(finalized
        .iter()
        .any(|(n, s)| n == "beta" && *s == JobStatus::Success));
}

#[tokio::test]
async fn job_satisfied_via_alternate_runs_with_its_declared_driver() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![make_job(
        &harness.fs,
        "precip",
        &[],
        vec![var_req(
            "pr",
            diagrun::types::Frequency::Daily,
            true,
            &["prc"],
        )],
    )];
    // Primary absent, alternate present.
    add_daily_data(&harness.fs, "prc");

    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);

    let report = with_timeout(
        harness
            .orchestrator(jobs, Box::new(NoEnvironmentManager), executor)
            .run(),
    )
    .await
    .expect("batch runs");

    assert_eq!(report.jobs[0].status, JobStatus::Success);

    let spawned = spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    // The run command references the originally-declared driver, not the
    // alternate variable.
    assert!(spawned[0]
        .command
        .contains("/code/diagnostics/precip/precip.py"));
    assert!(!spawned[0].command.contains("prc"));
}

#[tokio::test]
async fn test_mode_replaces_the_run_fragment_without_touching_the_rest() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![make_job(&harness.fs, "alpha", &["python"], vec![])];

    let ensure_calls = Arc::new(Mutex::new(HashMap::new()));
    let manager = Box::new(CountingEnvManager::new(Arc::clone(&ensure_calls)));
    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);

    let report = with_timeout(
        harness
            .orchestrator_with_options(jobs, manager, executor, BatchOptions { test_mode: true })
            .run(),
    )
    .await
    .expect("batch runs");

    assert_eq!(report.jobs[0].status, JobStatus::Success);

    let spawned = spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    let command = &spawned[0].command;
    // Activation and validation fragments are unchanged; only the run
    // fragment became a reporting no-op.
    assert!(command.starts_with("activate python && "));
    assert!(command.contains("validate_environment.sh -v -p python"));
    assert!(command.contains("echo \"TEST MODE: would call python"));
    assert!(command.contains("alpha.py\""));
}

#[tokio::test]
async fn spawn_failure_is_contained_to_its_job() {
    init_tracing();
    let harness = Harness::new();
    let jobs = vec![
        make_job(&harness.fs, "alpha", &[], vec![]),
        make_job(&harness.fs, "beta", &[], vec![]),
    ];

    let executor = harness.executor().with_outcome("alpha", JobStatus::SpawnFailed);
    let finalized = Arc::clone(&harness.finalized);

    let report = with_timeout(
        harness
            .orchestrator(jobs, Box::new(NoEnvironmentManager), executor)
            .run(),
    )
    .await
    .expect("batch survives a spawn failure");

    let status_of = |name: &str| {
        report
            .jobs
            .iter()
            .find(|j| j.name == name)
            .map(|j| j.status)
            .unwrap()
    };
    assert_eq!(status_of("alpha"), JobStatus::SpawnFailed);
    assert_eq!(status_of("beta"), JobStatus::Success);
    assert_eq!(finalized.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn broken_job_setup_fails_that_job_before_dependency_resolution() {
    init_tracing();
    let harness = Harness::new();

    // "broken" has no code dir at all; "alpha" is complete.
    let paths = path_context();
    let broken = Job::new(
        JobSpec::from_config("broken", &JobConfigBuilder::new().build()),
        paths.job_dirs("testcase", "broken"),
    );
    let jobs = vec![make_job(&harness.fs, "alpha", &[], vec![]), broken];

    let executor = harness.executor();
    let spawned = Arc::clone(&harness.spawned);
    let finalized = Arc::clone(&harness.finalized);

    let report = with_timeout(
        harness
            .orchestrator(jobs, Box::new(NoEnvironmentManager), executor)
            .run(),
    )
    .await
    .expect("batch survives a misconfigured job");

    let broken_report = report.jobs.iter().find(|j| j.name == "broken").unwrap();
    assert_eq!(broken_report.status, JobStatus::SetupFailed);
    assert!(broken_report.missing_files.is_empty());

    let spawned_names: Vec<String> =
        spawned.lock().unwrap().iter().map(|r| r.name.clone()).collect();
    assert_eq!(spawned_names, vec!["alpha"]);
    assert_eq!(finalized.lock().unwrap().len(), 2);
}

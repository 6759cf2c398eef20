// tests/environment_binding.rs

use std::sync::Arc;

use diagrun::config::PathsSection;
use diagrun::env::conda::{NCL_ENV, PYTHON_ENV, R_ENV};
use diagrun::env::{CondaEnvironmentManager, EnvironmentManager, NoEnvironmentManager};
use diagrun::errors::DiagrunError;
use diagrun::fs::mock::MockFileSystem;
use diagrun::job::{Job, JobSpec};
use diagrun::paths::PathContext;
use diagrun_test_utils::builders::JobConfigBuilder;
use diagrun_test_utils::init_tracing;

fn path_context() -> PathContext {
    PathContext::from_config(&PathsSection {
        code_root: "/code".to_string(),
        obs_data_root: "/obs".to_string(),
        model_data_root: "/model".to_string(),
        working_dir: "/work".to_string(),
        output_dir: "/out".to_string(),
    })
}

fn spec_with_programs(programs: &[&str]) -> JobSpec {
    let mut builder = JobConfigBuilder::new().driver("driver.py");
    for p in programs {
        builder = builder.required_program(p);
    }
    JobSpec::from_config("job", &builder.build())
}

fn conda_manager(fs: &MockFileSystem) -> CondaEnvironmentManager {
    fs.add_dir("/conda/envs");
    CondaEnvironmentManager::new("/conda/envs", &path_context(), Arc::new(fs.clone()))
        .expect("pool root exists")
}

#[test]
fn conda_resolution_prefers_r_then_ncl_then_python() {
    let fs = MockFileSystem::new();
    let manager = conda_manager(&fs);

    assert_eq!(manager.resolve_environment(&spec_with_programs(&["Rscript"])), R_ENV);
    assert_eq!(manager.resolve_environment(&spec_with_programs(&["R"])), R_ENV);
    // R wins over NCL regardless of declaration order.
    assert_eq!(
        manager.resolve_environment(&spec_with_programs(&["ncl", "r"])),
        R_ENV
    );
    assert_eq!(manager.resolve_environment(&spec_with_programs(&["NCL"])), NCL_ENV);
    assert_eq!(
        manager.resolve_environment(&spec_with_programs(&["python"])),
        PYTHON_ENV
    );
    assert_eq!(manager.resolve_environment(&spec_with_programs(&[])), PYTHON_ENV);
}

#[test]
fn conda_manager_requires_existing_pool_root() {
    let fs = MockFileSystem::new();
    let result =
        CondaEnvironmentManager::new("/conda/envs", &path_context(), Arc::new(fs.clone()));
    assert!(matches!(result, Err(DiagrunError::Config(_))));
}

#[tokio::test]
async fn existing_environment_is_not_recreated() {
    init_tracing();
    let fs = MockFileSystem::new();
    let manager = conda_manager(&fs);
    fs.add_dir(format!("/conda/envs/{PYTHON_ENV}"));

    manager
        .ensure_environment(PYTHON_ENV)
        .await
        .expect("existing environment is usable as-is");
}

#[tokio::test]
async fn missing_spec_file_is_an_environment_error() {
    init_tracing();
    let fs = MockFileSystem::new();
    let manager = conda_manager(&fs);
    // No /conda/envs/diagrun-R directory and no /code/src/conda_env_R.yml.

    let result = manager.ensure_environment(R_ENV).await;

    match result {
        Err(DiagrunError::Environment { env, reason }) => {
            assert_eq!(env, R_ENV);
            assert!(reason.contains("conda_env_R.yml"), "reason was: {reason}");
        }
        other => panic!("expected Environment error, got {other:?}"),
    }
}

#[test]
fn conda_activation_sources_init_script_and_activates_prefix() {
    let fs = MockFileSystem::new();
    let manager = conda_manager(&fs);

    let spec = spec_with_programs(&["python"]);
    let ctx = path_context();
    let mut job = Job::new(spec, ctx.job_dirs("testcase", "job"));
    job.env = manager.resolve_environment(&job.spec);

    assert_eq!(
        manager.activate_command(&job),
        format!("source /code/src/conda_init.sh && conda activate /conda/envs/{PYTHON_ENV}")
    );
    assert_eq!(manager.deactivate_command(&job), "");
}

#[tokio::test]
async fn ambient_manager_is_all_noops() {
    let manager = NoEnvironmentManager;
    let spec = spec_with_programs(&["python"]);
    let ctx = path_context();
    let job = Job::new(spec, ctx.job_dirs("testcase", "job"));

    assert_eq!(manager.resolve_environment(&job.spec), "");
    manager.ensure_environment("").await.expect("no-op success");
    assert_eq!(manager.activate_command(&job), "");
    assert_eq!(manager.deactivate_command(&job), "");
    manager.teardown_environment("").await;
}

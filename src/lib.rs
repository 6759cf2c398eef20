// src/lib.rs

pub mod cli;
pub mod config;
pub mod deps;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod finalize;
pub mod fs;
pub mod job;
pub mod logging;
pub mod paths;
pub mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{BatchContext, BatchEvent, BatchOptions, BatchReport, Orchestrator};
use crate::env::manager_from_settings;
use crate::errors::{DiagrunError, Result};
use crate::exec::RealJobExecutor;
use crate::finalize::ArtifactFinalizer;
use crate::fs::{FileSystem, RealFileSystem};
use crate::job::{Job, JobSpec};
use crate::paths::{check_required_dirs, PathContext};
use crate::types::JobStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - root directory checks
/// - environment manager / finalizer selection
/// - the orchestrator and the real process executor
pub async fn run(args: CliArgs) -> Result<BatchReport> {
    let cfg = load_and_validate(&args.config)?;
    let paths = PathContext::from_config(&cfg.paths);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    // Shared setup failures are the only batch-fatal errors.
    check_required_dirs(
        fs.as_ref(),
        &[&paths.code_root, &paths.obs_data_root, &paths.model_data_root],
        &[&paths.working_dir, &paths.output_dir],
    )?;

    let jobs = build_jobs(&cfg, &paths, args.job.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg, &jobs);
        return Ok(BatchReport::default());
    }

    let env_manager = manager_from_settings(&cfg.settings, &paths, Arc::clone(&fs))?;
    let finalizer = Box::new(ArtifactFinalizer::from_settings(&cfg.settings));

    let ctx = BatchContext {
        case_name: cfg.settings.case_name.clone(),
        data_dir: paths.model_data_dir(&cfg.settings.case_name),
        validate_script: paths.validate_script(),
    };
    let options = BatchOptions {
        test_mode: cfg.settings.test_mode || args.test_mode,
    };

    let (events_tx, events_rx) = mpsc::channel::<BatchEvent>(64);
    let executor = RealJobExecutor::new(events_tx);

    let orchestrator = Orchestrator::new(
        jobs,
        env_manager,
        finalizer,
        fs,
        ctx,
        options,
        executor,
        events_rx,
    );

    let report = orchestrator.run().await?;
    print_report(&report);
    Ok(report)
}

/// Construct the job collection from config, optionally filtered to a single
/// job via `--job`.
fn build_jobs(cfg: &ConfigFile, paths: &PathContext, only: Option<&str>) -> Result<Vec<Job>> {
    if let Some(name) = only {
        if !cfg.job.contains_key(name) {
            return Err(DiagrunError::Config(format!(
                "--job '{name}' does not match any [job.<name>] section"
            )));
        }
    }

    let case_name = &cfg.settings.case_name;
    let jobs = cfg
        .job
        .iter()
        .filter(|(name, _)| only.is_none_or(|n| n == name.as_str()))
        .map(|(name, job_cfg)| {
            let spec = JobSpec::from_config(name, job_cfg);
            let dirs = paths.job_dirs(case_name, name);
            Job::new(spec, dirs)
        })
        .collect();
    Ok(jobs)
}

/// Simple dry-run output: print jobs, drivers, environments-by-requirements
/// and variable requirements.
fn print_dry_run(cfg: &ConfigFile, jobs: &[Job]) {
    println!("diagrun dry-run");
    println!("  settings.case_name = {}", cfg.settings.case_name);
    println!("  settings.environment = {:?}", cfg.settings.environment);
    println!("  settings.test_mode = {}", cfg.settings.test_mode);
    println!();

    println!("jobs ({}):", jobs.len());
    for job in jobs {
        println!("  - {}", job.spec.name);
        if !job.spec.driver.is_empty() {
            println!("      driver: {}", job.spec.driver);
        }
        if !job.spec.program.is_empty() {
            println!("      program: {}", job.spec.program);
        }
        if !job.spec.required_programs.is_empty() {
            println!("      required_programs: {:?}", job.spec.required_programs);
        }
        println!("      work_dir: {}", job.dirs.work_dir.display());
        for var in job.spec.varlist.iter() {
            let required = if var.required { "required" } else { "optional" };
            if var.alternates.is_empty() {
                println!("      var: {} [{}] ({required})", var.name, var.freq);
            } else {
                println!(
                    "      var: {} [{}] ({required}, alternates: {:?})",
                    var.name, var.freq, var.alternates
                );
            }
        }
    }
}

/// Report every job's outcome after the batch completes.
fn print_report(report: &BatchReport) {
    println!();
    println!("batch finished — {} job(s):", report.jobs.len());
    for job in report.jobs.iter() {
        println!("  {:<28} {}", job.name, job.status);
        if job.status == JobStatus::SkippedMissingData {
            for file in job.missing_files.iter() {
                println!("      missing: {}", file.display());
            }
        } else {
            println!("      log: {}", job.log_path.display());
        }
    }
    info!("batch report printed");
}

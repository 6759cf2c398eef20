// src/paths.rs

//! Filesystem layout shared by every component.
//!
//! `PathContext` is constructed once from `[paths]` and passed by reference
//! wherever path computation is needed — there is no global path state.

use std::path::{Path, PathBuf};

use crate::config::model::PathsSection;
use crate::errors::{DiagrunError, Result};
use crate::fs::FileSystem;

/// Root directories for a run, as configured in `[paths]`.
#[derive(Debug, Clone)]
pub struct PathContext {
    pub code_root: PathBuf,
    pub obs_data_root: PathBuf,
    pub model_data_root: PathBuf,
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// The three directories belonging to one job.
#[derive(Debug, Clone)]
pub struct JobDirs {
    /// The job's source checkout: driver script, report template, docs.
    /// Must exist before the run.
    pub code_dir: PathBuf,
    /// The job's observational/reference data. Must exist before the run.
    pub obs_data_dir: PathBuf,
    /// Scratch + output space, created on demand. Exclusively owned by the
    /// job for the duration of the run.
    pub work_dir: PathBuf,
}

impl PathContext {
    pub fn from_config(paths: &PathsSection) -> Self {
        Self {
            code_root: PathBuf::from(&paths.code_root),
            obs_data_root: PathBuf::from(&paths.obs_data_root),
            model_data_root: PathBuf::from(&paths.model_data_root),
            working_dir: PathBuf::from(&paths.working_dir),
            output_dir: PathBuf::from(&paths.output_dir),
        }
    }

    /// Where the case's model data lives: `<model_data_root>/<case>`.
    pub fn model_data_dir(&self, case_name: &str) -> PathBuf {
        self.model_data_root.join(case_name)
    }

    /// Per-case work dir under which each job gets its own subdirectory.
    pub fn case_work_dir(&self, case_name: &str) -> PathBuf {
        self.working_dir.join(case_name)
    }

    /// Compute the directory layout for one job.
    pub fn job_dirs(&self, case_name: &str, job_name: &str) -> JobDirs {
        JobDirs {
            code_dir: self.code_root.join("diagnostics").join(job_name),
            obs_data_dir: self.obs_data_root.join(job_name),
            work_dir: self.case_work_dir(case_name).join(job_name),
        }
    }

    /// The environment-validation script shipped under `src/`.
    pub fn validate_script(&self) -> PathBuf {
        self.code_root.join("src").join("validate_environment.sh")
    }

    /// The conda bootstrap script sourced before any `conda` invocation.
    pub fn conda_init_script(&self) -> PathBuf {
        self.code_root.join("src").join("conda_init.sh")
    }

    /// Specification file a named conda environment is created from.
    pub fn conda_env_spec(&self, short_name: &str) -> PathBuf {
        self.code_root
            .join("src")
            .join(format!("conda_env_{short_name}.yml"))
    }
}

/// Verify that `already_exist` directories are present and create the
/// `create_if_nec` ones.
///
/// A missing `already_exist` directory is an error — the caller decides
/// whether that is batch-fatal (root dirs) or job-fatal (job dirs).
pub fn check_required_dirs(
    fs: &dyn FileSystem,
    already_exist: &[&Path],
    create_if_nec: &[&Path],
) -> Result<()> {
    for dir in already_exist {
        if !fs.is_dir(dir) {
            return Err(DiagrunError::Config(format!(
                "required directory {dir:?} does not exist"
            )));
        }
    }
    for dir in create_if_nec {
        if !fs.is_dir(dir) {
            tracing::debug!(dir = ?dir, "creating directory");
            fs.create_dir_all(dir)?;
        }
    }
    Ok(())
}

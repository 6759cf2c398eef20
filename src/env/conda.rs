// src/env/conda.rs

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::env::EnvironmentManager;
use crate::errors::{DiagrunError, Result};
use crate::fs::FileSystem;
use crate::job::spec::JobSpec;
use crate::job::state::Job;
use crate::paths::PathContext;
use crate::types::EnvName;

/// Prefix shared by every environment in the pool. The short name (the part
/// after the prefix) selects the `conda_env_<short>.yml` spec file.
const ENV_PREFIX: &str = "diagrun";

pub const PYTHON_ENV: &str = "diagrun-python";
pub const R_ENV: &str = "diagrun-R";
pub const NCL_ENV: &str = "diagrun-NCL";

/// Use conda to switch execution environments.
///
/// Environments live under a configured pool root and are created lazily
/// from spec files shipped under `<code_root>/src/`.
pub struct CondaEnvironmentManager {
    env_root: PathBuf,
    paths: PathContext,
    fs: Arc<dyn FileSystem>,
}

impl CondaEnvironmentManager {
    /// The pool root must already exist — an unreadable pool is batch-fatal,
    /// not a per-job condition.
    pub fn new(env_root: &str, ctx: &PathContext, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let env_root = PathBuf::from(env_root);
        if !fs.is_dir(&env_root) {
            return Err(DiagrunError::Config(format!(
                "conda_env_root {env_root:?} is not a directory"
            )));
        }
        Ok(Self {
            env_root,
            paths: ctx.clone(),
            fs,
        })
    }

    /// Filesystem prefix of a named environment.
    fn env_prefix(&self, env: &str) -> PathBuf {
        self.env_root.join(env)
    }

    fn short_name(env: &str) -> &str {
        env.strip_prefix(ENV_PREFIX)
            .map(|s| s.trim_start_matches('-'))
            .filter(|s| !s.is_empty())
            .unwrap_or(env)
    }

    async fn create_environment(&self, env: &str) -> Result<()> {
        let spec = self.paths.conda_env_spec(Self::short_name(env));
        if !self.fs.is_file(&spec) {
            return Err(DiagrunError::Environment {
                env: env.to_string(),
                reason: format!("environment spec file {spec:?} not found"),
            });
        }

        let prefix = self.env_prefix(env);
        info!(env = %env, prefix = ?prefix, "creating conda environment");

        let command = format!(
            "source {} && conda env create --force -q -p \"{}\" -f \"{}\"",
            self.paths.conda_init_script().to_string_lossy(),
            prefix.to_string_lossy(),
            spec.to_string_lossy(),
        );

        // `conda env create`/`conda activate` rely on shell functions set up
        // by conda_init.sh, which needs bash.
        let status = Command::new("bash")
            .arg("-c")
            .arg(&command)
            .status()
            .await
            .map_err(|e| DiagrunError::Environment {
                env: env.to_string(),
                reason: format!("failed to run environment creation: {e}"),
            })?;

        if !status.success() {
            return Err(DiagrunError::Environment {
                env: env.to_string(),
                reason: format!(
                    "environment creation exited with {}",
                    status.code().unwrap_or(-1)
                ),
            });
        }
        Ok(())
    }
}

impl EnvironmentManager for CondaEnvironmentManager {
    /// First matching capability wins: R tools select the R environment, NCL
    /// tools the NCL environment, anything else the python environment.
    fn resolve_environment(&self, spec: &JobSpec) -> EnvName {
        let keys: Vec<String> = spec
            .required_programs
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        if keys.iter().any(|k| k == "r" || k == "rscript") {
            R_ENV.to_string()
        } else if keys.iter().any(|k| k == "ncl") {
            NCL_ENV.to_string()
        } else {
            PYTHON_ENV.to_string()
        }
    }

    fn ensure_environment<'a>(
        &'a self,
        env: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let prefix = self.env_prefix(env);
            if self.fs.is_dir(&prefix) {
                debug!(env = %env, prefix = ?prefix, "conda environment already exists");
                return Ok(());
            }
            warn!(env = %env, "conda environment not found; creating it");
            self.create_environment(env).await
        })
    }

    /// Source conda_init.sh first: the subprocess shell is non-interactive,
    /// so the conda shell hooks aren't set up yet.
    fn activate_command(&self, job: &Job) -> String {
        format!(
            "source {} && conda activate {}",
            self.paths.conda_init_script().to_string_lossy(),
            self.env_prefix(&job.env).to_string_lossy(),
        )
    }

    fn deactivate_command(&self, _job: &Job) -> String {
        String::new()
    }

    /// The environment pool persists across runs; nothing to reclaim.
    fn teardown_environment<'a>(
        &'a self,
        _env: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

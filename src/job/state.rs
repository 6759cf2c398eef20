// src/job/state.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::job::spec::JobSpec;
use crate::paths::{check_required_dirs, JobDirs};
use crate::types::{EnvName, JobStatus};

/// Subdirectories created under every job's work dir.
const WORK_SUBDIRS: &[&str] = &["model", "model/PS", "model/netCDF", "obs", "obs/PS", "obs/netCDF"];

/// Lifecycle phase of a job.
///
/// The happy path is `Configured → DependenciesResolved → EnvironmentBound →
/// Executing → Completed → Finalized`. A job that fails or is skipped in an
/// early phase records its status there and jumps straight to `Finalized` —
/// every job in the batch reaches `Finalized` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Configured,
    DependenciesResolved,
    EnvironmentBound,
    Executing,
    Completed,
    Finalized,
}

/// One job's full runtime state. Owned exclusively by the orchestrator and
/// mutated only through the lifecycle phases; discarded after finalization.
#[derive(Debug, Clone)]
pub struct Job {
    pub spec: JobSpec,
    pub dirs: JobDirs,
    pub log_path: PathBuf,

    /// Resolved environment name; empty until `EnvironmentBound` (and for
    /// the ambient-environment manager).
    pub env: EnvName,

    pub found_files: Vec<PathBuf>,
    pub missing_files: Vec<PathBuf>,

    pub phase: JobPhase,
    /// Terminal status, set at the phase where the job's fate is decided.
    pub status: Option<JobStatus>,
}

impl Job {
    pub fn new(spec: JobSpec, dirs: JobDirs) -> Self {
        let log_path = dirs.work_dir.join(format!("{}.log", spec.name));
        Self {
            spec,
            dirs,
            log_path,
            env: EnvName::new(),
            found_files: Vec::new(),
            missing_files: Vec::new(),
            phase: JobPhase::Configured,
            status: None,
        }
    }

    /// A job is still in the running for execution while no terminal status
    /// has been recorded.
    pub fn is_pending(&self) -> bool {
        self.status.is_none()
    }

    pub fn set_phase(&mut self, phase: JobPhase) {
        debug!(job = %self.spec.name, ?phase, "job phase transition");
        self.phase = phase;
    }

    /// Verify the pre-existing dirs and build the work-dir skeleton.
    pub fn setup_directories(&self, fs: &dyn FileSystem) -> Result<()> {
        check_required_dirs(
            fs,
            &[&self.dirs.code_dir, &self.dirs.obs_data_dir],
            &[&self.dirs.work_dir],
        )?;
        for sub in WORK_SUBDIRS {
            let dir = self.dirs.work_dir.join(sub);
            if !fs.is_dir(&dir) {
                fs.create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Environment variables for the job's subprocess: the built-in bindings
    /// every driver relies on, then the job-specific ones from config (which
    /// win on key collision).
    pub fn runtime_env(&self, case_name: &str, data_dir: &Path) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("CASENAME".to_string(), case_name.to_string());
        env.insert("DATADIR".to_string(), path_str(data_dir));
        env.insert("DIAG_HOME".to_string(), path_str(&self.dirs.code_dir));
        env.insert("OBS_DATA".to_string(), path_str(&self.dirs.obs_data_dir));
        env.insert("WK_DIR".to_string(), path_str(&self.dirs.work_dir));
        for (key, val) in self.spec.env_vars.iter() {
            env.insert(key.clone(), val.clone());
        }
        env
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

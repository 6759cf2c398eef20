// src/job/spec.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::{JobConfig, VarRequirement};
use crate::errors::{DiagrunError, Result};
use crate::fs::FileSystem;
use crate::types::JobName;

/// Interpreters the driver extension is matched against, in probe order.
const KNOWN_PROGRAMS: &[(&str, &str)] = &[("py", "python"), ("ncl", "ncl"), ("R", "Rscript")];

/// Declared metadata of one job, with empty defaults already applied by the
/// config layer. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: JobName,
    pub long_name: String,
    pub description: String,
    /// Absolute after `resolve_driver`; may be empty or relative before.
    pub driver: String,
    pub program: String,
    pub required_programs: Vec<String>,
    pub required_python_modules: Vec<String>,
    pub required_ncl_scripts: Vec<String>,
    pub required_r_packages: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub varlist: Vec<VarRequirement>,
}

impl JobSpec {
    pub fn from_config(name: &str, cfg: &JobConfig) -> Self {
        Self {
            name: name.to_string(),
            long_name: cfg.long_name.clone(),
            description: cfg.description.clone(),
            driver: cfg.driver.clone(),
            program: cfg.program.clone(),
            required_programs: cfg.required_programs.clone(),
            required_python_modules: cfg.required_python_modules.clone(),
            required_ncl_scripts: cfg.required_ncl_scripts.clone(),
            required_r_packages: cfg.required_r_packages.clone(),
            env_vars: cfg.env_vars.clone(),
            varlist: cfg.var.clone(),
        }
    }

    /// Resolve the driver script and interpreter against the job's code dir.
    ///
    /// - An empty `driver` is searched for as `<name>.<ext>` then
    ///   `driver.<ext>` for each known extension; first hit wins.
    /// - A relative `driver` is anchored at the code dir.
    /// - An empty `program` is inferred from the driver extension.
    ///
    /// Any failure here is a configuration error: the job never reaches
    /// dependency resolution.
    pub fn resolve_driver(&mut self, fs: &dyn FileSystem, code_dir: &Path) -> Result<()> {
        if self.driver.is_empty() {
            warn!(job = %self.name, "no driver entry; probing code dir");
            self.driver = probe_driver(fs, code_dir, &self.name)?;
        }

        let mut driver_path = PathBuf::from(&self.driver);
        if driver_path.is_relative() {
            driver_path = code_dir.join(driver_path);
        }
        if !fs.is_file(&driver_path) {
            return Err(DiagrunError::Config(format!(
                "driver script {driver_path:?} for job '{}' not found",
                self.name
            )));
        }
        self.driver = driver_path.to_string_lossy().into_owned();

        if self.program.is_empty() {
            let ext = driver_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            self.program = program_for_extension(ext).ok_or_else(|| {
                DiagrunError::Config(format!(
                    "don't know how to run a '.{ext}' driver for job '{}'",
                    self.name
                ))
            })?;
            debug!(job = %self.name, program = %self.program, "inferred program from driver extension");
        }

        Ok(())
    }
}

fn probe_driver(fs: &dyn FileSystem, code_dir: &Path, job_name: &str) -> Result<String> {
    for stem in [job_name, "driver"] {
        for (ext, _) in KNOWN_PROGRAMS {
            let candidate = code_dir.join(format!("{stem}.{ext}"));
            if fs.is_file(&candidate) {
                debug!(job = %job_name, driver = ?candidate, "found driver script");
                return Ok(candidate.to_string_lossy().into_owned());
            }
        }
    }
    Err(DiagrunError::Config(format!(
        "no driver script found for job '{job_name}': looked in {code_dir:?} \
         for {job_name}.* or driver.*; set 'driver' in the job config to \
         specify one explicitly"
    )))
}

fn program_for_extension(ext: &str) -> Option<String> {
    KNOWN_PROGRAMS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, prog)| prog.to_string())
}

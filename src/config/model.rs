// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::Frequency;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [paths]
/// code_root = "/opt/diagrun"
/// obs_data_root = "/data/obs"
/// model_data_root = "/data/model"
/// working_dir = "/scratch/diagrun"
/// output_dir = "/results/diagrun"
///
/// [settings]
/// case_name = "CESM2_control"
/// environment = "conda"
/// conda_env_root = "/opt/conda/envs"
///
/// [job.precip_extremes]
/// driver = "precip_extremes.py"
/// required_programs = ["python"]
///
/// [[job.precip_extremes.var]]
/// name = "pr"
/// freq = "day"
/// required = true
/// alternates = ["prc"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Root directories from `[paths]`.
    pub paths: PathsSection,

    /// Batch-level settings from `[settings]`.
    pub settings: SettingsSection,

    /// All jobs from `[job.<name>]`. Keys are the job names.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// `[paths]` section: the five root directories everything else is computed
/// from. All are required; relative paths are taken relative to the process
/// working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Installation root: holds `diagnostics/<job>/` code dirs and `src/`
    /// helper scripts.
    pub code_root: String,

    /// Root of per-job observational data directories.
    pub obs_data_root: String,

    /// Root of per-case model data directories.
    pub model_data_root: String,

    /// Scratch space; per-case, per-job work dirs are created under it.
    pub working_dir: String,

    /// Where finished output is collected.
    pub output_dir: String,
}

/// Which environment manager to use for the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Run every job in the ambient process environment.
    #[default]
    None,
    /// Bind each job to a named conda environment, creating it on demand.
    Conda,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Name of the model case being analyzed; selects the model data
    /// directory and is substituted into report pages.
    pub case_name: String,

    #[serde(default)]
    pub environment: EnvironmentKind,

    /// Root of the conda environment pool. Required when
    /// `environment = "conda"`; must already exist.
    #[serde(default)]
    pub conda_env_root: Option<String>,

    /// Replace each job's run command with a reporting no-op.
    #[serde(default)]
    pub test_mode: bool,

    /// Flags passed to ImageMagick `convert` during figure conversion.
    #[serde(default = "default_convert_flags")]
    pub convert_flags: String,

    /// Output format for converted figures.
    #[serde(default = "default_convert_fmt")]
    pub convert_output_fmt: String,

    /// Keep the PS/EPS source figures after conversion.
    #[serde(default)]
    pub save_ps: bool,

    /// Keep intermediate netCDF output.
    #[serde(default)]
    pub save_nc: bool,
}

fn default_convert_flags() -> String {
    "-crop 0x0+5+5".to_string()
}

fn default_convert_fmt() -> String {
    "png".to_string()
}

/// `[job.<name>]` section.
///
/// Every field except the variable list defaults to empty, so downstream code
/// never has to test for presence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobConfig {
    /// Display name; may contain spaces.
    #[serde(default)]
    pub long_name: String,

    /// Short description inserted into the top-level report index.
    #[serde(default)]
    pub description: String,

    /// Driver script, absolute or relative to the job's code dir. If empty,
    /// the code dir is probed for `<name>.<ext>` / `driver.<ext>`.
    #[serde(default)]
    pub driver: String,

    /// Interpreter to invoke the driver with. If empty, inferred from the
    /// driver's extension.
    #[serde(default)]
    pub program: String,

    /// Executables that must be on the environment's PATH.
    #[serde(default)]
    pub required_programs: Vec<String>,

    /// Python modules the driver imports.
    #[serde(default)]
    pub required_python_modules: Vec<String>,

    /// NCL scripts the driver loads.
    #[serde(default)]
    pub required_ncl_scripts: Vec<String>,

    /// R packages the driver loads.
    #[serde(default)]
    pub required_r_packages: Vec<String>,

    /// Job-specific environment variable bindings, applied to the subprocess
    /// on top of the built-in ones (these win on key collision).
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,

    /// Input data requirements, from `[[job.<name>.var]]`.
    #[serde(default)]
    pub var: Vec<VarRequirement>,
}

/// One input-data requirement of a job.
#[derive(Debug, Clone, Deserialize)]
pub struct VarRequirement {
    /// Logical variable name as it appears in the data file name.
    pub name: String,

    /// Sampling frequency; also a path component of the data file.
    pub freq: Frequency,

    /// If false, an absent file is silently skipped.
    #[serde(default)]
    pub required: bool,

    /// Substitute variable names tried, in order, when the primary file is
    /// absent.
    #[serde(default)]
    pub alternates: Vec<String>,
}

#![allow(dead_code)]

use std::collections::BTreeMap;

use diagrun::config::{
    ConfigFile, EnvironmentKind, JobConfig, PathsSection, SettingsSection, VarRequirement,
};
use diagrun::types::Frequency;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigFile {
                paths: PathsSection {
                    code_root: "/code".to_string(),
                    obs_data_root: "/obs".to_string(),
                    model_data_root: "/model".to_string(),
                    working_dir: "/work".to_string(),
                    output_dir: "/out".to_string(),
                },
                settings: SettingsSection {
                    case_name: "testcase".to_string(),
                    environment: EnvironmentKind::None,
                    conda_env_root: None,
                    test_mode: false,
                    convert_flags: String::new(),
                    convert_output_fmt: "png".to_string(),
                    save_ps: false,
                    save_nc: false,
                },
                job: BTreeMap::new(),
            },
        }
    }

    pub fn case_name(mut self, name: &str) -> Self {
        self.config.settings.case_name = name.to_string();
        self
    }

    pub fn conda(mut self, env_root: &str) -> Self {
        self.config.settings.environment = EnvironmentKind::Conda;
        self.config.settings.conda_env_root = Some(env_root.to_string());
        self
    }

    pub fn test_mode(mut self, val: bool) -> Self {
        self.config.settings.test_mode = val;
        self
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn build(self) -> ConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new() -> Self {
        Self {
            job: JobConfig::default(),
        }
    }

    pub fn driver(mut self, driver: &str) -> Self {
        self.job.driver = driver.to_string();
        self
    }

    pub fn program(mut self, program: &str) -> Self {
        self.job.program = program.to_string();
        self
    }

    pub fn required_program(mut self, program: &str) -> Self {
        self.job.required_programs.push(program.to_string());
        self
    }

    pub fn python_module(mut self, module: &str) -> Self {
        self.job.required_python_modules.push(module.to_string());
        self
    }

    pub fn env_var(mut self, key: &str, val: &str) -> Self {
        self.job.env_vars.insert(key.to_string(), val.to_string());
        self
    }

    pub fn var(mut self, var: VarRequirement) -> Self {
        self.job.var.push(var);
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

impl Default for JobConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a `VarRequirement`.
pub fn var_req(name: &str, freq: Frequency, required: bool, alternates: &[&str]) -> VarRequirement {
    VarRequirement {
        name: name.to_string(),
        freq,
        required,
        alternates: alternates.iter().map(|s| s.to_string()).collect(),
    }
}

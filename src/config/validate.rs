// src/config/validate.rs

use crate::config::model::{ConfigFile, EnvironmentKind};
use crate::errors::{DiagrunError, Result};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one job
/// - `settings.case_name` is non-empty
/// - `settings.conda_env_root` is set when `environment = "conda"`
/// - every variable requirement has a non-empty name, non-empty alternate
///   names, and does not list itself as an alternate
///
/// It does **not** touch the filesystem; existence of the configured
/// directories is checked at startup against the real tree.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_settings(cfg)?;
    validate_varlists(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &ConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(DiagrunError::Config(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(cfg: &ConfigFile) -> Result<()> {
    if cfg.settings.case_name.trim().is_empty() {
        return Err(DiagrunError::Config(
            "[settings].case_name must be non-empty".to_string(),
        ));
    }

    if cfg.settings.environment == EnvironmentKind::Conda
        && cfg.settings.conda_env_root.as_deref().unwrap_or("").is_empty()
    {
        return Err(DiagrunError::Config(
            "[settings].conda_env_root is required when environment = \"conda\"".to_string(),
        ));
    }

    Ok(())
}

fn validate_varlists(cfg: &ConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        for var in job.var.iter() {
            if var.name.trim().is_empty() {
                return Err(DiagrunError::Config(format!(
                    "job '{name}' has a variable requirement with an empty name"
                )));
            }
            for alt in var.alternates.iter() {
                if alt.trim().is_empty() {
                    return Err(DiagrunError::Config(format!(
                        "job '{name}' variable '{}' has an empty alternate name",
                        var.name
                    )));
                }
                if alt == &var.name {
                    return Err(DiagrunError::Config(format!(
                        "job '{name}' variable '{}' lists itself as an alternate",
                        var.name
                    )));
                }
            }
        }
    }
    Ok(())
}

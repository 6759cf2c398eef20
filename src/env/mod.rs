// src/env/mod.rs

//! Runtime environment management.
//!
//! Every job is bound to a named environment before execution. The manager
//! trait covers the full capability set — resolution, creation, activation /
//! deactivation shell fragments, and teardown — with two variants:
//! [`NoEnvironmentManager`] (ambient process environment) and
//! [`CondaEnvironmentManager`] (a pool of named conda environments, created
//! lazily from on-disk spec files).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::model::{EnvironmentKind, SettingsSection};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::job::spec::JobSpec;
use crate::job::state::Job;
use crate::paths::PathContext;
use crate::types::EnvName;

pub mod conda;
pub mod none;

pub use conda::CondaEnvironmentManager;
pub use none::NoEnvironmentManager;

/// Capability set every environment manager variant implements.
///
/// `ensure_environment` and `teardown_environment` return boxed futures so
/// the trait stays object-safe while variants may await external commands.
pub trait EnvironmentManager: Send + Sync {
    /// Map a job's declared tool requirements to an environment name.
    /// Pure function of the job metadata.
    fn resolve_environment(&self, spec: &JobSpec) -> EnvName;

    /// Make the named environment usable, creating it if necessary.
    ///
    /// This is a blocking prerequisite: activation commands may only be
    /// emitted for an environment once its ensure has returned success.
    fn ensure_environment<'a>(
        &'a self,
        env: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Shell fragment that activates the job's environment; empty when no
    /// activation is needed.
    fn activate_command(&self, job: &Job) -> String;

    /// Shell fragment that deactivates the job's environment; empty when no
    /// deactivation is needed.
    fn deactivate_command(&self, job: &Job) -> String;

    /// Release the named environment after every bound job has finalized.
    fn teardown_environment<'a>(
        &'a self,
        env: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Construct the manager selected in `[settings]`.
pub fn manager_from_settings(
    settings: &SettingsSection,
    ctx: &PathContext,
    fs: Arc<dyn FileSystem>,
) -> Result<Box<dyn EnvironmentManager>> {
    match settings.environment {
        EnvironmentKind::None => Ok(Box::new(NoEnvironmentManager)),
        EnvironmentKind::Conda => {
            // Presence of the setting is checked at config validation; the
            // directory itself is checked here.
            let root = settings.conda_env_root.as_deref().unwrap_or("");
            let manager = CondaEnvironmentManager::new(root, ctx, fs)?;
            Ok(Box::new(manager))
        }
    }
}

// src/env/none.rs

use std::future::Future;
use std::pin::Pin;

use crate::env::EnvironmentManager;
use crate::errors::Result;
use crate::job::spec::JobSpec;
use crate::job::state::Job;
use crate::types::EnvName;

/// Do not switch execution environments: every job runs in the ambient
/// process environment. All commands are empty and every environment
/// operation is a no-op success.
pub struct NoEnvironmentManager;

impl EnvironmentManager for NoEnvironmentManager {
    fn resolve_environment(&self, _spec: &JobSpec) -> EnvName {
        EnvName::new()
    }

    fn ensure_environment<'a>(
        &'a self,
        _env: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }

    fn activate_command(&self, _job: &Job) -> String {
        String::new()
    }

    fn deactivate_command(&self, _job: &Job) -> String {
        String::new()
    }

    fn teardown_environment<'a>(
        &'a self,
        _env: &'a str,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

// src/job/command.rs

//! Shell fragment construction and chain composition.
//!
//! A job's subprocess runs four fragments joined by `&&` so that failure of
//! any fragment aborts the rest of that job's chain (and nothing else):
//! activate, validate, run, deactivate. Empty fragments are omitted.

use std::path::Path;

use crate::job::spec::JobSpec;

/// The command that actually runs the job: `<program> <driver>`.
///
/// `program` may legitimately be empty (self-executing driver), in which case
/// the driver alone is the command.
pub fn run_command(spec: &JobSpec) -> String {
    if spec.program.is_empty() {
        spec.driver.clone()
    } else {
        format!("{} {}", spec.program, spec.driver)
    }
}

/// The reporting no-op substituted for the run fragment in test mode.
pub fn test_mode_command(run: &str) -> String {
    format!("echo \"TEST MODE: would call {run}\"")
}

/// Invocation of the external environment-validation script.
///
/// Flag shape: `-v`, then `-p <program>` per required program, `-z <key>` per
/// job env-var key, `-a <module>` per python module, `-b <script>` per NCL
/// script, `-c <package>` per R package. Its exit code gates the run
/// fragment.
pub fn validate_command(spec: &JobSpec, validate_script: &Path) -> String {
    let mut cmd = format!("{} -v", validate_script.to_string_lossy());
    push_flag_args(&mut cmd, "-p", spec.required_programs.iter());
    push_flag_args(&mut cmd, "-z", spec.env_vars.keys());
    push_flag_args(&mut cmd, "-a", spec.required_python_modules.iter());
    push_flag_args(&mut cmd, "-b", spec.required_ncl_scripts.iter());
    push_flag_args(&mut cmd, "-c", spec.required_r_packages.iter());
    cmd
}

fn push_flag_args<'a>(cmd: &mut String, flag: &str, items: impl Iterator<Item = &'a String>) {
    for item in items {
        cmd.push(' ');
        cmd.push_str(flag);
        cmd.push(' ');
        cmd.push_str(item);
    }
}

/// Join non-empty fragments with ` && `, short-circuiting the chain on the
/// first failure. No dangling separators for empty fragments.
pub fn compose_chain(fragments: &[String]) -> String {
    fragments
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" && ")
}

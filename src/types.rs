// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Canonical job name type used throughout the crate.
pub type JobName = String;

/// Name of a runtime environment. Empty for the ambient environment.
pub type EnvName = String;

/// Terminal status of a job, recorded at `Completed` and reported after the
/// batch finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// The composed command chain exited 0.
    Success,
    /// The chain exited nonzero (exit code, or -1 if killed by a signal).
    Failed(i32),
    /// The subprocess (or its log file) could not be created.
    SpawnFailed,
    /// The job's runtime environment could not be created.
    EnvironmentFailed,
    /// Directory setup or driver discovery failed before dependency
    /// resolution.
    SetupFailed,
    /// Required input data was missing after alternate resolution.
    SkippedMissingData,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed(code) => write!(f, "failed (exit {code})"),
            JobStatus::SpawnFailed => write!(f, "spawn error"),
            JobStatus::EnvironmentFailed => write!(f, "environment error"),
            JobStatus::SetupFailed => write!(f, "setup error"),
            JobStatus::SkippedMissingData => write!(f, "skipped — missing inputs"),
        }
    }
}

/// Sampling frequency of an input data file.
///
/// Closed set: deserialization of any other string fails, which surfaces as a
/// configuration error before the batch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1hr")]
    Hourly,
    #[serde(rename = "3hr")]
    ThreeHourly,
    #[serde(rename = "6hr")]
    SixHourly,
    #[serde(rename = "day")]
    Daily,
    #[serde(rename = "mon")]
    Monthly,
}

impl Frequency {
    /// The on-disk spelling, used in data file paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "1hr",
            Frequency::ThreeHourly => "3hr",
            Frequency::SixHourly => "6hr",
            Frequency::Daily => "day",
            Frequency::Monthly => "mon",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

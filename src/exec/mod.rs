// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs each job's composed command chain as its own subprocess via
//! `tokio::process::Command` and reports completion back to the orchestrator
//! over a `BatchEvent` channel.
//!
//! - [`backend`] provides the `JobExecutor` trait and the concrete
//!   `RealJobExecutor` used in production; tests substitute a fake
//!   implementation that never spawns OS processes.
//! - [`runner`] owns the background executor loop and individual job
//!   process handling.

pub mod backend;
pub mod runner;

pub use backend::{JobExecutor, RealJobExecutor, SpawnRequest};
pub use runner::spawn_executor;

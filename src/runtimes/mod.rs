//! Graph execution runtime.
//!
//! The runtime plays the executor role for compiled graphs: a ready-queue
//! scheduler over the tokio multi-thread runtime that dispatches nodes whose
//! dependencies are satisfied, honors priority tiers, routes condition branch
//! results, expands sub-module groups, and tracks detached work so a run only
//! reports completion at full quiescence.

pub mod runner;
pub mod runtime_config;

pub use runner::{RunReport, Runner, RunnerError};
pub use runtime_config::RuntimeConfig;

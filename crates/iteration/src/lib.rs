//! Iteration control: repeated orchestrator runs under a completion policy.
//!
//! A lineage is a chain of sessions connected by an evolving goal. After
//! each pass the [`IterationController`] asks a designated analysis
//! capability whether to continue and with what goal, then applies the
//! configured [`CompletionStrategy`](swarmforge_core::CompletionStrategy)
//! on top of that verdict.

mod controller;
mod verdict;

pub use controller::{IterationController, LineageConfig, LineageReport, PassRecord, StopReason};
pub use verdict::AnalysisVerdict;

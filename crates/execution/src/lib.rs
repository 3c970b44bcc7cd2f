//! The orchestration engine.
//!
//! Given a validated workflow definition and a registry of agents, the
//! [`Orchestrator`] instantiates task records, dispatches ready tasks
//! concurrently wherever the dependency graph permits, aggregates status
//! into durable snapshots, and supports cancellation and deadlines.

mod orchestrator;
mod runner;

pub use orchestrator::{Orchestrator, OrchestratorConfig};

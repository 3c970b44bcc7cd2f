//! Declarative workflow definitions.
//!
//! A workflow is a dependency graph of phases, each bound to one agent.
//! Definitions are validated at registration time; the scheduler never sees
//! a cyclic or dangling graph.

mod builtins;
mod definition;
mod registry;

pub use builtins::{
    builtin_workflows, register_builtins, ANALYSIS_AGENT, DEVELOPMENT_AGENT, DOCUMENTATION_AGENT,
    PLANNING_AGENT, RESEARCH_AGENT,
};
pub use definition::{PhaseSpec, WorkflowDefinition};
pub use registry::{WorkflowRegistry, WorkflowSummary};

//! Agent capability trait and registry.
//!
//! An agent is a named capability that accepts a task's resolved inputs and
//! returns an output mapping or a typed failure. What the capability does
//! behind `invoke` (LLM calls, file writes, tool servers) is opaque to the
//! orchestration core.

mod registry;

pub use registry::{AgentRegistry, InvokeResult};

use async_trait::async_trait;

use swarmforge_core::{AgentError, ValueMap};

/// A single-capability invocable unit.
///
/// The registry treats this as a black box that may be slow and may fail;
/// the orchestrator enforces timeouts and maps failures onto task status.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute the capability against resolved task inputs.
    async fn invoke(&self, inputs: ValueMap) -> Result<ValueMap, AgentError>;
}

/// Adapter exposing a plain closure as an [`Agent`].
///
/// Used by the CLI's placeholder agents and by tests that script agent
/// behavior instead of waiting on a real external call.
pub struct FnAgent<F> {
    f: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&ValueMap) -> Result<ValueMap, AgentError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Agent for FnAgent<F>
where
    F: Fn(&ValueMap) -> Result<ValueMap, AgentError> + Send + Sync,
{
    async fn invoke(&self, inputs: ValueMap) -> Result<ValueMap, AgentError> {
        (self.f)(&inputs)
    }
}

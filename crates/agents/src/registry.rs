//! Agent registry - stateless routing from identifiers to capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use swarmforge_core::{AgentError, ConfigurationError, ValueMap};

use crate::Agent;

/// Lookup table mapping agent identifiers to capabilities.
///
/// Agents are registered once at startup and resolved per task dispatch.
/// The registry holds no other state; side effects belong to the
/// capabilities themselves.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under an identifier.
    pub fn register(
        &mut self,
        agent_id: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Result<(), ConfigurationError> {
        let agent_id = agent_id.into();
        if self.agents.contains_key(&agent_id) {
            return Err(ConfigurationError::DuplicateAgent(agent_id));
        }
        debug!(agent_id = %agent_id, "registered agent");
        self.agents.insert(agent_id, agent);
        Ok(())
    }

    /// Resolve an agent by identifier.
    ///
    /// An unknown identifier is a configuration error, fatal to the
    /// enclosing task.
    pub fn get(&self, agent_id: &str) -> Result<Arc<dyn Agent>, ConfigurationError> {
        self.agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent_id.to_string()))
    }

    /// True if an agent is registered under this identifier.
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve and invoke in one step.
    pub async fn invoke(&self, agent_id: &str, inputs: ValueMap) -> InvokeResult {
        match self.get(agent_id) {
            Ok(agent) => InvokeResult::Agent(agent.invoke(inputs).await),
            Err(e) => InvokeResult::Configuration(e),
        }
    }
}

/// Outcome of [`AgentRegistry::invoke`]: a capability result, or a fatal
/// routing failure distinct from any agent-scoped error.
#[derive(Debug)]
pub enum InvokeResult {
    /// The capability ran and returned its result
    Agent(Result<ValueMap, AgentError>),
    /// The agent identifier could not be resolved
    Configuration(ConfigurationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnAgent;

    fn echo_agent() -> Arc<dyn Agent> {
        Arc::new(FnAgent::new(|inputs: &ValueMap| {
            let mut out = ValueMap::new();
            out.insert("seen".into(), serde_json::json!(inputs.len()));
            Ok(out)
        }))
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = AgentRegistry::new();
        registry.register("research-agent", echo_agent()).unwrap();
        assert!(registry.contains("research-agent"));
        assert!(registry.get("research-agent").is_ok());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = AgentRegistry::new();
        registry.register("research-agent", echo_agent()).unwrap();
        let err = registry.register("research-agent", echo_agent()).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAgent(id) if id == "research-agent"));
    }

    #[test]
    fn unknown_agent_is_configuration_error() {
        let registry = AgentRegistry::new();
        let err = registry.get("nonexistent").err().unwrap();
        assert!(matches!(err, ConfigurationError::UnknownAgent(id) if id == "nonexistent"));
    }

    #[tokio::test]
    async fn invoke_routes_to_capability() {
        let mut registry = AgentRegistry::new();
        registry.register("research-agent", echo_agent()).unwrap();

        match registry.invoke("research-agent", ValueMap::new()).await {
            InvokeResult::Agent(Ok(out)) => assert_eq!(out["seen"], serde_json::json!(0)),
            other => panic!("unexpected invoke result: {other:?}"),
        }

        match registry.invoke("missing", ValueMap::new()).await {
            InvokeResult::Configuration(ConfigurationError::UnknownAgent(id)) => {
                assert_eq!(id, "missing");
            }
            other => panic!("unexpected invoke result: {other:?}"),
        }
    }
}

//! Workflow registry with registration-time validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use swarmforge_core::ConfigurationError;

use crate::WorkflowDefinition;

/// Registry for workflow definitions.
///
/// Registration rejects invalid graphs, so a workflow resolved from here is
/// guaranteed acyclic with all dependency names bound.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, WorkflowDefinition>,
}

impl WorkflowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition.
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), ConfigurationError> {
        definition.validate()?;
        if self.workflows.contains_key(&definition.id) {
            return Err(ConfigurationError::DuplicateWorkflow(definition.id));
        }
        debug!(workflow_id = %definition.id, phases = definition.phases.len(), "registered workflow");
        self.workflows.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Resolve a workflow by identifier.
    pub fn get(&self, workflow_id: &str) -> Result<&WorkflowDefinition, ConfigurationError> {
        self.workflows
            .get(workflow_id)
            .ok_or_else(|| ConfigurationError::UnknownWorkflow(workflow_id.to_string()))
    }

    /// True if a workflow is registered under this identifier.
    pub fn contains(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id)
    }

    /// Summaries of all registered workflows, sorted by identifier.
    pub fn list(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<WorkflowSummary> = self
            .workflows
            .values()
            .map(|w| WorkflowSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                description: w.description.clone(),
                phases: w.phases.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

/// Listing entry for a registered workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Workflow identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    pub description: String,
    /// Number of phases
    pub phases: usize,
}

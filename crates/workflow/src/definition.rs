//! Workflow definition model and registration-time validation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use swarmforge_core::{ConfigurationError, ValueMap};

/// One phase of a workflow: a named slot bound to an agent, with dependency
/// edges to other phases by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Phase name, unique within the workflow
    pub name: String,

    /// Agent identifier to invoke
    pub agent_id: String,

    /// Names of phases that must complete first
    pub depends_on: Vec<String>,

    /// Phase-specific data merged into the task's inputs
    pub data: ValueMap,

    /// A failed or skipped optional phase does not fail the session
    pub optional: bool,

    /// Per-task execution timeout
    pub timeout: Option<Duration>,
}

impl PhaseSpec {
    /// Create a phase with no dependencies.
    pub fn new(name: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_id: agent_id.into(),
            depends_on: Vec::new(),
            data: ValueMap::new(),
            optional: false,
            timeout: None,
        }
    }

    /// Add dependency edges by phase name.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Attach phase-specific data.
    pub fn data(mut self, data: ValueMap) -> Self {
        self.data = data;
        self
    }

    /// Mark the phase optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set a per-task timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A declarative workflow: an ordered set of phase specs plus the
/// dependency edges between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Description shown in listings
    pub description: String,

    /// Phases in declaration order
    pub phases: Vec<PhaseSpec>,
}

impl WorkflowDefinition {
    /// Create an empty definition.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            phases: Vec::new(),
        }
    }

    /// Append a phase.
    pub fn phase(mut self, phase: PhaseSpec) -> Self {
        self.phases.push(phase);
        self
    }

    /// Validate the definition: unique phase names, dependency names that
    /// resolve, and an acyclic graph. Called at registration, never at run
    /// time.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        for phase in &self.phases {
            if !names.insert(phase.name.as_str()) {
                return Err(ConfigurationError::DuplicatePhase {
                    workflow: self.id.clone(),
                    phase: phase.name.clone(),
                });
            }
        }

        for phase in &self.phases {
            for dep in &phase.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(ConfigurationError::UnknownDependency {
                        workflow: self.id.clone(),
                        phase: phase.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm: absence of a total order means a cycle.
        if self.topological_order().len() < self.phases.len() {
            return Err(ConfigurationError::CyclicWorkflow(self.id.clone()));
        }

        Ok(())
    }

    /// Phase names in a dependency-respecting order. Phases caught in a
    /// cycle are omitted, which `validate` uses for cycle detection.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut in_degree: HashMap<&str, usize> = self
            .phases
            .iter()
            .map(|p| (p.name.as_str(), p.depends_on.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for phase in &self.phases {
            for dep in &phase.depends_on {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(phase.name.as_str());
            }
        }

        let mut ready: VecDeque<&str> = self
            .phases
            .iter()
            .filter(|p| p.depends_on.is_empty())
            .map(|p| p.name.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.phases.len());
        while let Some(name) = ready.pop_front() {
            order.push(name);
            if let Some(deps) = dependents.get(name) {
                for dependent in deps {
                    let degree = in_degree.entry(dependent).or_insert(0);
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        order
    }

    /// Look up a phase by name.
    pub fn phase_by_name(&self, name: &str) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.name == name)
    }
}

//! Iteration state and completion policy.

use serde::{Deserialize, Serialize};

/// Policy deciding whether an iteration lineage continues after each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStrategy {
    /// Run exactly `max_iterations` passes, ignoring the analysis verdict
    /// once the bound is reached
    Fixed,
    /// Trust the analysis verdict verbatim; the only strategy allowed to
    /// stop before `max_iterations`
    Smart,
    /// Stop when the tracked version reaches `target_version`, with
    /// `max_iterations` as a safety bound
    VersionDriven,
}

impl std::fmt::Display for CompletionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Smart => write!(f, "smart"),
            Self::VersionDriven => write!(f, "version_driven"),
        }
    }
}

/// Configuration for an iterative execution, supplied at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    /// Completion policy
    pub completion_strategy: CompletionStrategy,

    /// Pass bound; `None` means unbounded (exit is analysis-driven only)
    pub max_iterations: Option<u32>,

    /// Version the lineage is driving toward (VersionDriven only)
    pub target_version: Option<String>,

    /// Allow the analysis step to revise `max_iterations` upward
    pub adaptive: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            completion_strategy: CompletionStrategy::Fixed,
            max_iterations: Some(3),
            target_version: None,
            adaptive: false,
        }
    }
}

/// Per-lineage iteration state, attached to each session of the lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationState {
    /// Passes performed so far, monotonically increasing per lineage
    pub iteration_count: u32,

    /// Pass bound; `None` means unbounded
    pub max_iterations: Option<u32>,

    /// Completion policy
    pub completion_strategy: CompletionStrategy,

    /// Version the lineage is driving toward, if any
    pub target_version: Option<String>,

    /// Whether the analysis step may raise `max_iterations`
    pub adaptive: bool,

    /// Verdict of the most recent analysis pass
    pub should_continue: bool,

    /// Goal text for the next pass; absent when stopping
    pub evolved_goal: Option<String>,
}

impl IterationState {
    /// Initial state for a fresh lineage.
    pub fn initial(config: &IterationConfig) -> Self {
        Self {
            iteration_count: 0,
            max_iterations: config.max_iterations,
            completion_strategy: config.completion_strategy,
            target_version: config.target_version.clone(),
            adaptive: config.adaptive,
            should_continue: true,
            evolved_goal: None,
        }
    }

    /// True once the bounded pass budget is exhausted.
    pub fn budget_exhausted(&self) -> bool {
        match self.max_iterations {
            Some(max) => self.iteration_count >= max,
            None => false,
        }
    }

    /// Raise `max_iterations`, never lowering it below the current count.
    /// Returns the effective new bound.
    pub fn revise_max_iterations(&mut self, revised: u32) -> u32 {
        let floor = self.iteration_count.max(self.max_iterations.unwrap_or(0));
        let effective = revised.max(floor);
        self.max_iterations = Some(effective);
        effective
    }
}

//! Task record - the unit of schedulable work.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AgentError;
use crate::id::TaskId;
use crate::Time;

/// Free-form key/value mapping used for task inputs, outputs and session context.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// A concrete task instantiated from a workflow phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier within the session
    pub id: TaskId,

    /// Logical grouping, e.g. "research"
    pub phase: String,

    /// Capability to invoke
    pub agent_id: String,

    /// Named input values: the goal, shared context, and the outputs of
    /// completed dependencies merged in by the scheduler
    pub inputs: ValueMap,

    /// Tasks that must complete before this one may run
    pub depends_on: Vec<TaskId>,

    /// Current status
    pub status: TaskStatus,

    /// Output produced by the agent on success
    pub output: Option<ValueMap>,

    /// Failure reason, present iff status is Failed
    pub error: Option<AgentError>,

    /// A failed or skipped optional task does not fail the session
    pub optional: bool,

    /// Per-task execution timeout
    pub timeout: Option<Duration>,

    /// When the task transitioned to Running
    pub started_at: Option<Time>,

    /// When the task reached a terminal status
    pub finished_at: Option<Time>,
}

impl TaskRecord {
    /// Create a pending task for a phase.
    pub fn new(phase: impl Into<String>, agent_id: impl Into<String>, inputs: ValueMap) -> Self {
        Self {
            id: TaskId::new(),
            phase: phase.into(),
            agent_id: agent_id.into(),
            inputs,
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            output: None,
            error: None,
            optional: false,
            timeout: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// True if the task reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting on dependencies
    Pending,
    /// All dependencies completed, eligible for dispatch
    Ready,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an agent error
    Failed,
    /// Never ran because a dependency failed or the session was cancelled
    Skipped,
}

impl TaskStatus {
    /// True for Completed, Failed and Skipped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

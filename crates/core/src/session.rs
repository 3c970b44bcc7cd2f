//! Execution session - one concrete run of a workflow.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::id::{SessionId, TaskId};
use crate::iteration::IterationState;
use crate::task::{TaskRecord, TaskStatus, ValueMap};
use crate::Time;

/// One run of a workflow against a concrete goal and context.
///
/// The scheduler exclusively owns mutation of the task states; external
/// callers receive read-only [`SessionSnapshot`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSession {
    /// Session identifier
    pub session_id: SessionId,

    /// The workflow this session runs
    pub workflow_id: String,

    /// Free-text goal driving the run
    pub goal: String,

    /// Side-channel key/value data (project directory, prior outputs, ...)
    pub context: ValueMap,

    /// Concrete tasks instantiated from the workflow definition
    pub tasks: Vec<TaskRecord>,

    /// Aggregated session status
    pub overall_status: SessionStatus,

    /// Iteration state, present only for iteration-style executions
    pub iteration: Option<IterationState>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last mutation timestamp
    pub updated_at: Time,
}

impl ExecutionSession {
    /// Create an initializing session with no tasks yet.
    pub fn new(workflow_id: impl Into<String>, goal: impl Into<String>, context: ValueMap) -> Self {
        let now = chrono::Utc::now();
        Self {
            session_id: SessionId::new(),
            workflow_id: workflow_id.into(),
            goal: goal.into(),
            context,
            tasks: Vec::new(),
            overall_status: SessionStatus::Initializing,
            iteration: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a task by id.
    pub fn task(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Mutable task lookup.
    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Look up a task by phase name.
    pub fn task_by_phase(&self, phase: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.phase == phase)
    }

    /// True once no task is Pending, Ready or Running.
    pub fn all_tasks_settled(&self) -> bool {
        self.tasks.iter().all(TaskRecord::is_terminal)
    }

    /// Outputs of every completed task, keyed by phase name.
    pub fn aggregated_output(&self) -> ValueMap {
        let mut merged = ValueMap::new();
        for task in &self.tasks {
            if task.status == TaskStatus::Completed {
                if let Some(output) = &task.output {
                    merged.insert(
                        task.phase.clone(),
                        serde_json::Value::Object(output.clone()),
                    );
                }
            }
        }
        merged
    }

    /// Produce a read-only snapshot for status pollers.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            workflow_id: self.workflow_id.clone(),
            goal: self.goal.clone(),
            overall_status: self.overall_status,
            counts: TaskCounts::of(&self.tasks),
            tasks: self.tasks.iter().map(TaskSnapshot::of).collect(),
            aggregated_output: self.aggregated_output(),
            iteration: self.iteration.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Overall status of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Session created, tasks not yet dispatched
    Initializing,
    /// At least one task is still in flight or waiting
    Running,
    /// Every required task completed
    Completed,
    /// A required task failed and no retry is possible
    Failed,
    /// Cancelled by request or by exceeding the session deadline
    Cancelled,
}

impl SessionStatus {
    /// True for Completed, Failed and Cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of a session, durable enough to be polled from another
/// process without replaying execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub session_id: SessionId,
    /// Workflow identifier
    pub workflow_id: String,
    /// The goal this session ran against
    pub goal: String,
    /// Aggregated status
    pub overall_status: SessionStatus,
    /// Per-status task counts
    pub counts: TaskCounts,
    /// Per-task status views
    pub tasks: Vec<TaskSnapshot>,
    /// Outputs of completed tasks keyed by phase name
    pub aggregated_output: ValueMap,
    /// Iteration state if this is an iterative execution
    pub iteration: Option<IterationState>,
    /// Session creation time
    pub created_at: Time,
    /// Time of the last status transition
    pub updated_at: Time,
}

impl SessionSnapshot {
    /// The first failed task, if any.
    pub fn first_failure(&self) -> Option<&TaskSnapshot> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::Failed)
    }
}

/// Read-only view of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier
    pub task_id: TaskId,
    /// Phase name
    pub phase: String,
    /// Assigned agent
    pub agent_id: String,
    /// Current status
    pub status: TaskStatus,
    /// Output mapping, present for completed tasks
    pub output: Option<ValueMap>,
    /// Failure reason, present for failed tasks
    pub error: Option<AgentError>,
    /// When the task started running
    pub started_at: Option<Time>,
    /// When the task settled
    pub finished_at: Option<Time>,
}

impl TaskSnapshot {
    fn of(task: &TaskRecord) -> Self {
        Self {
            task_id: task.id,
            phase: task.phase.clone(),
            agent_id: task.agent_id.clone(),
            status: task.status,
            output: task.output.clone(),
            error: task.error.clone(),
            started_at: task.started_at,
            finished_at: task.finished_at,
        }
    }
}

/// Per-status task counts, mirroring what pollers usually want first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Total tasks in the session
    pub total: usize,
    /// Completed tasks
    pub completed: usize,
    /// Failed tasks
    pub failed: usize,
    /// Skipped tasks
    pub skipped: usize,
    /// Tasks still pending, ready or running
    pub in_progress: usize,
}

impl TaskCounts {
    fn of(tasks: &[TaskRecord]) -> Self {
        let mut counts = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                _ => counts.in_progress += 1,
            }
        }
        counts
    }
}

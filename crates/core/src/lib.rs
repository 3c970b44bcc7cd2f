//! SwarmForge core data models.
//!
//! This crate defines the fundamental data structures shared by the
//! orchestration engine: task records, execution sessions, iteration
//! state, and the error taxonomy.

#![warn(missing_docs)]

// Core identities
mod id;

// Schedulable work
mod task;

// One concrete run of a workflow
mod session;

// Repeat-loop state and completion policy
mod iteration;

// Error taxonomy
mod error;

// Re-exports
pub use id::{SessionId, TaskId};

pub use task::{TaskRecord, TaskStatus, ValueMap};

pub use session::{
    ExecutionSession, SessionSnapshot, SessionStatus, TaskCounts, TaskSnapshot,
};

pub use iteration::{CompletionStrategy, IterationConfig, IterationState};

pub use error::{
    AgentError, ConfigurationError, IterationPolicyError, OrchestratorError, SessionError,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

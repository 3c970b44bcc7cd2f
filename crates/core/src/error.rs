//! Error taxonomy for the orchestration core.

use serde::{Deserialize, Serialize};

use crate::id::SessionId;
use crate::session::SessionStatus;

/// Fatal configuration problems: unknown references and invalid workflow
/// graphs. Surfaced immediately, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// No agent registered under this identifier
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// An agent is already registered under this identifier
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),

    /// No workflow registered under this identifier
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// A workflow is already registered under this identifier
    #[error("workflow already registered: {0}")]
    DuplicateWorkflow(String),

    /// Two phases in one workflow share a name
    #[error("workflow `{workflow}` declares phase `{phase}` more than once")]
    DuplicatePhase {
        /// Workflow identifier
        workflow: String,
        /// Offending phase name
        phase: String,
    },

    /// A phase depends on a phase that does not exist
    #[error("workflow `{workflow}`: phase `{phase}` depends on unknown phase `{dependency}`")]
    UnknownDependency {
        /// Workflow identifier
        workflow: String,
        /// Phase declaring the dependency
        phase: String,
        /// The missing dependency name
        dependency: String,
    },

    /// The dependency graph has no total order
    #[error("workflow `{0}` contains a dependency cycle")]
    CyclicWorkflow(String),
}

/// Failure of a single agent invocation. Scoped to one task; dependents are
/// skipped, the session is not crashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum AgentError {
    /// The invocation exceeded its timeout
    #[error("agent timed out")]
    Timeout,

    /// The agent rejected its inputs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An upstream service the agent depends on failed
    #[error("external service error: {0}")]
    ExternalServiceError(String),

    /// The invocation was cancelled
    #[error("cancelled")]
    Cancelled,
}

impl AgentError {
    /// Stable reason code for status reporting.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::InvalidInput(_) => "invalid_input",
            Self::ExternalServiceError(_) => "external_service_error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Attempting to act on an unknown or already-terminal session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session with this identifier
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The session already reached a terminal status
    #[error("session {id} is already terminal ({status})")]
    AlreadyTerminal {
        /// Session identifier
        id: SessionId,
        /// The terminal status it holds
        status: SessionStatus,
    },
}

/// The analysis capability returned an unusable verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum IterationPolicyError {
    /// `should_continue` was true but no evolved goal was supplied;
    /// continuing without a goal is undefined, so the lineage stops
    #[error("analysis requested continuation without an evolved goal")]
    MissingEvolvedGoal,
}

/// Umbrella error for the orchestrator's public API.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Fatal configuration problem
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Session lookup or lifecycle problem
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Snapshot persistence failed
    #[error("storage error: {0}")]
    Storage(String),
}

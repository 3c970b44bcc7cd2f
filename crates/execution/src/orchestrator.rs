//! Public scheduler API: session creation, execution, status, cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use swarmforge_agents::{Agent, AgentRegistry};
use swarmforge_core::{
    ExecutionSession, IterationState, OrchestratorError, SessionError, SessionId, SessionSnapshot,
    SessionStatus, TaskId, TaskRecord, TaskStatus, ValueMap,
};
use swarmforge_storage::SessionStore;
use swarmforge_workflow::WorkflowRegistry;

use crate::runner;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock bound per session. Exceeding it cancels all tasks not yet
    /// running and abandons in-flight ones.
    pub max_runtime: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_runtime: None }
    }
}

/// Live state of one session owned by the scheduler.
///
/// The session mutex is the single-writer serialization point: every status
/// transition happens under it, and the snapshot is persisted before the
/// lock is released, so no reader can observe a Completed status with a
/// stale output.
pub(crate) struct SessionHandle {
    pub(crate) session: Mutex<ExecutionSession>,
    /// Agents resolved once at session start, not per dispatch
    pub(crate) agents: HashMap<TaskId, Arc<dyn Agent>>,
    pub(crate) cancelled: AtomicBool,
    pub(crate) started: AtomicBool,
    pub(crate) status_tx: watch::Sender<SessionStatus>,
}

/// Coordinates workflow executions against a registry of agents.
///
/// Cheap to clone; all clones share the same session table and store.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) agents: AgentRegistry,
    pub(crate) workflows: WorkflowRegistry,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over fully-built registries.
    ///
    /// Registries are resolved here once; there is no post-construction
    /// registration and no ambient global configuration.
    pub fn new(
        agents: AgentRegistry,
        workflows: WorkflowRegistry,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                agents,
                workflows,
                store,
                sessions: Mutex::new(HashMap::new()),
                config: OrchestratorConfig::default(),
            }),
        }
    }

    /// Replace the configuration. Only valid before any session starts.
    pub fn with_config(self, config: OrchestratorConfig) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.config = config;
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(inner) => {
                warn!("with_config called on a shared orchestrator; keeping existing config");
                Self { inner }
            }
        }
    }

    /// The agent registry this orchestrator dispatches to.
    pub fn agents(&self) -> &AgentRegistry {
        &self.inner.agents
    }

    /// The workflow registry sessions are instantiated from.
    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.inner.workflows
    }

    /// The durable snapshot store.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.inner.store)
    }

    /// Instantiate a session from a workflow: concrete tasks with resolved
    /// dependency edges and inputs seeded from the goal and context.
    ///
    /// Fails fast with a `ConfigurationError` if the workflow is unknown or
    /// any phase references an unregistered agent; nothing is persisted in
    /// that case.
    pub async fn start_session(
        &self,
        workflow_id: &str,
        goal: &str,
        context: ValueMap,
        iteration: Option<IterationState>,
    ) -> Result<SessionId, OrchestratorError> {
        let workflow = self.inner.workflows.get(workflow_id)?;

        let mut session = ExecutionSession::new(workflow_id, goal, context.clone());
        session.iteration = iteration;

        // Assign every task id first: a phase may depend on a phase
        // declared after it, so edges can only bind once the whole name
        // table exists.
        let ids_by_phase: HashMap<&str, TaskId> = workflow
            .phases
            .iter()
            .map(|phase| (phase.name.as_str(), TaskId::new()))
            .collect();

        // Resolve every agent up front so a dangling reference surfaces
        // before any task runs.
        let mut agents: HashMap<TaskId, Arc<dyn Agent>> = HashMap::new();

        for phase in &workflow.phases {
            let agent = self.inner.agents.get(&phase.agent_id)?;

            let mut inputs = ValueMap::new();
            inputs.insert("goal".into(), serde_json::Value::String(goal.to_string()));
            inputs.insert("context".into(), serde_json::Value::Object(context.clone()));
            for (key, value) in &phase.data {
                inputs.insert(key.clone(), value.clone());
            }

            let mut task = TaskRecord::new(&phase.name, &phase.agent_id, inputs);
            task.id = ids_by_phase[phase.name.as_str()];
            task.optional = phase.optional;
            task.timeout = phase.timeout;
            task.depends_on = phase
                .depends_on
                .iter()
                .filter_map(|dep| ids_by_phase.get(dep.as_str()).copied())
                .collect();

            agents.insert(task.id, agent);
            session.tasks.push(task);
        }

        let session_id = session.session_id;
        let snapshot = session.snapshot();

        let (status_tx, _) = watch::channel(SessionStatus::Initializing);
        let handle = Arc::new(SessionHandle {
            session: Mutex::new(session),
            agents,
            cancelled: AtomicBool::new(false),
            started: AtomicBool::new(false),
            status_tx,
        });
        self.inner.sessions.lock().await.insert(session_id, handle);

        self.inner
            .store
            .save(&snapshot)
            .await
            .map_err(|e| OrchestratorError::Storage(e.to_string()))?;

        info!(session_id = %session_id, workflow_id, "session created");
        Ok(session_id)
    }

    /// Execute a session.
    ///
    /// With `blocking = true` the call returns the terminal snapshot once no
    /// task remains pending, ready or running. With `blocking = false` the
    /// session continues on a detached task and the caller polls `status`.
    pub async fn run(
        &self,
        session_id: SessionId,
        blocking: bool,
    ) -> Result<Option<SessionSnapshot>, OrchestratorError> {
        let handle = self.handle(session_id).await?;

        let current = *handle.status_tx.borrow();
        if current.is_terminal() {
            return Err(SessionError::AlreadyTerminal {
                id: session_id,
                status: current,
            }
            .into());
        }

        if !handle.started.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            let run_handle = Arc::clone(&handle);
            tokio::spawn(async move {
                runner::drive(inner, run_handle, session_id).await;
            });
        }

        if blocking {
            self.wait_for_terminal(&handle).await;
            let snapshot = self.status(session_id).await?;
            Ok(Some(snapshot))
        } else {
            Ok(None)
        }
    }

    /// Read-only snapshot of a session, served from the durable store so it
    /// is safe from any call path at any lifecycle point.
    pub async fn status(&self, session_id: SessionId) -> Result<SessionSnapshot, OrchestratorError> {
        match self.inner.store.load(session_id).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(SessionError::UnknownSession(session_id).into()),
            Err(e) => Err(OrchestratorError::Storage(e.to_string())),
        }
    }

    /// Cancel a session: tasks not yet running are skipped and will never be
    /// dispatched; in-flight tasks finish naturally but their results no
    /// longer trigger dispatch.
    pub async fn cancel(&self, session_id: SessionId) -> Result<(), OrchestratorError> {
        let handle = self.handle(session_id).await?;

        let mut session = handle.session.lock().await;
        if session.overall_status.is_terminal() {
            return Err(SessionError::AlreadyTerminal {
                id: session_id,
                status: session.overall_status,
            }
            .into());
        }

        handle.cancelled.store(true, Ordering::SeqCst);
        let now = chrono::Utc::now();
        for task in &mut session.tasks {
            if matches!(task.status, TaskStatus::Pending | TaskStatus::Ready) {
                task.status = TaskStatus::Skipped;
                task.finished_at = Some(now);
            }
        }
        session.overall_status = SessionStatus::Cancelled;
        session.updated_at = now;

        let snapshot = session.snapshot();
        drop(session);

        handle.status_tx.send_replace(SessionStatus::Cancelled);
        if let Err(e) = self.inner.store.save(&snapshot).await {
            return Err(OrchestratorError::Storage(e.to_string()));
        }

        info!(session_id = %session_id, "session cancelled");
        Ok(())
    }

    async fn handle(&self, session_id: SessionId) -> Result<Arc<SessionHandle>, SessionError> {
        self.inner
            .sessions
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(SessionError::UnknownSession(session_id))
    }

    async fn wait_for_terminal(&self, handle: &SessionHandle) {
        let mut rx = handle.status_tx.subscribe();
        loop {
            if rx.borrow().is_terminal() {
                return;
            }
            // The sender lives as long as the handle, but tolerate a drop.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

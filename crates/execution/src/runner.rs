//! The session drive loop.
//!
//! Dispatch is a non-blocking fan-out: every task whose dependencies are
//! satisfied is spawned onto a `JoinSet`, and the loop then waits for the
//! next completion. All session mutation happens under the per-session
//! mutex, and the snapshot is persisted before the lock is released, which
//! publishes a Completed status atomically with its output.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use swarmforge_agents::Agent;
use swarmforge_core::{
    AgentError, ExecutionSession, SessionId, SessionStatus, TaskId, TaskStatus, ValueMap,
};

use crate::orchestrator::{Inner, SessionHandle};

type TaskOutcome = (TaskId, Result<ValueMap, AgentError>);

pub(crate) async fn drive(inner: Arc<Inner>, handle: Arc<SessionHandle>, session_id: SessionId) {
    let deadline = inner
        .config
        .max_runtime
        .map(|d| tokio::time::Instant::now() + d);
    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();

    loop {
        // Dispatch pass, under the session lock.
        {
            let mut session = handle.session.lock().await;
            let cancelled = handle.cancelled.load(Ordering::SeqCst);
            let mut dispatched = 0usize;

            if !cancelled {
                propagate_skips(&mut session);
                promote_ready(&mut session);

                let ready: Vec<TaskId> = session
                    .tasks
                    .iter()
                    .filter(|t| t.status == TaskStatus::Ready)
                    .map(|t| t.id)
                    .collect();

                for task_id in ready {
                    let Some(agent) = handle.agents.get(&task_id).cloned() else {
                        // Agents were resolved at session start; a missing
                        // entry means the record was tampered with.
                        continue;
                    };
                    if let Some(task) = session.task_mut(task_id) {
                        task.status = TaskStatus::Running;
                        task.started_at = Some(chrono::Utc::now());
                        debug!(
                            session_id = %session_id,
                            phase = %task.phase,
                            agent_id = %task.agent_id,
                            "dispatching task"
                        );
                        spawn_invoke(&mut join_set, agent, task.inputs.clone(), task.timeout, task_id);
                        dispatched += 1;
                    }
                }

                if session.overall_status == SessionStatus::Initializing {
                    session.overall_status = SessionStatus::Running;
                }
                session.updated_at = chrono::Utc::now();
            }

            // No work in flight and nothing newly dispatched: the session
            // has settled (or was cancelled) and can be finalized.
            if join_set.is_empty() && dispatched == 0 {
                finalize(&mut session, cancelled);
                let status = session.overall_status;
                let snapshot = session.snapshot();
                drop(session);

                persist(&inner, &handle, &snapshot).await;
                handle.status_tx.send_replace(status);
                info!(session_id = %session_id, status = %status, "session finished");
                return;
            }

            let status = session.overall_status;
            let snapshot = session.snapshot();
            drop(session);

            persist(&inner, &handle, &snapshot).await;
            handle.status_tx.send_replace(status);
        }

        // Wait for the next completion, bounded by the session deadline.
        let next = match deadline {
            Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    expire(&handle, &mut join_set, session_id).await;
                    continue;
                }
            },
            None => join_set.join_next().await,
        };

        match next {
            Some(Ok((task_id, result))) => {
                apply_result(&inner, &handle, session_id, task_id, result).await;
            }
            Some(Err(join_err)) => {
                // A panicked agent task; its record is settled in finalize.
                warn!(session_id = %session_id, error = %join_err, "agent task aborted");
            }
            None => {
                // Join set drained; loop back to dispatch or finalize.
            }
        }
    }
}

/// Apply one task outcome: record the terminal status, and on success merge
/// the output into every dependent's inputs. After cancellation the task's
/// own status is still recorded, but its output no longer feeds dispatch.
async fn apply_result(
    inner: &Inner,
    handle: &SessionHandle,
    session_id: SessionId,
    task_id: TaskId,
    result: Result<ValueMap, AgentError>,
) {
    let mut session = handle.session.lock().await;
    let cancelled = handle.cancelled.load(Ordering::SeqCst);
    let now = chrono::Utc::now();

    match result {
        Ok(output) => {
            let phase = match session.task_mut(task_id) {
                Some(task) => {
                    task.status = TaskStatus::Completed;
                    task.output = Some(output.clone());
                    task.finished_at = Some(now);
                    debug!(session_id = %session_id, phase = %task.phase, "task completed");
                    task.phase.clone()
                }
                None => return,
            };
            if !cancelled {
                merge_into_dependents(&mut session, task_id, &phase, &output);
            }
        }
        Err(err) => {
            if let Some(task) = session.task_mut(task_id) {
                task.status = TaskStatus::Failed;
                warn!(
                    session_id = %session_id,
                    phase = %task.phase,
                    reason = err.reason_code(),
                    "task failed"
                );
                task.error = Some(err);
                task.finished_at = Some(now);
            }
            if !cancelled {
                propagate_skips(&mut session);
            }
        }
    }

    session.updated_at = now;
    let snapshot = session.snapshot();
    drop(session);
    persist(inner, handle, &snapshot).await;
}

/// Merge a completed dependency's output into each dependent: key-by-key
/// into the flat input mapping, plus the whole map under the phase name so
/// one upstream phase can be addressed unambiguously.
fn merge_into_dependents(
    session: &mut ExecutionSession,
    task_id: TaskId,
    phase: &str,
    output: &ValueMap,
) {
    for task in &mut session.tasks {
        if task.depends_on.contains(&task_id) && !task.is_terminal() {
            for (key, value) in output {
                task.inputs.insert(key.clone(), value.clone());
            }
            task.inputs
                .insert(phase.to_string(), serde_json::Value::Object(output.clone()));
        }
    }
}

/// Promote every task whose dependencies are all Completed to Ready.
fn promote_ready(session: &mut ExecutionSession) {
    let promotable: Vec<TaskId> = session
        .tasks
        .iter()
        .filter(|t| {
            t.status == TaskStatus::Pending
                && t.depends_on.iter().all(|dep| {
                    session
                        .task(*dep)
                        .map(|d| d.status == TaskStatus::Completed)
                        .unwrap_or(false)
                })
        })
        .map(|t| t.id)
        .collect();
    for task_id in promotable {
        if let Some(task) = session.task_mut(task_id) {
            task.status = TaskStatus::Ready;
        }
    }
}

/// Abort-dependents policy: any task waiting on a failed or skipped
/// dependency is itself skipped, transitively.
fn propagate_skips(session: &mut ExecutionSession) {
    let now = chrono::Utc::now();
    loop {
        let doomed: Vec<TaskId> = session
            .tasks
            .iter()
            .filter(|t| {
                matches!(t.status, TaskStatus::Pending | TaskStatus::Ready)
                    && t.depends_on.iter().any(|dep| {
                        session
                            .task(*dep)
                            .map(|d| matches!(d.status, TaskStatus::Failed | TaskStatus::Skipped))
                            .unwrap_or(false)
                    })
            })
            .map(|t| t.id)
            .collect();

        if doomed.is_empty() {
            return;
        }
        for task_id in doomed {
            if let Some(task) = session.task_mut(task_id) {
                task.status = TaskStatus::Skipped;
                task.finished_at = Some(now);
            }
        }
    }
}

/// Settle any non-terminal task and compute the session's terminal status.
fn finalize(session: &mut ExecutionSession, cancelled: bool) {
    let now = chrono::Utc::now();
    for task in &mut session.tasks {
        match task.status {
            TaskStatus::Running => {
                // Abandoned in-flight work: deadline expiry or a panicked
                // agent task.
                task.status = TaskStatus::Failed;
                task.error = Some(AgentError::Cancelled);
                task.finished_at = Some(now);
            }
            TaskStatus::Pending | TaskStatus::Ready => {
                task.status = TaskStatus::Skipped;
                task.finished_at = Some(now);
            }
            _ => {}
        }
    }

    session.overall_status = if cancelled {
        SessionStatus::Cancelled
    } else if session
        .tasks
        .iter()
        .any(|t| !t.optional && matches!(t.status, TaskStatus::Failed | TaskStatus::Skipped))
    {
        SessionStatus::Failed
    } else {
        SessionStatus::Completed
    };
    session.updated_at = now;
}

/// Session deadline hit: stop dispatch, abandon in-flight tasks, and drain
/// the join set discarding late results.
async fn expire(handle: &SessionHandle, join_set: &mut JoinSet<TaskOutcome>, session_id: SessionId) {
    warn!(session_id = %session_id, "session exceeded max_runtime; cancelling");
    handle.cancelled.store(true, Ordering::SeqCst);
    join_set.abort_all();
    while join_set.join_next().await.is_some() {
        // Late results are discarded, not applied.
    }
}

fn spawn_invoke(
    join_set: &mut JoinSet<TaskOutcome>,
    agent: Arc<dyn Agent>,
    inputs: ValueMap,
    timeout: Option<Duration>,
    task_id: TaskId,
) {
    join_set.spawn(async move {
        let fut = agent.invoke(inputs);
        let result = match timeout {
            Some(bound) => match tokio::time::timeout(bound, fut).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Timeout),
            },
            None => fut.await,
        };
        (task_id, result)
    });
}

/// Persist a snapshot, honoring a cancellation another process made
/// durable: a Cancelled snapshot in the store is never overwritten by a
/// non-terminal one, and observing it flips this session's cancelled flag
/// so dispatch stops.
async fn persist(inner: &Inner, handle: &SessionHandle, snapshot: &swarmforge_core::SessionSnapshot) {
    if !snapshot.overall_status.is_terminal() {
        if let Ok(Some(stored)) = inner.store.load(snapshot.session_id).await {
            if stored.overall_status == SessionStatus::Cancelled {
                warn!(
                    session_id = %snapshot.session_id,
                    "session cancelled externally; stopping dispatch"
                );
                handle.cancelled.store(true, Ordering::SeqCst);
                return;
            }
        }
    }
    if let Err(e) = inner.store.save(snapshot).await {
        error!(session_id = %snapshot.session_id, error = %e, "failed to persist snapshot");
    }
}

//! End-to-end scheduler behavior over scripted agents and an in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use swarmforge_agents::{Agent, AgentRegistry, FnAgent};
use swarmforge_core::{
    AgentError, ConfigurationError, OrchestratorError, SessionError, SessionStatus, TaskStatus,
    ValueMap,
};
use swarmforge_execution::{Orchestrator, OrchestratorConfig};
use swarmforge_storage::{MemorySessionStore, SessionStore};
use swarmforge_workflow::{PhaseSpec, WorkflowDefinition, WorkflowRegistry};

/// Records the inputs it was invoked with and returns a fixed output.
struct ScriptedAgent {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    seen: Arc<Mutex<Vec<ValueMap>>>,
    result: Result<ValueMap, AgentError>,
}

#[async_trait::async_trait]
impl Agent for ScriptedAgent {
    async fn invoke(&self, inputs: ValueMap) -> Result<ValueMap, AgentError> {
        self.log.lock().unwrap().push(self.name.to_string());
        self.seen.lock().unwrap().push(inputs);
        self.result.clone()
    }
}

struct SleepAgent {
    duration: Duration,
}

#[async_trait::async_trait]
impl Agent for SleepAgent {
    async fn invoke(&self, _inputs: ValueMap) -> Result<ValueMap, AgentError> {
        tokio::time::sleep(self.duration).await;
        Ok(ValueMap::new())
    }
}

fn output(key: &str, value: &str) -> ValueMap {
    let mut map = ValueMap::new();
    map.insert(key.to_string(), serde_json::json!(value));
    map
}

struct Harness {
    log: Arc<Mutex<Vec<String>>>,
    seen: Arc<Mutex<Vec<ValueMap>>>,
    agents: AgentRegistry,
}

impl Harness {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
            agents: AgentRegistry::new(),
        }
    }

    fn script(&mut self, name: &'static str, result: Result<ValueMap, AgentError>) {
        let agent = ScriptedAgent {
            name,
            log: Arc::clone(&self.log),
            seen: Arc::clone(&self.seen),
            result,
        };
        self.agents.register(name, Arc::new(agent)).unwrap();
    }

    fn take_agents(&mut self) -> AgentRegistry {
        std::mem::take(&mut self.agents)
    }

    fn invocations(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn pipeline() -> WorkflowDefinition {
    WorkflowDefinition::new("pipeline", "Pipeline", "research, plan, develop")
        .phase(PhaseSpec::new("research", "research"))
        .phase(PhaseSpec::new("planning", "planning").depends_on(["research"]))
        .phase(PhaseSpec::new("development", "development").depends_on(["planning"]))
}

fn orchestrator(agents: AgentRegistry, workflow: WorkflowDefinition) -> Orchestrator {
    let mut workflows = WorkflowRegistry::new();
    workflows.register(workflow).unwrap();
    Orchestrator::new(agents, workflows, Arc::new(MemorySessionStore::new()))
}

#[tokio::test]
async fn linear_pipeline_runs_in_order() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "three crates surveyed")));
    harness.script("planning", Ok(output("plan", "two milestones")));
    harness.script("development", Ok(output("artifact", "src/main.rs")));

    let orch = orchestrator(harness.take_agents(), pipeline());

    let session_id = orch
        .start_session("pipeline", "build a CLI calculator", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Completed);
    assert_eq!(
        harness.invocations(),
        vec!["research", "planning", "development"]
    );
    assert_eq!(snapshot.counts.completed, 3);
    assert_eq!(snapshot.counts.in_progress, 0);

    // Outputs of every completed phase are aggregated by phase name.
    assert_eq!(
        snapshot.aggregated_output["research"]["findings"],
        serde_json::json!("three crates surveyed")
    );
    assert_eq!(
        snapshot.aggregated_output["development"]["artifact"],
        serde_json::json!("src/main.rs")
    );
}

#[tokio::test]
async fn dependency_outputs_merge_into_dependent_inputs() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "three crates surveyed")));
    harness.script("planning", Ok(output("plan", "two milestones")));
    harness.script("development", Ok(output("artifact", "src/main.rs")));

    let seen = Arc::clone(&harness.seen);
    let orch = orchestrator(harness.take_agents(), pipeline());

    let session_id = orch
        .start_session("pipeline", "build a CLI calculator", ValueMap::new(), None)
        .await
        .unwrap();
    orch.run(session_id, true).await.unwrap();

    let seen = seen.lock().unwrap();
    // research sees only the seeded inputs
    assert_eq!(seen[0]["goal"], serde_json::json!("build a CLI calculator"));
    assert!(!seen[0].contains_key("findings"));
    // planning sees research's output, flat and under the phase name
    assert_eq!(seen[1]["findings"], serde_json::json!("three crates surveyed"));
    assert_eq!(
        seen[1]["research"]["findings"],
        serde_json::json!("three crates surveyed")
    );
    // development sees planning's output but was never a dependent of research
    assert_eq!(seen[2]["plan"], serde_json::json!("two milestones"));
    assert!(!seen[2].contains_key("research"));
}

#[tokio::test]
async fn forward_declared_dependency_still_orders_execution() {
    // A phase may depend on a phase declared after it; the edge must bind
    // all the same.
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "three crates surveyed")));
    harness.script("planning", Ok(output("plan", "two milestones")));

    let workflow = WorkflowDefinition::new("fwd", "Forward", "dependent declared first")
        .phase(PhaseSpec::new("planning", "planning").depends_on(["research"]))
        .phase(PhaseSpec::new("research", "research"));
    let seen = Arc::clone(&harness.seen);
    let orch = orchestrator(harness.take_agents(), workflow);

    let session_id = orch
        .start_session("fwd", "build a CLI calculator", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Completed);
    assert_eq!(harness.invocations(), vec!["research", "planning"]);

    // The dependent still received the dependency's output.
    let seen = seen.lock().unwrap();
    assert_eq!(seen[1]["findings"], serde_json::json!("three crates surveyed"));
}

#[tokio::test]
async fn failed_task_skips_dependents_and_fails_session() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "three crates surveyed")));
    harness.script(
        "planning",
        Err(AgentError::ExternalServiceError("provider unreachable".into())),
    );
    harness.script("development", Ok(output("artifact", "src/main.rs")));

    let orch = orchestrator(harness.take_agents(), pipeline());

    let session_id = orch
        .start_session("pipeline", "build a CLI calculator", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Failed);
    assert_eq!(harness.invocations(), vec!["research", "planning"]);

    let failure = snapshot.first_failure().unwrap();
    assert_eq!(failure.phase, "planning");
    assert_eq!(
        failure.error,
        Some(AgentError::ExternalServiceError("provider unreachable".into()))
    );

    let development = snapshot
        .tasks
        .iter()
        .find(|t| t.phase == "development")
        .unwrap();
    assert_eq!(development.status, TaskStatus::Skipped);

    // Completed work upstream of the failure is retained.
    assert_eq!(
        snapshot.aggregated_output["research"]["findings"],
        serde_json::json!("three crates surveyed")
    );
}

#[tokio::test]
async fn optional_failure_does_not_fail_session() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "ok")));
    harness.script(
        "linting",
        Err(AgentError::ExternalServiceError("linter crashed".into())),
    );

    let workflow = WorkflowDefinition::new("lenient", "Lenient", "optional side phase")
        .phase(PhaseSpec::new("research", "research"))
        .phase(PhaseSpec::new("linting", "linting").optional());
    let orch = orchestrator(harness.agents, workflow);

    let session_id = orch
        .start_session("lenient", "survey parsers", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Completed);
    assert_eq!(snapshot.counts.failed, 1);
}

#[tokio::test]
async fn diamond_fans_out_concurrently() {
    // Both branch agents block on one barrier; the session can only finish
    // if they are in flight at the same time.
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    struct BarrierAgent {
        barrier: Arc<tokio::sync::Barrier>,
        key: &'static str,
    }

    #[async_trait::async_trait]
    impl Agent for BarrierAgent {
        async fn invoke(&self, _inputs: ValueMap) -> Result<ValueMap, AgentError> {
            self.barrier.wait().await;
            let mut out = ValueMap::new();
            out.insert(self.key.to_string(), serde_json::json!(true));
            Ok(out)
        }
    }

    let mut agents = AgentRegistry::new();
    agents
        .register("root", Arc::new(FnAgent::new(|_: &ValueMap| Ok(ValueMap::new()))))
        .unwrap();
    agents
        .register(
            "left",
            Arc::new(BarrierAgent {
                barrier: Arc::clone(&barrier),
                key: "left_done",
            }),
        )
        .unwrap();
    agents
        .register(
            "right",
            Arc::new(BarrierAgent {
                barrier,
                key: "right_done",
            }),
        )
        .unwrap();
    agents
        .register("join", Arc::new(FnAgent::new(|inputs: &ValueMap| {
            let mut out = ValueMap::new();
            out.insert(
                "both".into(),
                serde_json::json!(
                    inputs.contains_key("left_done") && inputs.contains_key("right_done")
                ),
            );
            Ok(out)
        })))
        .unwrap();

    let workflow = WorkflowDefinition::new("diamond", "Diamond", "fan out and join")
        .phase(PhaseSpec::new("root", "root"))
        .phase(PhaseSpec::new("left", "left").depends_on(["root"]))
        .phase(PhaseSpec::new("right", "right").depends_on(["root"]))
        .phase(PhaseSpec::new("join", "join").depends_on(["left", "right"]));
    let orch = orchestrator(agents, workflow);

    let session_id = orch
        .start_session("diamond", "exercise the graph", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Completed);
    assert_eq!(
        snapshot.aggregated_output["join"]["both"],
        serde_json::json!(true)
    );
}

#[tokio::test]
async fn cancellation_skips_tasks_not_yet_running() {
    let mut agents = AgentRegistry::new();
    agents
        .register(
            "slow",
            Arc::new(SleepAgent {
                duration: Duration::from_secs(30),
            }),
        )
        .unwrap();
    agents
        .register("after", Arc::new(FnAgent::new(|_: &ValueMap| Ok(ValueMap::new()))))
        .unwrap();

    let workflow = WorkflowDefinition::new("slowflow", "Slow", "slow then after")
        .phase(PhaseSpec::new("slow", "slow"))
        .phase(PhaseSpec::new("after", "after").depends_on(["slow"]));
    let orch = orchestrator(agents, workflow);

    let session_id = orch
        .start_session("slowflow", "never finishes", ValueMap::new(), None)
        .await
        .unwrap();
    orch.run(session_id, false).await.unwrap();

    // Give the drive loop a chance to dispatch the first task.
    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.cancel(session_id).await.unwrap();

    let snapshot = orch.status(session_id).await.unwrap();
    assert_eq!(snapshot.overall_status, SessionStatus::Cancelled);
    let after = snapshot.tasks.iter().find(|t| t.phase == "after").unwrap();
    assert_eq!(after.status, TaskStatus::Skipped);

    // Cancelling twice is a lifecycle error.
    let err = orch.cancel(session_id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Session(SessionError::AlreadyTerminal { .. })
    ));
}

#[tokio::test]
async fn externally_cancelled_snapshot_stops_dispatch() {
    // A separate process can only cancel by rewriting the durable
    // snapshot; the scheduler must observe that instead of overwriting it.
    let store = Arc::new(MemorySessionStore::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut agents = AgentRegistry::new();
    agents
        .register(
            "slow",
            Arc::new(SleepAgent {
                duration: Duration::from_millis(200),
            }),
        )
        .unwrap();
    agents
        .register(
            "after",
            Arc::new(ScriptedAgent {
                name: "after",
                log: Arc::clone(&log),
                seen: Arc::new(Mutex::new(Vec::new())),
                result: Ok(ValueMap::new()),
            }),
        )
        .unwrap();

    let workflow = WorkflowDefinition::new("ext", "External", "slow then after")
        .phase(PhaseSpec::new("slow", "slow"))
        .phase(PhaseSpec::new("after", "after").depends_on(["slow"]));
    let mut workflows = WorkflowRegistry::new();
    workflows.register(workflow).unwrap();
    let orch = Orchestrator::new(agents, workflows, Arc::clone(&store) as Arc<dyn SessionStore>);

    let session_id = orch
        .start_session("ext", "cancel me from outside", ValueMap::new(), None)
        .await
        .unwrap();
    orch.run(session_id, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut snapshot = store.load(session_id).await.unwrap().unwrap();
    snapshot.overall_status = SessionStatus::Cancelled;
    store.save(&snapshot).await.unwrap();

    // Wait for the scheduler to settle every task.
    let mut last = store.load(session_id).await.unwrap().unwrap();
    for _ in 0..100 {
        if last.overall_status.is_terminal() && last.counts.in_progress == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        last = store.load(session_id).await.unwrap().unwrap();
    }

    // The cancel survived and the dependent was never dispatched.
    assert_eq!(last.overall_status, SessionStatus::Cancelled);
    assert_eq!(last.counts.in_progress, 0);
    assert!(log.lock().unwrap().is_empty());
    let after = last.tasks.iter().find(|t| t.phase == "after").unwrap();
    assert_eq!(after.status, TaskStatus::Skipped);
}

#[tokio::test]
async fn per_task_timeout_fails_the_task() {
    let mut agents = AgentRegistry::new();
    agents
        .register(
            "slow",
            Arc::new(SleepAgent {
                duration: Duration::from_secs(30),
            }),
        )
        .unwrap();

    let workflow = WorkflowDefinition::new("timed", "Timed", "bounded phase").phase(
        PhaseSpec::new("slow", "slow").timeout(Duration::from_millis(20)),
    );
    let orch = orchestrator(agents, workflow);

    let session_id = orch
        .start_session("timed", "bounded work", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Failed);
    let failure = snapshot.first_failure().unwrap();
    assert_eq!(failure.phase, "slow");
    assert_eq!(failure.error, Some(AgentError::Timeout));
}

#[tokio::test]
async fn session_deadline_cancels_the_run() {
    let mut agents = AgentRegistry::new();
    agents
        .register(
            "slow",
            Arc::new(SleepAgent {
                duration: Duration::from_secs(30),
            }),
        )
        .unwrap();

    let workflow =
        WorkflowDefinition::new("unbounded", "Unbounded", "no per-task timeout")
            .phase(PhaseSpec::new("slow", "slow"));
    let mut workflows = WorkflowRegistry::new();
    workflows.register(workflow).unwrap();
    let orch = Orchestrator::new(agents, workflows, Arc::new(MemorySessionStore::new()))
        .with_config(OrchestratorConfig {
            max_runtime: Some(Duration::from_millis(50)),
        });

    let session_id = orch
        .start_session("unbounded", "runs too long", ValueMap::new(), None)
        .await
        .unwrap();
    let snapshot = orch.run(session_id, true).await.unwrap().unwrap();

    assert_eq!(snapshot.overall_status, SessionStatus::Cancelled);
    let slow = snapshot.tasks.iter().find(|t| t.phase == "slow").unwrap();
    assert_eq!(slow.status, TaskStatus::Failed);
    assert_eq!(slow.error, Some(AgentError::Cancelled));
}

#[tokio::test]
async fn background_run_is_pollable_until_terminal() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "ok")));

    let workflow = WorkflowDefinition::new("bg", "Background", "one phase")
        .phase(PhaseSpec::new("research", "research"));
    let orch = orchestrator(harness.agents, workflow);

    let session_id = orch
        .start_session("bg", "survey parsers", ValueMap::new(), None)
        .await
        .unwrap();
    let immediate = orch.run(session_id, false).await.unwrap();
    assert!(immediate.is_none());

    let mut last = orch.status(session_id).await.unwrap();
    for _ in 0..100 {
        if last.overall_status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        last = orch.status(session_id).await.unwrap();
    }
    assert_eq!(last.overall_status, SessionStatus::Completed);
    assert_eq!(last.counts.completed, 1);
}

#[tokio::test]
async fn start_session_fails_fast_on_unknown_references() {
    let harness = Harness::new();
    let store: Arc<MemorySessionStore> = Arc::new(MemorySessionStore::new());
    let mut workflows = WorkflowRegistry::new();
    workflows.register(pipeline()).unwrap();
    let orch = Orchestrator::new(harness.agents, workflows, Arc::clone(&store) as Arc<dyn SessionStore>);

    let err = orch
        .start_session("nonexistent", "goal", ValueMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::UnknownWorkflow(_))
    ));

    // The pipeline exists but none of its agents are registered.
    let err = orch
        .start_session("pipeline", "goal", ValueMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Configuration(ConfigurationError::UnknownAgent(_))
    ));

    // Nothing was persisted for either attempt.
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn run_on_terminal_session_is_rejected() {
    let mut harness = Harness::new();
    harness.script("research", Ok(output("findings", "ok")));

    let workflow = WorkflowDefinition::new("once", "Once", "one phase")
        .phase(PhaseSpec::new("research", "research"));
    let orch = orchestrator(harness.agents, workflow);

    let session_id = orch
        .start_session("once", "survey parsers", ValueMap::new(), None)
        .await
        .unwrap();
    orch.run(session_id, true).await.unwrap();

    let err = orch.run(session_id, true).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Session(SessionError::AlreadyTerminal { .. })
    ));
}

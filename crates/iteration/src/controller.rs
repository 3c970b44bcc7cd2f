//! The lineage state machine: run a pass, evaluate, continue or stop.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use swarmforge_agents::InvokeResult;
use swarmforge_core::{
    AgentError, CompletionStrategy, IterationConfig, IterationPolicyError, IterationState,
    OrchestratorError, SessionId, SessionStatus, ValueMap,
};
use swarmforge_execution::Orchestrator;

use crate::verdict::AnalysisVerdict;

/// Configuration for one iteration lineage.
#[derive(Debug, Clone)]
pub struct LineageConfig {
    /// Workflow every pass instantiates
    pub workflow_id: String,

    /// Goal of the first pass; later passes use the evolved goal
    pub goal: String,

    /// Context shared by every pass
    pub context: ValueMap,

    /// Registry id of the analysis capability consulted after each pass
    pub analysis_agent_id: String,

    /// Completion policy and bounds
    pub iteration: IterationConfig,

    /// Keep iterating after a Failed pass instead of stopping
    pub continue_past_failure: bool,
}

impl LineageConfig {
    /// Lineage over a workflow with the default (Fixed, 3 passes) policy.
    pub fn new(
        workflow_id: impl Into<String>,
        goal: impl Into<String>,
        analysis_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            goal: goal.into(),
            context: ValueMap::new(),
            analysis_agent_id: analysis_agent_id.into(),
            iteration: IterationConfig::default(),
            continue_past_failure: false,
        }
    }

    /// Attach shared context.
    pub fn context(mut self, context: ValueMap) -> Self {
        self.context = context;
        self
    }

    /// Set the completion policy.
    pub fn iteration(mut self, iteration: IterationConfig) -> Self {
        self.iteration = iteration;
        self
    }

    /// Keep iterating after a Failed pass.
    pub fn continue_past_failure(mut self) -> Self {
        self.continue_past_failure = true;
        self
    }
}

/// One completed pass of a lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassRecord {
    /// 1-based pass number
    pub iteration: u32,

    /// The session this pass ran as
    pub session_id: SessionId,

    /// Goal the pass ran against
    pub goal: String,

    /// Terminal status of the pass's session
    pub status: SessionStatus,

    /// Analysis verdict, absent when the lineage stopped before evaluating
    pub verdict: Option<AnalysisVerdict>,
}

/// Why a lineage stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `iteration_count` reached `max_iterations`
    BudgetExhausted,
    /// The analysis verdict said stop and the strategy trusted it
    AnalysisStop,
    /// The tracked version reached `target_version`
    TargetVersionReached,
    /// A pass ended Failed and the lineage is not configured to continue
    PassFailed,
    /// Continuation was requested without an evolved goal; continuing
    /// without a goal is undefined, so the lineage stops
    MissingEvolvedGoal,
    /// The analysis capability itself failed
    AnalysisFailed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BudgetExhausted => write!(f, "budget exhausted"),
            Self::AnalysisStop => write!(f, "analysis requested stop"),
            Self::TargetVersionReached => write!(f, "target version reached"),
            Self::PassFailed => write!(f, "pass failed"),
            Self::MissingEvolvedGoal => write!(f, "continuation without evolved goal"),
            Self::AnalysisFailed => write!(f, "analysis capability failed"),
        }
    }
}

/// Outcome of a whole lineage. Prior passes are retained whatever the stop
/// reason, so partial work stays inspectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageReport {
    /// Identifier shared by every session of the lineage
    pub lineage_id: String,

    /// Every pass in order
    pub passes: Vec<PassRecord>,

    /// Why the lineage stopped
    pub stop_reason: StopReason,

    /// Error of the analysis capability when `stop_reason` is AnalysisFailed
    pub analysis_error: Option<AgentError>,

    /// Policy violation when `stop_reason` is MissingEvolvedGoal
    pub policy_error: Option<IterationPolicyError>,
}

impl LineageReport {
    /// The last pass, if any ran.
    pub fn last_pass(&self) -> Option<&PassRecord> {
        self.passes.last()
    }
}

/// Runs iteration lineages against an [`Orchestrator`].
///
/// Each pass is a fresh session; the controller owns no session state
/// beyond the in-flight [`IterationState`] it threads through.
pub struct IterationController {
    orchestrator: Orchestrator,
}

impl IterationController {
    /// Wrap an orchestrator.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Run a lineage to its stop condition.
    ///
    /// Configuration errors (unknown workflow, unknown analysis agent)
    /// surface as `Err` before any pass runs; everything after that is
    /// recorded in the report rather than returned as an error.
    pub async fn run(&self, config: LineageConfig) -> Result<LineageReport, OrchestratorError> {
        // Fail fast on a dangling analysis reference.
        self.orchestrator
            .agents()
            .get(&config.analysis_agent_id)
            .map_err(OrchestratorError::Configuration)?;

        let lineage_id = ulid::Ulid::new().to_string();
        let mut state = IterationState::initial(&config.iteration);
        let mut goal = config.goal.clone();
        let mut passes: Vec<PassRecord> = Vec::new();
        let mut analysis_error = None;
        let mut policy_error = None;
        info!(
            lineage_id = %lineage_id,
            workflow_id = %config.workflow_id,
            strategy = %state.completion_strategy,
            "lineage started"
        );

        let stop_reason = loop {
            let pass_number = state.iteration_count + 1;
            let mut context = config.context.clone();
            context.insert("lineage_id".into(), serde_json::json!(lineage_id));
            context.insert("iteration".into(), serde_json::json!(pass_number));

            let session_id = self
                .orchestrator
                .start_session(&config.workflow_id, &goal, context, Some(state.clone()))
                .await?;
            let snapshot = match self.orchestrator.run(session_id, true).await? {
                Some(snapshot) => snapshot,
                None => self.orchestrator.status(session_id).await?,
            };
            state.iteration_count = pass_number;

            let mut pass = PassRecord {
                iteration: pass_number,
                session_id,
                goal: goal.clone(),
                status: snapshot.overall_status,
                verdict: None,
            };

            if snapshot.overall_status != SessionStatus::Completed && !config.continue_past_failure
            {
                warn!(
                    lineage_id = %lineage_id,
                    iteration = pass_number,
                    status = %snapshot.overall_status,
                    "pass did not complete; stopping lineage"
                );
                passes.push(pass);
                break StopReason::PassFailed;
            }

            // Evaluating: consult the analysis capability.
            let verdict = match self
                .evaluate(&config.analysis_agent_id, &goal, &snapshot.aggregated_output, &state)
                .await?
            {
                Ok(verdict) => verdict,
                Err(err) => {
                    warn!(
                        lineage_id = %lineage_id,
                        iteration = pass_number,
                        reason = err.reason_code(),
                        "analysis capability failed; stopping lineage"
                    );
                    analysis_error = Some(err);
                    passes.push(pass);
                    break StopReason::AnalysisFailed;
                }
            };

            if state.adaptive {
                if let Some(revised) = verdict.revised_max_iterations {
                    let effective = state.revise_max_iterations(revised);
                    warn!(
                        lineage_id = %lineage_id,
                        requested = revised,
                        effective,
                        "analysis revised the iteration bound"
                    );
                }
            }
            state.should_continue = verdict.should_continue;
            state.evolved_goal = verdict.evolved_goal.clone();
            pass.verdict = Some(verdict.clone());
            passes.push(pass);

            if let Some(reason) = decide(&state, &verdict, config.iteration.target_version.as_deref())
            {
                info!(lineage_id = %lineage_id, iteration = pass_number, reason = %reason, "lineage stopped");
                break reason;
            }

            // Continue: the next pass runs against the evolved goal. A
            // strategy that keeps going despite a stop verdict reuses the
            // current goal.
            match state.evolved_goal.clone() {
                Some(next_goal) => goal = next_goal,
                None if verdict.should_continue => {
                    let err = IterationPolicyError::MissingEvolvedGoal;
                    warn!(
                        lineage_id = %lineage_id,
                        iteration = pass_number,
                        error = %err,
                        "stopping lineage"
                    );
                    policy_error = Some(err);
                    break StopReason::MissingEvolvedGoal;
                }
                None => {
                    debug!(lineage_id = %lineage_id, "no evolved goal; reusing current goal");
                }
            }
        };

        Ok(LineageReport {
            lineage_id,
            passes,
            stop_reason,
            analysis_error,
            policy_error,
        })
    }

    /// Invoke the analysis capability with the last pass's aggregated
    /// output and the current iteration state.
    async fn evaluate(
        &self,
        analysis_agent_id: &str,
        goal: &str,
        aggregated_output: &ValueMap,
        state: &IterationState,
    ) -> Result<Result<AnalysisVerdict, AgentError>, OrchestratorError> {
        let mut inputs = ValueMap::new();
        inputs.insert("goal".into(), serde_json::json!(goal));
        inputs.insert(
            "aggregated_output".into(),
            serde_json::Value::Object(aggregated_output.clone()),
        );
        inputs.insert(
            "iteration_state".into(),
            serde_json::to_value(state).unwrap_or(serde_json::Value::Null),
        );

        match self
            .orchestrator
            .agents()
            .invoke(analysis_agent_id, inputs)
            .await
        {
            InvokeResult::Agent(Ok(output)) => Ok(Ok(AnalysisVerdict::from_output(&output))),
            InvokeResult::Agent(Err(err)) => Ok(Err(err)),
            InvokeResult::Configuration(err) => Err(OrchestratorError::Configuration(err)),
        }
    }
}

/// Apply the completion strategy on top of the analysis verdict. `None`
/// means the lineage continues.
fn decide(
    state: &IterationState,
    verdict: &AnalysisVerdict,
    target_version: Option<&str>,
) -> Option<StopReason> {
    match state.completion_strategy {
        // Fixed runs the full budget regardless of the verdict.
        CompletionStrategy::Fixed => state
            .budget_exhausted()
            .then_some(StopReason::BudgetExhausted),
        // Smart trusts the verdict; the budget is a safety bound.
        CompletionStrategy::Smart => {
            if !verdict.should_continue {
                Some(StopReason::AnalysisStop)
            } else if state.budget_exhausted() {
                Some(StopReason::BudgetExhausted)
            } else {
                None
            }
        }
        // VersionDriven stops at the target regardless of the verdict.
        CompletionStrategy::VersionDriven => {
            if target_version.is_some_and(|target| verdict.version_reached(target)) {
                Some(StopReason::TargetVersionReached)
            } else if state.budget_exhausted() {
                Some(StopReason::BudgetExhausted)
            } else {
                None
            }
        }
    }
}

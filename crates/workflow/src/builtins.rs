//! Built-in workflow variants.
//!
//! Five shapes are representable without any change to the scheduler: the
//! linear standard pipeline, the two single-track variants, and the two
//! analysis-wrapped improvement loops used by iterative builds.

use serde_json::json;

use swarmforge_core::{ConfigurationError, ValueMap};

use crate::{PhaseSpec, WorkflowDefinition, WorkflowRegistry};

/// Agent identifiers the built-in workflows bind to.
pub const RESEARCH_AGENT: &str = "research";
/// Planning capability.
pub const PLANNING_AGENT: &str = "planning";
/// Development capability.
pub const DEVELOPMENT_AGENT: &str = "development";
/// Documentation capability.
pub const DOCUMENTATION_AGENT: &str = "documentation";
/// Analysis capability, also used by the iteration controller.
pub const ANALYSIS_AGENT: &str = "analysis";

fn data(value: serde_json::Value) -> ValueMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ValueMap::new(),
    }
}

/// research -> planning -> development -> documentation.
pub fn standard_project() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "standard_project",
        "Standard Project Workflow",
        "Standard workflow for project development with research, planning, development, and documentation phases.",
    )
    .phase(PhaseSpec::new("research", RESEARCH_AGENT).data(data(json!({
        "topic": "project_goal",
        "depth": "medium",
        "focus_areas": ["technologies", "best_practices", "similar_projects"],
    }))))
    .phase(
        PhaseSpec::new("planning", PLANNING_AGENT)
            .depends_on(["research"])
            .data(data(json!({
                "planning_depth": "detailed",
                "include_architecture": true,
                "include_timeline": true,
            }))),
    )
    .phase(
        PhaseSpec::new("development", DEVELOPMENT_AGENT)
            .depends_on(["planning"])
            .data(data(json!({
                "implementation_style": "modular",
                "include_tests": true,
                "code_quality": "high",
            }))),
    )
    .phase(
        PhaseSpec::new("documentation", DOCUMENTATION_AGENT)
            .depends_on(["development"])
            .data(data(json!({
                "include_user_guide": true,
                "include_api_docs": true,
                "include_examples": true,
            }))),
    )
}

/// A single deep research phase, no implementation.
pub fn research_only() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "research_only",
        "Research Only Workflow",
        "Workflow for conducting research without implementation.",
    )
    .phase(PhaseSpec::new("research", RESEARCH_AGENT).data(data(json!({
        "topic": "project_goal",
        "depth": "deep",
        "focus_areas": [
            "technologies",
            "best_practices",
            "similar_projects",
            "academic_papers",
            "industry_trends",
        ],
    }))))
}

/// development -> documentation, assuming research and planning exist.
pub fn development_only() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "development_only",
        "Development Only Workflow",
        "Workflow for implementing a project with existing research and planning.",
    )
    .phase(PhaseSpec::new("development", DEVELOPMENT_AGENT).data(data(json!({
        "implementation_style": "modular",
        "include_tests": true,
        "code_quality": "high",
    }))))
    .phase(
        PhaseSpec::new("documentation", DOCUMENTATION_AGENT)
            .depends_on(["development"])
            .data(data(json!({
                "include_user_guide": true,
                "include_api_docs": true,
                "include_examples": true,
            }))),
    )
}

/// Continuous improvement loop with no built-in bound; pairs with an
/// unbounded Smart completion strategy so the analysis verdict is the only
/// exit condition.
pub fn indefinite() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "indefinite",
        "Indefinite Improvement Workflow",
        "Continuously analyzes and improves the project until stopped.",
    )
    .phase(PhaseSpec::new("initial_analysis", ANALYSIS_AGENT).data(data(json!({
        "analysis_depth": "comprehensive",
    }))))
    .phase(
        PhaseSpec::new("improvement_planning", PLANNING_AGENT)
            .depends_on(["initial_analysis"])
            .data(data(json!({
                "planning_type": "improvement",
                "use_analysis_results": true,
                "focus_on_incremental": true,
            }))),
    )
    .phase(
        PhaseSpec::new("improvement_implementation", DEVELOPMENT_AGENT)
            .depends_on(["improvement_planning"])
            .data(data(json!({
                "implementation_style": "incremental",
                "preserve_existing": true,
                "focus_on_improvements": true,
            }))),
    )
    .phase(
        PhaseSpec::new("iteration_analysis", ANALYSIS_AGENT)
            .depends_on(["improvement_implementation"])
            .data(data(json!({
                "analysis_depth": "focused",
                "check_continue": true,
            }))),
    )
}

/// Analysis-wrapped improvement pass with a completion-evaluation tail.
pub fn iteration() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "iteration",
        "Iteration Workflow",
        "Iteration workflow with completion strategies and parameter-aware phases.",
    )
    .phase(PhaseSpec::new("enhanced_analysis", ANALYSIS_AGENT).data(data(json!({
        "analysis_depth": "comprehensive",
        "focus_on_existing": true,
        "analyze_architecture": true,
        "identify_pain_points": true,
    }))))
    .phase(
        PhaseSpec::new("strategic_planning", PLANNING_AGENT)
            .depends_on(["enhanced_analysis"])
            .data(data(json!({
                "planning_type": "strategic_iteration",
                "use_analysis_results": true,
                "preserve_functionality": true,
                "plan_incremental_steps": true,
            }))),
    )
    .phase(
        PhaseSpec::new("smart_implementation", DEVELOPMENT_AGENT)
            .depends_on(["strategic_planning"])
            .data(data(json!({
                "implementation_style": "adaptive",
                "use_planning_results": true,
                "maintain_compatibility": true,
            }))),
    )
    .phase(
        PhaseSpec::new("completion_evaluation", ANALYSIS_AGENT)
            .depends_on(["smart_implementation"])
            .data(data(json!({
                "evaluate_improvements": true,
                "assess_completion_readiness": true,
                "check_continue": true,
            }))),
    )
}

/// All built-in workflow definitions.
pub fn builtin_workflows() -> Vec<WorkflowDefinition> {
    vec![
        standard_project(),
        research_only(),
        development_only(),
        indefinite(),
        iteration(),
    ]
}

/// Register every built-in workflow.
pub fn register_builtins(registry: &mut WorkflowRegistry) -> Result<(), ConfigurationError> {
    for workflow in builtin_workflows() {
        registry.register(workflow)?;
    }
    Ok(())
}

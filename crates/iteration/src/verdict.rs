//! The analysis capability's verdict on whether a lineage should continue.

use serde::{Deserialize, Serialize};

use swarmforge_core::ValueMap;

/// Structured view of the analysis agent's output.
///
/// Unknown keys are ignored and every field except `should_continue` is
/// optional, so a capability may return a richer mapping than the
/// controller consumes. A missing `should_continue` reads as a stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    /// Whether the lineage should run another pass
    #[serde(default)]
    pub should_continue: bool,

    /// Goal text for the next pass; required whenever `should_continue`
    #[serde(default)]
    pub evolved_goal: Option<String>,

    /// Requested new iteration bound, honored only in adaptive mode
    #[serde(default)]
    pub revised_max_iterations: Option<u32>,

    /// Version the work currently sits at, for version-driven lineages
    #[serde(default)]
    pub current_version: Option<String>,

    /// Advisory improvement summary, passed through unchanged
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

impl AnalysisVerdict {
    /// Read a verdict out of an agent output mapping, ignoring extra keys.
    pub fn from_output(output: &ValueMap) -> Self {
        serde_json::from_value(serde_json::Value::Object(output.clone())).unwrap_or_default()
    }

    /// True once `current_version` has caught up with the target.
    ///
    /// Versions compare as dot-separated numeric components; anything
    /// non-numeric falls back to string equality.
    pub fn version_reached(&self, target: &str) -> bool {
        let Some(current) = self.current_version.as_deref() else {
            return false;
        };
        match (parse_version(current), parse_version(target)) {
            (Some(cur), Some(tgt)) => cur >= tgt,
            _ => current == target,
        }
    }
}

fn parse_version(text: &str) -> Option<Vec<u64>> {
    text.split('.').map(|part| part.parse().ok()).collect()
}

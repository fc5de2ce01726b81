//! The Virya (tool synthesis, "forge") pattern: build a live [`Tool`] from a
//! blueprint, gated by a source denylist and a per-invocation wall-clock
//! timeout. Treated as an optional capability outside the core contract —
//! the core only guarantees `addTool`.

use std::sync::Arc;
use std::time::Duration;

use agentlom_core::model::ToolResult;
use agentlom_core::tool::Tool;
use async_trait::async_trait;
use serde_json::Value;

/// Source substrings that always reject a blueprint before it is compiled.
pub const DENYLIST: &[&str] = &["process", "require", "import", "eval", "Function", "fetch"];

#[derive(Debug, Clone)]
pub struct ToolBlueprint {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    pub source: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("blueprint source contains denied substring '{0}'")]
    DeniedSubstring(String),
}

/// Reject a blueprint whose source contains any denylisted substring.
pub fn validate_blueprint(blueprint: &ToolBlueprint) -> Result<(), BlueprintError> {
    for pattern in DENYLIST {
        if blueprint.source.contains(pattern) {
            tracing::warn!(tool = %blueprint.name, pattern, "virya blueprint rejected by denylist");
            return Err(BlueprintError::DeniedSubstring((*pattern).to_string()));
        }
    }
    Ok(())
}

/// The executable behavior a forged tool carries. Real implementations
/// would compile `ToolBlueprint::source` into this; the core contract only
/// requires that whatever backs it runs under `execute_with_timeout`.
pub type ForgedBehavior = Arc<dyn Fn(Value) -> ToolResult + Send + Sync>;

pub struct ForgedTool {
    blueprint: ToolBlueprint,
    behavior: ForgedBehavior,
    timeout: Duration,
}

impl ForgedTool {
    /// Validates `blueprint.source` against the denylist before construction.
    pub fn new(
        blueprint: ToolBlueprint,
        behavior: ForgedBehavior,
        timeout: Duration,
    ) -> Result<Self, BlueprintError> {
        validate_blueprint(&blueprint)?;
        tracing::info!(tool = %blueprint.name, "forged tool accepted");
        Ok(Self {
            blueprint,
            behavior,
            timeout,
        })
    }
}

#[async_trait]
impl Tool for ForgedTool {
    fn name(&self) -> &str {
        &self.blueprint.name
    }

    fn description(&self) -> &str {
        &self.blueprint.description
    }

    fn parameters_schema(&self) -> Value {
        self.blueprint.parameters_schema.clone()
    }

    async fn execute(&self, parameters: Value) -> ToolResult {
        let behavior = self.behavior.clone();
        let run = tokio::task::spawn_blocking(move || behavior(parameters));
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                tracing::error!(tool = %self.blueprint.name, error = %join_err, "forged tool panicked");
                ToolResult::failed(format!("forged tool panicked: {join_err}"))
            }
            Err(_) => {
                tracing::warn!(tool = %self.blueprint.name, timeout = ?self.timeout, "forged tool timed out");
                ToolResult::failed(format!(
                    "forged tool '{}' exceeded {:?} timeout",
                    self.blueprint.name, self.timeout
                ))
            }
        }
    }
}

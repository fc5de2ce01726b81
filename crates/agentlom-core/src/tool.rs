//! The tool contract and a dynamic registry (`addTool`/`getToolNames`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolDefinition;
use crate::model::ToolResult;

/// `{name, description, parameters, execute}`. Names are unique within one
/// agent; re-registering the same name replaces the prior entry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, parameters: Value) -> ToolResult;
}

/// Dynamic, mutable tool registry held by the kernel.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on name: registering a tool under an existing name replaces it.
    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, parameters: Value) -> ToolResult {
            ToolResult::ok(parameters)
        }
    }

    struct EchoV2;

    #[async_trait]
    impl Tool for EchoV2 {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input, v2"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, parameters: Value) -> ToolResult {
            ToolResult::ok(parameters)
        }
    }

    #[test]
    fn re_registering_same_name_replaces_prior_entry() {
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(Echo));
        registry.add(Arc::new(EchoV2));
        assert_eq!(registry.names(), vec!["echo".to_string()]);
        assert_eq!(registry.get("echo").unwrap().description(), "echoes input, v2");
    }
}

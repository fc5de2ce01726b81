//! Resolves an [`Action`] against the tool registry, executes it,
//! and appends the matching tool-role chat message.

use agentlom_core::llm::ChatMessage;
use agentlom_core::model::{Action, ToolResult};
use agentlom_core::tool::ToolRegistry;

pub async fn dispatch(
    action: &Action,
    registry: &ToolRegistry,
    history: &mut Vec<ChatMessage>,
) -> ToolResult {
    let result = match registry.get(&action.tool_name) {
        Some(tool) => tool.execute(action.parameters.clone()).await,
        None => {
            tracing::warn!(tool = %action.tool_name, "dispatch requested unknown tool");
            ToolResult::failed(format!("Tool not found: {}", action.tool_name))
        }
    };
    if !result.success {
        tracing::debug!(tool = %action.tool_name, error = ?result.error, "tool execution failed");
    }

    let content = serde_json::to_string(&result.output).unwrap_or_default();
    let tool_call_id = action
        .tool_call_id
        .clone()
        .unwrap_or_else(|| action.tool_name.clone());
    history.push(ChatMessage::tool_result(tool_call_id, content));

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlom_core::tool::Tool;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

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

    #[tokio::test]
    async fn unknown_tool_yields_not_found_failure() {
        let registry = ToolRegistry::new();
        let action = Action {
            tool_name: "missing".to_string(),
            parameters: Value::Null,
            reasoning: None,
            tool_call_id: None,
        };
        let mut history = Vec::new();
        let result = dispatch(&action, &registry, &mut history).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool not found: missing"));
    }

    #[tokio::test]
    async fn known_tool_executes_and_appends_tool_message_with_call_id() {
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(Echo));
        let action = Action {
            tool_name: "echo".to_string(),
            parameters: serde_json::json!({"x": 1}),
            reasoning: None,
            tool_call_id: Some("call_42".to_string()),
        };
        let mut history = Vec::new();
        let result = dispatch(&action, &registry, &mut history).await;
        assert!(result.success);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tool_call_id.as_deref(), Some("call_42"));
    }

    #[tokio::test]
    async fn missing_tool_call_id_falls_back_to_tool_name() {
        let mut registry = ToolRegistry::new();
        registry.add(Arc::new(Echo));
        let action = Action {
            tool_name: "echo".to_string(),
            parameters: Value::Null,
            reasoning: None,
            tool_call_id: None,
        };
        let mut history = Vec::new();
        dispatch(&action, &registry, &mut history).await;
        assert_eq!(history[0].tool_call_id.as_deref(), Some("echo"));
    }
}

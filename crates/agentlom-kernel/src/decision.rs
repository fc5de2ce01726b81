//! The decision pipeline. The single-pass pipeline runs when no
//! karma store is configured; the Seven-Factor pipeline runs when one is.
//! Both return `None` to mean "goal complete, no action".

use std::sync::Arc;

use agentlom_core::llm::{ChatMessage, ChatOptions, LlmAdapter};
use agentlom_core::memory_model::{FailureEntry, KarmaEntry, SkillEntry};
use agentlom_core::model::{Action, Delta};
use agentlom_core::self_model::ActiveStrategies;
use serde_json::Value;

use crate::retry::retry_with_backoff;

const HISTORY_WINDOW: usize = 10;

/// Interprets a chat response: `DONE` (case-insensitive,
/// trimmed) or fully empty content+tool_calls means no action; otherwise the
/// first tool call becomes the Action and the assistant turn (content +
/// tool_calls) is appended to `history` so the LLM can correlate the
/// subsequent tool reply.
fn interpret_response(
    response: &agentlom_core::llm::ChatResponse,
    history: &mut Vec<ChatMessage>,
) -> Option<Action> {
    if response.signals_done() {
        return None;
    }
    let tool_calls = response.tool_calls.clone().unwrap_or_default();
    let first = tool_calls.first()?;
    let action = Action {
        tool_name: first.name.clone(),
        parameters: first.arguments.clone(),
        reasoning: response.content.clone(),
        tool_call_id: Some(first.id.clone()),
    };
    history.push(ChatMessage::assistant_with_tool_calls(
        response.content.clone(),
        tool_calls,
    ));
    Some(action)
}

fn strategy_sections(strategies: &ActiveStrategies) -> Vec<String> {
    let mut sections = Vec::new();
    let preferences = strategies.sorted_tool_preferences();
    if !preferences.is_empty() {
        let lines: Vec<String> = preferences
            .iter()
            .map(|(tool, score)| format!("- {tool}: {:.0}% preference", score * 100.0))
            .collect();
        sections.push(format!("Tool Preferences (learned):\n{}", lines.join("\n")));
    }
    if !strategies.avoid_patterns.is_empty() {
        let lines: Vec<String> = strategies.avoid_patterns.iter().cloned().collect();
        sections.push(format!("Patterns to avoid:\n- {}", lines.join("\n- ")));
    }
    if !strategies.approach_hints.is_empty() {
        let lines: Vec<String> = strategies.approach_hints.iter().cloned().collect();
        sections.push(format!("Approach hints:\n- {}", lines.join("\n- ")));
    }
    sections
}

fn format_skills(skills: &[SkillEntry]) -> String {
    skills
        .iter()
        .map(|s| format!("- when {}: {} ({})", s.trigger, s.command, s.condition))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_failures(failures: &[FailureEntry]) -> String {
    failures
        .iter()
        .map(|f| format!("- {} (when {})", f.proverb, f.condition))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_karma(karma: &[KarmaEntry]) -> String {
    karma
        .iter()
        .map(|k| format!("- {} [{:?}, weight {:.2}]", k.proverb, k.karma_type, k.transfer_weight))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inputs to the single-pass decision pipeline.
pub struct SinglePassInputs<'a> {
    pub goal_description: &'a str,
    pub delta: &'a Delta,
    pub retrieved_skills: Vec<SkillEntry>,
    pub retrieved_failures: Vec<FailureEntry>,
    pub active_strategies: &'a ActiveStrategies,
    pub extra_sections: Vec<String>,
    pub tool_definitions: Vec<agentlom_core::llm::ToolDefinition>,
}

pub async fn run_single_pass(
    inputs: SinglePassInputs<'_>,
    history: &mut Vec<ChatMessage>,
    llm: &Arc<dyn LlmAdapter>,
    max_retries: u32,
) -> anyhow::Result<Option<Action>> {
    let mut system = format!(
        "Goal: {}\nDelta: {} (progress {:.0}%)\nGaps: {}\n",
        inputs.goal_description,
        inputs.delta.description,
        inputs.delta.progress * 100.0,
        inputs.delta.gaps.join("; ")
    );
    if !inputs.retrieved_skills.is_empty() {
        system.push_str(&format!("\nRelevant skills:\n{}\n", format_skills(&inputs.retrieved_skills)));
    }
    if !inputs.retrieved_failures.is_empty() {
        system.push_str(&format!("\nRelevant warnings:\n{}\n", format_failures(&inputs.retrieved_failures)));
    }
    for section in strategy_sections(inputs.active_strategies) {
        system.push_str(&format!("\n{section}\n"));
    }
    for section in &inputs.extra_sections {
        system.push_str(&format!("\n{section}\n"));
    }
    system.push_str("\nRespond with a tool call, or reply DONE if the goal is complete.");

    let mut messages = vec![ChatMessage::system(system)];
    let tail_start = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(history[tail_start..].iter().cloned());

    let tools = inputs.tool_definitions;
    let response = retry_with_backoff(max_retries, || {
        let llm = llm.clone();
        let messages = messages.clone();
        let tools = tools.clone();
        async move { llm.chat(&messages, ChatOptions { tools: Some(tools) }).await }
    })
    .await?;
    tracing::debug!(tool_calls = response.tool_calls.as_ref().map(|c| c.len()).unwrap_or(0), "single-pass decision received");
    Ok(interpret_response(&response, history))
}

/// Inputs to the Seven-Factor pipeline, gated on a configured karma store.
pub struct SevenFactorInputs<'a> {
    pub goal_description: &'a str,
    pub delta: &'a Delta,
    pub retrieved_skills: Vec<SkillEntry>,
    pub retrieved_failures: Vec<FailureEntry>,
    pub retrieved_karma: Vec<KarmaEntry>,
    pub habitual_patterns: Vec<KarmaEntry>,
    pub active_strategies: &'a ActiveStrategies,
    pub extra_sections: Vec<String>,
    pub tool_definitions: Vec<agentlom_core::llm::ToolDefinition>,
}

/// One `awakening:stage` emission; the kernel turns these into events.
pub struct StageOutput {
    pub stage: &'static str,
    pub output: Value,
    pub confidence: Option<f64>,
    pub filtered_prior: bool,
}

pub async fn run_seven_factor(
    inputs: SevenFactorInputs<'_>,
    history: &mut Vec<ChatMessage>,
    llm: &Arc<dyn LlmAdapter>,
    max_retries: u32,
) -> anyhow::Result<(Option<Action>, Vec<StageOutput>)> {
    let mut stages = Vec::with_capacity(3);

    let investigation_prompt = format!(
        "Goal: {}\nDelta: {} (gaps: {})\nRelevant skills:\n{}\nRelevant warnings:\n{}\nRelevant karma wisdom:\n{}\nHabitual patterns:\n{}\n\nPropose 2-3 candidate approaches as a short numbered list.",
        inputs.goal_description,
        inputs.delta.description,
        inputs.delta.gaps.join("; "),
        format_skills(&inputs.retrieved_skills),
        format_failures(&inputs.retrieved_failures),
        format_karma(&inputs.retrieved_karma),
        format_karma(&inputs.habitual_patterns),
    );
    let investigation = retry_with_backoff(max_retries, || {
        let llm = llm.clone();
        let prompt = investigation_prompt.clone();
        async move { llm.complete(&prompt).await }
    })
    .await?;
    tracing::debug!(stage = "investigation", "seven-factor stage complete");
    stages.push(StageOutput {
        stage: "investigation",
        output: Value::String(investigation.clone()),
        confidence: None,
        filtered_prior: false,
    });

    let mindfulness_prompt = format!(
        "Candidate approaches:\n{investigation}\n\nFilter these for repeated-failure patterns, ego bias, and confirmation bias. List the approaches that survive filtering, and note anything you removed."
    );
    let mindfulness = retry_with_backoff(max_retries, || {
        let llm = llm.clone();
        let prompt = mindfulness_prompt.clone();
        async move { llm.complete(&prompt).await }
    })
    .await?;
    tracing::debug!(stage = "mindfulness", "seven-factor stage complete");
    let filtered_prior = mindfulness.to_lowercase().contains("removed")
        || mindfulness.len() < investigation.len();
    stages.push(StageOutput {
        stage: "mindfulness",
        output: Value::String(mindfulness.clone()),
        confidence: None,
        filtered_prior,
    });

    let mut final_prompt = format!(
        "Goal: {}\nInvestigation:\n{investigation}\nMindfulness filter:\n{mindfulness}\n\nApply energy, joy, tranquility, concentration, and equanimity as internal criteria to choose among the surviving approaches.",
        inputs.goal_description,
    );
    for section in strategy_sections(inputs.active_strategies) {
        final_prompt.push_str(&format!("\n\n{section}"));
    }
    for section in &inputs.extra_sections {
        final_prompt.push_str(&format!("\n\n{section}"));
    }
    final_prompt.push_str("\n\nRespond with a tool call, or reply DONE if the goal is complete.");

    let mut messages = vec![ChatMessage::system(final_prompt)];
    let tail_start = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(history[tail_start..].iter().cloned());
    let tools = inputs.tool_definitions;
    let response = retry_with_backoff(max_retries, || {
        let llm = llm.clone();
        let messages = messages.clone();
        let tools = tools.clone();
        async move { llm.chat(&messages, ChatOptions { tools: Some(tools) }).await }
    })
    .await?;

    let confidence = if response.signals_done() { Some(1.0) } else { Some(0.7) };
    tracing::debug!(stage = "final_decision", confidence, "seven-factor pipeline complete");
    let action = interpret_response(&response, history);
    stages.push(StageOutput {
        stage: "final_decision",
        output: serde_json::to_value(&response).unwrap_or(Value::Null),
        confidence,
        filtered_prior: false,
    });

    Ok((action, stages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlom_core::llm::{ChatResponse, ToolCallRequest, ToolDefinition};
    use async_trait::async_trait;

    struct ScriptedLlm {
        chat_response: ChatResponse,
        complete_response: String,
    }

    #[async_trait]
    impl LlmAdapter for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.complete_response.clone())
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![])
        }
        async fn chat(&self, _messages: &[ChatMessage], _options: ChatOptions) -> anyhow::Result<ChatResponse> {
            Ok(self.chat_response.clone())
        }
    }

    fn delta() -> Delta {
        Delta {
            description: "need to write a file".to_string(),
            progress: 0.4,
            gaps: vec!["missing output file".to_string()],
            is_complete: false,
            suffering_delta: None,
            ego_noise: None,
        }
    }

    #[tokio::test]
    async fn done_response_returns_no_action() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm {
            chat_response: ChatResponse { content: Some("DONE".to_string()), tool_calls: None },
            complete_response: String::new(),
        });
        let mut history = Vec::new();
        let inputs = SinglePassInputs {
            goal_description: "test",
            delta: &delta(),
            retrieved_skills: vec![],
            retrieved_failures: vec![],
            active_strategies: &ActiveStrategies::default(),
            extra_sections: vec![],
            tool_definitions: vec![],
        };
        let action = run_single_pass(inputs, &mut history, &llm, 3).await.unwrap();
        assert!(action.is_none());
    }

    #[tokio::test]
    async fn tool_call_response_returns_action_and_appends_history() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm {
            chat_response: ChatResponse {
                content: Some("writing the file".to_string()),
                tool_calls: Some(vec![ToolCallRequest {
                    id: "call_1".to_string(),
                    name: "file_write".to_string(),
                    arguments: serde_json::json!({"path": "out.txt"}),
                }]),
            },
            complete_response: String::new(),
        });
        let mut history = Vec::new();
        let inputs = SinglePassInputs {
            goal_description: "test",
            delta: &delta(),
            retrieved_skills: vec![],
            retrieved_failures: vec![],
            active_strategies: &ActiveStrategies::default(),
            extra_sections: vec![],
            tool_definitions: vec![ToolDefinition {
                name: "file_write".to_string(),
                description: "writes a file".to_string(),
                parameters: serde_json::json!({}),
            }],
        };
        let action = run_single_pass(inputs, &mut history, &llm, 3).await.unwrap().unwrap();
        assert_eq!(action.tool_name, "file_write");
        assert_eq!(action.tool_call_id, Some("call_1".to_string()));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn seven_factor_pipeline_emits_three_stages() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(ScriptedLlm {
            chat_response: ChatResponse { content: Some("DONE".to_string()), tool_calls: None },
            complete_response: "1. Approach A\n2. Approach B".to_string(),
        });
        let mut history = Vec::new();
        let inputs = SevenFactorInputs {
            goal_description: "test",
            delta: &delta(),
            retrieved_skills: vec![],
            retrieved_failures: vec![],
            retrieved_karma: vec![],
            habitual_patterns: vec![],
            active_strategies: &ActiveStrategies::default(),
            extra_sections: vec![],
            tool_definitions: vec![],
        };
        let (action, stages) = run_seven_factor(inputs, &mut history, &llm, 3).await.unwrap();
        assert!(action.is_none());
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].stage, "investigation");
        assert_eq!(stages[2].stage, "final_decision");
    }

    struct CapturingLlm {
        sent: std::sync::Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl LlmAdapter for CapturingLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(String::new())
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![])
        }
        async fn chat(&self, messages: &[ChatMessage], _options: ChatOptions) -> anyhow::Result<ChatResponse> {
            *self.sent.lock().unwrap() = messages.to_vec();
            Ok(ChatResponse { content: Some("DONE".to_string()), tool_calls: None })
        }
    }

    #[tokio::test]
    async fn learned_tool_preferences_render_as_percentages() {
        let llm = Arc::new(CapturingLlm { sent: std::sync::Mutex::new(Vec::new()) });
        let mut strategies = ActiveStrategies::default();
        strategies.adjust_tool_preference("file_read", 0.2);
        let mut history = Vec::new();
        let inputs = SinglePassInputs {
            goal_description: "test",
            delta: &delta(),
            retrieved_skills: vec![],
            retrieved_failures: vec![],
            active_strategies: &strategies,
            extra_sections: vec![],
            tool_definitions: vec![],
        };
        let dyn_llm: Arc<dyn LlmAdapter> = llm.clone();
        run_single_pass(inputs, &mut history, &dyn_llm, 3).await.unwrap();
        let sent = llm.sent.lock().unwrap();
        let system = sent.first().unwrap().content.clone().unwrap_or_default();
        assert!(system.contains("Tool Preferences (learned)"));
        assert!(system.contains("file_read: 70% preference"));
    }
}

//! The self-evolver (Anatta). Periodically proposes an evolution from
//! the running self-model and applies accepted proposals back into
//! `active_strategies`, which the decision pipeline reads on the very next
//! iteration — the closed-loop guarantee.

use std::sync::Arc;

use agentlom_core::config::EvolutionConfig;
use agentlom_core::llm::LlmAdapter;
use agentlom_core::model::extract_first_json_object;
use agentlom_core::self_model::{
    ActiveStrategies, EvolutionProposal, EvolutionRecord, EvolutionType, SelfModel,
};

const NEGATIVE_LEXEMES: &[&str] = &["avoid", "reduce", "less"];
const TREND_GATE_SAMPLES: usize = 5;
const FAILURE_RATE_THRESHOLD: f64 = 0.6;
const MIN_USES_FOR_AUTO_AVOID: u32 = 3;

/// Runs the evolution gate and, if it passes and the LLM's proposal clears
/// the confidence floor, applies it to `self_model.active_strategies` and
/// appends an [`EvolutionRecord`]. Returns `None` when the gate doesn't
/// fire or the proposal is discarded.
pub async fn evolve_if_needed(
    self_model: &mut SelfModel,
    llm: &Arc<dyn LlmAdapter>,
    config: &EvolutionConfig,
    tanha_loop_detected: bool,
    known_tools: &[String],
) -> Option<EvolutionRecord> {
    if self_model.suffering_trend.len() < TREND_GATE_SAMPLES {
        return None;
    }
    let mean = self_model.mean_of_last(TREND_GATE_SAMPLES).unwrap_or(0.0);
    if mean <= config.threshold && !tanha_loop_detected {
        return None;
    }
    tracing::debug!(mean, tanha_loop_detected, "evolution gate passed, requesting proposal");

    let prompt = build_evolution_prompt(self_model, tanha_loop_detected);
    let response = llm.complete(&prompt).await.ok()?;
    let proposal = parse_proposal(&response)?;
    if proposal.confidence < config.min_confidence {
        tracing::debug!(confidence = proposal.confidence, "evolution proposal discarded below confidence floor");
        return None;
    }

    apply_proposal(&mut self_model.active_strategies, &proposal, known_tools);
    recompute_auto_avoid_patterns(self_model, known_tools);

    let record = EvolutionRecord {
        proposal,
        applied: true,
        at: chrono::Utc::now(),
    };
    tracing::info!(kind = ?record.proposal.kind, confidence = record.proposal.confidence, "evolution proposal applied");
    self_model.evolution_log.push(record.clone());
    Some(record)
}

fn build_evolution_prompt(self_model: &SelfModel, tanha_loop_detected: bool) -> String {
    let mut table = String::new();
    for (tool, stats) in &self_model.tool_stats {
        table.push_str(&format!(
            "- {tool}: uses={}, successes={}, failures={}, avg_suffering_delta={:.3}\n",
            stats.uses, stats.successes, stats.failures, stats.avg_suffering_delta
        ));
    }
    let trend: Vec<String> = self_model.suffering_trend.iter().map(|v| format!("{v:.2}")).collect();
    format!(
        "Tool statistics:\n{table}\nSuffering trend (oldest first): [{}]\nTanha loop detected: {}\nEvolution count so far: {}\n\nPropose one evolution as a single JSON object: {{\"change\": string, \"reason\": string, \"type\": \"tool_preference\"|\"approach_shift\"|\"milestone_reorder\"|\"strategy_change\", \"confidence\": number in [0,1]}}.",
        trend.join(", "),
        tanha_loop_detected,
        self_model.evolution_log.len(),
    )
}

fn parse_proposal(response: &str) -> Option<EvolutionProposal> {
    let value = extract_first_json_object(response)?;
    serde_json::from_value(value).ok()
}

fn apply_proposal(strategies: &mut ActiveStrategies, proposal: &EvolutionProposal, known_tools: &[String]) {
    match proposal.kind {
        EvolutionType::ToolPreference => {
            let negative = NEGATIVE_LEXEMES
                .iter()
                .any(|lexeme| proposal.change.to_lowercase().contains(lexeme));
            let delta = if negative { -0.2 } else { 0.2 };
            for tool in known_tools {
                if proposal.change.contains(tool.as_str()) {
                    strategies.adjust_tool_preference(tool, delta);
                }
            }
        }
        EvolutionType::ApproachShift | EvolutionType::StrategyChange => {
            ActiveStrategies::push_capped(&mut strategies.approach_hints, proposal.change.clone());
        }
        EvolutionType::MilestoneReorder => {
            ActiveStrategies::push_capped(
                &mut strategies.approach_hints,
                format!("Milestone reorder: {}", proposal.change),
            );
        }
    }
}

fn recompute_auto_avoid_patterns(self_model: &mut SelfModel, known_tools: &[String]) {
    for tool in known_tools {
        if let Some(stats) = self_model.tool_stats.get(tool) {
            if stats.uses > MIN_USES_FOR_AUTO_AVOID && stats.failure_rate() > FAILURE_RATE_THRESHOLD {
                let pattern = format!(
                    "{tool} fails {:.0}% of the time ({} uses)",
                    stats.failure_rate() * 100.0,
                    stats.uses
                );
                ActiveStrategies::push_capped(&mut self_model.active_strategies.avoid_patterns, pattern);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlom_core::llm::{ChatMessage, ChatOptions, ChatResponse};
    use async_trait::async_trait;

    struct FixedLlm(String);

    #[async_trait]
    impl LlmAdapter for FixedLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![])
        }
        async fn chat(&self, _messages: &[ChatMessage], _options: ChatOptions) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse::default())
        }
    }

    fn model_with_high_trend() -> SelfModel {
        let mut model = SelfModel::default();
        for _ in 0..10 {
            model.push_suffering(0.6, 20);
        }
        model
            .tool_stats
            .entry("http_request".to_string())
            .or_default();
        model
    }

    #[tokio::test]
    async fn gate_requires_five_samples() {
        let mut model = SelfModel::default();
        model.push_suffering(0.9, 20);
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"change":"x","reason":"y","type":"approach_shift","confidence":0.9}"#.to_string(),
        ));
        let result = evolve_if_needed(&mut model, &llm, &EvolutionConfig::default(), false, &[]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn accepted_proposal_updates_tool_preference_with_boost() {
        let mut model = model_with_high_trend();
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"change":"Prefer file_read over http_request for reliability","reason":"http_request has high failure rate","type":"tool_preference","confidence":0.8}"#.to_string(),
        ));
        let known = vec!["file_read".to_string(), "http_request".to_string()];
        let record = evolve_if_needed(&mut model, &llm, &EvolutionConfig::default(), false, &known)
            .await
            .unwrap();
        assert!(record.applied);
        assert_eq!(model.active_strategies.tool_preferences["file_read"], 0.7);
        assert_eq!(model.active_strategies.tool_preferences["http_request"], 0.7);
    }

    #[tokio::test]
    async fn low_confidence_proposal_is_discarded() {
        let mut model = model_with_high_trend();
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"change":"x","reason":"y","type":"approach_shift","confidence":0.2}"#.to_string(),
        ));
        let result = evolve_if_needed(&mut model, &llm, &EvolutionConfig::default(), false, &[]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn tanha_loop_bypasses_threshold_gate() {
        let mut model = SelfModel::default();
        for _ in 0..5 {
            model.push_suffering(0.0, 20);
        }
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"change":"x","reason":"y","type":"strategy_change","confidence":0.9}"#.to_string(),
        ));
        let result = evolve_if_needed(&mut model, &llm, &EvolutionConfig::default(), true, &[]).await;
        assert!(result.is_some());
    }

    #[test]
    fn auto_avoid_patterns_recomputed_for_high_failure_tools() {
        let mut model = SelfModel::default();
        for i in 0..5 {
            model.record_tool_use("flaky_tool", i < 1, 0.0);
        }
        recompute_auto_avoid_patterns(&mut model, &["flaky_tool".to_string()]);
        assert_eq!(model.active_strategies.avoid_patterns.len(), 1);
    }
}

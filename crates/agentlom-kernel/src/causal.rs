//! Causal analysis. An append-only ring of recent actions feeds a
//! best-effort LLM prompt asking whether a prior action caused the current
//! failure; positive inferences merge into the most-similar karma entry.

use std::collections::VecDeque;
use std::sync::Arc;

use agentlom_core::llm::LlmAdapter;
use agentlom_core::model::extract_first_json_object;
use serde::Deserialize;

const RING_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct RecentAction {
    pub id: String,
    pub tool_name: String,
    pub success: bool,
    pub step: u64,
}

/// Append-only, capped ring of the last few recent actions.
#[derive(Default)]
pub struct ActionRing {
    ring: VecDeque<RecentAction>,
}

impl ActionRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: RecentAction) {
        self.ring.push_back(action);
        while self.ring.len() > RING_CAPACITY {
            self.ring.pop_front();
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &RecentAction> {
        self.ring.iter()
    }

    /// The most recent action before the one just recorded, if any — the
    /// candidate "cause" for the latest failure.
    pub fn previous(&self) -> Option<&RecentAction> {
        self.ring.iter().rev().nth(1)
    }

    /// Tail of failed-action ids, newest last, capped at `cap`.
    pub fn failed_tail(&self, cap: usize) -> Vec<String> {
        let failed: Vec<String> = self
            .ring
            .iter()
            .filter(|a| !a.success)
            .map(|a| a.id.clone())
            .collect();
        let start = failed.len().saturating_sub(cap);
        failed[start..].to_vec()
    }
}

#[derive(Debug, Deserialize)]
struct CausalInference {
    #[serde(rename = "isCausal", alias = "is_causal")]
    is_causal: bool,
    strength: f64,
    #[allow(dead_code)]
    reasoning: String,
}

pub struct CausalAnalysisOutcome {
    pub cause_id: String,
    pub effect_id: String,
    pub strength: f64,
}

/// Best-effort: any transport or parse failure is swallowed, returning
/// `None` rather than propagating, so test determinism never depends on
/// this inference succeeding.
pub async fn analyze_causality(
    previous: &RecentAction,
    current_failure_id: &str,
    llm: &Arc<dyn LlmAdapter>,
) -> Option<CausalAnalysisOutcome> {
    let prompt = format!(
        "A previous action `{}` (success={}) was followed by a failure (action id `{current_failure_id}`). \
         Did the previous action cause this failure? Respond with a single JSON object: \
         {{\"isCausal\": boolean, \"strength\": number in [0,1], \"reasoning\": string}}.",
        previous.tool_name, previous.success
    );
    let response = llm.complete(&prompt).await.ok()?;
    let value = extract_first_json_object(&response)?;
    let inference: CausalInference = serde_json::from_value(value).ok()?;
    if !inference.is_causal {
        return None;
    }
    tracing::debug!(cause = %previous.tool_name, strength = inference.strength, "causal link inferred");
    Some(CausalAnalysisOutcome {
        cause_id: previous.id.clone(),
        effect_id: current_failure_id.to_string(),
        strength: inference.strength.clamp(0.0, 1.0),
    })
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

    #[test]
    fn ring_is_capped_and_evicts_oldest() {
        let mut ring = ActionRing::new();
        for i in 0..(RING_CAPACITY + 5) {
            ring.push(RecentAction {
                id: format!("a{i}"),
                tool_name: "t".to_string(),
                success: true,
                step: i as u64,
            });
        }
        assert_eq!(ring.iter().count(), RING_CAPACITY);
        assert_eq!(ring.iter().next().unwrap().id, "a5");
    }

    #[test]
    fn failed_tail_caps_at_five() {
        let mut ring = ActionRing::new();
        for i in 0..8 {
            ring.push(RecentAction {
                id: format!("f{i}"),
                tool_name: "t".to_string(),
                success: false,
                step: i,
            });
        }
        let tail = ring.failed_tail(5);
        assert_eq!(tail.len(), 5);
        assert_eq!(tail.last().unwrap(), "f7");
    }

    #[tokio::test]
    async fn positive_inference_yields_outcome() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"isCausal":true,"strength":0.8,"reasoning":"timing"}"#.to_string(),
        ));
        let previous = RecentAction { id: "a1".to_string(), tool_name: "http_request".to_string(), success: true, step: 1 };
        let outcome = analyze_causality(&previous, "a2", &llm).await.unwrap();
        assert_eq!(outcome.cause_id, "a1");
        assert_eq!(outcome.effect_id, "a2");
        assert_eq!(outcome.strength, 0.8);
    }

    #[tokio::test]
    async fn negative_inference_yields_none() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm(
            r#"{"isCausal":false,"strength":0.1,"reasoning":"unrelated"}"#.to_string(),
        ));
        let previous = RecentAction { id: "a1".to_string(), tool_name: "http_request".to_string(), success: true, step: 1 };
        let outcome = analyze_causality(&previous, "a2", &llm).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn malformed_response_is_swallowed() {
        let llm: Arc<dyn LlmAdapter> = Arc::new(FixedLlm("not json at all".to_string()));
        let previous = RecentAction { id: "a1".to_string(), tool_name: "http_request".to_string(), success: true, step: 1 };
        let outcome = analyze_causality(&previous, "a2", &llm).await;
        assert!(outcome.is_none());
    }
}

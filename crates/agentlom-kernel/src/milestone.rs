//! Waypoint tracking with a two-phase reach check and a context-reset
//! boundary at which transient state is discarded while failure knowledge
//! survives.

use std::sync::Arc;
use std::time::Duration;

use agentlom_core::llm::LlmAdapter;
use agentlom_core::memory_model::FailureEntry;
use agentlom_core::model::{snapshot_to_string, Goal, Milestone, Snapshot};
use serde::{Deserialize, Serialize};

use crate::retry::retry_with_backoff;

/// Invoked on milestone reach with the failure list captured at that moment.
/// May fail; the runner retries with exponential backoff before surfacing
/// the error to the kernel.
#[async_trait::async_trait]
pub trait ResetCallback: Send + Sync {
    async fn reset(&self, failures: &[FailureEntry]) -> anyhow::Result<()>;
}

/// Serializable view of runner state, round-tripped via `to_json`/`from_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRunnerState {
    pub milestones: Vec<Milestone>,
    pub current_index: usize,
}

pub struct MilestoneRunner {
    milestones: Vec<Milestone>,
    current_index: usize,
}

const RESET_RETRY_BACKOFFS_MS: [u64; 3] = [100, 200, 400];

impl MilestoneRunner {
    pub fn new(milestones: Vec<Milestone>) -> Self {
        Self {
            milestones,
            current_index: 0,
        }
    }

    pub fn current(&self) -> Option<&Milestone> {
        self.milestones.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.milestones.len()
    }

    /// Phase 1 (rule-based): every resource token of the current milestone
    /// must be a substring of the serialized snapshot. Phase 2 (LLM
    /// confirmation): only consulted if phase 1 passes.
    pub async fn check_reached(
        &self,
        snapshot: &Snapshot,
        llm: &Arc<dyn LlmAdapter>,
        goal: &Goal,
        max_retries: u32,
    ) -> anyhow::Result<bool> {
        let Some(milestone) = self.current() else {
            return Ok(false);
        };
        let haystack = snapshot_to_string(snapshot);
        let phase1 = milestone
            .resources
            .iter()
            .all(|token| haystack.contains(token.as_str()));
        if !phase1 {
            return Ok(false);
        }
        tracing::debug!(milestone = %milestone.id, "milestone resources present, confirming with LLM");

        let prompt = format!(
            "Goal: {}\nCurrent milestone: {}\nSnapshot:\n{}\n\nIs this milestone satisfied? Reply with YES or NO as the first word.",
            goal.description, milestone.description, haystack
        );
        let reply = retry_with_backoff(max_retries, || {
            let llm = llm.clone();
            let prompt = prompt.clone();
            async move { llm.complete(&prompt).await }
        })
        .await?;
        let first_token = reply.split_whitespace().next().unwrap_or("");
        let reached = first_token.to_uppercase().starts_with("YES");
        if reached {
            tracing::info!(milestone = %milestone.id, "milestone confirmed reached");
        }
        Ok(reached)
    }

    /// Marks the current milestone reached, advances the index, and invokes
    /// `callback.reset` with the current failure list. The initial attempt
    /// plus up to three retries (100/200/400ms exponential backoff between
    /// them) are tried — four attempts total; the last attempt's error is
    /// surfaced on total failure.
    pub async fn reset(
        &mut self,
        failures: &[FailureEntry],
        callback: &dyn ResetCallback,
    ) -> anyhow::Result<(String, Option<String>)> {
        let previous_id = self
            .current()
            .map(|m| m.id.clone())
            .unwrap_or_default();
        if let Some(m) = self.milestones.get_mut(self.current_index) {
            m.reached_at = Some(chrono::Utc::now());
        }
        self.current_index += 1;
        let next_id = self.current().map(|m| m.id.clone());

        match callback.reset(failures).await {
            Ok(()) => return Ok((previous_id, next_id)),
            Err(e) => {
                let mut last_err = e;
                for backoff_ms in RESET_RETRY_BACKOFFS_MS {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    match callback.reset(failures).await {
                        Ok(()) => return Ok((previous_id, next_id)),
                        Err(e) => last_err = e,
                    }
                }
                Err(last_err)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(MilestoneRunnerState {
            milestones: self.milestones.clone(),
            current_index: self.current_index,
        })
        .unwrap_or_default()
    }

    pub fn from_json(value: serde_json::Value) -> anyhow::Result<Self> {
        let state: MilestoneRunnerState = serde_json::from_value(value)?;
        Ok(Self {
            milestones: state.milestones,
            current_index: state.current_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailNTimes {
        remaining_failures: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ResetCallback for FailNTimes {
        async fn reset(&self, _failures: &[FailureEntry]) -> anyhow::Result<()> {
            if self.remaining_failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("callback failed");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn reset_callback_throwing_three_times_is_retried_the_third_time() {
        let mut runner = MilestoneRunner::new(vec![
            Milestone::new("a", "first", vec![]),
            Milestone::new("b", "second", vec![]),
        ]);
        // Fails on the initial attempt plus the first two retries (three
        // throws total), then succeeds on the third retry (fourth attempt).
        let callback = FailNTimes {
            remaining_failures: AtomicUsize::new(3),
        };
        let result = runner.reset(&[], &callback).await;
        assert!(result.is_ok());
        assert_eq!(runner.current_index(), 1);
    }

    #[tokio::test]
    async fn reset_callback_throwing_four_times_aborts() {
        let mut runner = MilestoneRunner::new(vec![Milestone::new("a", "first", vec![])]);
        // Fails on every one of the four attempts (initial + three retries).
        let callback = FailNTimes {
            remaining_failures: AtomicUsize::new(4),
        };
        let result = runner.reset(&[], &callback).await;
        assert!(result.is_err());
    }

    #[test]
    fn to_json_from_json_round_trips() {
        let runner = MilestoneRunner::new(vec![Milestone::new("a", "first", vec!["x".into()])]);
        let json = runner.to_json();
        let restored = MilestoneRunner::from_json(json).unwrap();
        assert_eq!(restored.current().unwrap().id, "a");
    }
}

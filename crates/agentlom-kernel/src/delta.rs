//! Delta computation. Builds the prompt, retries the LLM call, and
//! parses the response — parsing itself never fails (see
//! [`agentlom_core::model::Delta::parse`]).

use std::sync::Arc;

use agentlom_core::llm::LlmAdapter;
use agentlom_core::model::{snapshot_to_string, Delta, Goal, Milestone, Snapshot};

use crate::retry::retry_with_backoff;

pub async fn compute_delta(
    goal: &Goal,
    snapshot: &Snapshot,
    current_milestone: Option<&Milestone>,
    tanha_loop_detected: bool,
    llm: &Arc<dyn LlmAdapter>,
    max_retries: u32,
) -> anyhow::Result<Delta> {
    let prompt = build_delta_prompt(goal, snapshot, current_milestone, tanha_loop_detected);
    let response = retry_with_backoff(max_retries, || {
        let llm = llm.clone();
        let prompt = prompt.clone();
        async move { llm.complete(&prompt).await }
    })
    .await?;
    let delta = Delta::parse(&response);
    tracing::debug!(progress = delta.progress, is_complete = delta.is_complete, gaps = delta.gaps.len(), "delta computed");
    Ok(delta)
}

fn build_delta_prompt(
    goal: &Goal,
    snapshot: &Snapshot,
    current_milestone: Option<&Milestone>,
    tanha_loop_detected: bool,
) -> String {
    let mut prompt = format!("Goal: {}\n", goal.description);
    if let Some(criteria) = &goal.success_criteria {
        prompt.push_str(&format!("Success criteria: {}\n", criteria.join("; ")));
    }
    prompt.push_str(&format!("Current snapshot:\n{}\n", snapshot_to_string(snapshot)));
    if let Some(milestone) = current_milestone {
        prompt.push_str(&format!(
            "Current milestone: {} (required resources: {})\n",
            milestone.description,
            milestone.resources.join(", ")
        ));
    }
    if tanha_loop_detected {
        prompt.push_str(
            "\nWarning: a repeated-failure (craving) loop has been detected. \
             Re-evaluate the situation from first principles before proposing the gap.\n",
        );
    }
    prompt.push_str(
        "\nRespond with a single JSON object: {\"description\": string, \"progress\": number in [0,1], \
         \"gaps\": array of strings, \"isComplete\": boolean, \"sufferingDelta\": number in [-1,1] optional, \
         \"egoNoise\": number in [0,1] optional}.",
    );
    prompt
}

//! The perception→gap→action vocabulary: Goal, Snapshot, Observation, Delta,
//! Action, ToolResult, Milestone.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<Vec<String>>,
}

impl Goal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            success_criteria: None,
        }
    }

    pub fn with_success_criteria(mut self, criteria: Vec<String>) -> Self {
        self.success_criteria = Some(criteria);
        self
    }
}

/// An opaque string-keyed mapping, captured fresh each iteration. Snapshots
/// are replaced wholesale, never merged.
pub type Snapshot = BTreeMap<String, Value>;

/// Render a snapshot as a readable object for prompt embedding, and as the
/// haystack for milestone resource substring checks.
pub fn snapshot_to_string(snapshot: &Snapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_default()
}

/// A snapshot wrapped with mindfulness metrics derived from craving-loop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub snapshot: Snapshot,
    pub bias_score: f64,
    pub mindfulness_level: f64,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    /// Elevated bias/lowered mindfulness when a Tanha loop is flagged.
    pub fn capture(snapshot: Snapshot, tanha_loop_detected: bool) -> Self {
        let (bias_score, mindfulness_level) = if tanha_loop_detected {
            (0.8, 0.3)
        } else {
            (0.1, 0.9)
        };
        Self {
            snapshot,
            bias_score,
            mindfulness_level,
            observed_at: Utc::now(),
        }
    }
}

/// The LLM-interpreted gap between Goal and Observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub description: String,
    pub progress: f64,
    pub gaps: Vec<String>,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffering_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ego_noise: Option<f64>,
}

impl Delta {
    pub fn clamp_ranges(mut self) -> Self {
        self.progress = self.progress.clamp(0.0, 1.0);
        if let Some(s) = self.suffering_delta {
            self.suffering_delta = Some(s.clamp(-1.0, 1.0));
        }
        if let Some(e) = self.ego_noise {
            self.ego_noise = Some(e.clamp(0.0, 1.0));
        }
        self
    }

    /// Both suffering metrics present → `dukkha:evaluated` fires.
    pub fn has_suffering_metrics(&self) -> bool {
        self.suffering_delta.is_some() && self.ego_noise.is_some()
    }

    fn degraded(raw_response: &str) -> Self {
        let description: String = raw_response.chars().take(200).collect();
        Self {
            description,
            progress: 0.0,
            gaps: vec!["Unable to parse delta".to_string()],
            is_complete: false,
            suffering_delta: None,
            ego_noise: None,
        }
    }

    /// Extract the first balanced JSON object embedded anywhere in
    /// `raw_response`, validate/clamp it, and fall back to a degraded delta
    /// on any failure. Never errors — this is a total function by design.
    pub fn parse(raw_response: &str) -> Self {
        match extract_first_json_object(raw_response) {
            Some(value) => match parse_delta_value(&value) {
                Some(delta) => delta.clamp_ranges(),
                None => Self::degraded(raw_response),
            },
            None => Self::degraded(raw_response),
        }
    }
}

fn parse_delta_value(value: &Value) -> Option<Delta> {
    let obj = value.as_object()?;
    let description = obj
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let progress = obj.get("progress").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let gaps = obj
        .get("gaps")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|g| g.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let is_complete = obj
        .get("isComplete")
        .or_else(|| obj.get("is_complete"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let suffering_delta = obj
        .get("sufferingDelta")
        .or_else(|| obj.get("suffering_delta"))
        .and_then(|v| v.as_f64());
    let ego_noise = obj
        .get("egoNoise")
        .or_else(|| obj.get("ego_noise"))
        .and_then(|v| v.as_f64());
    Some(Delta {
        description,
        progress,
        gaps,
        is_complete,
        suffering_delta,
        ego_noise,
    })
}

/// Scan `text` for the first `{...}` span with balanced braces, tolerating
/// braces embedded inside string literals, and parse it as JSON. Returns
/// `None` if no balanced span parses.
pub fn extract_first_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    serde_json::from_str(&text[start..end]).ok()
}

/// `{toolName, parameters, reasoning?, toolCallId?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub tool_name: String,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// The outcome of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            output: Value::Null,
            error: Some(error),
        }
    }
}

/// An ordered waypoint. Exactly one is *current* in a [`crate::model::MilestoneSet`]-like
/// sequence held by the milestone runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reached_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn new(id: impl Into<String>, description: impl Into<String>, resources: Vec<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            resources,
            reached_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_embedded_in_prose() {
        let text = "Sure, here's the delta: {\"description\": \"halfway there\", \"progress\": 0.5, \"gaps\": [\"need api key\"], \"isComplete\": false} hope that helps!";
        let delta = Delta::parse(text);
        assert_eq!(delta.description, "halfway there");
        assert_eq!(delta.progress, 0.5);
        assert_eq!(delta.gaps, vec!["need api key".to_string()]);
        assert!(!delta.is_complete);
    }

    #[test]
    fn falls_back_to_degraded_delta_on_garbage() {
        let text = "I cannot determine progress right now.";
        let delta = Delta::parse(text);
        assert_eq!(delta.progress, 0.0);
        assert!(!delta.is_complete);
        assert_eq!(delta.gaps, vec!["Unable to parse delta".to_string()]);
        assert_eq!(delta.description, text);
    }

    #[test]
    fn clamps_out_of_range_numeric_fields() {
        let text = r#"{"description":"x","progress":5.0,"gaps":[],"isComplete":false,"sufferingDelta":-9,"egoNoise":3}"#;
        let delta = Delta::parse(text);
        assert_eq!(delta.progress, 1.0);
        assert_eq!(delta.suffering_delta, Some(-1.0));
        assert_eq!(delta.ego_noise, Some(1.0));
    }

    #[test]
    fn tolerates_braces_inside_string_literals() {
        let text = r#"noise {"description":"has a { brace } inside", "progress":0.2,"gaps":[],"isComplete":false} trailer"#;
        let delta = Delta::parse(text);
        assert_eq!(delta.description, "has a { brace } inside");
    }

    #[test]
    fn observation_reflects_tanha_flag() {
        let obs = Observation::capture(Snapshot::new(), true);
        assert_eq!(obs.bias_score, 0.8);
        assert_eq!(obs.mindfulness_level, 0.3);
        let obs = Observation::capture(Snapshot::new(), false);
        assert_eq!(obs.bias_score, 0.1);
        assert_eq!(obs.mindfulness_level, 0.9);
    }
}

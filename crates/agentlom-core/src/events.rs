//! The exhaustive event taxonomy emitted by the kernel. Implementations
//! observe a run by registering an [`EventSink`]; the kernel never blocks on
//! a sink (best-effort delivery, no backpressure).

use serde::Serialize;
use serde_json::Value;

use crate::model::{Action, Delta, Observation, ToolResult};
use crate::self_model::EvolutionRecord;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum AgentEvent {
    #[serde(rename = "agent:start")]
    AgentStart,
    #[serde(rename = "agent:complete")]
    AgentComplete { total_steps: u64 },
    #[serde(rename = "agent:error")]
    AgentError { step: u64, message: String },
    #[serde(rename = "observation:captured")]
    ObservationCaptured(Observation),
    #[serde(rename = "dukkha:evaluated")]
    DukkhaEvaluated { delta: Delta },
    #[serde(rename = "milestone:reached")]
    MilestoneReached { milestone_id: String },
    #[serde(rename = "milestone:failed")]
    MilestoneFailed { milestone_id: String, reason: String },
    #[serde(rename = "context:reset")]
    ContextReset {
        previous_milestone: String,
        next_milestone: Option<String>,
    },
    #[serde(rename = "plugin:veto")]
    PluginVeto { plugin: String, reason: String },
    #[serde(rename = "action:start")]
    ActionStart { step: u64, action: Action },
    #[serde(rename = "action:complete")]
    ActionComplete {
        step: u64,
        action: Action,
        result: ToolResult,
    },
    #[serde(rename = "failure:recorded")]
    FailureRecorded { id: String, proverb: String },
    #[serde(rename = "skill:acquired")]
    SkillAcquired { id: String },
    #[serde(rename = "karma:stored")]
    KarmaStored { id: String, karma_type: String },
    #[serde(rename = "causal:analyzed")]
    CausalAnalyzed {
        cause_id: String,
        effect_id: String,
        strength: f64,
    },
    #[serde(rename = "awakening:stage")]
    AwakeningStage {
        stage: String,
        output: Value,
        confidence: Option<f64>,
        filtered_prior: bool,
    },
    #[serde(rename = "tanha:loop:detected")]
    TanhaLoopDetected { pattern: String, count: u32 },
    #[serde(rename = "anatta:evolved")]
    AnattaEvolved { record: EvolutionRecord },
}

/// Observer of a run's event stream. All methods are no-ops by default so
/// implementors subscribe only to what they need.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &AgentEvent);
}

/// A sink that drops every event; the kernel's default when none is wired.
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &AgentEvent) {}
}

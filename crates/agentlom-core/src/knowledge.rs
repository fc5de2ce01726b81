//! Causal links between actions, and the versioned packet exchanged between
//! agents by the Dana (knowledge-sharing) plugin pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::self_model::ActiveStrategies;

/// `{causeId, effectId, strength, reasoning}` — the output of causal analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalLink {
    pub cause_id: String,
    pub effect_id: String,
    pub strength: f64,
    pub reasoning: String,
}

/// One offered unit of knowledge inside a [`KnowledgePacket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gift {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub payload: Value,
    pub confidence: f64,
    pub source_context: String,
}

/// The atomic unit of agent-to-agent knowledge exchange. Transport is
/// unspecified; this crate defines only the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgePacket {
    pub version: u32,
    pub source_agent_id: String,
    pub created_at: DateTime<Utc>,
    pub gifts: Vec<Gift>,
    pub strategies: ActiveStrategies,
    pub evolution_summary: String,
}

impl KnowledgePacket {
    pub const VERSION: u32 = 1;

    pub fn new(
        source_agent_id: impl Into<String>,
        gifts: Vec<Gift>,
        strategies: ActiveStrategies,
        evolution_summary: impl Into<String>,
    ) -> Self {
        Self {
            version: Self::VERSION,
            source_agent_id: source_agent_id.into(),
            created_at: Utc::now(),
            gifts,
            strategies,
            evolution_summary: evolution_summary.into(),
        }
    }
}

//! Entry types stored by the memory stack: skills, failures, karma, and
//! hierarchical memory. The stores themselves live in `agentlom-kernel`;
//! this crate only defines what they hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A semantic triple: when `trigger` matches, `command` applies under `condition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntry {
    pub id: String,
    pub trigger: String,
    pub command: String,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// A short imperative lesson learned from a past failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub id: String,
    pub proverb: String,
    pub condition: String,
    pub severity: Severity,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// The closed variant set for karma classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KarmaType {
    Skillful,
    Unskillful,
    Neutral,
}

/// Failure knowledge extended with a causal chain and a decaying transfer weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KarmaEntry {
    pub id: String,
    pub proverb: String,
    pub condition: String,
    pub severity: Severity,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub causal_chain: Vec<String>,
    pub transfer_weight: f64,
    pub karma_type: KarmaType,
    pub occurrences: u32,
    pub last_seen: DateTime<Utc>,
}

impl KarmaEntry {
    pub fn from_failure(
        failure: FailureEntry,
        causal_chain: Vec<String>,
        transfer_weight: f64,
        karma_type: KarmaType,
    ) -> Self {
        Self {
            id: failure.id,
            proverb: failure.proverb,
            condition: failure.condition,
            severity: failure.severity,
            source: failure.source,
            embedding: failure.embedding,
            causal_chain,
            transfer_weight: transfer_weight.clamp(0.0, 1.0),
            karma_type,
            occurrences: 1,
            last_seen: Utc::now(),
        }
    }
}

/// One of the three hierarchical memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryLayer {
    Working,
    Episodic,
    Semantic,
}

impl MemoryLayer {
    /// The tier an entry is promoted into, if any.
    pub fn promotion_target(self) -> Option<MemoryLayer> {
        match self {
            MemoryLayer::Working => Some(MemoryLayer::Episodic),
            MemoryLayer::Episodic => Some(MemoryLayer::Semantic),
            MemoryLayer::Semantic => None,
        }
    }
}

/// A single hierarchical-memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub layer: MemoryLayer,
    pub content: Value,
    pub metadata: Value,
    pub relevance: f64,
    pub access_count: u32,
    pub created_at: DateTime<Utc>,
}

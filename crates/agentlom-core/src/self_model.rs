//! The agent's introspective state: per-tool statistics, a bounded suffering
//! trend, the evolution log, and the active strategies the decision pipeline
//! reads back. Lives in `agentlom-core` because the kernel, the decision
//! pipeline, and the self-evolver crate all need the same shape.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running counters for one tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    pub uses: u32,
    pub successes: u32,
    pub failures: u32,
    pub avg_suffering_delta: f64,
}

impl ToolStats {
    /// Invariant: `successes + failures == uses` after every record.
    pub fn record(&mut self, success: bool, suffering_delta: f64) {
        self.uses += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.avg_suffering_delta = (self.avg_suffering_delta * (self.uses as f64 - 1.0)
            + suffering_delta)
            / self.uses as f64;
    }

    pub fn failure_rate(&self) -> f64 {
        if self.uses == 0 {
            0.0
        } else {
            self.failures as f64 / self.uses as f64
        }
    }
}

/// The cap applied to `avoid_patterns` and `approach_hints`.
pub const STRATEGY_LIST_CAP: usize = 5;

/// The closed variant set for evolution proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionType {
    ToolPreference,
    ApproachShift,
    MilestoneReorder,
    StrategyChange,
}

/// An LLM-proposed evolution, as parsed off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProposal {
    pub change: String,
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: EvolutionType,
    pub confidence: f64,
}

/// One applied (or discarded) evolution, kept for the evolution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub proposal: EvolutionProposal,
    pub applied: bool,
    pub at: DateTime<Utc>,
}

/// The concrete biases written back into the decision prompt. This is *the*
/// closed-loop output: evolution writes it, `decide` reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveStrategies {
    pub tool_preferences: HashMap<String, f64>,
    pub avoid_patterns: VecDeque<String>,
    pub approach_hints: VecDeque<String>,
}

impl ActiveStrategies {
    /// Push onto a capped, oldest-evicted-first list.
    pub fn push_capped(list: &mut VecDeque<String>, item: String) {
        if list.contains(&item) {
            return;
        }
        list.push_back(item);
        while list.len() > STRATEGY_LIST_CAP {
            list.pop_front();
        }
    }

    pub fn adjust_tool_preference(&mut self, tool: &str, delta: f64) {
        let entry = self.tool_preferences.entry(tool.to_string()).or_insert(0.5);
        *entry = (*entry + delta).clamp(0.0, 1.0);
    }

    /// Tool preferences sorted descending, as consumed by the decision prompt.
    pub fn sorted_tool_preferences(&self) -> Vec<(String, f64)> {
        let mut v: Vec<_> = self
            .tool_preferences
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        v
    }
}

/// Per-run introspective state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelfModel {
    pub tool_stats: HashMap<String, ToolStats>,
    pub suffering_trend: VecDeque<f64>,
    pub evolution_log: Vec<EvolutionRecord>,
    pub active_strategies: ActiveStrategies,
}

impl SelfModel {
    pub fn record_tool_use(&mut self, tool: &str, success: bool, suffering_delta: f64) {
        self.tool_stats
            .entry(tool.to_string())
            .or_default()
            .record(success, suffering_delta);
    }

    /// Bounded FIFO push, capped at `window` (default 20).
    pub fn push_suffering(&mut self, value: f64, window: usize) {
        self.suffering_trend.push_back(value);
        while self.suffering_trend.len() > window {
            self.suffering_trend.pop_front();
        }
    }

    pub fn mean_of_last(&self, n: usize) -> Option<f64> {
        if self.suffering_trend.is_empty() {
            return None;
        }
        let take = n.min(self.suffering_trend.len());
        let sum: f64 = self
            .suffering_trend
            .iter()
            .rev()
            .take(take)
            .sum();
        Some(sum / take as f64)
    }
}

//! The Dana (knowledge-sharing) plugin pattern: export/import knowledge
//! packets between agents and merge incoming strategies into one's own.

use agentlom_core::knowledge::{Gift, KnowledgePacket};
use agentlom_core::self_model::ActiveStrategies;

use super::Plugin;

pub struct DanaPlugin {
    pub agent_id: String,
    pub confidence_threshold: f64,
    pub max_gifts: usize,
}

impl DanaPlugin {
    pub fn new(agent_id: impl Into<String>, confidence_threshold: f64, max_gifts: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            confidence_threshold,
            max_gifts,
        }
    }

    pub fn export_packet(
        &self,
        gifts: Vec<Gift>,
        strategies: ActiveStrategies,
        evolution_summary: impl Into<String>,
    ) -> KnowledgePacket {
        KnowledgePacket::new(self.agent_id.clone(), gifts, strategies, evolution_summary)
    }

    /// Rejects packets from self; otherwise keeps gifts meeting the
    /// confidence threshold, capped by count.
    pub fn import_packet(&self, packet: &KnowledgePacket) -> Option<Vec<Gift>> {
        if packet.source_agent_id == self.agent_id {
            return None;
        }
        let mut gifts: Vec<Gift> = packet
            .gifts
            .iter()
            .filter(|g| g.confidence >= self.confidence_threshold)
            .cloned()
            .collect();
        gifts.truncate(self.max_gifts);
        Some(gifts)
    }

    /// Overlapping tool preferences are arithmetic-meaned; incoming-only
    /// entries are scaled by 0.7. `avoid_patterns`/`approach_hints` are
    /// deduplicated unions.
    pub fn merge_strategies(
        &self,
        current: &ActiveStrategies,
        incoming: &ActiveStrategies,
    ) -> ActiveStrategies {
        let mut merged = current.clone();
        for (tool, weight) in &incoming.tool_preferences {
            merged
                .tool_preferences
                .entry(tool.clone())
                .and_modify(|existing| *existing = (*existing + weight) / 2.0)
                .or_insert(weight * 0.7);
        }
        for pattern in &incoming.avoid_patterns {
            if !merged.avoid_patterns.contains(pattern) {
                merged.avoid_patterns.push_back(pattern.clone());
            }
        }
        for hint in &incoming.approach_hints {
            if !merged.approach_hints.contains(hint) {
                merged.approach_hints.push_back(hint.clone());
            }
        }
        merged
    }
}

#[async_trait::async_trait]
impl Plugin for DanaPlugin {
    fn name(&self) -> &str {
        "dana"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(id: &str, confidence: f64) -> Gift {
        Gift {
            id: id.to_string(),
            kind: "skill".to_string(),
            description: "d".to_string(),
            payload: serde_json::Value::Null,
            confidence,
            source_context: "ctx".to_string(),
        }
    }

    #[test]
    fn import_rejects_packets_from_self() {
        let dana = DanaPlugin::new("agent-a", 0.5, 10);
        let packet = dana.export_packet(vec![gift("g1", 0.9)], ActiveStrategies::default(), "summary");
        assert!(dana.import_packet(&packet).is_none());
    }

    #[test]
    fn import_filters_by_confidence_and_caps_count() {
        let dana = DanaPlugin::new("agent-a", 0.6, 1);
        let packet = KnowledgePacket::new(
            "agent-b",
            vec![gift("g1", 0.9), gift("g2", 0.3), gift("g3", 0.7)],
            ActiveStrategies::default(),
            "summary",
        );
        let gifts = dana.import_packet(&packet).unwrap();
        assert_eq!(gifts.len(), 1);
        assert_eq!(gifts[0].id, "g1");
    }

    #[test]
    fn merge_strategies_averages_overlap_and_scales_incoming_only() {
        let dana = DanaPlugin::new("agent-a", 0.5, 10);
        let mut current = ActiveStrategies::default();
        current.tool_preferences.insert("file_read".to_string(), 0.8);
        let mut incoming = ActiveStrategies::default();
        incoming.tool_preferences.insert("file_read".to_string(), 0.4);
        incoming.tool_preferences.insert("http_request".to_string(), 0.5);
        let merged = dana.merge_strategies(&current, &incoming);
        assert_eq!(merged.tool_preferences["file_read"], 0.6);
        assert_eq!(merged.tool_preferences["http_request"], 0.35);
    }
}

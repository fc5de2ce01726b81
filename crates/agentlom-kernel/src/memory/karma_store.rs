//! Karma store. Semantic retrieval identical in shape to the skill
//! and failure stores, plus causal-chain tracing, habitual-pattern queries,
//! and impermanence decay.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use agentlom_core::memory_model::KarmaEntry;

use super::cosine_similarity;

#[derive(Default)]
pub struct KarmaStore {
    entries: Mutex<Vec<KarmaEntry>>,
}

impl KarmaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, entry: KarmaEntry) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub fn list(&self) -> Vec<KarmaEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<KarmaEntry> {
        self.entries.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }

    pub fn retrieve(&self, query: &str, query_embedding: Option<&[f32]>, top_k: usize) -> Vec<KarmaEntry> {
        let entries = self.entries.lock().unwrap();
        if let Some(q) = query_embedding {
            let mut scored: Vec<(f32, &KarmaEntry)> = entries
                .iter()
                .filter_map(|e| e.embedding.as_deref().map(|emb| (cosine_similarity(q, emb), e)))
                .collect();
            if !scored.is_empty() {
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                return scored.into_iter().take(top_k).map(|(_, e)| e.clone()).collect();
            }
        }
        let query_lower = query.to_lowercase();
        entries
            .iter()
            .filter(|e| {
                query_lower.contains(&e.condition.to_lowercase())
                    || e.condition.to_lowercase().contains(&query_lower)
                    || query_lower.contains(&e.proverb.to_lowercase())
            })
            .take(top_k)
            .cloned()
            .collect()
    }

    /// The entry whose proverb/condition is textually closest to `text`,
    /// used to merge a newly-inferred cause id into its causal chain.
    pub fn most_similar(&self, text: &str) -> Option<KarmaEntry> {
        self.retrieve(text, None, 1).into_iter().next()
    }

    /// Merge `cause_id` into `entry_id`'s causal chain, de-duplicated.
    pub fn merge_cause(&self, entry_id: &str, cause_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            if !entry.causal_chain.iter().any(|c| c == cause_id) {
                entry.causal_chain.push(cause_id.to_string());
            }
        }
    }

    /// Breadth-first transitive closure over `causal_chain` ids.
    pub fn trace_causal_chain(&self, entry_id: &str) -> Vec<String> {
        let entries = self.entries.lock().unwrap();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(entry_id.to_string());
        visited.insert(entry_id.to_string());
        let mut result = Vec::new();
        while let Some(id) = queue.pop_front() {
            if let Some(entry) = entries.iter().find(|e| e.id == id) {
                for cause in &entry.causal_chain {
                    if visited.insert(cause.clone()) {
                        result.push(cause.clone());
                        queue.push_back(cause.clone());
                    }
                }
            }
        }
        result
    }

    /// All entries whose `occurrences >= min_occurrences`.
    pub fn habitual_patterns(&self, min_occurrences: u32) -> Vec<KarmaEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.occurrences >= min_occurrences)
            .cloned()
            .collect()
    }

    /// Multiplies every `transfer_weight` by `(1 - decay_rate)`; entries
    /// below `floor` are dropped. Strictly monotonically decreasing weights
    /// across successive calls (idempotent in type, not in value).
    pub fn apply_impermanence(&self, decay_rate: f64, floor: f64) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            entry.transfer_weight *= 1.0 - decay_rate;
        }
        entries.retain(|e| e.transfer_weight >= floor);
    }

    /// Record (or bump) an occurrence: increments `occurrences` and sets
    /// `last_seen`, never decreasing either.
    pub fn bump_occurrence(&self, id: &str) -> Option<u32> {
        let mut entries = self.entries.lock().unwrap();
        entries.iter_mut().find(|e| e.id == id).map(|entry| {
            entry.occurrences += 1;
            entry.last_seen = chrono::Utc::now();
            entry.occurrences
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlom_core::memory_model::{KarmaType, Severity};

    fn entry(id: &str, causal_chain: Vec<&str>) -> KarmaEntry {
        KarmaEntry {
            id: id.to_string(),
            proverb: format!("proverb {id}"),
            condition: format!("condition {id}"),
            severity: Severity::High,
            source: "test".to_string(),
            embedding: None,
            causal_chain: causal_chain.into_iter().map(|s| s.to_string()).collect(),
            transfer_weight: 1.0,
            karma_type: KarmaType::Unskillful,
            occurrences: 1,
            last_seen: chrono::Utc::now(),
        }
    }

    #[test]
    fn impermanence_is_strictly_monotonically_decreasing() {
        let store = KarmaStore::new();
        store.store(entry("k1", vec![]));
        store.apply_impermanence(0.05, 0.0);
        let w1 = store.get("k1").unwrap().transfer_weight;
        store.apply_impermanence(0.05, 0.0);
        let w2 = store.get("k1").unwrap().transfer_weight;
        assert!(w2 < w1);
    }

    #[test]
    fn entries_below_floor_are_dropped() {
        let store = KarmaStore::new();
        let mut e = entry("k1", vec![]);
        e.transfer_weight = 0.1;
        store.store(e);
        store.apply_impermanence(0.5, 0.2);
        assert!(store.get("k1").is_none());
    }

    #[test]
    fn trace_causal_chain_is_transitive_bfs() {
        let store = KarmaStore::new();
        store.store(entry("k1", vec!["k2"]));
        store.store(entry("k2", vec!["k3"]));
        store.store(entry("k3", vec![]));
        let chain = store.trace_causal_chain("k1");
        assert_eq!(chain, vec!["k2".to_string(), "k3".to_string()]);
    }

    #[test]
    fn habitual_patterns_filters_by_occurrence_floor() {
        let store = KarmaStore::new();
        let mut frequent = entry("k1", vec![]);
        frequent.occurrences = 5;
        store.store(frequent);
        store.store(entry("k2", vec![]));
        let habitual = store.habitual_patterns(3);
        assert_eq!(habitual.len(), 1);
        assert_eq!(habitual[0].id, "k1");
    }
}

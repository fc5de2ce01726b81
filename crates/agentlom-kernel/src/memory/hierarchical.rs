//! The three-layer hierarchical (Prajna) memory — working, episodic,
//! semantic — each with its own capacity, decay, and promotion policy.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use agentlom_core::memory_model::{MemoryEntry, MemoryLayer};
use serde_json::Value;

/// Per-layer tunables: working decays fastest and has the lowest capacity,
/// episodic is looser, semantic is unbounded and never decays.
#[derive(Debug, Clone)]
pub struct HierarchicalMemoryConfig {
    pub working_capacity: usize,
    pub episodic_capacity: usize,
    pub working_decay: f64,
    pub episodic_decay: f64,
    pub working_promotion_access_count: u32,
    pub working_promotion_relevance: f64,
    pub episodic_promotion_access_count: u32,
    pub episodic_promotion_relevance: f64,
}

impl Default for HierarchicalMemoryConfig {
    fn default() -> Self {
        Self {
            working_capacity: 50,
            episodic_capacity: 200,
            working_decay: 0.3,
            episodic_decay: 0.1,
            working_promotion_access_count: 3,
            working_promotion_relevance: 0.7,
            episodic_promotion_access_count: 5,
            episodic_promotion_relevance: 0.85,
        }
    }
}

impl HierarchicalMemoryConfig {
    pub fn from_memory_config(cfg: &agentlom_core::config::MemoryConfig) -> Self {
        let defaults = Self::default();
        Self {
            working_capacity: cfg.working_capacity,
            episodic_capacity: cfg.episodic_capacity,
            working_promotion_access_count: cfg.promotion_access_count,
            working_promotion_relevance: cfg.promotion_threshold,
            ..defaults
        }
    }
}

#[derive(Default)]
struct Layers {
    working: Vec<MemoryEntry>,
    episodic: Vec<MemoryEntry>,
    semantic: Vec<MemoryEntry>,
}

impl Layers {
    fn list_mut(&mut self, layer: MemoryLayer) -> &mut Vec<MemoryEntry> {
        match layer {
            MemoryLayer::Working => &mut self.working,
            MemoryLayer::Episodic => &mut self.episodic,
            MemoryLayer::Semantic => &mut self.semantic,
        }
    }

    fn list(&self, layer: MemoryLayer) -> &Vec<MemoryEntry> {
        match layer {
            MemoryLayer::Working => &self.working,
            MemoryLayer::Episodic => &self.episodic,
            MemoryLayer::Semantic => &self.semantic,
        }
    }
}

pub struct HierarchicalMemory {
    config: HierarchicalMemoryConfig,
    layers: Mutex<Layers>,
}

impl HierarchicalMemory {
    pub fn new(config: HierarchicalMemoryConfig) -> Self {
        Self {
            config,
            layers: Mutex::new(Layers::default()),
        }
    }

    /// Insert a new entry, evicting the least-relevant existing entry in a
    /// bounded layer if at capacity. Returns the generated id.
    pub fn store(&self, layer: MemoryLayer, content: Value, metadata: Value, relevance: f64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let entry = MemoryEntry {
            id: id.clone(),
            layer,
            content,
            metadata,
            relevance: relevance.clamp(0.0, 1.0),
            access_count: 0,
            created_at: chrono::Utc::now(),
        };
        let mut layers = self.layers.lock().unwrap();
        let capacity = match layer {
            MemoryLayer::Working => Some(self.config.working_capacity),
            MemoryLayer::Episodic => Some(self.config.episodic_capacity),
            MemoryLayer::Semantic => None,
        };
        let list = layers.list_mut(layer);
        if let Some(cap) = capacity {
            while list.len() >= cap {
                if let Some((idx, _)) = list
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| a.relevance.partial_cmp(&b.relevance).unwrap_or(std::cmp::Ordering::Equal))
                {
                    list.remove(idx);
                } else {
                    break;
                }
            }
        }
        list.push(entry);
        id
    }

    /// Search the given layer, or all layers if `None`. Results are
    /// independent copies — no aliasing with stored state.
    pub fn retrieve(&self, query: &str, layer: Option<MemoryLayer>) -> Vec<MemoryEntry> {
        let mut layers = self.layers.lock().unwrap();
        let query_lower = query.to_lowercase();
        let layers_to_search = match layer {
            Some(l) => vec![l],
            None => vec![MemoryLayer::Working, MemoryLayer::Episodic, MemoryLayer::Semantic],
        };
        let mut results = Vec::new();
        for l in layers_to_search {
            for entry in layers.list_mut(l).iter_mut() {
                let haystack = format!("{} {}", entry.content, entry.metadata).to_lowercase();
                if query.is_empty() || haystack.contains(&query_lower) {
                    entry.access_count += 1;
                    results.push(entry.clone());
                }
            }
        }
        results
    }

    /// Apply decay, evict zero-relevance entries, then promote eligible
    /// entries. Snapshots ids before iterating so concurrent structural
    /// changes during the pass can't invalidate the walk.
    pub fn consolidate(&self) {
        let mut layers = self.layers.lock().unwrap();

        for (l, decay) in [
            (MemoryLayer::Working, self.config.working_decay),
            (MemoryLayer::Episodic, self.config.episodic_decay),
        ] {
            for entry in layers.list_mut(l).iter_mut() {
                entry.relevance = (entry.relevance - decay).max(0.0);
            }
            layers.list_mut(l).retain(|e| e.relevance > 0.0);
        }

        let working_ids: Vec<String> = layers.working.iter().map(|e| e.id.clone()).collect();
        for id in working_ids {
            let eligible = layers
                .working
                .iter()
                .find(|e| e.id == id)
                .map(|e| {
                    e.access_count >= self.config.working_promotion_access_count
                        && e.relevance >= self.config.working_promotion_relevance
                })
                .unwrap_or(false);
            if eligible {
                self.promote_locked(&mut layers, &id, MemoryLayer::Episodic);
            }
        }

        let episodic_ids: Vec<String> = layers.episodic.iter().map(|e| e.id.clone()).collect();
        for id in episodic_ids {
            let eligible = layers
                .episodic
                .iter()
                .find(|e| e.id == id)
                .map(|e| {
                    e.access_count >= self.config.episodic_promotion_access_count
                        && e.relevance >= self.config.episodic_promotion_relevance
                })
                .unwrap_or(false);
            if eligible {
                self.promote_locked(&mut layers, &id, MemoryLayer::Semantic);
            }
        }
    }

    /// Explicitly lift an entry into `target`, boosting relevance by +0.2
    /// (capped at 1.0).
    pub fn promote(&self, id: &str, target: MemoryLayer) -> bool {
        let mut layers = self.layers.lock().unwrap();
        self.promote_locked(&mut layers, id, target)
    }

    fn promote_locked(&self, layers: &mut Layers, id: &str, target: MemoryLayer) -> bool {
        for source in [MemoryLayer::Working, MemoryLayer::Episodic, MemoryLayer::Semantic] {
            let list = layers.list_mut(source);
            if let Some(idx) = list.iter().position(|e| e.id == id) {
                let mut entry = list.remove(idx);
                entry.layer = target;
                entry.relevance = (entry.relevance + 0.2).min(1.0);
                layers.list_mut(target).push(entry);
                return true;
            }
        }
        false
    }

    pub fn stats(&self) -> HashMap<String, usize> {
        let layers = self.layers.lock().unwrap();
        HashMap::from([
            ("working".to_string(), layers.working.len()),
            ("episodic".to_string(), layers.episodic.len()),
            ("semantic".to_string(), layers.semantic.len()),
        ])
    }

    /// Serialize all entries to `dir/hierarchical_memory.json`.
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let layers = self.layers.lock().unwrap();
        let all: Vec<&MemoryEntry> = layers
            .working
            .iter()
            .chain(layers.episodic.iter())
            .chain(layers.semantic.iter())
            .collect();
        let path = dir.join("hierarchical_memory.json");
        let json = serde_json::to_string_pretty(&all)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Tolerates a missing file or corrupt JSON by leaving memory empty.
    pub fn load(&self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join("hierarchical_memory.json");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Ok(());
        };
        let Ok(entries) = serde_json::from_str::<Vec<MemoryEntry>>(&contents) else {
            return Ok(());
        };
        let mut layers = self.layers.lock().unwrap();
        *layers = Layers::default();
        for entry in entries {
            layers.list_mut(entry.layer).push(entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieve_results_are_independent_copies() {
        let mem = HierarchicalMemory::new(HierarchicalMemoryConfig::default());
        mem.store(MemoryLayer::Working, serde_json::json!("hello world"), serde_json::json!({}), 0.9);
        let mut r1 = mem.retrieve("hello", None);
        r1[0].relevance = 0.0;
        let r2 = mem.retrieve("hello", None);
        assert_eq!(r2[0].relevance, 0.9);
    }

    #[test]
    fn promote_boosts_relevance_and_moves_layer() {
        let mem = HierarchicalMemory::new(HierarchicalMemoryConfig::default());
        let id = mem.store(MemoryLayer::Working, serde_json::json!("x"), serde_json::json!({}), 0.5);
        assert!(mem.promote(&id, MemoryLayer::Episodic));
        let stats = mem.stats();
        assert_eq!(stats["working"], 0);
        assert_eq!(stats["episodic"], 1);
        let found = mem.retrieve("x", Some(MemoryLayer::Episodic));
        assert!((found[0].relevance - 0.7).abs() < 1e-9);
    }

    #[test]
    fn consolidate_evicts_zero_relevance_entries() {
        let mut config = HierarchicalMemoryConfig::default();
        config.working_decay = 1.0;
        let mem = HierarchicalMemory::new(config);
        mem.store(MemoryLayer::Working, serde_json::json!("x"), serde_json::json!({}), 0.5);
        mem.consolidate();
        assert_eq!(mem.stats()["working"], 0);
    }

    #[test]
    fn consolidate_promotes_eligible_entries() {
        let mut config = HierarchicalMemoryConfig::default();
        config.working_decay = 0.0;
        config.working_promotion_access_count = 1;
        config.working_promotion_relevance = 0.5;
        let mem = HierarchicalMemory::new(config);
        let id = mem.store(MemoryLayer::Working, serde_json::json!("x"), serde_json::json!({}), 0.9);
        let _ = mem.retrieve("x", Some(MemoryLayer::Working));
        mem.consolidate();
        assert_eq!(mem.stats()["working"], 0);
        assert_eq!(mem.stats()["episodic"], 1);
        let _ = id;
    }

    #[test]
    fn save_then_load_round_trips_counts_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let mem = HierarchicalMemory::new(HierarchicalMemoryConfig::default());
        mem.store(MemoryLayer::Working, serde_json::json!("alpha"), serde_json::json!({}), 0.5);
        mem.store(MemoryLayer::Semantic, serde_json::json!("beta"), serde_json::json!({}), 0.9);
        mem.save(dir.path()).unwrap();

        let mem2 = HierarchicalMemory::new(HierarchicalMemoryConfig::default());
        mem2.load(dir.path()).unwrap();
        assert_eq!(mem2.stats(), mem.stats());
        assert!(!mem2.retrieve("alpha", None).is_empty());
        assert!(!mem2.retrieve("beta", None).is_empty());
    }

    #[test]
    fn load_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mem = HierarchicalMemory::new(HierarchicalMemoryConfig::default());
        assert!(mem.load(dir.path()).is_ok());
    }
}

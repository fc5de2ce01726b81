//! `store`/`retrieve`/`list` over [`SkillEntry`].

use std::sync::Mutex;

use agentlom_core::memory_model::SkillEntry;

use super::cosine_similarity;

/// Insertion-ordered, id-keyed store of skill entries with best-effort
/// semantic retrieval (falls back to substring search with no embeddings).
#[derive(Default)]
pub struct SkillStore {
    entries: Mutex<Vec<SkillEntry>>,
}

impl SkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id.
    pub fn store(&self, entry: SkillEntry) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub fn list(&self) -> Vec<SkillEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Top-`top_k` entries by cosine similarity of `query_embedding` to
    /// stored embeddings. With no embeddings anywhere, falls back to
    /// substring search over `trigger` then `command`.
    pub fn retrieve(&self, query: &str, query_embedding: Option<&[f32]>, top_k: usize) -> Vec<SkillEntry> {
        let entries = self.entries.lock().unwrap();
        if let Some(q) = query_embedding {
            let mut scored: Vec<(f32, &SkillEntry)> = entries
                .iter()
                .filter_map(|e| e.embedding.as_deref().map(|emb| (cosine_similarity(q, emb), e)))
                .collect();
            if !scored.is_empty() {
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                return scored.into_iter().take(top_k).map(|(_, e)| e.clone()).collect();
            }
        }
        let query_lower = query.to_lowercase();
        let mut matches: Vec<SkillEntry> = entries
            .iter()
            .filter(|e| query_lower.contains(&e.trigger.to_lowercase()) || e.trigger.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        if matches.len() < top_k {
            for e in entries.iter() {
                if matches.iter().any(|m| m.id == e.id) {
                    continue;
                }
                if query_lower.contains(&e.command.to_lowercase()) || e.command.to_lowercase().contains(&query_lower) {
                    matches.push(e.clone());
                }
            }
        }
        matches.truncate(top_k);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, trigger: &str, command: &str) -> SkillEntry {
        SkillEntry {
            id: id.to_string(),
            trigger: trigger.to_string(),
            command: command.to_string(),
            condition: "always".to_string(),
            embedding: None,
        }
    }

    #[test]
    fn store_replaces_by_id() {
        let store = SkillStore::new();
        store.store(entry("s1", "build fails", "cargo build --release"));
        store.store(entry("s1", "build fails v2", "cargo build"));
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].trigger, "build fails v2");
    }

    #[test]
    fn retrieve_falls_back_to_substring_search_without_embeddings() {
        let store = SkillStore::new();
        store.store(entry("s1", "network timeout", "retry with backoff"));
        store.store(entry("s2", "disk full", "clean temp files"));
        let results = store.retrieve("we hit a network timeout again", None, 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "s1");
    }

    #[test]
    fn retrieve_prefers_embeddings_when_present() {
        let store = SkillStore::new();
        let mut e1 = entry("s1", "a", "cmd-a");
        e1.embedding = Some(vec![1.0, 0.0]);
        let mut e2 = entry("s2", "b", "cmd-b");
        e2.embedding = Some(vec![0.0, 1.0]);
        store.store(e1);
        store.store(e2);
        let results = store.retrieve("irrelevant text", Some(&[1.0, 0.0]), 1);
        assert_eq!(results[0].id, "s1");
    }
}

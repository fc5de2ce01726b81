//! Same shape as the skill store, plus `export_current` used at
//! context-reset boundaries. Append-only for the lifetime of a run.

use std::sync::Mutex;

use agentlom_core::memory_model::FailureEntry;

use super::cosine_similarity;

#[derive(Default)]
pub struct FailureStore {
    entries: Mutex<Vec<FailureEntry>>,
}

impl FailureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coalesces duplicates with identical proverb+condition, keeping the
    /// latest — retrieval only ever needs to surface the newest lesson.
    pub fn store(&self, entry: FailureEntry) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.proverb == entry.proverb && e.condition == entry.condition)
        {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    pub fn list(&self) -> Vec<FailureEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// All entries recorded so far this run — surfaced to the milestone
    /// reset callback so failure knowledge survives a context reset.
    pub fn export_current(&self) -> Vec<FailureEntry> {
        self.list()
    }

    pub fn retrieve(&self, query: &str, query_embedding: Option<&[f32]>, top_k: usize) -> Vec<FailureEntry> {
        let entries = self.entries.lock().unwrap();
        if let Some(q) = query_embedding {
            let mut scored: Vec<(f32, &FailureEntry)> = entries
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
}

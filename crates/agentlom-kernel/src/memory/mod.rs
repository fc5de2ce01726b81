//! The memory stack: skill retriever, failure-knowledge store,
//! karma store with impermanence decay, and hierarchical (Prajna) memory.

pub mod failure_store;
pub mod hierarchical;
pub mod karma_store;
pub mod skill_store;

pub use failure_store::FailureStore;
pub use hierarchical::HierarchicalMemory;
pub use karma_store::KarmaStore;
pub use skill_store::SkillStore;

/// Cosine similarity of two equal-length embedding vectors. Returns 0.0 for
/// mismatched lengths or zero-norm vectors rather than panicking — callers
/// treat an unscored candidate as non-matching, not as an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

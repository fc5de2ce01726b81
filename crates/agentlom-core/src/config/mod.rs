//! Configuration layer: environment-driven, grouped by concern.

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use schema::{
    EvolutionConfig, KernelLimits, LlmConfig, MemoryConfig, ObservabilityConfig, PathsConfig,
    PersistenceConfig,
};

//! Config structs grouped by concern, loaded from the environment with
//! sensible defaults. None of these are required to construct a kernel —
//! callers may build `KernelConfig` directly — but `from_env()` is the
//! convenient path for binaries and tests.

use super::env_keys::{evolution, kernel, llm, memory, observability, paths, persistence};
use super::loader::{env_bool, env_f64, env_optional, env_or, env_usize, expand_home};

/// LLM API configuration (transport details only — the LLM *capability* used
/// by the kernel is the [`crate::llm::LlmAdapter`] trait, not this struct).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            api_base: env_or(llm::API_BASE, llm::API_BASE_ALIASES, || {
                "https://api.openai.com/v1".to_string()
            }),
            api_key: env_or(llm::API_KEY, llm::API_KEY_ALIASES, String::new),
            model: env_or(llm::MODEL, llm::MODEL_ALIASES, || "gpt-4o".to_string()),
        }
    }
}

/// Kernel loop bounds: step budget, retry budget, and craving-loop detection.
#[derive(Debug, Clone)]
pub struct KernelLimits {
    pub max_steps: usize,
    pub max_retries: u32,
    pub tanha_threshold: usize,
    pub suffering_window: usize,
}

impl Default for KernelLimits {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_retries: 3,
            tanha_threshold: 3,
            suffering_window: 20,
        }
    }
}

impl KernelLimits {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let defaults = Self::default();
        Self {
            max_steps: env_usize(kernel::MAX_STEPS, defaults.max_steps),
            max_retries: env_usize(kernel::MAX_RETRIES, defaults.max_retries as usize) as u32,
            tanha_threshold: env_usize(kernel::TANHA_THRESHOLD, defaults.tanha_threshold),
            suffering_window: env_usize(kernel::SUFFERING_WINDOW, defaults.suffering_window),
        }
    }
}

/// Hierarchical memory and karma decay tunables.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub karma_decay_rate: f64,
    pub karma_floor: f64,
    pub working_capacity: usize,
    pub episodic_capacity: usize,
    pub promotion_threshold: f64,
    pub promotion_access_count: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            karma_decay_rate: 0.05,
            karma_floor: 0.05,
            working_capacity: 50,
            episodic_capacity: 200,
            promotion_threshold: 0.7,
            promotion_access_count: 3,
        }
    }
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let defaults = Self::default();
        Self {
            karma_decay_rate: env_f64(memory::KARMA_DECAY_RATE, defaults.karma_decay_rate),
            karma_floor: env_f64(memory::KARMA_FLOOR, defaults.karma_floor),
            working_capacity: env_usize(memory::WORKING_CAPACITY, defaults.working_capacity),
            episodic_capacity: env_usize(memory::EPISODIC_CAPACITY, defaults.episodic_capacity),
            promotion_threshold: env_f64(memory::PROMOTION_THRESHOLD, defaults.promotion_threshold),
            promotion_access_count: env_usize(
                memory::PROMOTION_ACCESS_COUNT,
                defaults.promotion_access_count as usize,
            ) as u32,
        }
    }
}

/// Self-evolver gating.
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub threshold: f64,
    pub min_confidence: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_confidence: 0.5,
        }
    }
}

impl EvolutionConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let defaults = Self::default();
        Self {
            threshold: env_f64(evolution::THRESHOLD, defaults.threshold),
            min_confidence: env_f64(evolution::MIN_CONFIDENCE, defaults.min_confidence),
        }
    }
}

/// File-system paths for the opt-in persistence layer.
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    pub state_path: Option<String>,
    pub self_model_path: Option<String>,
    pub memory_dir: Option<String>,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            state_path: env_optional(paths::STATE_PATH, &[]).map(|p| expand_home(&p)),
            self_model_path: env_optional(paths::SELF_MODEL_PATH, &[]).map(|p| expand_home(&p)),
            memory_dir: env_optional(paths::MEMORY_DIR, &[]).map(|p| expand_home(&p)),
        }
    }
}

/// Minimum interval between throttled state snapshots.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub throttle_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { throttle_ms: 0 }
    }
}

impl PersistenceConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            throttle_ms: env_usize(persistence::THROTTLE_MS, Self::default().throttle_ms as usize)
                as u64,
        }
    }
}

/// Observability: log level/format, quiet mode.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
    pub quiet: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            log_level: env_or(
                observability::LOG_LEVEL,
                observability::LOG_LEVEL_ALIASES,
                || "agentlom=info".to_string(),
            ),
            log_json: env_bool(observability::LOG_JSON, &[], false),
            quiet: env_bool(observability::QUIET, &[], false),
        }
    }

    /// Install a `tracing-subscriber` global subscriber from this config.
    /// Safe to call more than once; later calls are no-ops.
    pub fn install(&self) {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_new(&self.log_level)
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let result = if self.log_json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        let _ = result;
    }
}

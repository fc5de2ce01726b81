//! Canonical environment variable names, grouped by concern: one module per
//! concern, a primary key plus a slice of accepted aliases for backward
//! compatibility.

pub mod llm {
    pub const API_BASE: &str = "AGENTLOM_API_BASE";
    pub const API_BASE_ALIASES: &[&str] = &["OPENAI_API_BASE", "BASE_URL"];
    pub const API_KEY: &str = "AGENTLOM_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &["OPENAI_API_KEY", "API_KEY"];
    pub const MODEL: &str = "AGENTLOM_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["OPENAI_MODEL", "MODEL"];
}

pub mod kernel {
    pub const MAX_STEPS: &str = "AGENTLOM_MAX_STEPS";
    pub const MAX_RETRIES: &str = "AGENTLOM_MAX_RETRIES";
    pub const TANHA_THRESHOLD: &str = "AGENTLOM_TANHA_THRESHOLD";
    pub const SUFFERING_WINDOW: &str = "AGENTLOM_SUFFERING_WINDOW";
}

pub mod memory {
    pub const KARMA_DECAY_RATE: &str = "AGENTLOM_KARMA_DECAY_RATE";
    pub const KARMA_FLOOR: &str = "AGENTLOM_KARMA_FLOOR";
    pub const WORKING_CAPACITY: &str = "AGENTLOM_WORKING_CAPACITY";
    pub const EPISODIC_CAPACITY: &str = "AGENTLOM_EPISODIC_CAPACITY";
    pub const PROMOTION_THRESHOLD: &str = "AGENTLOM_PROMOTION_THRESHOLD";
    pub const PROMOTION_ACCESS_COUNT: &str = "AGENTLOM_PROMOTION_ACCESS_COUNT";
}

pub mod evolution {
    pub const THRESHOLD: &str = "AGENTLOM_EVOLUTION_THRESHOLD";
    pub const MIN_CONFIDENCE: &str = "AGENTLOM_EVOLUTION_MIN_CONFIDENCE";
}

pub mod paths {
    pub const STATE_PATH: &str = "AGENTLOM_STATE_PATH";
    pub const SELF_MODEL_PATH: &str = "AGENTLOM_SELF_MODEL_PATH";
    pub const MEMORY_DIR: &str = "AGENTLOM_MEMORY_DIR";
}

pub mod persistence {
    pub const THROTTLE_MS: &str = "AGENTLOM_PERSIST_THROTTLE_MS";
}

pub mod observability {
    pub const LOG_LEVEL: &str = "AGENTLOM_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["RUST_LOG"];
    pub const LOG_JSON: &str = "AGENTLOM_LOG_JSON";
    pub const QUIET: &str = "AGENTLOM_QUIET";
}

//! Error categories for the agent kernel.
//!
//! Parse errors are recovered locally and never surface as `AgentError`;
//! everything else below does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is already running")]
    AlreadyRunning,

    #[error("LLM transport error after {retries} retries: {source}")]
    LlmTransport {
        retries: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("plugin hook error: {0}")]
    Plugin(anyhow::Error),

    #[error("milestone reset callback failed after {attempts} attempts: {source}")]
    MilestoneReset {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("snapshot function failed: {0}")]
    Snapshot(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

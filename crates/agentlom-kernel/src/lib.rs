//! The agent kernel: the goal/snapshot/delta loop, milestone runner,
//! memory stack, plugin pipeline, and opt-in persistence. The self-evolver
//! itself lives in `agentlom-evolution`; this crate calls into it once per
//! run from [`kernel::Agent::finalize`].

pub mod causal;
pub mod decision;
pub mod delta;
pub mod dispatch;
pub mod failure_recording;
pub mod kernel;
pub mod memory;
pub mod milestone;
pub mod persistence;
pub mod plugins;
pub mod retry;

pub use kernel::{Agent, AgentConfig, AgentState, SnapshotSource};

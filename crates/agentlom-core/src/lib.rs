//! Core data model and contracts shared by the agentlom kernel, memory stack,
//! self-evolver, and plugin pipeline.
//!
//! This crate deliberately carries no loop logic — it is the vocabulary the
//! other crates speak. See `agentlom-kernel` for the agent loop and
//! `agentlom-evolution` for the self-evolver.

pub mod config;
pub mod error;
pub mod events;
pub mod knowledge;
pub mod llm;
pub mod memory_model;
pub mod model;
pub mod self_model;
pub mod tool;

pub use error::AgentError;

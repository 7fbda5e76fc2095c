//! Local LLM inference
//!
//! This module supervises the llama.cpp server process and talks to its completion endpoint.

pub mod model;
pub mod prompt;
pub mod streaming;
pub mod supervisor;

pub use streaming::CompletionClient;
pub use supervisor::{InferenceSupervisor, SupervisorError};

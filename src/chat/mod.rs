//! Persona chat
//!
//! Single-flight message sending and live-reply hand-off.

pub mod gate;
pub mod relay;
pub mod service;

pub use service::{ChatError, ChatService};

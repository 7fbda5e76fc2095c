//! Persona Chat Library
//!
//! Runtime for role-play conversations with simulated stakeholders, backed by a
//! locally supervised llama.cpp completion server.

pub mod chat;
pub mod inference;
pub mod persona;
pub mod session;
pub mod storage;
pub mod system;
pub mod types;

#[cfg(test)]
mod test_support;

//! System utilities
//!
//! This module provides memory probing and process lookup.

pub mod process;
pub mod resources;

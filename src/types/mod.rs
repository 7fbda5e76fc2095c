//! Shared type definitions
//!
//! This module contains the data types shared across the runtime.

pub mod config;
pub mod message;

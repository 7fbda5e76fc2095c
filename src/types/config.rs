//! Configuration types
//!
//! Endpoint and sampling configuration shared by the supervisor and the completion client.

use serde::{Deserialize, Serialize};

/// Where the local inference server listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    /// Completion endpoint URL
    pub fn completion_url(&self) -> String {
        format!("http://{}:{}/completion", self.host, self.port)
    }
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Fixed sampling parameters sent with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Maximum number of new tokens
    pub n_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            n_predict: 2048,
            temperature: 0.2,
            top_k: 20,
            top_p: 0.8,
            repeat_penalty: 1.1,
        }
    }
}

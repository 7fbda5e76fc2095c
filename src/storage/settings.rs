//! Settings storage
//!
//! Manages persistence of the runtime settings.

use crate::storage::{get_data_dir, StorageError};
use crate::types::config::{SamplingConfig, ServerEndpoint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Directory where model files (.gguf) are stored
    pub models_directory: PathBuf,
    /// Path to the inference server executable
    pub server_binary: PathBuf,
    /// Process name used to detect an already running server
    #[serde(default = "default_server_process_name")]
    pub server_process_name: String,
    /// Worker threads handed to the server
    pub threads: u32,
    /// Context window size handed to the server
    pub context_size: u32,
    #[serde(default)]
    pub endpoint: ServerEndpoint,
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Seconds allowed to establish a connection to the server
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_server_process_name() -> String {
    "llama-server".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for AppSettings {
    fn default() -> Self {
        let server_file = if cfg!(windows) {
            "llama-server.exe"
        } else {
            "llama-server"
        };
        Self {
            models_directory: get_data_dir()
                .ok()
                .map(|d| d.join("Models"))
                .unwrap_or_else(|| PathBuf::from("./Models")),
            server_binary: PathBuf::from("llama-bin").join(server_file),
            server_process_name: default_server_process_name(),
            threads: 6,
            context_size: 1024,
            endpoint: ServerEndpoint::default(),
            sampling: SamplingConfig::default(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl AppSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        let defaults = SamplingConfig::default();

        self.sampling.temperature = self.sampling.temperature.clamp(0.0, 2.0);
        self.sampling.top_p = self.sampling.top_p.clamp(0.0, 1.0);
        if self.sampling.top_k == 0 {
            self.sampling.top_k = defaults.top_k;
        }
        if self.sampling.repeat_penalty <= 0.0 {
            self.sampling.repeat_penalty = defaults.repeat_penalty;
        }
        self.sampling.n_predict = self.sampling.n_predict.clamp(1, 65536);

        if self.threads == 0 {
            self.threads = 6;
        }
        if self.context_size < 256 {
            self.context_size = 1024;
        }
        if self.endpoint.port == 0 {
            self.endpoint.port = 8080;
        }
        if self.endpoint.host.trim().is_empty() {
            self.endpoint.host = "127.0.0.1".to_string();
        }
        if self.server_process_name.trim().is_empty() {
            self.server_process_name = default_server_process_name();
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = default_connect_timeout();
        }
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> AppSettings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            AppSettings::default()
        }
    }
}

/// Load and validate settings from a specific file
pub fn load_settings_from(path: &Path) -> Result<AppSettings, StorageError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(AppSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: AppSettings = serde_json::from_str(&json)?;
    settings.validate();

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Save settings to the default location
pub fn save_settings(settings: &AppSettings) -> Result<(), StorageError> {
    save_settings_to(settings, &get_settings_path()?)
}

/// Save settings to a specific file
pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}

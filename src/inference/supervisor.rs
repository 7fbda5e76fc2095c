//! Local inference server supervision
//!
//! Owns the lifecycle of the llama.cpp server process: picks a model by available
//! memory, attaches to an already running server or spawns a new one, and stops it.
//! One supervisor instance corresponds to one inference process for the run.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::inference::model::ModelSelection;
use crate::storage::settings::AppSettings;
use crate::system::process::{find_running, kill_pid};
use crate::system::resources::{read_memory, MemoryInfo};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Configuration errors raised while starting the supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("System memory could not be read")]
    MemoryUnavailable,
    #[error("Model not found at: {0}")]
    ModelNotFound(PathBuf),
    #[error("Failed to start inference server '{binary}': {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

enum ServerHandle {
    /// Started by this supervisor
    Spawned(Child),
    /// Found already running at startup
    Adopted(u32),
}

impl ServerHandle {
    fn pid(&self) -> Option<u32> {
        match self {
            ServerHandle::Spawned(child) => child.id(),
            ServerHandle::Adopted(pid) => Some(*pid),
        }
    }
}

pub struct InferenceSupervisor {
    selection: ModelSelection,
    adopted: bool,
    handle: Mutex<Option<ServerHandle>>,
}

impl InferenceSupervisor {
    /// Probe memory, select a model and make sure a server is running
    pub async fn start(settings: &AppSettings) -> Result<Self, SupervisorError> {
        let memory = read_memory().ok_or(SupervisorError::MemoryUnavailable)?;
        Self::start_with_memory(settings, memory).await
    }

    pub async fn start_with_memory(
        settings: &AppSettings,
        memory: MemoryInfo,
    ) -> Result<Self, SupervisorError> {
        let selection = resolve_model(memory, &settings.models_directory)?;

        tracing::info!(
            "RAM avail MB = {:.0} (total {:.0}), tier = {:?}, model = {:?}",
            memory.available_mb,
            memory.total_mb,
            selection.tier,
            selection.path
        );
        if let Some(notice) = selection.notice() {
            tracing::warn!("{}", notice);
        }

        if let Some(pid) = find_running(&settings.server_process_name).await {
            tracing::info!(
                "Inference server '{}' already running (pid {}), attaching",
                settings.server_process_name,
                pid
            );
            return Ok(Self {
                selection,
                adopted: true,
                handle: Mutex::new(Some(ServerHandle::Adopted(pid))),
            });
        }

        let child = spawn_server(settings, &selection.path)?;
        tracing::info!(
            "Started inference server {:?} (pid {:?}) on port {}",
            settings.server_binary,
            child.id(),
            settings.endpoint.port
        );

        Ok(Self {
            selection,
            adopted: false,
            handle: Mutex::new(Some(ServerHandle::Spawned(child))),
        })
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    /// User-visible warning when the smallest model had to be chosen
    pub fn low_memory_notice(&self) -> Option<&'static str> {
        self.selection.notice()
    }

    /// Whether an existing server was attached instead of spawned
    pub fn is_adopted(&self) -> bool {
        self.adopted
    }

    pub async fn pid(&self) -> Option<u32> {
        self.handle.lock().await.as_ref().and_then(ServerHandle::pid)
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Terminate the server and release its handle. Safe to call repeatedly.
    pub async fn stop(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };

        match handle {
            ServerHandle::Spawned(mut child) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Error shutting down inference server: {}", e);
                }
            }
            ServerHandle::Adopted(pid) => {
                if let Err(e) = kill_pid(pid).await {
                    tracing::warn!("Error shutting down inference server (pid {}): {}", pid, e);
                }
            }
        }
        tracing::info!("Inference server stopped");
    }
}

/// Choose the model for `memory` and check the asset exists
pub fn resolve_model(memory: MemoryInfo, models_dir: &Path) -> Result<ModelSelection, SupervisorError> {
    let selection = ModelSelection::new(memory, models_dir);
    if !selection.path.is_file() {
        return Err(SupervisorError::ModelNotFound(selection.path));
    }
    Ok(selection)
}

fn spawn_server(settings: &AppSettings, model_path: &Path) -> Result<Child, SupervisorError> {
    let mut cmd = Command::new(&settings.server_binary);
    cmd.arg("--model")
        .arg(model_path)
        .args(["--threads", &settings.threads.to_string()])
        .args(["--ctx-size", &settings.context_size.to_string()])
        .args(["--host", &settings.endpoint.host])
        .args(["--port", &settings.endpoint.port.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    cmd.spawn().map_err(|source| SupervisorError::Spawn {
        binary: settings.server_binary.clone(),
        source,
    })
}

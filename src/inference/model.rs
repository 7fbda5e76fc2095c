//! Model tier selection
//!
//! Maps available memory to one of the bundled GGUF assets.

use std::path::{Path, PathBuf};

use crate::system::resources::MemoryInfo;

/// Below this much available memory the smallest model is used
pub const LOW_MEMORY_THRESHOLD_MB: f64 = 4096.0;
/// Below this much available memory the mid-size model is used
pub const MID_MEMORY_THRESHOLD_MB: f64 = 8192.0;

pub const LOW_MEMORY_NOTICE: &str = "Your computer currently has less than 4 GB of available RAM, \
which may affect the LLM's performance. If your system has more total RAM than what is currently \
available, try closing other applications and restarting this program to improve performance";

/// Memory tier, ordered from smallest to largest model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelTier {
    Low,
    Mid,
    High,
}

impl ModelTier {
    pub fn for_available_mb(available_mb: f64) -> Self {
        if available_mb < LOW_MEMORY_THRESHOLD_MB {
            ModelTier::Low
        } else if available_mb < MID_MEMORY_THRESHOLD_MB {
            ModelTier::Mid
        } else {
            ModelTier::High
        }
    }

    /// Asset file name inside the models directory
    pub fn file_name(self) -> &'static str {
        match self {
            ModelTier::Low => "gemma-3-4b-it-QAT-Q4_0.gguf",
            ModelTier::Mid => "gemma-3-4b-it-Q4_K_M.gguf",
            ModelTier::High => "gemma-3-12b-it-Q4_K_M.gguf",
        }
    }

    pub fn notice(self) -> Option<&'static str> {
        match self {
            ModelTier::Low => Some(LOW_MEMORY_NOTICE),
            ModelTier::Mid | ModelTier::High => None,
        }
    }
}

/// Outcome of tier selection for the current machine
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    pub tier: ModelTier,
    pub path: PathBuf,
    pub memory: MemoryInfo,
}

impl ModelSelection {
    pub fn new(memory: MemoryInfo, models_dir: &Path) -> Self {
        let tier = ModelTier::for_available_mb(memory.available_mb);
        Self {
            tier,
            path: models_dir.join(tier.file_name()),
            memory,
        }
    }

    pub fn notice(&self) -> Option<&'static str> {
        self.tier.notice()
    }
}

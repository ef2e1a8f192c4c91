//! GPU data types

use serde::{Deserialize, Serialize};

/// Which vendor adapter is bound to the discrete GPU
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuKind {
    Nvidia,
    Amd,
    None,
}

impl std::fmt::Display for GpuKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuKind::Nvidia => write!(f, "NVIDIA"),
            GpuKind::Amd => write!(f, "AMD"),
            GpuKind::None => write!(f, "None"),
        }
    }
}

/// Power settings pushed to the GPU driver itself (not the firmware)
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuPowerLimits {
    /// Board power limit in watts
    pub power_limit_watts: Option<u32>,
}

/// A process holding the discrete GPU
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GpuProcess {
    pub pid: u32,
    pub name: String,
}

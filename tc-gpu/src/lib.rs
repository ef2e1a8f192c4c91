//! Discrete GPU backends for Thermoctl
//!
//! Provides one capability trait, [`GpuControl`], with vendor adapters for:
//! - NVIDIA GPUs (via nvidia-smi and nvidia-settings)
//! - AMD GPUs (via amdgpu driver and sysfs)
//!
//! plus [`NoGpuControl`] for machines where no discrete GPU is reachable
//! (absent, powered down, or driver not yet bound).

pub mod nvidia;
pub mod amd;

mod types;
pub mod constants;

pub use types::*;
pub use constants as gpu_const;
pub use nvidia::NvidiaGpuControl;
pub use amd::AmdGpuControl;

use tc_error::ThermoctlError;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, ThermoctlError>;

/// Capability set of a bound discrete GPU
///
/// Implementations are shared behind an `Arc` between the telemetry poll and
/// policy writers, so every method takes `&self`. After [`GpuControl::dispose`]
/// an adapter reports `is_valid() == false` and refuses further driver calls.
pub trait GpuControl: Send + Sync {
    fn kind(&self) -> GpuKind;

    fn is_valid(&self) -> bool;

    fn is_nvidia(&self) -> bool {
        self.kind() == GpuKind::Nvidia
    }

    fn full_name(&self) -> String;

    /// Current core temperature in °C, `None` if the driver has no reading
    fn current_temperature(&self) -> Result<Option<i32>>;

    /// Current GPU load in percent, `None` if the driver has no reading
    fn utilization_percent(&self) -> Result<Option<i32>>;

    fn apply_power_limits(&self, limits: &GpuPowerLimits) -> Result<()>;

    fn apply_clock_offsets(&self, core_mhz: i32, memory_mhz: i32) -> Result<()>;

    /// Terminate processes keeping the GPU awake (best effort)
    fn kill_resource_heavy_applications(&self);

    fn dispose(&self);
}

/// Terminal "no discrete GPU" state
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGpuControl;

impl GpuControl for NoGpuControl {
    fn kind(&self) -> GpuKind {
        GpuKind::None
    }

    fn is_valid(&self) -> bool {
        false
    }

    fn full_name(&self) -> String {
        "dGPU not found".to_string()
    }

    fn current_temperature(&self) -> Result<Option<i32>> {
        Ok(None)
    }

    fn utilization_percent(&self) -> Result<Option<i32>> {
        Ok(None)
    }

    fn apply_power_limits(&self, _limits: &GpuPowerLimits) -> Result<()> {
        Err(ThermoctlError::GpuUnavailable)
    }

    fn apply_clock_offsets(&self, _core_mhz: i32, _memory_mhz: i32) -> Result<()> {
        Err(ThermoctlError::GpuUnavailable)
    }

    fn kill_resource_heavy_applications(&self) {}

    fn dispose(&self) {}
}

/// Send SIGTERM to a process, skipping our own pid
pub fn terminate_pid(pid: u32) -> bool {
    if pid == 0 || pid == std::process::id() {
        return false;
    }
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill has no memory-safety preconditions; an invalid pid only yields ESRCH.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        debug!(pid, "Sent SIGTERM");
        true
    } else {
        warn!(pid, "Failed to terminate process: {}", std::io::Error::last_os_error());
        false
    }
}

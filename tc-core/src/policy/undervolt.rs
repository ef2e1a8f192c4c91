//! CPU and iGPU voltage tuning contract
//!
//! Undervolting and the CPU temperature limit go through the processor's
//! management unit rather than the laptop firmware. Hosts plug in whatever
//! transport their platform offers; unsupported knobs report
//! [`ThermoctlError::NotSupported`] and land as "not applicable".

use crate::error::{Result, ThermoctlError};

#[cfg_attr(test, mockall::automock)]
pub trait UndervoltControl: Send + Sync {
    /// CPU undervolt in steps; 0 is stock
    fn set_cpu_undervolt(&self, _steps: i32) -> Result<()> {
        Err(ThermoctlError::NotSupported("CPU undervolt".to_string()))
    }

    /// Integrated GPU undervolt in steps; 0 is stock
    fn set_igpu_undervolt(&self, _steps: i32) -> Result<()> {
        Err(ThermoctlError::NotSupported("iGPU undervolt".to_string()))
    }

    fn set_cpu_temp_limit(&self, _celsius: i32) -> Result<()> {
        Err(ThermoctlError::NotSupported("CPU temperature limit".to_string()))
    }
}

/// Platform without voltage tuning
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUndervoltControl;

impl UndervoltControl for NoUndervoltControl {}

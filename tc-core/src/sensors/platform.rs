//! OS-level fallback sensors

use crate::error::{Result, ThermoctlError};

/// Readers the snapshot falls back to when firmware has no value
pub trait PlatformSensors: Send + Sync {
    /// CPU thermal zone temperature in °C
    fn thermal_zone_celsius(&self) -> Result<f32>;

    /// Battery discharge rate in watts
    fn battery_discharge_watts(&self) -> Result<f32>;
}

/// Platform without OS sensors
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlatformSensors;

impl PlatformSensors for NullPlatformSensors {
    fn thermal_zone_celsius(&self) -> Result<f32> {
        Err(ThermoctlError::NotSupported("thermal zone".to_string()))
    }

    fn battery_discharge_watts(&self) -> Result<f32> {
        Err(ThermoctlError::NotSupported("power meter".to_string()))
    }
}

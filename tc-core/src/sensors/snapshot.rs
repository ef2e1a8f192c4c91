//! Per-poll sensor snapshot
//!
//! Every field is read through its own fallback path. A failing source only
//! blanks its own field; capture always completes.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tc_gpu::GpuControl;
use tracing::debug;

use super::{FanNormalizer, PlatformSensors};
use crate::constants::sentinel;
use crate::firmware::{ChannelId, FanChannel, FirmwareChannel};

/// Immutable reading of every sensor, captured once per poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Capture time, ms since the Unix epoch
    pub timestamp_ms: u64,
    pub cpu_temperature_c: Option<f32>,
    pub gpu_temperature_c: Option<i32>,
    /// Watts, or `-1.0` when the power meter could not be read
    pub battery_discharge_watts: Option<f32>,
    pub cpu_fan: Option<String>,
    pub gpu_fan: Option<String>,
    pub mid_fan: Option<String>,
    pub gpu_utilization_percent: Option<i32>,
}

impl SensorSnapshot {
    /// Battery discharge with the sentinel filtered out
    pub fn battery_watts(&self) -> Option<f32> {
        self.battery_discharge_watts
            .filter(|&w| w != sentinel::BATTERY_UNAVAILABLE)
    }

    pub fn fan(&self, channel: FanChannel) -> Option<&str> {
        match channel {
            FanChannel::Cpu => self.cpu_fan.as_deref(),
            FanChannel::Gpu => self.gpu_fan.as_deref(),
            FanChannel::Mid => self.mid_fan.as_deref(),
        }
    }
}

/// Assembles snapshots from firmware, OS fallbacks and the bound GPU
pub struct SnapshotReader {
    firmware: Arc<dyn FirmwareChannel>,
    platform: Arc<dyn PlatformSensors>,
    normalizer: Arc<FanNormalizer>,
}

impl SnapshotReader {
    pub fn new(
        firmware: Arc<dyn FirmwareChannel>,
        platform: Arc<dyn PlatformSensors>,
        normalizer: Arc<FanNormalizer>,
    ) -> Self {
        Self {
            firmware,
            platform,
            normalizer,
        }
    }

    pub fn capture(&self, gpu: &dyn GpuControl) -> SensorSnapshot {
        SensorSnapshot {
            timestamp_ms: now_ms(),
            cpu_fan: self.read_fan(FanChannel::Cpu),
            gpu_fan: self.read_fan(FanChannel::Gpu),
            mid_fan: self.read_fan(FanChannel::Mid),
            cpu_temperature_c: self.read_cpu_temperature(),
            gpu_temperature_c: self.read_gpu_temperature(gpu),
            battery_discharge_watts: Some(self.read_battery_discharge()),
            gpu_utilization_percent: read_gpu_utilization(gpu),
        }
    }

    fn read_fan(&self, fan: FanChannel) -> Option<String> {
        match self.firmware.read_channel(fan.speed_channel()) {
            Ok(raw) => self.normalizer.format_fan_reading(raw),
            Err(e) => {
                debug!(channel = %fan.speed_channel(), "Fan read failed: {}", e);
                None
            }
        }
    }

    fn read_cpu_temperature(&self) -> Option<f32> {
        match self.firmware.read_channel(ChannelId::CpuTemperature) {
            Ok(t) if t >= 0 => return Some(t as f32),
            Ok(t) => debug!(value = t, "Firmware CPU temperature missing, using thermal zone"),
            Err(e) => debug!("Firmware CPU temperature failed, using thermal zone: {}", e),
        }
        match self.platform.thermal_zone_celsius() {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("Thermal zone read failed: {}", e);
                None
            }
        }
    }

    fn read_gpu_temperature(&self, gpu: &dyn GpuControl) -> Option<i32> {
        match gpu.current_temperature() {
            Ok(Some(t)) if t >= 0 => return Some(t),
            Ok(_) => {}
            Err(e) => debug!("GPU backend temperature failed: {}", e),
        }
        match self.firmware.read_channel(ChannelId::GpuTemperature) {
            Ok(t) if t >= 0 => Some(t),
            Ok(_) => None,
            Err(e) => {
                debug!("Firmware GPU temperature failed: {}", e);
                None
            }
        }
    }

    fn read_battery_discharge(&self) -> f32 {
        self.platform
            .battery_discharge_watts()
            .unwrap_or_else(|e| {
                debug!("Battery discharge read failed: {}", e);
                sentinel::BATTERY_UNAVAILABLE
            })
    }
}

fn read_gpu_utilization(gpu: &dyn GpuControl) -> Option<i32> {
    gpu.utilization_percent().unwrap_or_else(|e| {
        debug!("GPU utilization read failed: {}", e);
        None
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

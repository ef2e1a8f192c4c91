//! Firmware (embedded controller / ACPI WMI) channel contract
//!
//! Every sensor and control the engine touches on the laptop firmware is
//! addressed by a [`ChannelId`]. The concrete transport lives outside the
//! core; calls are synchronous and may be slow or fail on any given model.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Firmware channels known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    CpuFan,
    GpuFan,
    MidFan,
    CpuTemperature,
    GpuTemperature,
    CpuFanCurve,
    GpuFanCurve,
    MidFanCurve,
    /// Sustained package power limit (SPL)
    PptTotal,
    /// Slow package power limit (sPPT)
    PptSlow,
    /// Fast boost power limit (fPPT)
    PptFast,
    /// CPU-only package power limit
    PptCpu,
    /// NVIDIA dynamic boost budget
    GpuDynamicBoost,
    /// NVIDIA thermal target
    GpuThermalTarget,
}

impl ChannelId {
    pub const ALL: [ChannelId; 14] = [
        ChannelId::CpuFan,
        ChannelId::GpuFan,
        ChannelId::MidFan,
        ChannelId::CpuTemperature,
        ChannelId::GpuTemperature,
        ChannelId::CpuFanCurve,
        ChannelId::GpuFanCurve,
        ChannelId::MidFanCurve,
        ChannelId::PptTotal,
        ChannelId::PptSlow,
        ChannelId::PptFast,
        ChannelId::PptCpu,
        ChannelId::GpuDynamicBoost,
        ChannelId::GpuThermalTarget,
    ];

    /// ASUS WMI device id for this channel
    pub fn device_id(self) -> u32 {
        match self {
            ChannelId::CpuFan => 0x0011_0013,
            ChannelId::GpuFan => 0x0011_0014,
            ChannelId::MidFan => 0x0011_0031,
            ChannelId::CpuTemperature => 0x0012_0094,
            ChannelId::GpuTemperature => 0x0012_0097,
            ChannelId::CpuFanCurve => 0x0011_0024,
            ChannelId::GpuFanCurve => 0x0011_0025,
            ChannelId::MidFanCurve => 0x0011_0032,
            ChannelId::PptTotal => 0x0012_00A0,
            ChannelId::PptSlow => 0x0012_00A3,
            ChannelId::PptFast => 0x0012_00C1,
            ChannelId::PptCpu => 0x0012_00B0,
            ChannelId::GpuDynamicBoost => 0x0012_00C0,
            ChannelId::GpuThermalTarget => 0x0012_00C2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::CpuFan => "cpu_fan",
            ChannelId::GpuFan => "gpu_fan",
            ChannelId::MidFan => "mid_fan",
            ChannelId::CpuTemperature => "cpu_temp",
            ChannelId::GpuTemperature => "gpu_temp",
            ChannelId::CpuFanCurve => "cpu_fan_curve",
            ChannelId::GpuFanCurve => "gpu_fan_curve",
            ChannelId::MidFanCurve => "mid_fan_curve",
            ChannelId::PptTotal => "ppt_total",
            ChannelId::PptSlow => "ppt_slow",
            ChannelId::PptFast => "ppt_fast",
            ChannelId::PptCpu => "ppt_cpu",
            ChannelId::GpuDynamicBoost => "gpu_dynamic_boost",
            ChannelId::GpuThermalTarget => "gpu_thermal_target",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The three fans a laptop may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanChannel {
    Cpu,
    Gpu,
    Mid,
}

impl FanChannel {
    pub const ALL: [FanChannel; 3] = [FanChannel::Cpu, FanChannel::Gpu, FanChannel::Mid];

    pub fn speed_channel(self) -> ChannelId {
        match self {
            FanChannel::Cpu => ChannelId::CpuFan,
            FanChannel::Gpu => ChannelId::GpuFan,
            FanChannel::Mid => ChannelId::MidFan,
        }
    }

    pub fn curve_channel(self) -> ChannelId {
        match self {
            FanChannel::Cpu => ChannelId::CpuFanCurve,
            FanChannel::Gpu => ChannelId::GpuFanCurve,
            FanChannel::Mid => ChannelId::MidFanCurve,
        }
    }
}

/// Synchronous access to firmware sensor/control channels
#[cfg_attr(test, mockall::automock)]
pub trait FirmwareChannel: Send + Sync {
    /// Read the current value of a channel
    fn read_channel(&self, channel: ChannelId) -> Result<i32>;

    /// Write a scalar control value
    fn write_channel(&self, channel: ChannelId, value: i32) -> Result<()>;

    /// Write a byte payload (fan curves)
    fn write_buffer(&self, channel: ChannelId, payload: &[u8]) -> Result<()>;
}

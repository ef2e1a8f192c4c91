//! User-level desired hardware state
//!
//! Every field is optional. Absent fields leave the hardware untouched.

use serde::{Deserialize, Serialize};
use tc_gpu::GpuPowerLimits;

use crate::error::Result;
use crate::firmware::FanChannel;

/// One fan curve control point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temperature_c: i32,
    pub fan_percent: i32,
}

impl CurvePoint {
    pub const fn new(temperature_c: i32, fan_percent: i32) -> Self {
        Self {
            temperature_c,
            fan_percent,
        }
    }
}

/// Per-fan curves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanCurves {
    pub cpu: Option<Vec<CurvePoint>>,
    pub gpu: Option<Vec<CurvePoint>>,
    pub mid: Option<Vec<CurvePoint>>,
}

impl FanCurves {
    pub fn get(&self, fan: FanChannel) -> Option<&[CurvePoint]> {
        match fan {
            FanChannel::Cpu => self.cpu.as_deref(),
            FanChannel::Gpu => self.gpu.as_deref(),
            FanChannel::Mid => self.mid.as_deref(),
        }
    }
}

/// Firmware power-limit registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerLimits {
    /// Long-term package limit (SPL)
    pub sustained_watts: Option<i32>,
    /// Slow package limit (sPPT)
    pub slow_watts: Option<i32>,
    /// Short boost limit (fPPT)
    pub fast_watts: Option<i32>,
    /// CPU-only package limit
    pub cpu_watts: Option<i32>,
    pub dynamic_boost_watts: Option<i32>,
    pub thermal_target_c: Option<i32>,
}

/// Settings pushed through the GPU driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuTuning {
    pub core_clock_offset_mhz: Option<i32>,
    pub memory_clock_offset_mhz: Option<i32>,
    pub power_limit_watts: Option<u32>,
}

impl GpuTuning {
    pub fn is_empty(&self) -> bool {
        self.core_clock_offset_mhz.is_none()
            && self.memory_clock_offset_mhz.is_none()
            && self.power_limit_watts.is_none()
    }

    pub fn power_limits(&self) -> GpuPowerLimits {
        GpuPowerLimits {
            power_limit_watts: self.power_limit_watts,
        }
    }
}

/// CPU and iGPU voltage tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Undervolt {
    /// CPU undervolt steps, -40..=0
    pub cpu_uv: Option<i32>,
    /// Integrated GPU undervolt steps, -40..=0
    pub igpu_uv: Option<i32>,
    pub cpu_temp_limit_c: Option<i32>,
    /// Apply together with the rest of the profile instead of on request only
    pub auto_apply: bool,
}

impl Undervolt {
    pub fn is_empty(&self) -> bool {
        self.cpu_uv.is_none() && self.igpu_uv.is_none() && self.cpu_temp_limit_c.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyProfile {
    pub fan_curves: FanCurves,
    pub power: PowerLimits,
    pub gpu: GpuTuning,
    pub undervolt: Undervolt,
}

impl PolicyProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

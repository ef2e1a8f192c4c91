//! Policy controller
//!
//! Translates a [`PolicyProfile`] into firmware and GPU driver writes. Every
//! write is attempted; the outcome of each one lands in an [`ApplyReport`].

mod fan_curve;
mod profile;
mod undervolt;

pub use fan_curve::{encode_fan_curve, normalize_curve};
pub use profile::{CurvePoint, FanCurves, GpuTuning, PolicyProfile, PowerLimits, Undervolt};
pub use undervolt::{NoUndervoltControl, UndervoltControl};

#[cfg(test)]
pub use undervolt::MockUndervoltControl;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{power, undervolt as voltage};
use crate::error::{Result, ThermoctlError};
use crate::firmware::{ChannelId, FanChannel, FirmwareChannel};
use crate::gpu::GpuBackendSlot;
use tc_gpu::gpu_const::clocks;

/// Result of one write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    NotApplicable(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyEntry {
    pub target: String,
    pub outcome: ApplyOutcome,
}

/// Per-write results of one apply call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
}

impl ApplyReport {
    fn record(&mut self, target: impl Into<String>, result: Result<()>) {
        let target = target.into();
        let outcome = match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) if e.is_not_applicable() => {
                debug!(target = %target, "Write not applicable: {}", e);
                ApplyOutcome::NotApplicable(e.to_string())
            }
            Err(e) => {
                warn!(target = %target, "Write failed: {}", e);
                ApplyOutcome::Failed(e.to_string())
            }
        };
        self.entries.push(ApplyEntry { target, outcome });
    }

    fn merge(&mut self, other: ApplyReport) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.outcome, ApplyOutcome::Failed(_)))
    }

    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == ApplyOutcome::Applied)
            .count()
    }

    pub fn outcome(&self, target: &str) -> Option<&ApplyOutcome> {
        self.entries
            .iter()
            .find(|e| e.target == target)
            .map(|e| &e.outcome)
    }
}

impl std::fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for entry in &self.entries {
            match &entry.outcome {
                ApplyOutcome::Applied => writeln!(f, "{:<22} applied", entry.target)?,
                ApplyOutcome::NotApplicable(reason) => writeln!(f, "{:<22} skipped ({})", entry.target, reason)?,
                ApplyOutcome::Failed(reason) => writeln!(f, "{:<22} FAILED ({})", entry.target, reason)?,
            }
        }
        Ok(())
    }
}

pub struct PolicyController {
    firmware: Arc<dyn FirmwareChannel>,
    gpu: Arc<GpuBackendSlot>,
    undervolt: Arc<dyn UndervoltControl>,
    last_applied: Mutex<Option<PolicyProfile>>,
    gpu_tuning: Mutex<Option<GpuTuning>>,
}

impl PolicyController {
    pub fn new(firmware: Arc<dyn FirmwareChannel>, gpu: Arc<GpuBackendSlot>) -> Self {
        Self {
            firmware,
            gpu,
            undervolt: Arc::new(NoUndervoltControl),
            last_applied: Mutex::new(None),
            gpu_tuning: Mutex::new(None),
        }
    }

    pub fn with_undervolt(mut self, undervolt: Arc<dyn UndervoltControl>) -> Self {
        self.undervolt = undervolt;
        self
    }

    /// Write every fan curve present in the profile
    pub fn apply_fan_curve(&self, profile: &PolicyProfile) -> ApplyReport {
        let mut report = ApplyReport::default();
        for fan in FanChannel::ALL {
            let Some(points) = profile.fan_curves.get(fan) else {
                continue;
            };
            let channel = fan.curve_channel();
            let result = encode_fan_curve(points)
                .and_then(|payload| self.firmware.write_buffer(channel, &payload));
            if result.is_ok() {
                info!(channel = %channel, "Fan curve applied");
            }
            report.record(channel.name(), result);
        }
        report
    }

    /// Write firmware power registers and the GPU driver settings
    pub fn apply_power_limits(&self, profile: &PolicyProfile) -> ApplyReport {
        let mut report = ApplyReport::default();
        let p = &profile.power;
        let writes = [
            (ChannelId::PptTotal, p.sustained_watts, power::PPT_TOTAL_MIN_WATTS, power::PPT_TOTAL_MAX_WATTS),
            (ChannelId::PptSlow, p.slow_watts, power::PPT_TOTAL_MIN_WATTS, power::PPT_TOTAL_MAX_WATTS),
            (ChannelId::PptFast, p.fast_watts, power::PPT_BOOST_MIN_WATTS, power::PPT_BOOST_MAX_WATTS),
            (ChannelId::PptCpu, p.cpu_watts, power::PPT_BOOST_MIN_WATTS, power::PPT_BOOST_MAX_WATTS),
            (
                ChannelId::GpuDynamicBoost,
                p.dynamic_boost_watts,
                power::DYNAMIC_BOOST_MIN_WATTS,
                power::DYNAMIC_BOOST_MAX_WATTS,
            ),
            (
                ChannelId::GpuThermalTarget,
                p.thermal_target_c,
                power::THERMAL_TARGET_MIN_C,
                power::THERMAL_TARGET_MAX_C,
            ),
        ];

        for (channel, value, min, max) in writes {
            let Some(requested) = value else {
                continue;
            };
            let value = clamp_logged(channel.name(), requested, min, max);
            let result = self.firmware.write_channel(channel, value);
            if result.is_ok() {
                info!(channel = %channel, value, "Power limit applied");
            }
            report.record(channel.name(), result);
        }

        *self.gpu_tuning.lock() = Some(profile.gpu);
        report.merge(self.apply_gpu_tuning(&profile.gpu));
        report
    }

    /// Write the CPU/iGPU undervolt and the CPU temperature limit
    pub fn apply_undervolt(&self, profile: &PolicyProfile) -> ApplyReport {
        let mut report = ApplyReport::default();
        let uv = &profile.undervolt;

        if let Some(steps) = uv.cpu_uv {
            let steps = clamp_logged("cpu_undervolt", steps, voltage::MIN_STEPS, voltage::MAX_STEPS);
            report.record("cpu_undervolt", self.undervolt.set_cpu_undervolt(steps));
        }
        if let Some(steps) = uv.igpu_uv {
            let steps = clamp_logged("igpu_undervolt", steps, voltage::MIN_STEPS, voltage::MAX_STEPS);
            report.record("igpu_undervolt", self.undervolt.set_igpu_undervolt(steps));
        }
        if let Some(celsius) = uv.cpu_temp_limit_c {
            let celsius = clamp_logged(
                "cpu_temp_limit",
                celsius,
                voltage::CPU_TEMP_LIMIT_MIN_C,
                voltage::CPU_TEMP_LIMIT_MAX_C,
            );
            report.record("cpu_temp_limit", self.undervolt.set_cpu_temp_limit(celsius));
        }

        if report.applied_count() > 0 {
            info!(applied = report.applied_count(), "Undervolt applied");
        }
        report
    }

    /// Fan curves, power limits, then undervolt when it is marked for auto-apply
    pub fn apply_profile(&self, profile: &PolicyProfile) -> ApplyReport {
        let mut report = self.apply_fan_curve(profile);
        report.merge(self.apply_power_limits(profile));
        if profile.undervolt.auto_apply {
            report.merge(self.apply_undervolt(profile));
        }

        let mut last = self.last_applied.lock();
        *last = if report.has_failures() {
            None
        } else {
            Some(profile.clone())
        };
        report
    }

    /// Apply only when the profile differs from the last fully applied one
    pub fn apply_if_changed(&self, profile: &PolicyProfile) -> Option<ApplyReport> {
        if self.last_applied.lock().as_ref() == Some(profile) {
            debug!("Profile unchanged, skipping apply");
            return None;
        }
        Some(self.apply_profile(profile))
    }

    /// Push the GPU driver part of the last profile again
    ///
    /// A freshly bound driver starts from its defaults.
    pub fn reapply_gpu_policy(&self) -> ApplyReport {
        let tuning = *self.gpu_tuning.lock();
        match tuning {
            Some(tuning) => self.apply_gpu_tuning(&tuning),
            None => ApplyReport::default(),
        }
    }

    pub fn last_applied(&self) -> Option<PolicyProfile> {
        self.last_applied.lock().clone()
    }

    fn apply_gpu_tuning(&self, tuning: &GpuTuning) -> ApplyReport {
        let mut report = ApplyReport::default();
        if tuning.is_empty() {
            return report;
        }

        if tuning.power_limit_watts.is_some() {
            let gpu = self.gpu.current();
            report.record("gpu_power_limit", gpu.apply_power_limits(&tuning.power_limits()));
        }

        if tuning.core_clock_offset_mhz.is_some() || tuning.memory_clock_offset_mhz.is_some() {
            let core = clamp_logged(
                "gpu_core_offset",
                tuning.core_clock_offset_mhz.unwrap_or(0),
                clocks::MIN_CORE_OFFSET_MHZ,
                clocks::MAX_CORE_OFFSET_MHZ,
            );
            let memory = clamp_logged(
                "gpu_memory_offset",
                tuning.memory_clock_offset_mhz.unwrap_or(0),
                clocks::MIN_MEMORY_OFFSET_MHZ,
                clocks::MAX_MEMORY_OFFSET_MHZ,
            );
            let result = match self.gpu.nvidia_control() {
                Some(gpu) => gpu.apply_clock_offsets(core, memory),
                None => Err(ThermoctlError::NotSupported("no NVIDIA GPU bound".to_string())),
            };
            report.record("gpu_clock_offsets", result);
        }
        report
    }
}

impl std::fmt::Debug for PolicyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyController")
            .field("gpu", &self.gpu)
            .field("last_applied", &self.last_applied.lock().is_some())
            .finish()
    }
}

fn clamp_logged(field: &str, value: i32, min: i32, max: i32) -> i32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        debug!(field, requested = value, applied = clamped, "Clamped out-of-range value");
    }
    clamped
}

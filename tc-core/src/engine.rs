//! Hardware engine facade
//!
//! Wires the firmware channel, GPU slot, normalizer and policy controller
//! together behind one handle that hosts can share across threads.

use std::sync::Arc;
use std::time::Duration;

use tc_gpu::{GpuControl, GpuKind};
use tokio::runtime::Handle;
use tracing::info;

use crate::error::{Result, ThermoctlError};
use crate::firmware::FirmwareChannel;
use crate::gpu::{default_probes, GpuBackendSlot, GpuProbe, RecreationScheduler, ScheduledRecreate};
use crate::policy::{ApplyReport, NoUndervoltControl, PolicyController, PolicyProfile, UndervoltControl};
use crate::process::{self, NoopTerminator, ProcessTerminator};
use crate::sensors::{FanCalibration, FanNormalizer, NullPlatformSensors, PlatformSensors, SensorSnapshot, SnapshotReader};
use crate::settings::{ConfigStore, EngineSettings};

pub struct HardwareEngine {
    settings: EngineSettings,
    config: Arc<dyn ConfigStore>,
    normalizer: Arc<FanNormalizer>,
    snapshots: SnapshotReader,
    gpu: Arc<GpuBackendSlot>,
    policy: Arc<PolicyController>,
    terminator: Arc<dyn ProcessTerminator>,
}

impl HardwareEngine {
    pub fn builder(firmware: Arc<dyn FirmwareChannel>, config: Arc<dyn ConfigStore>) -> HardwareEngineBuilder {
        HardwareEngineBuilder::new(firmware, config)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn capture_snapshot(&self) -> SensorSnapshot {
        let gpu = self.gpu.current();
        self.snapshots.capture(gpu.as_ref())
    }

    pub fn format_fan_reading(&self, raw: i32) -> Option<String> {
        self.normalizer.format_fan_reading(raw)
    }

    pub fn resolve_fan_max(&self) -> i32 {
        self.normalizer.resolve_fan_max()
    }

    pub fn calibration(&self) -> FanCalibration {
        self.normalizer.calibration()
    }

    pub fn reset_calibration(&self) -> Result<()> {
        self.normalizer.reset_calibration()
    }

    /// Re-probe GPU vendors synchronously
    pub fn recreate_backend(&self) -> GpuKind {
        self.gpu.recreate()
    }

    /// Re-probe after the configured delay on the current tokio runtime
    ///
    /// The GPU part of the last applied profile is pushed again once the new
    /// adapter is bound.
    pub fn schedule_recreate(&self) -> Result<ScheduledRecreate> {
        self.schedule_recreate_after(self.settings.recreate_delay())
    }

    pub fn schedule_recreate_after(&self, delay: Duration) -> Result<ScheduledRecreate> {
        let runtime = Handle::try_current()
            .map_err(|e| ThermoctlError::generic(format!("no async runtime for GPU recreation: {}", e)))?;
        let policy = self.policy.clone();
        let scheduler = RecreationScheduler::new(self.gpu.clone(), runtime).with_after_recreate(Arc::new(
            move |kind| {
                if kind != GpuKind::None {
                    let report = policy.reapply_gpu_policy();
                    if !report.is_empty() {
                        info!(applied = report.applied_count(), "GPU policy re-applied");
                    }
                }
            },
        ));
        Ok(scheduler.schedule_recreate(delay))
    }

    pub fn gpu_kind(&self) -> GpuKind {
        self.gpu.kind()
    }

    pub fn gpu_name(&self) -> String {
        self.gpu.full_name()
    }

    pub fn nvidia_control(&self) -> Option<Arc<dyn GpuControl>> {
        self.gpu.nvidia_control()
    }

    /// Debounced busy check using the configured settle delay
    pub fn is_gpu_busy(&self, threshold: i32) -> bool {
        self.gpu.is_gpu_busy(threshold, self.settings.busy_settle())
    }

    pub fn is_gpu_busy_default(&self) -> bool {
        self.is_gpu_busy(self.settings.busy_threshold_percent)
    }

    pub fn kill_gpu_apps(&self) -> usize {
        process::kill_gpu_apps(self.terminator.as_ref(), self.config.as_ref(), &self.gpu)
    }

    pub fn apply_fan_curve(&self, profile: &PolicyProfile) -> ApplyReport {
        self.policy.apply_fan_curve(profile)
    }

    pub fn apply_power_limits(&self, profile: &PolicyProfile) -> ApplyReport {
        self.policy.apply_power_limits(profile)
    }

    pub fn apply_undervolt(&self, profile: &PolicyProfile) -> ApplyReport {
        self.policy.apply_undervolt(profile)
    }

    pub fn apply_profile(&self, profile: &PolicyProfile) -> ApplyReport {
        self.policy.apply_profile(profile)
    }

    pub fn apply_if_changed(&self, profile: &PolicyProfile) -> Option<ApplyReport> {
        self.policy.apply_if_changed(profile)
    }

    pub fn reapply_gpu_policy(&self) -> ApplyReport {
        self.policy.reapply_gpu_policy()
    }

    pub fn shutdown(&self) {
        self.gpu.shutdown();
    }
}

impl std::fmt::Debug for HardwareEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareEngine")
            .field("settings", &self.settings)
            .field("gpu", &self.gpu)
            .finish()
    }
}

pub struct HardwareEngineBuilder {
    firmware: Arc<dyn FirmwareChannel>,
    config: Arc<dyn ConfigStore>,
    platform: Arc<dyn PlatformSensors>,
    terminator: Arc<dyn ProcessTerminator>,
    undervolt: Arc<dyn UndervoltControl>,
    probes: Option<Vec<Box<dyn GpuProbe>>>,
    settings: EngineSettings,
    probe_on_build: bool,
}

impl HardwareEngineBuilder {
    pub fn new(firmware: Arc<dyn FirmwareChannel>, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            firmware,
            config,
            platform: Arc::new(NullPlatformSensors),
            terminator: Arc::new(NoopTerminator),
            undervolt: Arc::new(NoUndervoltControl),
            probes: None,
            settings: EngineSettings::default(),
            probe_on_build: true,
        }
    }

    pub fn platform(mut self, platform: Arc<dyn PlatformSensors>) -> Self {
        self.platform = platform;
        self
    }

    pub fn terminator(mut self, terminator: Arc<dyn ProcessTerminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn undervolt(mut self, undervolt: Arc<dyn UndervoltControl>) -> Self {
        self.undervolt = undervolt;
        self
    }

    /// Replace the vendor probe order (NVIDIA then AMD by default)
    pub fn probes(mut self, probes: Vec<Box<dyn GpuProbe>>) -> Self {
        self.probes = Some(probes);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Skip the initial GPU probe; the slot starts unbound
    pub fn lazy_gpu(mut self) -> Self {
        self.probe_on_build = false;
        self
    }

    pub fn build(self) -> HardwareEngine {
        let gpu = Arc::new(GpuBackendSlot::new(self.probes.unwrap_or_else(default_probes)));
        if self.probe_on_build {
            gpu.recreate();
        }
        let normalizer = Arc::new(FanNormalizer::new(self.config.clone()));
        let snapshots = SnapshotReader::new(self.firmware.clone(), self.platform, normalizer.clone());
        let policy = Arc::new(PolicyController::new(self.firmware, gpu.clone()).with_undervolt(self.undervolt));

        HardwareEngine {
            settings: self.settings,
            config: self.config,
            normalizer,
            snapshots,
            gpu,
            policy,
            terminator: self.terminator,
        }
    }
}

//! Shared fakes for unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tc_gpu::{GpuControl, GpuKind, GpuPowerLimits};

use crate::error::{Result, ThermoctlError};
use crate::sensors::PlatformSensors;

/// Scriptable GPU adapter
#[derive(Debug)]
pub struct FakeGpu {
    pub kind: GpuKind,
    pub name: String,
    pub temperature: Mutex<Result<Option<i32>>>,
    pub utilization: Mutex<VecDeque<Result<Option<i32>>>>,
    pub power_limits: Mutex<Vec<GpuPowerLimits>>,
    pub clock_offsets: Mutex<Vec<(i32, i32)>>,
    pub fail_offsets: AtomicBool,
    pub kills: AtomicUsize,
    pub disposals: AtomicUsize,
}

impl FakeGpu {
    pub fn new(kind: GpuKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            temperature: Mutex::new(Ok(None)),
            utilization: Mutex::new(VecDeque::new()),
            power_limits: Mutex::new(Vec::new()),
            clock_offsets: Mutex::new(Vec::new()),
            fail_offsets: AtomicBool::new(false),
            kills: AtomicUsize::new(0),
            disposals: AtomicUsize::new(0),
        }
    }

    pub fn with_temperature(self, value: Result<Option<i32>>) -> Self {
        *self.temperature.lock() = value;
        self
    }

    pub fn with_utilization(self, reads: Vec<Result<Option<i32>>>) -> Self {
        *self.utilization.lock() = reads.into();
        self
    }

    pub fn utilization_reads_left(&self) -> usize {
        self.utilization.lock().len()
    }
}

fn clone_result(value: &Result<Option<i32>>) -> Result<Option<i32>> {
    match value {
        Ok(v) => Ok(*v),
        Err(e) => Err(ThermoctlError::gpu(e.to_string())),
    }
}

impl GpuControl for FakeGpu {
    fn kind(&self) -> GpuKind {
        self.kind
    }

    fn is_valid(&self) -> bool {
        self.disposals.load(Ordering::SeqCst) == 0
    }

    fn full_name(&self) -> String {
        self.name.clone()
    }

    fn current_temperature(&self) -> Result<Option<i32>> {
        clone_result(&self.temperature.lock())
    }

    fn utilization_percent(&self) -> Result<Option<i32>> {
        self.utilization.lock().pop_front().unwrap_or(Ok(None))
    }

    fn apply_power_limits(&self, limits: &GpuPowerLimits) -> Result<()> {
        self.power_limits.lock().push(*limits);
        Ok(())
    }

    fn apply_clock_offsets(&self, core_mhz: i32, memory_mhz: i32) -> Result<()> {
        if self.fail_offsets.load(Ordering::SeqCst) {
            return Err(ThermoctlError::gpu("nvidia-settings rejected offsets"));
        }
        self.clock_offsets.lock().push((core_mhz, memory_mhz));
        Ok(())
    }

    fn kill_resource_heavy_applications(&self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Platform sensors with fixed answers
#[derive(Debug, Clone, Copy)]
pub struct FakePlatform {
    pub thermal_zone: Option<f32>,
    pub battery: Option<f32>,
}

impl PlatformSensors for FakePlatform {
    fn thermal_zone_celsius(&self) -> Result<f32> {
        self.thermal_zone
            .ok_or_else(|| ThermoctlError::sensor("thermal_zone", "missing"))
    }

    fn battery_discharge_watts(&self) -> Result<f32> {
        self.battery
            .ok_or_else(|| ThermoctlError::sensor("power_meter", "missing"))
    }
}

//! NVIDIA discrete GPU adapter
//!
//! Telemetry via `nvidia-smi`, clock offsets via `nvidia-settings`
//! (requires Coolbits for offsets to be accepted).

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::{clocks, NVIDIA_EMPTY_MARKERS};
use crate::{terminate_pid, GpuControl, GpuKind, GpuPowerLimits, GpuProcess, Result};
use tc_error::ThermoctlError;
use tracing::{debug, info, trace, warn};

/// Runs the NVIDIA command line tools
///
/// Split out so the adapter can be driven by canned output in tests.
pub trait SmiRunner: Send + Sync {
    fn nvidia_smi(&self, args: &[&str]) -> Result<String>;
    fn nvidia_settings(&self, args: &[&str]) -> Result<String>;
}

/// Runs the real binaries from `PATH`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSmi;

impl SystemSmi {
    fn run(program: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| ThermoctlError::gpu(format!("{} not found: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ThermoctlError::gpu(format!("{} failed: {}", program, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SmiRunner for SystemSmi {
    fn nvidia_smi(&self, args: &[&str]) -> Result<String> {
        Self::run("nvidia-smi", args)
    }

    fn nvidia_settings(&self, args: &[&str]) -> Result<String> {
        Self::run("nvidia-settings", args)
    }
}

pub struct NvidiaGpuControl {
    runner: Box<dyn SmiRunner>,
    gpu_index: u32,
    name: String,
    valid: AtomicBool,
}

impl std::fmt::Debug for NvidiaGpuControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvidiaGpuControl")
            .field("gpu_index", &self.gpu_index)
            .field("name", &self.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl NvidiaGpuControl {
    /// Bind to the first NVIDIA GPU reported by the driver
    pub fn probe() -> Result<Self> {
        Self::probe_with(Box::new(SystemSmi))
    }

    pub fn probe_with(runner: Box<dyn SmiRunner>) -> Result<Self> {
        let stdout = runner.nvidia_smi(&["--query-gpu=index,name", "--format=csv,noheader,nounits"])?;

        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.splitn(2, ',').map(|s| s.trim()).collect();
            if parts.len() < 2 {
                trace!("Skipping malformed nvidia-smi line: {}", line);
                continue;
            }

            let gpu_index = match parts[0].parse::<u32>() {
                Ok(idx) => idx,
                Err(e) => {
                    warn!("Failed to parse GPU index '{}': {}", parts[0], e);
                    continue;
                }
            };

            info!(gpu_index, name = parts[1], "NVIDIA GPU bound");
            return Ok(Self {
                runner,
                gpu_index,
                name: parts[1].to_string(),
                valid: AtomicBool::new(true),
            });
        }

        Err(ThermoctlError::HardwareNotFound("no NVIDIA GPU reported by nvidia-smi".to_string()))
    }

    pub fn gpu_index(&self) -> u32 {
        self.gpu_index
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ThermoctlError::GpuUnavailable)
        }
    }

    fn query_field(&self, field: &str) -> Result<Option<i32>> {
        self.ensure_valid()?;
        let index = self.gpu_index.to_string();
        let query = format!("--query-gpu={}", field);
        let stdout = self.runner.nvidia_smi(&[
            "-i",
            &index,
            &query,
            "--format=csv,noheader,nounits",
        ])?;
        Ok(stdout.lines().next().and_then(parse_nvidia_value))
    }

    /// Processes currently holding the GPU
    pub fn gpu_processes(&self) -> Result<Vec<GpuProcess>> {
        self.ensure_valid()?;
        let index = self.gpu_index.to_string();
        let stdout = self.runner.nvidia_smi(&[
            "-i",
            &index,
            "--query-compute-apps=pid,process_name",
            "--format=csv,noheader",
        ])?;
        Ok(parse_compute_apps(&stdout))
    }
}

impl GpuControl for NvidiaGpuControl {
    fn kind(&self) -> GpuKind {
        GpuKind::Nvidia
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn full_name(&self) -> String {
        self.name.clone()
    }

    fn current_temperature(&self) -> Result<Option<i32>> {
        self.query_field("temperature.gpu")
    }

    fn utilization_percent(&self) -> Result<Option<i32>> {
        self.query_field("utilization.gpu")
    }

    fn apply_power_limits(&self, limits: &GpuPowerLimits) -> Result<()> {
        self.ensure_valid()?;
        let Some(watts) = limits.power_limit_watts else {
            return Ok(());
        };

        let index = self.gpu_index.to_string();
        let watts_arg = watts.to_string();
        self.runner.nvidia_smi(&["-i", &index, "-pl", &watts_arg])?;
        info!(gpu_index = self.gpu_index, watts, "Set NVIDIA power limit");
        Ok(())
    }

    fn apply_clock_offsets(&self, core_mhz: i32, memory_mhz: i32) -> Result<()> {
        self.ensure_valid()?;
        check_range("core_offset_mhz", core_mhz, clocks::MIN_CORE_OFFSET_MHZ, clocks::MAX_CORE_OFFSET_MHZ)?;
        check_range("memory_offset_mhz", memory_mhz, clocks::MIN_MEMORY_OFFSET_MHZ, clocks::MAX_MEMORY_OFFSET_MHZ)?;

        let core = format!(
            "[gpu:{}]/GPUGraphicsClockOffsetAllPerformanceLevels={}",
            self.gpu_index, core_mhz
        );
        let memory = format!(
            "[gpu:{}]/GPUMemoryTransferRateOffsetAllPerformanceLevels={}",
            self.gpu_index,
            memory_mhz * clocks::MEMORY_TRANSFER_MULTIPLIER
        );
        self.runner.nvidia_settings(&["-a", &core, "-a", &memory])?;

        info!(gpu_index = self.gpu_index, core_mhz, memory_mhz, "Set NVIDIA clock offsets");
        Ok(())
    }

    fn kill_resource_heavy_applications(&self) {
        let processes = match self.gpu_processes() {
            Ok(p) => p,
            Err(e) => {
                debug!("Could not list NVIDIA GPU processes: {}", e);
                return;
            }
        };

        for process in processes {
            if terminate_pid(process.pid) {
                info!(pid = process.pid, name = %process.name, "Closed GPU process");
            }
        }
    }

    fn dispose(&self) {
        if self.valid.swap(false, Ordering::SeqCst) {
            debug!(gpu_index = self.gpu_index, "NVIDIA adapter disposed");
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ThermoctlError::OutOfRange {
            field: field.to_string(),
            value: value.into(),
            min: min.into(),
            max: max.into(),
        })
    }
}

fn parse_nvidia_value(s: &str) -> Option<i32> {
    let s = s.trim();
    if NVIDIA_EMPTY_MARKERS.contains(&s) {
        None
    } else {
        // Some drivers print fractional values ("45.00")
        s.parse::<i32>().ok().or_else(|| s.parse::<f32>().ok().map(|v| v.round() as i32))
    }
}

fn parse_compute_apps(stdout: &str) -> Vec<GpuProcess> {
    stdout
        .lines()
        .filter_map(|line| {
            let (pid, name) = line.split_once(',')?;
            let pid = pid.trim().parse::<u32>().ok()?;
            Some(GpuProcess {
                pid,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Answers nvidia-smi queries by matching a substring of the joined args
    #[derive(Clone, Default)]
    struct FakeSmi {
        responses: HashMap<&'static str, std::result::Result<&'static str, &'static str>>,
        settings_calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSmi {
        fn with(mut self, needle: &'static str, out: &'static str) -> Self {
            self.responses.insert(needle, Ok(out));
            self
        }

        fn failing(mut self, needle: &'static str) -> Self {
            self.responses.insert(needle, Err("driver went away"));
            self
        }
    }

    impl SmiRunner for FakeSmi {
        fn nvidia_smi(&self, args: &[&str]) -> Result<String> {
            let joined = args.join(" ");
            for (needle, response) in &self.responses {
                if joined.contains(needle) {
                    return (*response)
                        .map(str::to_string)
                        .map_err(ThermoctlError::gpu);
                }
            }
            Err(ThermoctlError::gpu(format!("unexpected query: {}", joined)))
        }

        fn nvidia_settings(&self, args: &[&str]) -> Result<String> {
            self.settings_calls.lock().unwrap().push(args.join(" "));
            Ok(String::new())
        }
    }

    fn laptop_smi() -> FakeSmi {
        FakeSmi::default()
            .with("index,name", "0, NVIDIA GeForce RTX 4070 Laptop GPU\n")
            .with("temperature.gpu", "61\n")
            .with("utilization.gpu", "[N/A]\n")
    }

    #[test]
    fn test_probe_binds_first_gpu() {
        let gpu = NvidiaGpuControl::probe_with(Box::new(laptop_smi())).unwrap();
        assert!(gpu.is_valid());
        assert!(gpu.is_nvidia());
        assert_eq!(gpu.gpu_index(), 0);
        assert_eq!(gpu.full_name(), "NVIDIA GeForce RTX 4070 Laptop GPU");
    }

    #[test]
    fn test_probe_without_gpus_fails() {
        let smi = FakeSmi::default().with("index,name", "\n");
        assert!(NvidiaGpuControl::probe_with(Box::new(smi)).is_err());
    }

    #[test]
    fn test_probe_propagates_driver_error() {
        let smi = FakeSmi::default().failing("index,name");
        let err = NvidiaGpuControl::probe_with(Box::new(smi)).unwrap_err();
        assert!(err.to_string().contains("driver went away"));
    }

    #[test]
    fn test_telemetry_parsing() {
        let gpu = NvidiaGpuControl::probe_with(Box::new(laptop_smi())).unwrap();
        assert_eq!(gpu.current_temperature().unwrap(), Some(61));
        assert_eq!(gpu.utilization_percent().unwrap(), None);
    }

    #[test]
    fn test_disposed_adapter_refuses_calls() {
        let gpu = NvidiaGpuControl::probe_with(Box::new(laptop_smi())).unwrap();
        gpu.dispose();
        assert!(!gpu.is_valid());
        assert!(matches!(gpu.current_temperature(), Err(ThermoctlError::GpuUnavailable)));
        // Second dispose is harmless
        gpu.dispose();
    }

    #[test]
    fn test_clock_offsets_use_transfer_rate_for_memory() {
        let smi = laptop_smi();
        let calls = smi.settings_calls.clone();
        let gpu = NvidiaGpuControl::probe_with(Box::new(smi)).unwrap();

        gpu.apply_clock_offsets(150, 200).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("GPUGraphicsClockOffsetAllPerformanceLevels=150"));
        assert!(calls[0].contains("GPUMemoryTransferRateOffsetAllPerformanceLevels=400"));
    }

    #[test]
    fn test_clock_offsets_out_of_range_rejected() {
        let gpu = NvidiaGpuControl::probe_with(Box::new(laptop_smi())).unwrap();
        let err = gpu.apply_clock_offsets(500, 0).unwrap_err();
        assert!(matches!(err, ThermoctlError::OutOfRange { .. }));
    }

    #[test]
    fn test_empty_power_limits_is_noop() {
        let gpu = NvidiaGpuControl::probe_with(Box::new(laptop_smi())).unwrap();
        assert!(gpu.apply_power_limits(&GpuPowerLimits::default()).is_ok());
    }

    #[test]
    fn test_parse_nvidia_value_markers() {
        assert_eq!(parse_nvidia_value("[Not Supported]"), None);
        assert_eq!(parse_nvidia_value("N/A"), None);
        assert_eq!(parse_nvidia_value(" 42 "), Some(42));
        assert_eq!(parse_nvidia_value("44.6"), Some(45));
    }

    #[test]
    fn test_parse_compute_apps() {
        let out = "1234, /usr/bin/steam\n\ngarbage\n5678, blender\n";
        let apps = parse_compute_apps(out);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0], GpuProcess { pid: 1234, name: "/usr/bin/steam".into() });
        assert_eq!(apps[1].pid, 5678);
    }
}

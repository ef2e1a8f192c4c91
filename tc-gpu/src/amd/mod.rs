//! AMD discrete GPU adapter
//!
//! Telemetry and power cap via sysfs (amdgpu driver).
//! Only a non-boot GPU (`boot_vga == 0`) is bound: on hybrid laptops the boot
//! GPU is the integrated one, and it is never what this adapter controls.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{gpu_const, GpuControl, GpuKind, GpuPowerLimits, Result};
use tc_error::ThermoctlError;
use tracing::{debug, info};

#[derive(Debug)]
pub struct AmdGpuControl {
    device_path: PathBuf,
    hwmon_path: Option<PathBuf>,
    name: String,
    valid: AtomicBool,
}

impl AmdGpuControl {
    /// Bind to the discrete AMD GPU under `/sys/class/drm`
    pub fn probe() -> Result<Self> {
        Self::probe_in(Path::new(gpu_const::DRM_PATH))
    }

    /// Bind to the discrete AMD GPU under an arbitrary DRM root
    pub fn probe_in(drm_path: &Path) -> Result<Self> {
        if !drm_path.exists() {
            return Err(ThermoctlError::HardwareNotFound(format!(
                "DRM path {} not found",
                drm_path.display()
            )));
        }

        let mut cards: Vec<PathBuf> = fs::read_dir(drm_path)?
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.starts_with("card") && !name.contains('-')
            })
            .map(|e| e.path())
            .collect();
        cards.sort();

        for card_path in cards {
            let device_path = card_path.join("device");

            if !is_amd_gpu(&device_path) {
                continue;
            }
            if is_boot_gpu(&device_path) {
                debug!("Skipping boot AMD GPU at {:?}", card_path);
                continue;
            }

            let name = read_gpu_name(&device_path);
            let hwmon_path = find_hwmon(&device_path);
            info!(card = %card_path.display(), name = %name, "AMD GPU bound");

            return Ok(Self {
                device_path,
                hwmon_path,
                name,
                valid: AtomicBool::new(true),
            });
        }

        Err(ThermoctlError::HardwareNotFound("no discrete AMD GPU".to_string()))
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ThermoctlError::GpuUnavailable)
        }
    }

    fn hwmon(&self) -> Result<&Path> {
        self.hwmon_path
            .as_deref()
            .ok_or_else(|| ThermoctlError::NotSupported("AMD GPU exposes no hwmon".to_string()))
    }
}

impl GpuControl for AmdGpuControl {
    fn kind(&self) -> GpuKind {
        GpuKind::Amd
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn full_name(&self) -> String {
        self.name.clone()
    }

    fn current_temperature(&self) -> Result<Option<i32>> {
        self.ensure_valid()?;
        let Some(hwmon) = self.hwmon_path.as_deref() else {
            return Ok(None);
        };
        // temp1 is the edge sensor on every amdgpu generation
        Ok(read_number::<i32>(&hwmon.join("temp1_input"))?
            .map(|millidegrees| millidegrees / gpu_const::MILLIDEGREE_DIVISOR))
    }

    fn utilization_percent(&self) -> Result<Option<i32>> {
        self.ensure_valid()?;
        read_number::<i32>(&self.device_path.join("gpu_busy_percent"))
    }

    fn apply_power_limits(&self, limits: &GpuPowerLimits) -> Result<()> {
        self.ensure_valid()?;
        let Some(watts) = limits.power_limit_watts else {
            return Ok(());
        };
        let hwmon = self.hwmon()?;
        let microwatts = u64::from(watts) * gpu_const::MICROWATTS_PER_WATT;

        if let Some(max) = read_number::<u64>(&hwmon.join("power1_cap_max"))? {
            let min = read_number::<u64>(&hwmon.join("power1_cap_min"))?.unwrap_or(0);
            if microwatts < min || microwatts > max {
                return Err(ThermoctlError::OutOfRange {
                    field: "power_limit_watts".to_string(),
                    value: watts.into(),
                    min: (min / gpu_const::MICROWATTS_PER_WATT) as i64,
                    max: (max / gpu_const::MICROWATTS_PER_WATT) as i64,
                });
            }
        }

        let cap_path = hwmon.join("power1_cap");
        fs::write(&cap_path, microwatts.to_string()).map_err(|e| ThermoctlError::FileWrite {
            path: cap_path.clone(),
            source: e,
        })?;
        info!(watts, "Set AMD GPU power cap");
        Ok(())
    }

    fn apply_clock_offsets(&self, _core_mhz: i32, _memory_mhz: i32) -> Result<()> {
        self.ensure_valid()?;
        Err(ThermoctlError::NotSupported(
            "clock offsets are not exposed for AMD GPUs".to_string(),
        ))
    }

    fn kill_resource_heavy_applications(&self) {
        // amdgpu has no per-process listing in sysfs; the host's fixed kill list covers AMD launchers
        debug!("No AMD-specific GPU processes to close");
    }

    fn dispose(&self) {
        if self.valid.swap(false, Ordering::SeqCst) {
            debug!(device = %self.device_path.display(), "AMD adapter disposed");
        }
    }
}

fn is_amd_gpu(device_path: &Path) -> bool {
    let vendor_path = device_path.join("vendor");
    if let Ok(vendor_id) = fs::read_to_string(&vendor_path) {
        return vendor_id.trim() == gpu_const::AMD_VENDOR_ID;
    }
    false
}

fn is_boot_gpu(device_path: &Path) -> bool {
    fs::read_to_string(device_path.join("boot_vga"))
        .map(|s| s.trim() == "1")
        .unwrap_or(false)
}

fn find_hwmon(device_path: &Path) -> Option<PathBuf> {
    let hwmon_dir = device_path.join("hwmon");
    fs::read_dir(&hwmon_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .next()
}

fn read_gpu_name(device_path: &Path) -> String {
    let product_path = device_path.join("product_name");
    if let Ok(name) = fs::read_to_string(&product_path) {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    "AMD Radeon GPU".to_string()
}

/// Read a numeric sysfs attribute; a missing file is `None`, a garbled one an error
fn read_number<T: std::str::FromStr>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ThermoctlError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    content
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ThermoctlError::sensor(path.display().to_string(), format!("unparsable value '{}'", content.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_card(root: &Path, card: &str, vendor: &str, boot_vga: &str) -> PathBuf {
        let device = root.join(card).join("device");
        fs::create_dir_all(device.join("hwmon").join("hwmon5")).unwrap();
        fs::write(device.join("vendor"), format!("{}\n", vendor)).unwrap();
        fs::write(device.join("boot_vga"), format!("{}\n", boot_vga)).unwrap();
        device
    }

    #[test]
    fn test_probe_skips_boot_gpu_and_other_vendors() {
        let tmp = TempDir::new().unwrap();
        make_card(tmp.path(), "card0", gpu_const::AMD_VENDOR_ID, "1");
        make_card(tmp.path(), "card1", gpu_const::NVIDIA_VENDOR_ID, "0");
        // connector entries are ignored
        fs::create_dir_all(tmp.path().join("card2-eDP-1")).unwrap();

        assert!(AmdGpuControl::probe_in(tmp.path()).is_err());

        let device = make_card(tmp.path(), "card3", gpu_const::AMD_VENDOR_ID, "0");
        fs::write(device.join("product_name"), "Radeon RX 7600S\n").unwrap();

        let gpu = AmdGpuControl::probe_in(tmp.path()).unwrap();
        assert_eq!(gpu.kind(), GpuKind::Amd);
        assert!(!gpu.is_nvidia());
        assert_eq!(gpu.full_name(), "Radeon RX 7600S");
    }

    #[test]
    fn test_probe_missing_drm_root() {
        let tmp = TempDir::new().unwrap();
        assert!(AmdGpuControl::probe_in(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_telemetry_reads_sysfs() {
        let tmp = TempDir::new().unwrap();
        let device = make_card(tmp.path(), "card1", gpu_const::AMD_VENDOR_ID, "0");
        fs::write(device.join("gpu_busy_percent"), "37\n").unwrap();
        fs::write(device.join("hwmon/hwmon5/temp1_input"), "54000\n").unwrap();

        let gpu = AmdGpuControl::probe_in(tmp.path()).unwrap();
        assert_eq!(gpu.full_name(), "AMD Radeon GPU");
        assert_eq!(gpu.utilization_percent().unwrap(), Some(37));
        assert_eq!(gpu.current_temperature().unwrap(), Some(54));
    }

    #[test]
    fn test_missing_busy_file_is_none_and_garbage_is_error() {
        let tmp = TempDir::new().unwrap();
        let device = make_card(tmp.path(), "card1", gpu_const::AMD_VENDOR_ID, "0");
        let gpu = AmdGpuControl::probe_in(tmp.path()).unwrap();
        assert_eq!(gpu.utilization_percent().unwrap(), None);

        fs::write(device.join("gpu_busy_percent"), "busy\n").unwrap();
        assert!(gpu.utilization_percent().is_err());
    }

    #[test]
    fn test_power_cap_written_in_microwatts_and_range_checked() {
        let tmp = TempDir::new().unwrap();
        let device = make_card(tmp.path(), "card1", gpu_const::AMD_VENDOR_ID, "0");
        let hwmon = device.join("hwmon/hwmon5");
        fs::write(hwmon.join("power1_cap"), "90000000\n").unwrap();
        fs::write(hwmon.join("power1_cap_min"), "30000000\n").unwrap();
        fs::write(hwmon.join("power1_cap_max"), "100000000\n").unwrap();

        let gpu = AmdGpuControl::probe_in(tmp.path()).unwrap();
        gpu.apply_power_limits(&GpuPowerLimits { power_limit_watts: Some(80) }).unwrap();
        assert_eq!(fs::read_to_string(hwmon.join("power1_cap")).unwrap(), "80000000");

        let err = gpu
            .apply_power_limits(&GpuPowerLimits { power_limit_watts: Some(120) })
            .unwrap_err();
        assert!(matches!(err, ThermoctlError::OutOfRange { max: 100, .. }));
    }

    #[test]
    fn test_clock_offsets_not_supported() {
        let tmp = TempDir::new().unwrap();
        make_card(tmp.path(), "card1", gpu_const::AMD_VENDOR_ID, "0");
        let gpu = AmdGpuControl::probe_in(tmp.path()).unwrap();
        assert!(gpu.apply_clock_offsets(100, 0).unwrap_err().is_not_applicable());

        gpu.dispose();
        assert!(!gpu.is_valid());
        assert!(matches!(gpu.utilization_percent(), Err(ThermoctlError::GpuUnavailable)));
    }
}

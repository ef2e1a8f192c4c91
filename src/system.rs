/*
 * This file is part of Thermoctl.
 *
 * Copyright (C) 2025 Thermoctl contributors
 *
 * Thermoctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Thermoctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Thermoctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fs;
use std::path::{Path, PathBuf};

use tc_core::PlatformSensors;
use tc_error::{Result, ThermoctlError};

const DMI_PRODUCT_NAME: &str = "/sys/class/dmi/id/product_name";
const THERMAL_ROOT: &str = "/sys/class/thermal";
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Thermal zone types tried first, in order
const PREFERRED_ZONES: &[&str] = &["x86_pkg_temp", "acpitz"];

/// Hardware model identifier from DMI (empty when unreadable)
pub fn read_model_id() -> String {
    read_model_id_from(Path::new(DMI_PRODUCT_NAME))
}

pub fn read_model_id_from(path: &Path) -> String {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Thermal zone and battery readers backed by sysfs
#[derive(Debug, Clone)]
pub struct LinuxPlatformSensors {
    thermal_root: PathBuf,
    power_supply_root: PathBuf,
}

impl LinuxPlatformSensors {
    pub fn new() -> Self {
        Self::with_roots(THERMAL_ROOT, POWER_SUPPLY_ROOT)
    }

    pub fn with_roots(thermal_root: impl Into<PathBuf>, power_supply_root: impl Into<PathBuf>) -> Self {
        Self {
            thermal_root: thermal_root.into(),
            power_supply_root: power_supply_root.into(),
        }
    }

    fn thermal_zones(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut zones: Vec<(String, PathBuf)> = fs::read_dir(&self.thermal_root)?
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("thermal_zone"))
            .map(|e| {
                let dir = e.path();
                let kind = fs::read_to_string(dir.join("type")).unwrap_or_default().trim().to_string();
                (kind, dir)
            })
            .collect();
        zones.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(zones)
    }

    fn batteries(&self) -> Result<Vec<PathBuf>> {
        let mut batteries: Vec<PathBuf> = fs::read_dir(&self.power_supply_root)?
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("BAT"))
            .map(|e| e.path())
            .collect();
        batteries.sort();
        Ok(batteries)
    }
}

impl Default for LinuxPlatformSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSensors for LinuxPlatformSensors {
    fn thermal_zone_celsius(&self) -> Result<f32> {
        let zones = self.thermal_zones()?;
        let ordered = PREFERRED_ZONES
            .iter()
            .flat_map(|preferred| zones.iter().filter(move |(kind, _)| kind == preferred))
            .chain(zones.iter());

        for (_, dir) in ordered {
            if let Some(millidegrees) = read_i64(&dir.join("temp")) {
                return Ok(millidegrees as f32 / 1000.0);
            }
        }
        Err(ThermoctlError::sensor("thermal_zone", "no readable thermal zone"))
    }

    fn battery_discharge_watts(&self) -> Result<f32> {
        for battery in self.batteries()? {
            if let Some(microwatts) = read_i64(&battery.join("power_now")) {
                return Ok(microwatts.abs() as f32 / 1_000_000.0);
            }
            let current = read_i64(&battery.join("current_now"));
            let voltage = read_i64(&battery.join("voltage_now"));
            if let (Some(ua), Some(uv)) = (current, voltage) {
                return Ok((ua.abs() as f64 * uv as f64 / 1e12) as f32);
            }
        }
        Err(ThermoctlError::sensor("power_meter", "no battery power reading"))
    }
}

fn read_i64(path: &Path) -> Option<i64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

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

use parking_lot::Mutex;
use tc_core::constants::curve;
use tc_core::{ChannelId, FirmwareChannel};
use tc_error::{Result, ThermoctlError};
use tracing::{debug, info};

const DEBUGFS_DIR: &str = "/sys/kernel/debug/asus-nb-wmi";
const HWMON_ROOT: &str = "/sys/class/hwmon";
const FAN_CURVE_HWMON: &str = "asus_custom_fan_curve";

/// DSTS results carry a presence bit above the 16-bit value
const DSTS_PRESENCE_BIT: i64 = 0x1_0000;

/// Firmware channel over the asus-nb-wmi debugfs interface
///
/// Scalar channels go through `dev_id`/`ctrl_param` and the `dsts`/`devs`
/// method files. Fan curves go through the `asus_custom_fan_curve` hwmon
/// chip since debugfs only carries 32-bit arguments.
pub struct AsusWmiChannel {
    debugfs_dir: PathBuf,
    hwmon_root: PathBuf,
    // dev_id and ctrl_param are shared state in the driver
    call_lock: Mutex<()>,
}

impl AsusWmiChannel {
    pub fn new() -> Self {
        Self::with_paths(DEBUGFS_DIR, HWMON_ROOT)
    }

    pub fn with_paths(debugfs_dir: impl Into<PathBuf>, hwmon_root: impl Into<PathBuf>) -> Self {
        Self {
            debugfs_dir: debugfs_dir.into(),
            hwmon_root: hwmon_root.into(),
            call_lock: Mutex::new(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.debugfs_dir.is_dir()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ThermoctlError::FirmwareUnavailable(self.debugfs_dir.display().to_string()))
        }
    }

    fn write_attr(&self, name: &str, value: &str) -> Result<()> {
        let path = self.debugfs_dir.join(name);
        fs::write(&path, value).map_err(|e| attr_error(path, e, true))
    }

    fn read_attr(&self, name: &str) -> Result<String> {
        let path = self.debugfs_dir.join(name);
        fs::read_to_string(&path).map_err(|e| attr_error(path, e, false))
    }

    fn fan_curve_hwmon(&self) -> Result<PathBuf> {
        let entries = fs::read_dir(&self.hwmon_root)?;
        for entry in entries.flatten() {
            let dir = entry.path();
            let name = fs::read_to_string(dir.join("name")).unwrap_or_default();
            if name.trim() == FAN_CURVE_HWMON {
                return Ok(dir);
            }
        }
        Err(ThermoctlError::NotSupported(format!("no {} hwmon chip", FAN_CURVE_HWMON)))
    }
}

impl Default for AsusWmiChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareChannel for AsusWmiChannel {
    fn read_channel(&self, channel: ChannelId) -> Result<i32> {
        self.ensure_available()?;
        let _guard = self.call_lock.lock();
        self.write_attr("dev_id", &format!("{:#010x}", channel.device_id()))
            .map_err(|e| wrap(e, |reason| ThermoctlError::channel_read(channel, reason)))?;
        let output = self
            .read_attr("dsts")
            .map_err(|e| wrap(e, |reason| ThermoctlError::channel_read(channel, reason)))?;
        let status = parse_result(&output).ok_or_else(|| {
            ThermoctlError::channel_read(channel, format!("unparsable dsts output '{}'", output.trim()))
        })?;
        let value = status - DSTS_PRESENCE_BIT;
        debug!(channel = %channel, status, value, "Firmware read");
        i32::try_from(value).map_err(|_| ThermoctlError::channel_read(channel, format!("status {:#x} out of range", status)))
    }

    fn write_channel(&self, channel: ChannelId, value: i32) -> Result<()> {
        self.ensure_available()?;
        let _guard = self.call_lock.lock();
        self.write_attr("dev_id", &format!("{:#010x}", channel.device_id()))
            .and_then(|_| self.write_attr("ctrl_param", &format!("{:#x}", value)))
            .map_err(|e| wrap(e, |reason| ThermoctlError::channel_write(channel, reason)))?;
        let output = self
            .read_attr("devs")
            .map_err(|e| wrap(e, |reason| ThermoctlError::channel_write(channel, reason)))?;
        match parse_result(&output) {
            Some(1) => {
                info!(channel = %channel, value, "Firmware write");
                Ok(())
            }
            Some(code) => Err(ThermoctlError::channel_write(channel, format!("firmware returned {:#x}", code))),
            None => Err(ThermoctlError::channel_write(
                channel,
                format!("unparsable devs output '{}'", output.trim()),
            )),
        }
    }

    fn write_buffer(&self, channel: ChannelId, payload: &[u8]) -> Result<()> {
        let pwm = match channel {
            ChannelId::CpuFanCurve => 1,
            ChannelId::GpuFanCurve => 2,
            ChannelId::MidFanCurve => 3,
            other => {
                return Err(ThermoctlError::channel_write(other, "channel takes no byte payload"));
            }
        };
        if payload.len() != curve::PAYLOAD_LEN {
            return Err(ThermoctlError::channel_write(
                channel,
                format!("expected {} bytes, got {}", curve::PAYLOAD_LEN, payload.len()),
            ));
        }

        let _guard = self.call_lock.lock();
        let dir = self
            .fan_curve_hwmon()
            .map_err(|e| ThermoctlError::channel_write(channel, e.to_string()))?;
        let (temps, percents) = payload.split_at(curve::POINTS);
        for (i, (&temp, &percent)) in temps.iter().zip(percents).enumerate() {
            let point = i + 1;
            write_hwmon(&dir, &format!("pwm{}_auto_point{}_temp", pwm, point), u32::from(temp), channel)?;
            write_hwmon(&dir, &format!("pwm{}_auto_point{}_pwm", pwm, point), percent_to_pwm(percent), channel)?;
        }
        write_hwmon(&dir, &format!("pwm{}_enable", pwm), 1, channel)?;
        info!(channel = %channel, "Fan curve written");
        Ok(())
    }
}

fn attr_error(path: PathBuf, e: std::io::Error, write: bool) -> ThermoctlError {
    match (e.kind(), write) {
        (std::io::ErrorKind::PermissionDenied, _) => ThermoctlError::PermissionDenied(path.display().to_string()),
        (_, true) => ThermoctlError::FileWrite { path, source: e },
        (_, false) => ThermoctlError::FileRead { path, source: e },
    }
}

/// Attach the channel to transport errors; permission problems pass through unchanged
fn wrap(e: ThermoctlError, with_channel: impl FnOnce(String) -> ThermoctlError) -> ThermoctlError {
    match e {
        ThermoctlError::PermissionDenied(_) => e,
        other => with_channel(other.to_string()),
    }
}

fn write_hwmon(dir: &Path, attr: &str, value: u32, channel: ChannelId) -> Result<()> {
    fs::write(dir.join(attr), value.to_string())
        .map_err(|e| ThermoctlError::channel_write(channel, format!("{}: {}", attr, e)))
}

fn percent_to_pwm(percent: u8) -> u32 {
    (u32::from(percent.min(100)) * 255 + 50) / 100
}

/// Parse the value after `=` in debugfs method output, e.g. `DSTS(0x110013) = 0x1002a`
fn parse_result(output: &str) -> Option<i64> {
    let value = output.rsplit('=').next()?.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

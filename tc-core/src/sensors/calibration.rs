//! Fan reading normalization with self-calibrating scale
//!
//! Firmware reports fan speed in hundreds of RPM with no published maximum.
//! The "100%" point starts at a per-model default and is raised whenever a
//! plausible reading exceeds it. The learned value lives in the config store
//! under [`keys::FAN_MAX`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::fan;
use crate::error::Result;
use crate::settings::{keys, ConfigStore};

/// Current calibration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanCalibration {
    /// Learned scale from the config store (0 when unset or rejected)
    pub max_observed_scale: i32,
    /// Default scale for this hardware model
    pub model_floor: i32,
}

impl FanCalibration {
    /// Scale used for percentage display
    pub fn effective_max(&self) -> i32 {
        self.model_floor.max(self.max_observed_scale)
    }
}

/// Default "100%" raw value for a model id
pub fn model_default_max(model: &str) -> i32 {
    fan::MODEL_MAX_TABLE
        .iter()
        .find(|(needle, _)| model.contains(needle))
        .map(|&(_, max)| max)
        .unwrap_or(fan::DEFAULT_MAX)
}

/// Converts raw fan counters into display strings and maintains calibration
pub struct FanNormalizer {
    config: Arc<dyn ConfigStore>,
    // serializes resolve-then-raise so concurrent readings cannot lower the scale
    calibration_lock: Mutex<()>,
}

impl FanNormalizer {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            config,
            calibration_lock: Mutex::new(()),
        }
    }

    pub fn calibration(&self) -> FanCalibration {
        let stored = self.config.get_int(keys::FAN_MAX).unwrap_or(0);
        FanCalibration {
            max_observed_scale: if stored > fan::CALIBRATION_CEILING { 0 } else { stored },
            model_floor: model_default_max(&self.config.model()),
        }
    }

    /// `max(model default, stored calibration)`; stored values above the ceiling count as 0
    pub fn resolve_fan_max(&self) -> i32 {
        self.calibration().effective_max()
    }

    /// Format a raw fan reading, or `None` when the value is garbage
    pub fn format_fan_reading(&self, raw: i32) -> Option<String> {
        let mut value = raw;
        if value < 0 {
            // older firmware reports small speeds as signed 16-bit overflow
            value = value.checked_add(fan::WRAPAROUND)?;
            if value <= 0 || value > fan::MAX_PLAUSIBLE_RAW {
                debug!(raw, corrected = value, "Discarding implausible fan reading");
                return None;
            }
        }

        let scale = {
            let _guard = self.calibration_lock.lock();
            let scale = self.resolve_fan_max();
            if value > scale && value < fan::CALIBRATION_CEILING {
                match self.config.set_int(keys::FAN_MAX, value) {
                    Ok(()) => info!(from = scale, to = value, "Raised fan calibration"),
                    Err(e) => warn!("Failed to persist fan calibration: {}", e),
                }
            }
            scale
        };

        if self.config.is_enabled(keys::FAN_RPM) {
            Some(format!("{}: {}RPM", fan::LABEL, value * fan::RPM_PER_UNIT))
        } else {
            Some(format!("{}: {}%", fan::LABEL, percent_of(value, scale)))
        }
    }

    /// Forget the learned scale so the model default applies again
    pub fn reset_calibration(&self) -> Result<()> {
        let _guard = self.calibration_lock.lock();
        self.config.set_int(keys::FAN_MAX, 0)?;
        info!("Fan calibration reset");
        Ok(())
    }
}

impl std::fmt::Debug for FanNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanNormalizer")
            .field("calibration", &self.calibration())
            .finish()
    }
}

fn percent_of(value: i32, scale: i32) -> i64 {
    if scale <= 0 {
        return 100;
    }
    let percent = (f64::from(value) / f64::from(scale) * 100.0).round_ties_even() as i64;
    percent.clamp(0, 100)
}

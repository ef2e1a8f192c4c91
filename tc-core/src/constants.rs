//! Constants and configuration values for Thermoctl
//!
//! Centralizes all magic numbers, channel ranges, and configuration defaults.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// Fan reading normalization and calibration
pub mod fan {
    /// Raw fan units are hundreds of RPM
    pub const RPM_PER_UNIT: i32 = 100;

    /// Offset added to negative readings produced by 16-bit signed overflow
    pub const WRAPAROUND: i32 = 65536;

    /// Largest raw value with a plausible physical meaning
    pub const MAX_PLAUSIBLE_RAW: i32 = 100;

    /// Calibration never learns a scale at or above this value
    pub const CALIBRATION_CEILING: i32 = 80;

    /// Default "100%" raw value for models without a table entry
    pub const DEFAULT_MAX: i32 = 58;

    /// Model id substring -> default "100%" raw value
    pub const MODEL_MAX_TABLE: &[(&str, i32)] = &[("401", 72), ("503", 68)];

    /// Label prefix for formatted fan readings
    pub const LABEL: &str = "Fan";
}

/// Sentinel values published in snapshots
pub mod sentinel {
    /// Battery discharge when the power meter could not be read
    pub const BATTERY_UNAVAILABLE: f32 = -1.0;
}

/// Timing defaults
pub mod timing {
    use super::Duration;

    /// Settle time between the two utilization reads of the busy check
    pub const BUSY_SETTLE: Duration = Duration::from_millis(1000);

    /// Delay before re-probing the GPU after a power-state transition
    pub const RECREATE_DELAY: Duration = Duration::from_secs(5);

    /// Default sensor poll interval
    pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

    /// Utilization above this counts as "GPU in use"
    pub const BUSY_THRESHOLD_PERCENT: i32 = 10;
}

/// Fan curve payload layout
pub mod curve {
    /// Control points per fan curve
    pub const POINTS: usize = 8;

    /// Encoded curve size: temperatures followed by percentages
    pub const PAYLOAD_LEN: usize = POINTS * 2;

    pub const MIN_TEMP_C: i32 = 0;
    pub const MAX_TEMP_C: i32 = 120;
    pub const MIN_PERCENT: i32 = 0;
    pub const MAX_PERCENT: i32 = 100;
}

/// Accepted ranges for power-limit registers (inclusive)
pub mod power {
    /// Sustained and slow package limits (SPL, sPPT)
    pub const PPT_TOTAL_MIN_WATTS: i32 = 10;
    pub const PPT_TOTAL_MAX_WATTS: i32 = 180;

    /// Fast boost and CPU-only limits (fPPT, CPU)
    pub const PPT_BOOST_MIN_WATTS: i32 = 5;
    pub const PPT_BOOST_MAX_WATTS: i32 = 85;

    pub const DYNAMIC_BOOST_MIN_WATTS: i32 = 5;
    pub const DYNAMIC_BOOST_MAX_WATTS: i32 = 25;

    pub const THERMAL_TARGET_MIN_C: i32 = 75;
    pub const THERMAL_TARGET_MAX_C: i32 = 87;
}

/// Accepted ranges for CPU and iGPU voltage tuning (inclusive)
pub mod undervolt {
    /// Undervolt steps; 0 is stock
    pub const MIN_STEPS: i32 = -40;
    pub const MAX_STEPS: i32 = 0;

    pub const CPU_TEMP_LIMIT_MIN_C: i32 = 75;
    /// The firmware default; requesting it restores stock behavior
    pub const CPU_TEMP_LIMIT_MAX_C: i32 = 98;
}

/// Processes closed before a GPU mode switch so the dGPU can power down
pub const GPU_LAUNCHERS: &[&str] = &[
    "EADesktop",
    "RadeonSoftware",
    "epicgameslauncher",
    "ASUSSmartDisplayControl",
];

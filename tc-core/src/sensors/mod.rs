//! Sensor acquisition and normalization
//!
//! - `calibration` - fan counter normalization and scale learning
//! - `platform` - OS fallback readers
//! - `snapshot` - per-poll snapshot assembly

mod calibration;
mod platform;
mod snapshot;

pub use calibration::{model_default_max, FanCalibration, FanNormalizer};
pub use platform::{NullPlatformSensors, PlatformSensors};
pub use snapshot::{SensorSnapshot, SnapshotReader};

//! Thermoctl Core Library
//!
//! Hardware telemetry and thermal/power control for laptops with a
//! switchable discrete GPU.
//!
//! # Module Structure
//!
//! - `firmware` - firmware channel contract and channel ids
//! - `sensors/` - fan normalization, calibration, snapshot assembly
//! - `gpu/` - GPU backend slot and delayed re-probe
//! - `policy/` - fan curve and power limit application
//! - `engine` - facade wiring everything together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tc_core::{FirmwareChannel, HardwareEngine, MemoryConfigStore};
//!
//! fn run(firmware: Arc<dyn FirmwareChannel>) {
//!     let engine = HardwareEngine::builder(firmware, Arc::new(MemoryConfigStore::new("GA401QM"))).build();
//!     let snapshot = engine.capture_snapshot();
//!     println!("{:?}", snapshot.cpu_fan);
//! }
//! ```

pub mod gpu;
pub mod policy;
pub mod sensors;

pub mod constants;
pub mod engine;
pub mod error;
pub mod firmware;
pub mod process;
pub mod settings;

#[cfg(test)]
mod testing;

pub use error::{Result, ThermoctlError};

pub use engine::{HardwareEngine, HardwareEngineBuilder};

pub use firmware::{ChannelId, FanChannel, FirmwareChannel};

pub use gpu::{
    default_probes, AmdProbe, GpuBackendSlot, GpuProbe, NvidiaProbe, RecreationScheduler,
    ScheduledRecreate,
};

pub use policy::{
    encode_fan_curve, normalize_curve, ApplyEntry, ApplyOutcome, ApplyReport, CurvePoint,
    FanCurves, GpuTuning, NoUndervoltControl, PolicyController, PolicyProfile, PowerLimits,
    Undervolt, UndervoltControl,
};

pub use process::{kill_gpu_apps, NoopTerminator, ProcessTerminator};

pub use sensors::{
    model_default_max, FanCalibration, FanNormalizer, NullPlatformSensors, PlatformSensors,
    SensorSnapshot, SnapshotReader,
};

pub use settings::{keys, ConfigStore, EngineSettings, MemoryConfigStore};

// GPU adapter types callers need alongside the engine
pub use tc_gpu::{terminate_pid, GpuControl, GpuKind, GpuPowerLimits, NoGpuControl};

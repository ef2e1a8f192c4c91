//! Engine settings and the persisted-configuration contract
//!
//! The engine never reads or writes configuration files itself. It talks to
//! a [`ConfigStore`] supplied by the host, which owns the storage format.
//! [`MemoryConfigStore`] is an in-process store for embedding and tests.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::timing;
use crate::error::Result;

/// Keys the engine reads from and writes to the config store
pub mod keys {
    /// Learned "100%" raw fan value
    pub const FAN_MAX: &str = "fan_max";
    /// Display fans as RPM instead of percent
    pub const FAN_RPM: &str = "fan_rpm";
    /// Close heavy GPU consumers when releasing the dGPU
    pub const KILL_GPU_APPS: &str = "kill_gpu_apps";
}

/// Key/value store persisted by the host
pub trait ConfigStore: Send + Sync {
    fn get_int(&self, key: &str) -> Option<i32>;

    fn set_int(&self, key: &str, value: i32) -> Result<()>;

    /// Flags are stored as integers; only `1` means enabled
    fn is_enabled(&self, key: &str) -> bool {
        self.get_int(key) == Some(1)
    }

    /// Hardware model identifier (e.g. "ROG Zephyrus G14 GA401QM")
    fn model(&self) -> String;
}

/// Config store kept in memory
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, i32>>,
    model: String,
}

impl MemoryConfigStore {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            model: model.into(),
        }
    }

    /// Builder-style preset of a key
    pub fn with(self, key: &str, value: i32) -> Self {
        self.values.write().insert(key.to_string(), value);
        self
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.values.read().get(key).copied()
    }

    fn set_int(&self, key: &str, value: i32) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Settle delay between the two reads of the GPU busy check
    pub busy_settle_ms: u64,
    /// Utilization threshold for the GPU busy check
    pub busy_threshold_percent: i32,
    /// Delay before a scheduled GPU backend re-probe
    pub recreate_delay_secs: u64,
    /// Sensor poll interval used by hosts that drive the poll loop
    pub poll_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            busy_settle_ms: timing::BUSY_SETTLE.as_millis() as u64,
            busy_threshold_percent: timing::BUSY_THRESHOLD_PERCENT,
            recreate_delay_secs: timing::RECREATE_DELAY.as_secs(),
            poll_interval_ms: timing::POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl EngineSettings {
    pub fn busy_settle(&self) -> Duration {
        Duration::from_millis(self.busy_settle_ms)
    }

    pub fn recreate_delay(&self) -> Duration {
        Duration::from_secs(self.recreate_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip_and_flags() {
        let store = MemoryConfigStore::new("GA401QM").with(keys::FAN_RPM, 1);
        assert!(store.is_enabled(keys::FAN_RPM));
        assert!(!store.is_enabled(keys::KILL_GPU_APPS));

        store.set_int(keys::KILL_GPU_APPS, 2).unwrap();
        assert!(!store.is_enabled(keys::KILL_GPU_APPS));

        store.set_int(keys::FAN_MAX, 61).unwrap();
        assert_eq!(store.get_int(keys::FAN_MAX), Some(61));
        store.remove(keys::FAN_MAX);
        assert_eq!(store.get_int(keys::FAN_MAX), None);
        assert_eq!(store.model(), "GA401QM");
    }

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.busy_settle(), Duration::from_secs(1));
        assert_eq!(settings.recreate_delay(), Duration::from_secs(5));
        assert_eq!(settings.busy_threshold_percent, 10);
    }

    #[test]
    fn test_engine_settings_partial_json() {
        let settings: EngineSettings = serde_json::from_str(r#"{"recreate_delay_secs": 8}"#).unwrap();
        assert_eq!(settings.recreate_delay_secs, 8);
        assert_eq!(settings.poll_interval_ms, 1000);
    }
}

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

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tc_core::{ConfigStore, EngineSettings};
use tc_error::{Result, ThermoctlError};
use tracing::{debug, warn};

use crate::system::read_model_id;

/// Key holding an explicit model id override
const MODEL_KEY: &str = "model";
/// Key holding the engine tunables object
const ENGINE_KEY: &str = "engine";

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("thermoctl").join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("thermoctl")
            .join("config.json");
    }
    PathBuf::from("/etc/thermoctl/config.json")
}

/// Config store persisted as a flat JSON object
///
/// Every `set_int` rewrites the file. Unknown keys are preserved.
#[derive(Debug)]
pub struct JsonConfigStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
    detected_model: String,
}

impl JsonConfigStore {
    /// Load `path`, starting empty if it does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_model(path, read_model_id())
    }

    pub fn open_with_model(path: impl Into<PathBuf>, detected_model: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(data) if data.trim().is_empty() => Map::new(),
            Ok(data) => match serde_json::from_str::<Value>(&data)? {
                Value::Object(map) => map,
                _ => {
                    return Err(ThermoctlError::InvalidConfig {
                        field: path.display().to_string(),
                        reason: "top level must be an object".to_string(),
                    })
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, starting empty");
                Map::new()
            }
            Err(e) => return Err(ThermoctlError::FileRead { path, source: e }),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
            detected_model: detected_model.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Engine tunables from the `engine` object, defaults for anything missing
    pub fn engine_settings(&self) -> EngineSettings {
        let values = self.values.read();
        match values.get(ENGINE_KEY) {
            Some(engine) => serde_json::from_value(engine.clone()).unwrap_or_else(|e| {
                warn!("Invalid engine settings, using defaults: {}", e);
                EngineSettings::default()
            }),
            None => EngineSettings::default(),
        }
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json).map_err(|e| ThermoctlError::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_int(&self, key: &str) -> Option<i32> {
        let values = self.values.read();
        let value = values.get(key)?;
        match value {
            Value::Bool(b) => Some(i32::from(*b)),
            other => other.as_i64().and_then(|v| i32::try_from(v).ok()),
        }
    }

    fn set_int(&self, key: &str, value: i32) -> Result<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), Value::from(value));
        self.persist(&values)
    }

    fn model(&self) -> String {
        self.values
            .read()
            .get(MODEL_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.detected_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::keys;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonConfigStore::open_with_model(tmp.path().join("config.json"), "FA507").unwrap();
        assert_eq!(store.get_int(keys::FAN_MAX), None);
        assert_eq!(store.model(), "FA507");
        assert_eq!(store.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_set_persists_and_keeps_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"theme": "dark", "fan_rpm": true}"#).unwrap();

        let store = JsonConfigStore::open_with_model(&path, "").unwrap();
        assert!(store.is_enabled(keys::FAN_RPM));
        store.set_int(keys::FAN_MAX, 66).unwrap();

        let reopened = JsonConfigStore::open_with_model(&path, "").unwrap();
        assert_eq!(reopened.get_int(keys::FAN_MAX), Some(66));
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn test_model_override_and_engine_settings() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"model": "GA401QM", "engine": {"recreate_delay_secs": 3}}"#).unwrap();

        let store = JsonConfigStore::open_with_model(&path, "G533").unwrap();
        assert_eq!(store.model(), "GA401QM");
        assert_eq!(store.engine_settings().recreate_delay_secs, 3);
        assert_eq!(store.engine_settings().busy_settle_ms, 1000);
    }

    #[test]
    fn test_non_object_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonConfigStore::open_with_model(&path, "").is_err());

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonConfigStore::open_with_model(&path, ""),
            Err(ThermoctlError::JsonParse(_))
        ));
    }
}

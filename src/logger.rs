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

//! JSON-lines event log
//!
//! Enabled with `--logging`. Each record is `{"ts_ms", "event", "data"}`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::{json, Value};

const DEFAULT_LOG_PATH: &str = "/etc/thermoctl/logs.json";
const FALLBACK_LOG_PATH: &str = "/tmp/thermoctl_logs.json";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<(PathBuf, File)>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Open the event log, falling back to /tmp when /etc is not writable
pub fn init_logging() -> Option<PathBuf> {
    init_logging_at(Path::new(DEFAULT_LOG_PATH))
        .or_else(|| init_logging_at(Path::new(FALLBACK_LOG_PATH)))
}

pub fn init_logging_at(path: &Path) -> Option<PathBuf> {
    let file = open_append(path)?;
    *LOG_FILE.lock() = Some((path.to_path_buf(), file));
    Some(path.to_path_buf())
}

pub fn is_enabled() -> bool {
    LOG_FILE.lock().is_some()
}

/// Append one record; a no-op until [`init_logging`] succeeded
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Some((_, f)) = LOG_FILE.lock().as_mut() {
        let _ = writeln!(f, "{}", line);
    }
}

/// Close the log so later events are dropped
pub fn shutdown_logging() {
    *LOG_FILE.lock() = None;
}

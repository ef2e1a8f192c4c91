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

//! Periodic sensor polling

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tc_core::{HardwareEngine, SensorSnapshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::logger;

/// Human-readable multi-line rendering of a snapshot
pub fn format_snapshot(snapshot: &SensorSnapshot) -> String {
    fn or_dash<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
        value.map(|v| format!("{}{}", v, unit)).unwrap_or_else(|| "-".to_string())
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "CPU      {}  {}",
        or_dash(snapshot.cpu_temperature_c.map(|t| format!("{:.1}", t)), "°C"),
        snapshot.cpu_fan.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "GPU      {}  {}  load {}",
        or_dash(snapshot.gpu_temperature_c, "°C"),
        snapshot.gpu_fan.as_deref().unwrap_or("-"),
        or_dash(snapshot.gpu_utilization_percent, "%")
    );
    if let Some(mid) = snapshot.mid_fan.as_deref() {
        let _ = writeln!(out, "Mid      {}", mid);
    }
    let _ = write!(out, "Battery  {}", or_dash(snapshot.battery_watts().map(|w| format!("{:.1}", w)), "W"));
    out
}

pub fn render_snapshot(snapshot: &SensorSnapshot, as_json: bool) -> Result<String> {
    if as_json {
        serde_json::to_string(snapshot).context("serializing snapshot")
    } else {
        Ok(format_snapshot(snapshot))
    }
}

/// Capture on the blocking pool; firmware and driver calls may be slow
async fn capture(engine: &Arc<HardwareEngine>) -> Result<SensorSnapshot> {
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || engine.capture_snapshot())
        .await
        .context("snapshot task failed")
}

/// Poll until `count` snapshots were printed or Ctrl-C
pub async fn run_monitor(
    engine: Arc<HardwareEngine>,
    interval: Duration,
    count: Option<u64>,
    as_json: bool,
) -> Result<()> {
    info!(interval_ms = interval.as_millis() as u64, "Monitor started");
    let printed = monitor_until(
        engine,
        interval,
        count,
        |snapshot| {
            println!("{}", render_snapshot(snapshot, as_json)?);
            if !as_json {
                println!();
            }
            Ok(())
        },
        tokio::signal::ctrl_c(),
    )
    .await?;
    info!(snapshots = printed, "Monitor stopped");
    Ok(())
}

/// Poll loop behind [`run_monitor`]
///
/// `shutdown` is polled across iterations, so a signal that lands while a
/// capture is in flight stops the loop at the next tick.
async fn monitor_until<S, F>(
    engine: Arc<HardwareEngine>,
    interval: Duration,
    count: Option<u64>,
    mut emit: S,
    shutdown: F,
) -> Result<u64>
where
    S: FnMut(&SensorSnapshot) -> Result<()>,
    F: Future,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut printed = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        let snapshot = capture(&engine).await?;
        if logger::is_enabled() {
            logger::log_event("snapshot", serde_json::to_value(&snapshot)?);
        }
        emit(&snapshot)?;

        printed += 1;
        if count.is_some_and(|limit| printed >= limit) {
            break;
        }
    }

    Ok(printed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::AsusWmiChannel;
    use tc_core::MemoryConfigStore;
    use tokio::sync::oneshot;

    fn offline_engine() -> Arc<HardwareEngine> {
        let firmware = AsusWmiChannel::with_paths("/nonexistent/asus-nb-wmi", "/nonexistent/hwmon");
        Arc::new(
            HardwareEngine::builder(Arc::new(firmware), Arc::new(MemoryConfigStore::new("FA507")))
                .probes(Vec::new())
                .build(),
        )
    }

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            timestamp_ms: 1,
            cpu_temperature_c: Some(61.25),
            gpu_temperature_c: None,
            battery_discharge_watts: Some(-1.0),
            cpu_fan: Some("Fan: 42%".to_string()),
            gpu_fan: None,
            mid_fan: None,
            gpu_utilization_percent: Some(3),
        }
    }

    #[test]
    fn test_format_snapshot_marks_missing_fields() {
        let text = format_snapshot(&snapshot());
        assert!(text.contains("61.2°C") || text.contains("61.3°C"));
        assert!(text.contains("Fan: 42%"));
        assert!(text.contains("load 3%"));
        assert!(text.contains("Battery  -"));
        assert!(!text.contains("Mid"));
    }

    #[test]
    fn test_render_json() {
        let json = render_snapshot(&snapshot(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cpu_fan"], "Fan: 42%");
        assert_eq!(value["battery_discharge_watts"], -1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_monitor_stops_after_count() {
        let mut seen = Vec::new();
        let printed = monitor_until(
            offline_engine(),
            Duration::from_millis(1),
            Some(3),
            |snapshot| {
                seen.push(snapshot.cpu_fan.clone());
                Ok(())
            },
            std::future::pending::<()>(),
        )
        .await
        .unwrap();
        assert_eq!(printed, 3);
        assert_eq!(seen, vec![None, None, None]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interrupt_during_capture_is_not_lost() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);
        // the interrupt fires while the loop is busy emitting, outside the select
        let printed = monitor_until(
            offline_engine(),
            Duration::from_millis(1),
            None,
            |_| {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                Ok(())
            },
            rx,
        )
        .await
        .unwrap();
        assert_eq!(printed, 1);
    }
}

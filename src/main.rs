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
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tc_core::{HardwareEngine, PolicyProfile};
use tracing::{info, warn};

use thermoctl::cli::{CalibrationCommands, Cli, Commands, GpuCommands};
use thermoctl::config::{config_path, JsonConfigStore};
use thermoctl::ec::AsusWmiChannel;
use thermoctl::logger;
use thermoctl::process::ProcfsTerminator;
use thermoctl::service;
use thermoctl::system::{self, LinuxPlatformSensors};

fn init_tracing() {
    let log_level = std::env::var("THERMOCTL_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(log_level)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if cli.logging {
        if let Some(path) = logger::init_logging() {
            info!(path = %path.display(), "Event log enabled");
        }
        logger::log_event("startup", json!({ "args": std::env::args().collect::<Vec<_>>() }));
    }

    if !system::is_root() {
        warn!("Not running as root; firmware channels will likely be unreadable");
    }

    let config = Arc::new(JsonConfigStore::open(cli.config.clone().unwrap_or_else(config_path))?);
    let firmware = AsusWmiChannel::new();
    if !firmware.is_available() {
        warn!("asus-nb-wmi debugfs interface not found");
    }

    let engine = Arc::new(
        HardwareEngine::builder(Arc::new(firmware), config.clone())
            .platform(Arc::new(LinuxPlatformSensors::new()))
            .terminator(Arc::new(ProcfsTerminator::new()))
            .settings(config.engine_settings())
            .lazy_gpu()
            .build(),
    );

    let result = run(&cli.command, &engine);
    engine.shutdown();
    if let Err(e) = &result {
        logger::log_event("fatal_error", json!({ "error": e.to_string() }));
    }
    result
}

fn run(command: &Commands, engine: &Arc<HardwareEngine>) -> Result<()> {
    match command {
        Commands::Status { json } => {
            engine.recreate_backend();
            let snapshot = engine.capture_snapshot();
            logger::log_event("snapshot", serde_json::to_value(&snapshot)?);
            println!("{}", service::render_snapshot(&snapshot, *json)?);
        }

        Commands::Monitor { interval_ms, count, json } => {
            engine.recreate_backend();
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| engine.settings().poll_interval())
                .max(Duration::from_millis(1));
            runtime()?.block_on(service::run_monitor(engine.clone(), interval, *count, *json))?;
        }

        Commands::Gpu { action: None } => {
            let kind = engine.recreate_backend();
            println!("{}: {}", kind, engine.gpu_name());
        }

        Commands::Gpu { action: Some(GpuCommands::Busy { threshold }) } => {
            engine.recreate_backend();
            let threshold = threshold.unwrap_or(engine.settings().busy_threshold_percent);
            let busy = engine.is_gpu_busy(threshold);
            println!("{}", if busy { "busy" } else { "idle" });
        }

        Commands::Gpu { action: Some(GpuCommands::Recreate { delay_secs }) } => {
            let delay = delay_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| engine.settings().recreate_delay());
            let kind = runtime()?.block_on(async {
                let pending = engine.schedule_recreate_after(delay)?;
                Ok::<_, tc_core::ThermoctlError>(pending.wait().await)
            })?;
            match kind {
                Some(kind) => println!("{}: {}", kind, engine.gpu_name()),
                None => println!("recreation skipped"),
            }
        }

        Commands::Apply { profile, undervolt } => {
            let data = fs::read_to_string(profile)
                .with_context(|| format!("reading {}", profile.display()))?;
            let mut profile = PolicyProfile::from_json(&data)
                .with_context(|| format!("parsing {}", profile.display()))?;
            profile.undervolt.auto_apply |= *undervolt;

            engine.recreate_backend();
            let report = engine.apply_profile(&profile);
            logger::log_event("apply", serde_json::to_value(&report)?);
            print!("{}", report);
            if report.has_failures() {
                bail!("some writes failed");
            }
        }

        Commands::Calibration(CalibrationCommands::Show) => {
            let calibration = engine.calibration();
            println!("model floor:    {}", calibration.model_floor);
            println!("learned scale:  {}", calibration.max_observed_scale);
            println!("effective max:  {}", calibration.effective_max());
        }

        Commands::Calibration(CalibrationCommands::Reset) => {
            engine.reset_calibration()?;
            println!("fan calibration reset (max {})", engine.resolve_fan_max());
        }

        Commands::KillGpuApps => {
            engine.recreate_backend();
            let killed = engine.kill_gpu_apps();
            logger::log_event("kill_gpu_apps", json!({ "killed": killed }));
            println!("closed {} process(es)", killed);
        }
    }
    Ok(())
}

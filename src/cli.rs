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

//! Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "thermoctl")]
#[command(version)]
#[command(about = "Thermoctl - sensor telemetry and thermal/power control for ASUS laptops")]
#[command(long_about = "Thermoctl - sensor telemetry and thermal/power control for ASUS laptops

Reads fan, temperature and battery sensors through the asus-nb-wmi firmware
interface and pushes fan curves and power limits back down.

EXAMPLES:
    thermoctl status                   Print one sensor snapshot
    thermoctl monitor --count 10       Poll sensors ten times
    thermoctl gpu                      Show the bound discrete GPU
    thermoctl gpu busy                 Check whether the dGPU is in use
    thermoctl apply profile.json       Apply fan curves and power limits
    thermoctl calibration reset        Forget the learned fan scale

ENVIRONMENT VARIABLES:
    THERMOCTL_LOG=debug    Log level (trace, debug, info, warn, error)

FILES:
    ~/.config/thermoctl/config.json    Persisted settings
    /etc/thermoctl/logs.json           Event log (--logging)")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Append JSON event records to /etc/thermoctl/logs.json
    #[arg(long, global = true)]
    pub logging: bool,

    /// Config file (default: ~/.config/thermoctl/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture and print one sensor snapshot
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll sensors periodically
    Monitor {
        /// Poll interval in milliseconds (default from config)
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,

        /// Stop after this many snapshots
        #[arg(long, value_name = "N")]
        count: Option<u64>,

        /// Print as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Discrete GPU backend
    Gpu {
        #[command(subcommand)]
        action: Option<GpuCommands>,
    },

    /// Apply a policy profile (fan curves, power limits, GPU tuning, undervolt)
    Apply {
        /// Profile JSON file
        profile: PathBuf,

        /// Apply the undervolt section even when it is not marked auto_apply
        #[arg(long)]
        undervolt: bool,
    },

    /// Fan calibration
    #[command(subcommand)]
    Calibration(CalibrationCommands),

    /// Close applications that keep the dGPU awake
    KillGpuApps,
}

#[derive(Subcommand, Debug)]
pub enum GpuCommands {
    /// Debounced check whether the dGPU is in use
    Busy {
        /// Utilization threshold in percent (default from config)
        #[arg(long)]
        threshold: Option<i32>,
    },

    /// Re-probe the GPU after a delay, as after a power-state change
    Recreate {
        /// Delay in seconds (default from config)
        #[arg(long, value_name = "SECS")]
        delay_secs: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CalibrationCommands {
    /// Show the model floor and learned scale
    Show,
    /// Forget the learned scale
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor() {
        let cli = Cli::parse_from(["thermoctl", "monitor", "--interval-ms", "500", "--count", "3"]);
        match cli.command {
            Commands::Monitor { interval_ms, count, json } => {
                assert_eq!(interval_ms, Some(500));
                assert_eq!(count, Some(3));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_gpu_busy_and_global_flags() {
        let cli = Cli::parse_from(["thermoctl", "gpu", "busy", "--threshold", "20", "--logging"]);
        assert!(cli.logging);
        assert!(matches!(
            cli.command,
            Commands::Gpu { action: Some(GpuCommands::Busy { threshold: Some(20) }) }
        ));

        let cli = Cli::parse_from(["thermoctl", "gpu"]);
        assert!(matches!(cli.command, Commands::Gpu { action: None }));
    }

    #[test]
    fn test_parse_calibration_and_kill() {
        let cli = Cli::parse_from(["thermoctl", "calibration", "reset"]);
        assert!(matches!(cli.command, Commands::Calibration(CalibrationCommands::Reset)));
        let cli = Cli::parse_from(["thermoctl", "kill-gpu-apps"]);
        assert!(matches!(cli.command, Commands::KillGpuApps));
    }

    #[test]
    fn test_parse_apply_with_undervolt() {
        let cli = Cli::parse_from(["thermoctl", "apply", "silent.json", "--undervolt"]);
        match cli.command {
            Commands::Apply { profile, undervolt } => {
                assert_eq!(profile, PathBuf::from("silent.json"));
                assert!(undervolt);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

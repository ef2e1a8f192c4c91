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

//! Thermoctl - sensor telemetry and thermal/power control for ASUS laptops
//!
//! The engine lives in `tc-core`. This crate provides the Linux
//! collaborators it needs (firmware channel, OS sensors, process
//! termination, persisted config) and the command-line front end.

pub mod cli;
pub mod config;
pub mod ec;
pub mod logger;
pub mod process;
pub mod service;
pub mod system;

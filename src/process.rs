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
use std::path::PathBuf;

use tc_core::{terminate_pid, ProcessTerminator};
use tracing::debug;

/// Linux truncates `comm` to 15 bytes
const COMM_LEN: usize = 15;

/// Terminates processes found by scanning `/proc/*/comm`
#[derive(Debug, Clone)]
pub struct ProcfsTerminator {
    proc_root: PathBuf,
}

impl ProcfsTerminator {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Pids whose command name matches `name`, case-insensitively
    pub fn find_pids(&self, name: &str) -> Vec<u32> {
        let wanted = comm_key(name);
        let Ok(entries) = fs::read_dir(&self.proc_root) else {
            return Vec::new();
        };
        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|e| e.file_name().to_str()?.parse::<u32>().ok().map(|pid| (pid, e.path())))
            .filter(|(_, dir)| {
                fs::read_to_string(dir.join("comm"))
                    .map(|comm| comm_key(comm.trim()) == wanted)
                    .unwrap_or(false)
            })
            .map(|(pid, _)| pid)
            .collect();
        pids.sort_unstable();
        pids
    }
}

impl Default for ProcfsTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTerminator for ProcfsTerminator {
    fn kill_by_name(&self, name: &str) -> usize {
        let pids = self.find_pids(name);
        if pids.is_empty() {
            debug!(name, "No matching process");
        }
        pids.into_iter().filter(|&pid| terminate_pid(pid)).count()
    }
}

fn comm_key(name: &str) -> String {
    name.chars().take(COMM_LEN).collect::<String>().to_lowercase()
}

/*
 * This file is part of atkmon.
 *
 * Copyright (C) 2025 atkmon contributors
 *
 * atkmon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * atkmon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with atkmon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Operating system metrics
//!
//! CPU, memory, disk, network and host information come from `sysinfo`.
//! Battery state comes from the Linux `power_supply` class on Linux and from
//! the `battery` crate elsewhere. None of this touches the ATK device.
//!
//! CPU usage is measured between two refreshes, so the reader keeps one
//! `System` alive across calls. The very first sample after start-up reports
//! zero usage.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Disks, Networks, System};
use tracing::debug;

use crate::constants::{paths, units};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub os: Option<String>,
    pub hostname: Option<String>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStats {
    pub usage_percent: f32,
    pub per_core_usage_percent: Vec<f32>,
    pub core_count: usize,
    pub frequency_mhz: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_gb: f64,
    pub used_percent: f32,
    pub available_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskStats {
    pub total_gb: f64,
    pub used_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatteryStats {
    pub charge_percent: Option<f32>,
    pub ac_plugged: Option<bool>,
}

pub fn default_disk_mount() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

/// Where battery state is read from
#[derive(Debug, Clone, PartialEq)]
pub enum BatterySource {
    /// A Linux `power_supply` class directory
    PowerSupply(PathBuf),
    /// The platform battery API via the `battery` crate
    Manager,
}

impl Default for BatterySource {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            BatterySource::PowerSupply(PathBuf::from(paths::POWER_SUPPLY_BASE))
        } else {
            BatterySource::Manager
        }
    }
}

pub struct OsMetricsReader {
    system: Mutex<System>,
    disk_mount: PathBuf,
    battery_source: BatterySource,
}

impl OsMetricsReader {
    pub fn new(disk_mount: Option<PathBuf>) -> Self {
        Self::with_battery_source(disk_mount, BatterySource::default())
    }

    pub fn with_power_supply_root(disk_mount: Option<PathBuf>, power_supply_root: PathBuf) -> Self {
        Self::with_battery_source(disk_mount, BatterySource::PowerSupply(power_supply_root))
    }

    pub fn with_battery_source(disk_mount: Option<PathBuf>, battery_source: BatterySource) -> Self {
        let mut system = System::new();
        // Baseline for the first usage sample
        system.refresh_cpu_all();
        Self {
            system: Mutex::new(system),
            disk_mount: disk_mount.unwrap_or_else(default_disk_mount),
            battery_source,
        }
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            os: System::long_os_version(),
            hostname: System::host_name(),
            uptime_seconds: System::uptime(),
        }
    }

    pub fn cpu(&self) -> CpuStats {
        let mut sys = self.system.lock();
        sys.refresh_cpu_all();
        let cpus = sys.cpus();
        CpuStats {
            usage_percent: units::round1(sys.global_cpu_usage()),
            per_core_usage_percent: cpus.iter().map(|c| units::round1(c.cpu_usage())).collect(),
            core_count: cpus.len(),
            frequency_mhz: cpus.first().map(|c| c.frequency()).filter(|f| *f > 0),
        }
    }

    /// `None` when the OS reports no memory at all
    pub fn memory(&self) -> Option<MemoryStats> {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return None;
        }
        let available = sys.available_memory();
        Some(MemoryStats {
            total_gb: units::gb(total),
            used_percent: used_percent(total, available),
            available_gb: units::gb(available),
        })
    }

    /// Usage of the configured mount; `None` if it is not mounted
    pub fn disk(&self) -> Option<DiskStats> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.disk_mount.as_path());
        let Some(disk) = disk else {
            debug!("No disk mounted at {:?}", self.disk_mount);
            return None;
        };
        let total = disk.total_space();
        if total == 0 {
            return None;
        }
        Some(DiskStats {
            total_gb: units::gb(total),
            used_percent: used_percent(total, disk.available_space()),
        })
    }

    /// Totals since boot across every interface
    pub fn network(&self) -> NetworkStats {
        let networks = Networks::new_with_refreshed_list();
        let (sent, received) = networks.list().iter().fold((0u64, 0u64), |(s, r), (_, data)| {
            (
                s.saturating_add(data.total_transmitted()),
                r.saturating_add(data.total_received()),
            )
        });
        NetworkStats {
            bytes_sent: sent,
            bytes_received: received,
        }
    }

    pub fn battery(&self) -> BatteryStats {
        match &self.battery_source {
            BatterySource::PowerSupply(root) => read_battery(root),
            BatterySource::Manager => read_battery_manager(),
        }
    }
}

fn used_percent(total: u64, available: u64) -> f32 {
    let used = total.saturating_sub(available);
    units::round1((used as f64 / total as f64 * 100.0) as f32)
}

/// Battery charge and AC state from a `power_supply` class directory
pub fn read_battery(root: &Path) -> BatteryStats {
    let mut stats = BatteryStats::default();
    let Ok(entries) = fs::read_dir(root) else {
        return stats;
    };

    let mut battery_status: Option<String> = None;
    let mut supplies: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    supplies.sort();

    for dir in supplies {
        let kind = read_trimmed(&dir.join("type"));
        match kind.as_deref() {
            Some("Battery") if stats.charge_percent.is_none() => {
                stats.charge_percent = read_trimmed(&dir.join("capacity"))
                    .and_then(|s| s.parse::<f32>().ok())
                    .map(|c| c.clamp(0.0, 100.0));
                battery_status = read_trimmed(&dir.join("status"));
            }
            Some("Mains") => {
                let online = read_trimmed(&dir.join("online")).map(|s| s == "1");
                stats.ac_plugged = match (stats.ac_plugged, online) {
                    (Some(true), _) => Some(true),
                    (_, o) => o.or(stats.ac_plugged),
                };
            }
            _ => {}
        }
    }

    if stats.ac_plugged.is_none() {
        stats.ac_plugged = battery_status.map(|s| s != "Discharging");
    }
    stats
}

/// First battery reported by the platform battery API
pub fn read_battery_manager() -> BatteryStats {
    let manager = match battery::Manager::new() {
        Ok(manager) => manager,
        Err(e) => {
            debug!("Battery API unavailable: {}", e);
            return BatteryStats::default();
        }
    };
    let first = manager.batteries().map(|mut batteries| batteries.next());
    match first {
        Ok(Some(Ok(bat))) => {
            battery_stats(bat.state_of_charge().get::<battery::units::ratio::percent>(), bat.state())
        }
        Ok(Some(Err(e))) | Err(e) => {
            debug!("Battery unavailable: {}", e);
            BatteryStats::default()
        }
        Ok(None) => BatteryStats::default(),
    }
}

fn battery_stats(charge_percent: f32, state: battery::State) -> BatteryStats {
    let ac_plugged = match state {
        battery::State::Charging | battery::State::Full => Some(true),
        battery::State::Discharging | battery::State::Empty => Some(false),
        _ => None,
    };
    BatteryStats {
        charge_percent: Some(units::round1(charge_percent.clamp(0.0, 100.0))),
        ac_plugged,
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

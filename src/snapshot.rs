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

//! Snapshot aggregation
//!
//! The only place where the OS metrics, the fan/thermal reader and the mode
//! controller meet. A snapshot is built fresh on every call; sections that
//! cannot be read are `None` (JSON `null`) and never fail the snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::constants::units;
use crate::controller::PerformanceModeController;
use crate::metrics::{BatteryStats, CpuStats, DiskStats, MemoryStats, NetworkStats, OsMetricsReader, SystemInfo};
use crate::modes::ModeState;
use crate::thermal::{FanId, FanThermalReader};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermalSection {
    pub cpu_package_temp_celsius: Option<f32>,
    pub cpu_core_avg_celsius: Option<f32>,
    pub cpu_core_max_celsius: Option<f32>,
    pub cpu_fan_rpm: Option<u32>,
    pub cpu_fan_percent: Option<f32>,
    pub gpu_core_temp_celsius: Option<f32>,
    pub gpu_hotspot_celsius: Option<f32>,
    pub gpu_fan_rpm: Option<u32>,
    pub gpu_fan_percent: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub system: Option<SystemInfo>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub disk: Option<DiskStats>,
    pub network: Option<NetworkStats>,
    pub thermal: ThermalSection,
    /// Cached modes; `None` when the ATK device is absent
    pub modes: Option<ModeState>,
    pub battery: BatteryStats,
}

pub struct SnapshotAggregator {
    metrics: Arc<OsMetricsReader>,
    thermal: Arc<FanThermalReader>,
    modes: Arc<PerformanceModeController>,
}

impl SnapshotAggregator {
    pub fn new(
        metrics: Arc<OsMetricsReader>,
        thermal: Arc<FanThermalReader>,
        modes: Arc<PerformanceModeController>,
    ) -> Self {
        Self { metrics, thermal, modes }
    }

    pub fn build_snapshot(&self) -> Snapshot {
        let snapshot = Snapshot {
            system: Some(self.metrics.system_info()),
            cpu: Some(self.metrics.cpu()),
            memory: self.metrics.memory(),
            disk: self.metrics.disk(),
            network: Some(self.metrics.network()),
            thermal: self.thermal_section(),
            modes: self.modes.is_available().then(|| self.modes.current_modes()),
            battery: self.metrics.battery(),
        };
        debug!(
            "Built snapshot (memory={}, disk={}, modes={})",
            snapshot.memory.is_some(),
            snapshot.disk.is_some(),
            snapshot.modes.is_some()
        );
        snapshot
    }

    fn thermal_section(&self) -> ThermalSection {
        let temps = self.thermal.read_temperatures();
        let cpu_fan = self.thermal.read_fan(FanId::Cpu);
        let gpu_fan = self.thermal.read_fan(FanId::Gpu);
        ThermalSection {
            cpu_package_temp_celsius: temps.cpu_package,
            cpu_core_avg_celsius: temps.cpu_core_avg,
            cpu_core_max_celsius: temps.cpu_core_max,
            cpu_fan_rpm: cpu_fan.rpm(),
            cpu_fan_percent: cpu_fan.percent().map(units::round1),
            gpu_core_temp_celsius: temps.gpu_core,
            gpu_hotspot_celsius: temps.gpu_hotspot,
            gpu_fan_rpm: gpu_fan.rpm(),
            gpu_fan_percent: gpu_fan.percent().map(units::round1),
        }
    }
}

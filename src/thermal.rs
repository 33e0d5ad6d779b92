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

//! Fan and temperature readings
//!
//! Fan speeds come from the ATK device (the vendor sensor library reports no
//! fans on these machines); temperatures come from the [`SensorHub`]. Nothing
//! here returns an error: every field degrades to "unavailable" on its own.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::{fan, units};
use crate::device::{decode_status, DeviceAccess, DeviceRequest};
use crate::platform::{DeviceName, DeviceTable};
use crate::sensors::{self, hwmon, names, SensorHub, SensorKind, SensorValue};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FanId {
    Cpu,
    Gpu,
}

impl FanId {
    pub fn device(self) -> DeviceName {
        match self {
            FanId::Cpu => DeviceName::CpuFan,
            FanId::Gpu => DeviceName::GpuFan,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct FanReading {
    pub rpm: u32,
    pub percent_of_max: f32,
    /// `false` when the device could not be read; `rpm` and
    /// `percent_of_max` are then zero
    pub available: bool,
}

impl FanReading {
    pub fn from_rpm(rpm: u32, max_rpm: u32) -> Self {
        Self {
            rpm,
            percent_of_max: percent_of_max(rpm, max_rpm),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            rpm: 0,
            percent_of_max: 0.0,
            available: false,
        }
    }

    pub fn rpm(&self) -> Option<u32> {
        self.available.then_some(self.rpm)
    }

    pub fn percent(&self) -> Option<f32> {
        self.available.then_some(self.percent_of_max)
    }
}

/// `rpm` as a percentage of `max_rpm`, clamped to `0..=100`
pub fn percent_of_max(rpm: u32, max_rpm: u32) -> f32 {
    if max_rpm == 0 {
        return 0.0;
    }
    (rpm as f32 / max_rpm as f32 * 100.0).clamp(0.0, 100.0)
}

/// Decode a fan DSTS result into RPM.
///
/// The firmware reports hundreds of RPM. Values above the documented range
/// are not interpreted.
pub fn fan_rpm_from_status(raw: u32) -> Option<u32> {
    decode_status(raw)
        .filter(|v| *v <= fan::MAX_STATUS_VALUE)
        .map(|v| v * fan::RPM_PER_UNIT)
}

/// Temperatures in degrees Celsius; `None` is unavailable.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ThermalReadings {
    pub cpu_package: Option<f32>,
    pub cpu_core_avg: Option<f32>,
    pub cpu_core_max: Option<f32>,
    pub gpu_core: Option<f32>,
    pub gpu_hotspot: Option<f32>,
}

impl ThermalReadings {
    /// Pick the named temperatures out of a sensor listing, deriving core
    /// average and maximum from per-core values when not reported directly.
    pub fn from_values(values: &[SensorValue]) -> Self {
        let temp = |name: &str| sensors::find(values, SensorKind::Temperature, name);

        let cores: Vec<f32> = values
            .iter()
            .filter(|v| v.kind == SensorKind::Temperature && hwmon::is_core_sensor(&v.name))
            .map(|v| v.value)
            .collect();
        let derived_avg = (!cores.is_empty())
            .then(|| units::round1(cores.iter().sum::<f32>() / cores.len() as f32));
        let derived_max = cores.iter().copied().reduce(f32::max);

        Self {
            cpu_package: temp(names::CPU_PACKAGE),
            cpu_core_avg: temp(names::CORE_AVERAGE).or(derived_avg),
            cpu_core_max: temp(names::CORE_MAX).or(derived_max),
            gpu_core: temp(names::GPU_CORE),
            gpu_hotspot: temp(names::GPU_HOT_SPOT),
        }
    }
}

pub struct FanThermalReader {
    device: DeviceAccess,
    table: Arc<DeviceTable>,
    sensors: Arc<SensorHub>,
}

impl FanThermalReader {
    pub fn new(device: DeviceAccess, table: Arc<DeviceTable>, sensors: Arc<SensorHub>) -> Self {
        Self { device, table, sensors }
    }

    pub fn read_fan(&self, fan: FanId) -> FanReading {
        let name = fan.device();
        let raw = match self.device.send(DeviceRequest::read(self.table.id(name))) {
            Ok(raw) => raw,
            Err(e) if e.is_unavailable() => {
                debug!("{} unavailable: {}", name, e);
                return FanReading::unavailable();
            }
            Err(e) => {
                warn!("Reading {} failed: {}", name, e);
                return FanReading::unavailable();
            }
        };

        match fan_rpm_from_status(raw) {
            Some(rpm) => FanReading::from_rpm(rpm, self.table.fan_max_rpm),
            None => {
                debug!("{} status {:#x} not interpretable", name, raw);
                FanReading::unavailable()
            }
        }
    }

    pub fn read_temperatures(&self) -> ThermalReadings {
        match self.sensors.read_all() {
            Ok(values) => ThermalReadings::from_values(&values),
            Err(e) => {
                debug!("Temperatures unavailable: {}", e);
                ThermalReadings::default()
            }
        }
    }
}

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

//! Telemetry service
//!
//! Wires the device channel, mode cache, sensor hub and readers together and
//! exposes the three operations a transport layer needs: snapshot, mode
//! change and raw diagnostic dump.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::cache::ModeCacheStore;
use crate::config::AppConfig;
use crate::controller::PerformanceModeController;
use crate::device::{decode_status, DeviceAccess, DeviceRequest};
use crate::error::Result;
use crate::logger;
use crate::metrics::OsMetricsReader;
use crate::modes::{CpuMode, GpuModeRequest, ModeState, SetModesRequest};
use crate::platform::{self, DeviceTable};
use crate::sensors::{BackendStatus, SensorHub, SensorValue};
use crate::snapshot::{Snapshot, SnapshotAggregator};
use crate::system::HostInfo;
use crate::thermal::FanThermalReader;

#[derive(Debug, Clone, Serialize)]
pub struct RawDeviceReading {
    pub name: String,
    pub device_id: String,
    /// Raw DSTS result, hex
    pub raw: Option<String>,
    /// Value bits when the presence bit is set
    pub value: Option<u32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceDump {
    pub backend: String,
    pub available: bool,
    pub model: String,
    pub readings: Vec<RawDeviceReading>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModesDump {
    pub cached: ModeState,
    /// What the firmware claims; not trusted
    pub firmware_cpu_mode: Option<CpuMode>,
    pub firmware_error: Option<String>,
    /// From the MUX and eco flags; shows Ultimate when booted that way
    pub firmware_gpu_mode: Option<GpuModeRequest>,
    pub firmware_gpu_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorsDump {
    pub backends: Vec<BackendStatus>,
    pub values: Vec<SensorValue>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RawSensorDump {
    pub host: HostInfo,
    pub device: DeviceDump,
    pub modes: ModesDump,
    pub sensors: SensorsDump,
}

pub struct TelemetryService {
    device: DeviceAccess,
    table: Arc<DeviceTable>,
    sensors: Arc<SensorHub>,
    controller: Arc<PerformanceModeController>,
    aggregator: SnapshotAggregator,
}

impl TelemetryService {
    /// Open every collaborator named in `cfg`.
    ///
    /// Missing hardware never fails this; an unreadable device table does.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let table = platform::resolve_table(cfg.device_table.as_deref())?;
        let device = DeviceAccess::open(cfg.device.backend, cfg.device.debugfs_root.as_deref());
        logger::log_event(
            "device_open",
            json!({ "available": device.is_available(), "backend": device.describe() }),
        );

        let cache = ModeCacheStore::open(cfg.cache_path());
        let sensors = SensorHub::from_config(&cfg.sensors);
        let metrics = OsMetricsReader::new(cfg.disk_mount.clone());
        Ok(Self::from_parts(device, table, cache, sensors, metrics))
    }

    pub fn from_parts(
        device: DeviceAccess,
        table: DeviceTable,
        cache: ModeCacheStore,
        sensors: SensorHub,
        metrics: OsMetricsReader,
    ) -> Self {
        let table = Arc::new(table);
        let sensors = Arc::new(sensors);
        let controller = Arc::new(PerformanceModeController::new(
            device.clone(),
            table.clone(),
            Arc::new(cache),
        ));
        let thermal = Arc::new(FanThermalReader::new(device.clone(), table.clone(), sensors.clone()));
        let aggregator = SnapshotAggregator::new(Arc::new(metrics), thermal, controller.clone());
        info!(
            "Telemetry service ready (device: {}, model: {})",
            device.describe(),
            table.model
        );
        Self {
            device,
            table,
            sensors,
            controller,
            aggregator,
        }
    }

    pub fn controller(&self) -> &PerformanceModeController {
        &self.controller
    }

    pub fn get_snapshot(&self) -> Snapshot {
        self.aggregator.build_snapshot()
    }

    pub fn current_modes(&self) -> ModeState {
        self.controller.current_modes()
    }

    /// Apply the requested modes; unspecified dimensions stay unchanged.
    pub fn set_modes(&self, request: SetModesRequest) -> Result<ModeState> {
        self.controller.set_modes(request)
    }

    pub fn raw_sensor_dump(&self) -> RawSensorDump {
        let readings = if self.device.is_available() {
            self.table
                .entries()
                .into_iter()
                .map(|(name, id)| self.raw_reading(name, id))
                .collect()
        } else {
            Vec::new()
        };

        let (firmware_cpu_mode, firmware_error) = match self.controller.firmware_cpu_mode() {
            Ok(mode) => (mode, None),
            Err(e) => (None, Some(e.to_string())),
        };

        let (firmware_gpu_mode, firmware_gpu_error) = match self.controller.firmware_gpu_mode() {
            Ok(mode) => (mode, None),
            Err(e) => (None, Some(e.to_string())),
        };

        let (values, error) = match self.sensors.read_all() {
            Ok(values) => (values, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        RawSensorDump {
            host: HostInfo::detect(),
            device: DeviceDump {
                backend: self.device.describe(),
                available: self.device.is_available(),
                model: self.table.model.clone(),
                readings,
            },
            modes: ModesDump {
                cached: self.controller.current_modes(),
                firmware_cpu_mode,
                firmware_error,
                firmware_gpu_mode,
                firmware_gpu_error,
            },
            sensors: SensorsDump {
                backends: self.sensors.statuses(),
                values,
                error,
            },
        }
    }

    fn raw_reading(&self, name: String, id: u32) -> RawDeviceReading {
        let device_id = format!("{:#010x}", id);
        match self.device.send(DeviceRequest::read(id)) {
            Ok(raw) => RawDeviceReading {
                name,
                device_id,
                raw: Some(format!("{:#010x}", raw)),
                value: decode_status(raw),
                error: None,
            },
            Err(e) => RawDeviceReading {
                name,
                device_id,
                raw: None,
                value: None,
                error: Some(e.to_string()),
            },
        }
    }
}

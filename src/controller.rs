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

//! Performance mode controller
//!
//! Each mode dimension (CPU, GPU) is a small state machine: a transition is a
//! device write the firmware accepted followed by a cache commit. A failed
//! write changes nothing. There is no pending state.
//!
//! The firmware's CPU mode read-back reports "Performance" after any change,
//! so [`current_modes`](PerformanceModeController::current_modes) answers from
//! the cache and never from the device. The read-back is exposed only as a
//! diagnostic.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};

use crate::cache::ModeCacheStore;
use crate::device::{decode_status, write_accepted, DeviceAccess, DeviceRequest};
use crate::error::{AtkError, Result};
use crate::logger;
use crate::modes::{CpuMode, GpuMode, GpuModeRequest, ModeState, SetModesRequest};
use crate::platform::{DeviceName, DeviceTable};

pub struct PerformanceModeController {
    device: DeviceAccess,
    table: Arc<DeviceTable>,
    cache: Arc<ModeCacheStore>,
    // Serializes whole mode changes so cache commits follow write order.
    writes: Mutex<()>,
}

impl PerformanceModeController {
    pub fn new(device: DeviceAccess, table: Arc<DeviceTable>, cache: Arc<ModeCacheStore>) -> Self {
        Self {
            device,
            table,
            cache,
            writes: Mutex::new(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.device.is_available()
    }

    /// The cached mode pair. Never touches the hardware.
    pub fn current_modes(&self) -> ModeState {
        self.cache.current()
    }

    pub fn set_cpu_mode(&self, mode: CpuMode) -> Result<ModeState> {
        self.set_modes(SetModesRequest {
            cpu_mode: Some(mode),
            gpu_mode: None,
        })
    }

    /// Ultimate is rejected before any device call.
    pub fn set_gpu_mode(&self, request: GpuModeRequest) -> Result<ModeState> {
        self.set_modes(SetModesRequest {
            cpu_mode: None,
            gpu_mode: Some(request),
        })
    }

    /// Apply the requested dimensions, CPU first, then commit them together.
    ///
    /// The whole request is validated before the first write. If the GPU write
    /// fails after the CPU write succeeded, the CPU change is still committed
    /// and the error is returned.
    pub fn set_modes(&self, request: SetModesRequest) -> Result<ModeState> {
        let gpu = request.gpu_mode.map(GpuMode::try_from).transpose()?;
        let _writes = self.writes.lock();

        let mut next = self.cache.current();
        let mut applied = false;
        let mut outcome = Ok(());

        if let Some(cpu) = request.cpu_mode {
            outcome = self.write_device(DeviceName::CpuMode, self.table.cpu_mode_code(cpu));
            if outcome.is_ok() {
                next.cpu_mode = cpu;
                applied = true;
            }
        }
        if let Some(gpu) = gpu.filter(|_| outcome.is_ok()) {
            outcome = self.write_device(DeviceName::GpuEco, self.table.gpu_eco_code(gpu));
            if outcome.is_ok() {
                next.gpu_mode = gpu;
                applied = true;
            }
        }

        if applied {
            self.commit(next);
        }
        outcome.map(|()| next)
    }

    /// CPU mode as reported by the firmware. Diagnostic only.
    pub fn firmware_cpu_mode(&self) -> Result<Option<CpuMode>> {
        let value = self.read_status(DeviceName::CpuMode)?;
        Ok(value.and_then(|v| self.table.cpu_mode_from_code(v)))
    }

    /// GPU mode implied by the MUX and eco flags. Diagnostic only, but unlike
    /// the cache it shows a machine that was booted in Ultimate.
    pub fn firmware_gpu_mode(&self) -> Result<Option<GpuModeRequest>> {
        let (mux, eco) = match (
            self.read_status(DeviceName::GpuMux),
            self.read_status(DeviceName::GpuEco),
        ) {
            (Err(e), Err(_)) => return Err(e),
            (mux, eco) => (mux.ok().flatten(), eco.ok().flatten()),
        };
        Ok(self.table.gpu_mode_from_flags(mux, eco))
    }

    fn read_status(&self, name: DeviceName) -> Result<Option<u32>> {
        let raw = self.device.send(DeviceRequest::read(self.table.id(name)))?;
        Ok(decode_status(raw))
    }

    fn write_device(&self, name: DeviceName, value: u32) -> Result<()> {
        let id = self.table.id(name);
        let raw = self.device.send(DeviceRequest::write(id, value)).map_err(|e| {
            warn!("Setting {} to {} failed: {}", name, value, e);
            e
        })?;
        if !write_accepted(raw) {
            warn!("Firmware rejected {} = {} (result {:#x})", name, value, raw);
            return Err(AtkError::device_io(
                id,
                format!("firmware rejected value {} (result {:#x})", value, raw),
            ));
        }
        Ok(())
    }

    fn commit(&self, next: ModeState) {
        info!("Modes set: cpu={} gpu={}", next.cpu_mode, next.gpu_mode);
        if let Err(e) = self.cache.commit(next) {
            warn!("Mode applied but not persisted: {}", e);
            logger::log_event("mode_cache_persist_failed", json!({ "error": e.to_string() }));
        }
        logger::log_event("mode_change", json!(next));
    }
}

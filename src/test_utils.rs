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

//! Test fakes shared by the unit tests
//!
//! `FakeTransport` answers status reads from a table and accepts every write.
//! Like the real firmware it never updates a status after a write, so the CPU
//! mode read-back stays wherever the test pinned it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::cache::ModeCacheStore;
use crate::controller::PerformanceModeController;
use crate::device::{DeviceAccess, DeviceRequest, DeviceTransport};
use crate::error::{AtkError, Result};
use crate::platform::DeviceTable;
use crate::sensors::{SensorLibrary, SensorValue};

pub struct FakeTransport {
    calls: Arc<Mutex<Vec<DeviceRequest>>>,
    status: HashMap<u32, u32>,
    failing: HashSet<u32>,
    write_result: u32,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            status: HashMap::new(),
            failing: HashSet::new(),
            write_result: 1,
        }
    }

    /// Raw DSTS result for `device_id`
    pub fn with_status(mut self, device_id: u32, raw: u32) -> Self {
        self.status.insert(device_id, raw);
        self
    }

    /// Every call touching `device_id` fails with `DeviceIo`
    pub fn failing(mut self, device_id: u32) -> Self {
        self.failing.insert(device_id);
        self
    }

    pub fn with_write_result(mut self, raw: u32) -> Self {
        self.write_result = raw;
        self
    }

    /// Shared log of every request, including failed ones
    pub fn calls(&self) -> Arc<Mutex<Vec<DeviceRequest>>> {
        self.calls.clone()
    }
}

impl DeviceTransport for FakeTransport {
    fn call(&mut self, request: DeviceRequest) -> Result<u32> {
        self.calls.lock().push(request);
        if self.failing.contains(&request.device_id) {
            return Err(AtkError::device_io(request.device_id, "injected failure"));
        }
        match request.payload {
            Some(_) => Ok(self.write_result),
            None => self
                .status
                .get(&request.device_id)
                .copied()
                .ok_or_else(|| AtkError::device_io(request.device_id, "no fake status")),
        }
    }

    fn describe(&self) -> String {
        "fake transport".to_string()
    }
}

/// Controller over `transport` with its cache in `dir`
pub fn open_controller(dir: &TempDir, transport: FakeTransport) -> PerformanceModeController {
    PerformanceModeController::new(
        DeviceAccess::from_transport(Box::new(transport)),
        Arc::new(DeviceTable::default()),
        Arc::new(ModeCacheStore::open(dir.path().join("mode_cache.json"))),
    )
}

pub struct FakeSensors {
    name: String,
    values: Vec<SensorValue>,
}

impl FakeSensors {
    pub fn new(name: &str, values: Vec<SensorValue>) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }
}

impl SensorLibrary for FakeSensors {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        Ok(self.values.clone())
    }
}

/// A backend whose probe and reads always fail
pub struct FailingSensors {
    name: String,
}

impl FailingSensors {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl SensorLibrary for FailingSensors {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        Err(AtkError::SensorUnavailable(format!("{} is broken", self.name)))
    }
}

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

//! Vendor-style sensor library
//!
//! Temperatures come from whichever backends the machine supports. Every
//! backend reports values under the names the vendor tooling uses
//! (`CPU Package`, `GPU Hot Spot`, ...) so the thermal reader can stay
//! backend-agnostic.
//!
//! Backends are probed when the hub is built. A backend that fails the probe
//! stays in the hub, unavailable, so diagnostics can report why, and is probed
//! again on later reads.

pub mod hwmon;
pub mod nvidia;
pub mod probe;

use std::collections::HashSet;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SensorsConfig;
use crate::error::{AtkError, Result};

/// Sensor names shared by every backend
pub mod names {
    pub const CPU_PACKAGE: &str = "CPU Package";
    pub const CORE_AVERAGE: &str = "Core Average";
    pub const CORE_MAX: &str = "Core Max";
    pub const GPU_CORE: &str = "GPU Core";
    pub const GPU_HOT_SPOT: &str = "GPU Hot Spot";
    pub const CPU_FAN: &str = "CPU Fan";
    pub const GPU_FAN: &str = "GPU Fan";
    pub const CORE_PREFIX: &str = "CPU Core #";

    pub fn core(index: usize) -> String {
        format!("{}{}", CORE_PREFIX, index)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Fan,
    /// Duty cycle in percent
    Control,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorValue {
    pub hardware: String,
    pub kind: SensorKind,
    pub name: String,
    pub value: f32,
}

impl SensorValue {
    pub fn new(hardware: impl Into<String>, kind: SensorKind, name: impl Into<String>, value: f32) -> Self {
        Self {
            hardware: hardware.into(),
            kind,
            name: name.into(),
            value,
        }
    }

    pub fn temperature(hardware: impl Into<String>, name: impl Into<String>, celsius: f32) -> Self {
        Self::new(hardware, SensorKind::Temperature, name, celsius)
    }
}

/// A source of named sensor readings
pub trait SensorLibrary: Send + Sync {
    fn name(&self) -> &str;

    /// Capability check, run at start-up and again while the backend is
    /// unavailable
    fn probe(&self) -> Result<()> {
        self.read().map(|_| ())
    }

    fn read(&self) -> Result<Vec<SensorValue>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendState {
    Ready,
    Unavailable(String),
}

/// One library plus its last known capability state.
///
/// Hardware can come and go at runtime (the dGPU powers off in Eco mode), so
/// an unavailable backend is probed again on the next read and a ready one
/// that fails a read is marked unavailable.
pub struct SensorBackend {
    library: Box<dyn SensorLibrary>,
    state: RwLock<BackendState>,
}

impl SensorBackend {
    /// Probe `library` and wrap it accordingly.
    pub fn probe(library: Box<dyn SensorLibrary>) -> Self {
        let state = match library.probe() {
            Ok(()) => {
                info!("Sensor backend {} ready", library.name());
                BackendState::Ready
            }
            Err(e) => {
                info!("Sensor backend {} unavailable: {}", library.name(), e);
                BackendState::Unavailable(e.to_string())
            }
        };
        Self {
            library,
            state: RwLock::new(state),
        }
    }

    pub fn name(&self) -> &str {
        self.library.name()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.read() == BackendState::Ready
    }

    /// Probe again if unavailable. Returns whether the backend is ready.
    pub fn ensure_ready(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        match self.library.probe() {
            Ok(()) => {
                info!("Sensor backend {} became ready", self.name());
                *self.state.write() = BackendState::Ready;
                true
            }
            Err(e) => {
                debug!("Sensor backend {} still unavailable: {}", self.name(), e);
                *self.state.write() = BackendState::Unavailable(e.to_string());
                false
            }
        }
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        self.library.read().map_err(|e| {
            warn!("Sensor backend {} read failed: {}", self.name(), e);
            *self.state.write() = BackendState::Unavailable(e.to_string());
            e
        })
    }

    pub fn status(&self) -> BackendStatus {
        let (ready, reason) = match &*self.state.read() {
            BackendState::Ready => (true, None),
            BackendState::Unavailable(reason) => (false, Some(reason.clone())),
        };
        BackendStatus {
            name: self.name().to_string(),
            ready,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub ready: bool,
    pub reason: Option<String>,
}

/// Ordered set of sensor backends. For a given kind and name the first
/// backend that reports it wins.
#[derive(Default)]
pub struct SensorHub {
    backends: Vec<SensorBackend>,
}

impl SensorHub {
    pub fn new(libraries: Vec<Box<dyn SensorLibrary>>) -> Self {
        Self {
            backends: libraries.into_iter().map(SensorBackend::probe).collect(),
        }
    }

    /// Build the backends enabled in `cfg`, in priority order: external probe,
    /// hwmon, nvidia-smi.
    pub fn from_config(cfg: &SensorsConfig) -> Self {
        let mut libraries: Vec<Box<dyn SensorLibrary>> = Vec::new();
        if let Some(cmd) = &cfg.probe_command {
            libraries.push(Box::new(probe::ProbeCommand::new(cmd.clone())));
        }
        if cfg.hwmon {
            libraries.push(Box::new(hwmon::HwmonLibrary::new(cfg.hwmon_root.clone())));
        }
        if cfg.nvidia_smi {
            libraries.push(Box::new(nvidia::NvidiaSmi::new()));
        }
        Self::new(libraries)
    }

    /// Whether any backend was ready at its last check
    pub fn is_available(&self) -> bool {
        self.backends.iter().any(SensorBackend::is_ready)
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.backends.iter().map(SensorBackend::status).collect()
    }

    /// Read every backend that is (or has become) ready and merge the results.
    ///
    /// Fails with `SensorUnavailable` only when no backend produced a reading.
    pub fn read_all(&self) -> Result<Vec<SensorValue>> {
        let mut seen: HashSet<(SensorKind, String)> = HashSet::new();
        let mut out = Vec::new();
        let mut answered = false;

        for backend in self.backends.iter().filter(|b| b.ensure_ready()) {
            if let Ok(values) = backend.read() {
                answered = true;
                for v in values {
                    if seen.insert((v.kind, v.name.clone())) {
                        out.push(v);
                    }
                }
            }
        }

        if !answered {
            return Err(AtkError::SensorUnavailable(if self.backends.is_empty() {
                "no sensor backend configured".to_string()
            } else {
                "no sensor backend available".to_string()
            }));
        }
        debug!("Read {} sensor values", out.len());
        Ok(out)
    }
}

/// First value with the given kind and name
pub fn find(values: &[SensorValue], kind: SensorKind, name: &str) -> Option<f32> {
    values
        .iter()
        .find(|v| v.kind == kind && v.name == name)
        .map(|v| v.value)
}

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

//! Per-model device-ID table
//!
//! The controller and the fan reader never use raw device IDs; they ask the
//! table for a [`DeviceName`]. A table can be loaded from a JSON file so other
//! ATK models can be supported without code changes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::fan;
use crate::error::{AtkError, Result};
use crate::modes::{CpuMode, GpuMode, GpuModeRequest};

/// Current device table format version
pub const TABLE_VERSION: u32 = 1;

/// Symbolic name of a device-control target
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceName {
    CpuFan,
    GpuFan,
    CpuMode,
    GpuEco,
    GpuMux,
}

impl DeviceName {
    pub const ALL: [DeviceName; 5] = [
        DeviceName::CpuFan,
        DeviceName::GpuFan,
        DeviceName::CpuMode,
        DeviceName::GpuEco,
        DeviceName::GpuMux,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceName::CpuFan => "cpu_fan",
            DeviceName::GpuFan => "gpu_fan",
            DeviceName::CpuMode => "cpu_mode",
            DeviceName::GpuEco => "gpu_eco",
            DeviceName::GpuMux => "gpu_mux",
        }
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceIds {
    pub cpu_fan: u32,
    pub gpu_fan: u32,
    pub cpu_mode: u32,
    pub gpu_eco: u32,
    pub gpu_mux: u32,
}

/// Values written to the CPU mode device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CpuModeCodes {
    pub silent: u32,
    pub balanced: u32,
    pub turbo: u32,
    pub performance: u32,
}

/// Values written to the GPU eco device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpuEcoCodes {
    pub eco: u32,
    pub standard: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceTable {
    pub version: u32,
    pub model: String,
    #[serde(default = "default_fan_max_rpm")]
    pub fan_max_rpm: u32,
    pub devices: DeviceIds,
    pub cpu_mode_codes: CpuModeCodes,
    pub gpu_eco_codes: GpuEcoCodes,
    /// MUX value meaning the dGPU drives the panel directly (Ultimate)
    #[serde(default)]
    pub gpu_mux_ultimate: u32,
    /// IDs seen on this model whose semantics are undocumented. They are only
    /// read raw for diagnostics.
    #[serde(default)]
    pub extra: BTreeMap<String, u32>,
}

fn default_fan_max_rpm() -> u32 {
    fan::DEFAULT_MAX_RPM
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::tuf_dash_f15()
    }
}

impl DeviceTable {
    /// ASUS TUF Dash F15 (FX517Z*)
    pub fn tuf_dash_f15() -> Self {
        Self {
            version: TABLE_VERSION,
            model: "ASUS TUF Dash F15 (FX517Z)".to_string(),
            fan_max_rpm: fan::DEFAULT_MAX_RPM,
            devices: DeviceIds {
                cpu_fan: 0x0011_0013,
                gpu_fan: 0x0011_0014,
                cpu_mode: 0x0012_0075,
                gpu_eco: 0x0009_0020,
                gpu_mux: 0x0009_0016,
            },
            cpu_mode_codes: CpuModeCodes {
                balanced: 0,
                turbo: 1,
                silent: 2,
                performance: 3,
            },
            gpu_eco_codes: GpuEcoCodes { eco: 1, standard: 0 },
            gpu_mux_ultimate: 0,
            extra: BTreeMap::new(),
        }
    }

    pub fn id(&self, name: DeviceName) -> u32 {
        match name {
            DeviceName::CpuFan => self.devices.cpu_fan,
            DeviceName::GpuFan => self.devices.gpu_fan,
            DeviceName::CpuMode => self.devices.cpu_mode,
            DeviceName::GpuEco => self.devices.gpu_eco,
            DeviceName::GpuMux => self.devices.gpu_mux,
        }
    }

    /// Look up an ID by its symbolic name, including `extra` entries
    pub fn lookup(&self, name: &str) -> Option<u32> {
        DeviceName::ALL
            .into_iter()
            .find(|n| n.as_str() == name)
            .map(|n| self.id(n))
            .or_else(|| self.extra.get(name).copied())
    }

    pub fn cpu_mode_code(&self, mode: CpuMode) -> u32 {
        match mode {
            CpuMode::Silent => self.cpu_mode_codes.silent,
            CpuMode::Balanced => self.cpu_mode_codes.balanced,
            CpuMode::Turbo => self.cpu_mode_codes.turbo,
            CpuMode::Performance => self.cpu_mode_codes.performance,
        }
    }

    /// Reverse of [`cpu_mode_code`](Self::cpu_mode_code); unknown codes are `None`
    pub fn cpu_mode_from_code(&self, code: u32) -> Option<CpuMode> {
        CpuMode::ALL
            .into_iter()
            .find(|m| self.cpu_mode_code(*m) == code)
    }

    pub fn gpu_eco_code(&self, mode: GpuMode) -> u32 {
        match mode {
            GpuMode::Eco => self.gpu_eco_codes.eco,
            GpuMode::Standard => self.gpu_eco_codes.standard,
        }
    }

    /// GPU mode implied by the MUX and eco flags. A MUX in direct mode wins
    /// over the eco flag; `None` when neither flag could be read.
    pub fn gpu_mode_from_flags(&self, mux: Option<u32>, eco: Option<u32>) -> Option<GpuModeRequest> {
        if mux.is_none() && eco.is_none() {
            return None;
        }
        if mux == Some(self.gpu_mux_ultimate) {
            Some(GpuModeRequest::Ultimate)
        } else if eco == Some(self.gpu_eco_codes.eco) {
            Some(GpuModeRequest::Eco)
        } else {
            Some(GpuModeRequest::Standard)
        }
    }

    /// Every (name, id) pair, named devices first
    pub fn entries(&self) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = DeviceName::ALL
            .into_iter()
            .map(|n| (n.as_str().to_string(), self.id(n)))
            .collect();
        out.extend(self.extra.iter().map(|(k, v)| (k.clone(), *v)));
        out
    }
}

pub fn validate_table(table: &DeviceTable) -> std::result::Result<(), String> {
    if table.version != TABLE_VERSION {
        return Err(format!(
            "unsupported device table version {} (expected {})",
            table.version, TABLE_VERSION
        ));
    }
    if table.model.trim().is_empty() {
        return Err("device table model must not be empty".to_string());
    }
    if table.fan_max_rpm == 0 {
        return Err("fan_max_rpm must be greater than zero".to_string());
    }
    let c = &table.cpu_mode_codes;
    let mut codes = [c.silent, c.balanced, c.turbo, c.performance];
    codes.sort_unstable();
    if codes.windows(2).any(|w| w[0] == w[1]) {
        return Err("cpu_mode_codes must be distinct".to_string());
    }
    if table.gpu_eco_codes.eco == table.gpu_eco_codes.standard {
        return Err("gpu_eco_codes must be distinct".to_string());
    }
    for name in table.extra.keys() {
        if DeviceName::ALL.iter().any(|n| n.as_str() == name) {
            return Err(format!("extra device '{}' shadows a named device", name));
        }
    }
    Ok(())
}

/// Load and validate a device table from a JSON file
pub fn load_table(path: &Path) -> Result<DeviceTable> {
    let data = fs::read_to_string(path)?;
    let table: DeviceTable = serde_json::from_str(&data)?;
    validate_table(&table).map_err(|e| AtkError::config(format!("{}: {}", path.display(), e)))?;
    info!("Loaded device table '{}' from {:?}", table.model, path);
    Ok(table)
}

/// Pick the table for this machine: an explicit file wins, otherwise the
/// built-in table.
pub fn resolve_table(path: Option<&Path>) -> Result<DeviceTable> {
    match path {
        Some(p) => load_table(p),
        None => {
            debug!("Using built-in device table");
            Ok(DeviceTable::default())
        }
    }
}

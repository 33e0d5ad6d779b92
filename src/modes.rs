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

//! Performance mode types
//!
//! `ModeState` is the record held by the mode cache. GPU "Ultimate" is only
//! representable as a request: it needs a MUX switch and a reboot, so it can
//! never become part of the runtime state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AtkError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuMode {
    Silent,
    Balanced,
    Turbo,
    Performance,
}

impl CpuMode {
    pub const ALL: [CpuMode; 4] = [
        CpuMode::Silent,
        CpuMode::Balanced,
        CpuMode::Turbo,
        CpuMode::Performance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CpuMode::Silent => "Silent",
            CpuMode::Balanced => "Balanced",
            CpuMode::Turbo => "Turbo",
            CpuMode::Performance => "Performance",
        }
    }
}

impl fmt::Display for CpuMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CpuMode {
    type Err = AtkError;

    fn from_str(s: &str) -> Result<Self> {
        CpuMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AtkError::InvalidMode {
                kind: "cpu_mode",
                value: s.to_string(),
                valid: "Silent, Balanced, Turbo, Performance",
            })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuMode {
    Eco,
    Standard,
}

impl GpuMode {
    pub const ALL: [GpuMode; 2] = [GpuMode::Eco, GpuMode::Standard];

    pub fn as_str(self) -> &'static str {
        match self {
            GpuMode::Eco => "Eco",
            GpuMode::Standard => "Standard",
        }
    }
}

impl fmt::Display for GpuMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpuMode {
    type Err = AtkError;

    fn from_str(s: &str) -> Result<Self> {
        GpuMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AtkError::InvalidMode {
                kind: "gpu_mode",
                value: s.to_string(),
                valid: "Eco, Standard",
            })
    }
}

/// GPU mode as a caller may request it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuModeRequest {
    Eco,
    Standard,
    /// dGPU wired directly to the panel via the MUX; needs a reboot.
    Ultimate,
}

impl From<GpuMode> for GpuModeRequest {
    fn from(mode: GpuMode) -> Self {
        match mode {
            GpuMode::Eco => GpuModeRequest::Eco,
            GpuMode::Standard => GpuModeRequest::Standard,
        }
    }
}

impl TryFrom<GpuModeRequest> for GpuMode {
    type Error = AtkError;

    fn try_from(req: GpuModeRequest) -> Result<Self> {
        match req {
            GpuModeRequest::Eco => Ok(GpuMode::Eco),
            GpuModeRequest::Standard => Ok(GpuMode::Standard),
            GpuModeRequest::Ultimate => Err(AtkError::UnsupportedModeTransition(
                "GPU Ultimate mode requires a MUX switch and a reboot".to_string(),
            )),
        }
    }
}

impl FromStr for GpuModeRequest {
    type Err = AtkError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("ultimate") {
            return Ok(GpuModeRequest::Ultimate);
        }
        s.parse::<GpuMode>().map(GpuModeRequest::from)
    }
}

/// The authoritative performance mode pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub cpu_mode: CpuMode,
    pub gpu_mode: GpuMode,
}

impl Default for ModeState {
    /// Baseline used when no valid cache record exists: Balanced / Standard.
    fn default() -> Self {
        Self {
            cpu_mode: CpuMode::Balanced,
            gpu_mode: GpuMode::Standard,
        }
    }
}

impl ModeState {
    pub fn new(cpu_mode: CpuMode, gpu_mode: GpuMode) -> Self {
        Self { cpu_mode, gpu_mode }
    }

    /// Every valid (cpu, gpu) combination
    pub fn all() -> impl Iterator<Item = ModeState> {
        CpuMode::ALL
            .into_iter()
            .flat_map(|c| GpuMode::ALL.into_iter().map(move |g| ModeState::new(c, g)))
    }
}

/// A mode change where either dimension may be left untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetModesRequest {
    #[serde(default)]
    pub cpu_mode: Option<CpuMode>,
    #[serde(default)]
    pub gpu_mode: Option<GpuModeRequest>,
}

impl SetModesRequest {
    pub fn is_empty(&self) -> bool {
        self.cpu_mode.is_none() && self.gpu_mode.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_mode_parse_case_insensitive() {
        assert_eq!("silent".parse::<CpuMode>().unwrap(), CpuMode::Silent);
        assert_eq!("TURBO".parse::<CpuMode>().unwrap(), CpuMode::Turbo);
        assert_eq!(" Performance ".parse::<CpuMode>().unwrap(), CpuMode::Performance);
        assert!(matches!(
            "manual".parse::<CpuMode>(),
            Err(AtkError::InvalidMode { kind: "cpu_mode", .. })
        ));
    }

    #[test]
    fn test_gpu_mode_request_parse() {
        assert_eq!("eco".parse::<GpuModeRequest>().unwrap(), GpuModeRequest::Eco);
        assert_eq!("Ultimate".parse::<GpuModeRequest>().unwrap(), GpuModeRequest::Ultimate);
        assert!("optimus".parse::<GpuModeRequest>().is_err());
        assert!("ultimate".parse::<GpuMode>().is_err());
    }

    #[test]
    fn test_ultimate_is_not_a_runtime_state() {
        let res = GpuMode::try_from(GpuModeRequest::Ultimate);
        assert!(matches!(res, Err(AtkError::UnsupportedModeTransition(_))));
        assert_eq!(GpuMode::try_from(GpuModeRequest::Eco).unwrap(), GpuMode::Eco);
    }

    #[test]
    fn test_default_state() {
        let state = ModeState::default();
        assert_eq!(state.cpu_mode, CpuMode::Balanced);
        assert_eq!(state.gpu_mode, GpuMode::Standard);
    }

    #[test]
    fn test_all_combinations() {
        let all: Vec<_> = ModeState::all().collect();
        assert_eq!(all.len(), 8);
        assert!(all.contains(&ModeState::new(CpuMode::Silent, GpuMode::Eco)));
    }

    #[test]
    fn test_state_serializes_with_original_key_names() {
        let json = serde_json::to_string(&ModeState::new(CpuMode::Turbo, GpuMode::Eco)).unwrap();
        assert_eq!(json, r#"{"cpu_mode":"Turbo","gpu_mode":"Eco"}"#);
    }

    #[test]
    fn test_set_modes_request_partial_json() {
        let req: SetModesRequest = serde_json::from_str(r#"{"gpu_mode":"Standard"}"#).unwrap();
        assert_eq!(req.cpu_mode, None);
        assert_eq!(req.gpu_mode, Some(GpuModeRequest::Standard));
        assert!(SetModesRequest::default().is_empty());
    }
}

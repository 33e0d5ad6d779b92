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

//! NVIDIA GPU temperature via `nvidia-smi`
//!
//! Only the first GPU is reported; laptops carry at most one discrete GPU. In
//! Eco mode the dGPU is powered off and `nvidia-smi` fails, which shows up as
//! an unreadable backend rather than an error.

use std::process::Command;

use tracing::trace;

use super::{names, SensorKind, SensorLibrary, SensorValue};
use crate::error::{AtkError, Result};

const QUERY: &str = "--query-gpu=temperature.gpu,fan.speed";

pub struct NvidiaSmi {
    program: String,
}

impl NvidiaSmi {
    pub fn new() -> Self {
        Self::with_program("nvidia-smi")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorLibrary for NvidiaSmi {
    fn name(&self) -> &str {
        "nvidia-smi"
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        let output = Command::new(&self.program)
            .args(["-i", "0", QUERY, "--format=csv,noheader,nounits"])
            .output()
            .map_err(|e| AtkError::SensorUnavailable(format!("{} not found: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AtkError::SensorUnavailable(format!("{} failed", self.program)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_query(&stdout)
            .ok_or_else(|| AtkError::SensorUnavailable(format!("unexpected {} output", self.program)))
    }
}

/// Parse `temperature.gpu, fan.speed` CSV output.
fn parse_query(stdout: &str) -> Option<Vec<SensorValue>> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < 2 {
        trace!("Skipping malformed nvidia-smi line: {}", line);
        return None;
    }

    let mut out = Vec::new();
    if let Some(t) = parse_nvidia_value_f32(parts[0]) {
        out.push(SensorValue::temperature("gpu", names::GPU_CORE, t));
    }
    if let Some(pct) = parse_nvidia_value_f32(parts[1]) {
        out.push(SensorValue::new("gpu", SensorKind::Control, names::GPU_FAN, pct));
    }
    Some(out)
}

fn parse_nvidia_value_f32(s: &str) -> Option<f32> {
    if s.is_empty() || s == "N/A" || s == "[N/A]" || s == "[Not Supported]" {
        None
    } else {
        s.parse().ok()
    }
}

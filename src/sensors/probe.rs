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

//! External probe command
//!
//! Runs a helper program that prints one JSON object with the vendor sensor
//! values, for platforms where the sensor library is only reachable from
//! another runtime:
//!
//! ```json
//! {"cpu_package_temp_celsius": 71.0, "cpu_core_avg_celsius": 64.2,
//!  "cpu_core_max_celsius": 78.0, "cpu_fan_rpm": null,
//!  "gpu_core_temp_celsius": 55.0, "gpu_hotspot_celsius": 63.5,
//!  "gpu_fan_rpm": 2900, "gpu_fan_percent": 41.0}
//! ```
//!
//! Missing or `null` fields are simply not reported.

use std::process::Command;

use serde::Deserialize;

use super::{names, SensorKind, SensorLibrary, SensorValue};
use crate::error::{AtkError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbePayload {
    pub cpu_package_temp_celsius: Option<f32>,
    pub cpu_core_avg_celsius: Option<f32>,
    pub cpu_core_max_celsius: Option<f32>,
    pub cpu_fan_rpm: Option<f32>,
    pub gpu_core_temp_celsius: Option<f32>,
    pub gpu_hotspot_celsius: Option<f32>,
    pub gpu_fan_rpm: Option<f32>,
    pub gpu_fan_percent: Option<f32>,
}

impl ProbePayload {
    pub fn into_values(self) -> Vec<SensorValue> {
        use SensorKind::*;
        let fields = [
            ("cpu", Temperature, names::CPU_PACKAGE, self.cpu_package_temp_celsius),
            ("cpu", Temperature, names::CORE_AVERAGE, self.cpu_core_avg_celsius),
            ("cpu", Temperature, names::CORE_MAX, self.cpu_core_max_celsius),
            ("cpu", Fan, names::CPU_FAN, self.cpu_fan_rpm),
            ("gpu", Temperature, names::GPU_CORE, self.gpu_core_temp_celsius),
            ("gpu", Temperature, names::GPU_HOT_SPOT, self.gpu_hotspot_celsius),
            ("gpu", Fan, names::GPU_FAN, self.gpu_fan_rpm),
            ("gpu", Control, names::GPU_FAN, self.gpu_fan_percent),
        ];
        fields
            .into_iter()
            .filter_map(|(hw, kind, name, v)| v.map(|v| SensorValue::new(hw, kind, name, v)))
            .collect()
    }
}

pub struct ProbeCommand {
    argv: Vec<String>,
}

impl ProbeCommand {
    /// `argv[0]` is the program, the rest its arguments.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl SensorLibrary for ProbeCommand {
    fn name(&self) -> &str {
        "probe"
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| AtkError::SensorUnavailable("empty probe command".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| AtkError::SensorUnavailable(format!("{}: {}", program, e)))?;
        if !output.status.success() {
            return Err(AtkError::SensorUnavailable(format!(
                "{} exited with {}",
                program, output.status
            )));
        }

        let payload: ProbePayload = serde_json::from_slice(&output.stdout)
            .map_err(|e| AtkError::SensorUnavailable(format!("{} printed invalid JSON: {}", program, e)))?;
        Ok(payload.into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::find;

    #[test]
    fn test_payload_nulls_are_skipped() {
        let payload: ProbePayload = serde_json::from_str(
            r#"{"cpu_package_temp_celsius": 71.0, "cpu_core_avg_celsius": null,
                "gpu_fan_rpm": 2900, "gpu_fan_percent": 41.5, "extra": 1}"#,
        )
        .unwrap();
        let values = payload.into_values();
        assert_eq!(values.len(), 3);
        assert_eq!(find(&values, SensorKind::Temperature, names::CPU_PACKAGE), Some(71.0));
        assert_eq!(find(&values, SensorKind::Temperature, names::CORE_AVERAGE), None);
        assert_eq!(find(&values, SensorKind::Fan, names::GPU_FAN), Some(2900.0));
        assert_eq!(find(&values, SensorKind::Control, names::GPU_FAN), Some(41.5));
    }

    #[test]
    fn test_empty_command_is_unavailable() {
        let probe = ProbeCommand::new(Vec::new());
        assert!(matches!(probe.read(), Err(AtkError::SensorUnavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_command() {
        let probe = ProbeCommand::new(vec![
            "sh".into(),
            "-c".into(),
            r#"printf '{"gpu_core_temp_celsius": 48.0}'"#.into(),
        ]);
        let values = probe.read().unwrap();
        assert_eq!(find(&values, SensorKind::Temperature, names::GPU_CORE), Some(48.0));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_is_unavailable() {
        let probe = ProbeCommand::new(vec!["sh".into(), "-c".into(), "exit 3".into()]);
        assert!(probe.probe().is_err());
        let garbage = ProbeCommand::new(vec!["sh".into(), "-c".into(), "echo nope".into()]);
        assert!(matches!(garbage.read(), Err(AtkError::SensorUnavailable(_))));
    }
}

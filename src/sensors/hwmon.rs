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

//! Linux hwmon sensor backend
//!
//! Walks `/sys/class/hwmon` and translates the well-known drivers into the
//! shared sensor names:
//!
//! | driver      | label                 | name                  |
//! |-------------|-----------------------|-----------------------|
//! | `coretemp`  | `Package id 0`        | `CPU Package`         |
//! | `coretemp`  | `Core N`              | `CPU Core #N+1`       |
//! | `k10temp`   | `Tdie` (else `Tctl`)  | `CPU Package`         |
//! | `k10temp`   | `TccdN`               | `CPU CCD #N`          |
//! | `amdgpu`    | `edge` / `junction`   | `GPU Core` / `GPU Hot Spot` |
//! | `asus`      | `cpu_fan` / `gpu_fan` | `CPU Fan` / `GPU Fan` |
//!
//! Anything else is passed through as `<chip> <label>` so it still shows up in
//! the raw dump.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::trace;

use super::{names, SensorKind, SensorLibrary, SensorValue};
use crate::constants::{paths, units};
use crate::error::{AtkError, Result};

const CCD_PREFIX: &str = "CPU CCD #";

#[derive(Debug, Clone)]
pub struct ChipReadings {
    /// Driver name from the `name` file
    pub name: String,
    /// `hwmonX` directory name
    pub tag: String,
    pub temps: Vec<(String, f64)>, // Celsius
    pub fans: Vec<(String, u64)>,  // RPM
}

pub struct HwmonLibrary {
    root: PathBuf,
}

impl HwmonLibrary {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root: root.unwrap_or_else(|| PathBuf::from(paths::HWMON_BASE)),
        }
    }
}

impl SensorLibrary for HwmonLibrary {
    fn name(&self) -> &str {
        "hwmon"
    }

    fn probe(&self) -> Result<()> {
        let chips = read_chips(&self.root)?;
        if chips.iter().all(|c| c.temps.is_empty() && c.fans.is_empty()) {
            return Err(AtkError::SensorUnavailable(format!(
                "no hwmon sensors under {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn read(&self) -> Result<Vec<SensorValue>> {
        let chips = read_chips(&self.root)?;
        Ok(chips.iter().flat_map(map_chip).collect())
    }
}

/// Read every chip's temperature and fan inputs. A missing root yields no
/// chips.
pub fn read_chips(root: &Path) -> io::Result<Vec<ChipReadings>> {
    let mut out: Vec<ChipReadings> = Vec::new();

    let entries = match fs::read_dir(root) {
        Ok(it) => it,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e),
    };

    for ent in entries.flatten() {
        let path = ent.path();
        // Resolve to the actual device dir in case of symlink
        let dir = fs::canonicalize(&path).unwrap_or(path);
        if !dir.is_dir() {
            continue;
        }

        let name = read_trimmed(dir.join("name")).unwrap_or_else(|_| "unknown".into());
        let tag = ent.file_name().to_string_lossy().into_owned();

        let mut temps: Vec<(String, f64)> = Vec::new();
        let mut fans: Vec<(String, u64)> = Vec::new();

        let Ok(dir_iter) = fs::read_dir(&dir) else { continue };
        for file in dir_iter.flatten() {
            let fname = file.file_name();
            let fname = fname.to_string_lossy();
            let fpath = file.path();

            if let Some(idx) = extract_index(&fname, "temp", "_input") {
                let label = read_trimmed(dir.join(format!("temp{}_label", idx)))
                    .unwrap_or_else(|_| format!("temp{}", idx));
                match read_trimmed(&fpath).map(|raw| raw.parse::<i64>()) {
                    // millidegree C
                    Ok(Ok(mc)) => temps.push((label, mc as f64 / 1000.0)),
                    _ => trace!("Skipping unreadable {:?}", fpath),
                }
            } else if let Some(idx) = extract_index(&fname, "fan", "_input") {
                let label = read_trimmed(dir.join(format!("fan{}_label", idx)))
                    .unwrap_or_else(|_| format!("fan{}", idx));
                match read_trimmed(&fpath).map(|raw| raw.parse::<u64>()) {
                    Ok(Ok(rpm)) => fans.push((label, rpm)),
                    _ => trace!("Skipping unreadable {:?}", fpath),
                }
            }
        }

        temps.sort_by(|a, b| a.0.cmp(&b.0));
        fans.sort_by(|a, b| a.0.cmp(&b.0));
        out.push(ChipReadings { name, tag, temps, fans });
    }

    // Sort for stable output
    out.sort_by(|a, b| a.tag.cmp(&b.tag));
    Ok(out)
}

fn map_chip(chip: &ChipReadings) -> Vec<SensorValue> {
    let mut out = Vec::new();
    let temp = |hw: &str, name: String, c: f64| SensorValue::temperature(hw, name, units::round1(c as f32));

    match chip.name.as_str() {
        "coretemp" => {
            for (label, c) in &chip.temps {
                if label.starts_with("Package id") {
                    out.push(temp("cpu", names::CPU_PACKAGE.to_string(), *c));
                } else if let Some(n) = label.strip_prefix("Core ").and_then(|n| n.parse::<usize>().ok()) {
                    out.push(temp("cpu", names::core(n + 1), *c));
                }
            }
        }
        "k10temp" => {
            let find = |want: &str| chip.temps.iter().find(|(l, _)| l == want).map(|(_, c)| *c);
            if let Some(c) = find("Tdie").or_else(|| find("Tctl")) {
                out.push(temp("cpu", names::CPU_PACKAGE.to_string(), c));
            }
            for (label, c) in &chip.temps {
                if let Some(n) = extract_index(label, "Tccd", "") {
                    out.push(temp("cpu", format!("{}{}", CCD_PREFIX, n), *c));
                }
            }
        }
        "amdgpu" => {
            for (label, c) in &chip.temps {
                match label.as_str() {
                    "edge" => out.push(temp("gpu", names::GPU_CORE.to_string(), *c)),
                    "junction" => out.push(temp("gpu", names::GPU_HOT_SPOT.to_string(), *c)),
                    other => out.push(temp("gpu", format!("GPU {}", other), *c)),
                }
            }
        }
        _ => {
            for (label, c) in &chip.temps {
                out.push(temp(&chip.name, format!("{} {}", chip.name, label), *c));
            }
        }
    }

    for (label, rpm) in &chip.fans {
        let name = match (chip.name.as_str(), label.as_str()) {
            ("asus", "cpu_fan") => names::CPU_FAN.to_string(),
            ("asus", "gpu_fan") => names::GPU_FAN.to_string(),
            _ => format!("{} {}", chip.name, label),
        };
        out.push(SensorValue::new(&chip.name, SensorKind::Fan, name, *rpm as f32));
    }

    out
}

/// True for per-core or per-CCD temperatures, the inputs for derived
/// average and maximum.
pub fn is_core_sensor(name: &str) -> bool {
    name.starts_with(names::CORE_PREFIX) || name.starts_with(CCD_PREFIX)
}

fn read_trimmed<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let mut s = String::new();
    fs::File::open(p)?.read_to_string(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn extract_index(fname: &str, prefix: &str, suffix: &str) -> Option<usize> {
    if fname.len() > prefix.len() + suffix.len() && fname.starts_with(prefix) && fname.ends_with(suffix) {
        let mid = &fname[prefix.len()..fname.len() - suffix.len()];
        mid.parse().ok()
    } else {
        None
    }
}

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

//! Host identification and privilege checks

use std::fs;

use serde::Serialize;

const DMI_ROOT: &str = "/sys/devices/virtual/dmi/id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostInfo {
    pub cpu: String,
    pub product: String,
    pub board: String,
    pub elevated: bool,
}

impl HostInfo {
    pub fn detect() -> Self {
        Self {
            cpu: read_cpu_name(),
            product: read_product_name(),
            board: read_mb_name(),
            elevated: is_elevated(),
        }
    }
}

pub fn read_cpu_name() -> String {
    if let Ok(s) = fs::read_to_string("/proc/cpuinfo") {
        if let Some(name) = parse_cpu_name(&s) {
            return name;
        }
    }
    // Fallback: device-tree model
    if let Ok(mut s) = fs::read_to_string("/proc/device-tree/model") {
        s.retain(|c| c != '\u{0}');
        return s.trim().to_string();
    }
    String::new()
}

fn parse_cpu_name(cpuinfo: &str) -> Option<String> {
    let mut model_name: Option<String> = None;
    let mut hardware: Option<String> = None;

    for line in cpuinfo.lines() {
        let Some((k, v)) = line.split_once(':') else { continue };
        let val = v.trim();
        if val.is_empty() {
            continue;
        }
        match k.trim().to_ascii_lowercase().as_str() {
            "model name" if model_name.is_none() => model_name = Some(val.to_string()),
            "hardware" if hardware.is_none() => hardware = Some(val.to_string()),
            _ => {}
        }
    }
    model_name.or(hardware)
}

fn read_dmi(field: &str) -> Option<String> {
    fs::read_to_string(format!("{}/{}", DMI_ROOT, field))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn join_vendor(vendor: Option<String>, name: Option<String>) -> String {
    match (vendor, name) {
        (Some(v), Some(n)) => format!("{} {}", v, n),
        (Some(v), None) => v,
        (None, Some(n)) => n,
        (None, None) => String::new(),
    }
}

/// Laptop model, e.g. "ASUSTeK COMPUTER INC. ASUS TUF Dash F15 FX517ZM"
pub fn read_product_name() -> String {
    join_vendor(read_dmi("sys_vendor"), read_dmi("product_name"))
}

pub fn read_mb_name() -> String {
    join_vendor(read_dmi("board_vendor"), read_dmi("board_name"))
}

/// Whether the process can reach root-only interfaces such as debugfs
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    // The ATK ACPI driver is usable without elevation
    false
}

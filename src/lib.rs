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

//! atkmon - telemetry and performance modes for ASUS ATK ACPI laptops
//!
//! This library talks to the vendor ACPI control interface to read fan speeds
//! and switch CPU/GPU performance modes, and merges those readings with OS
//! counters and temperature sensors into one snapshot.

pub mod cache;
pub mod config;
pub mod constants;
pub mod controller;
pub mod device;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod modes;
pub mod platform;
pub mod sensors;
pub mod service;
pub mod snapshot;
pub mod system;
pub mod thermal;

#[cfg(test)]
pub mod test_utils;

pub use error::{AtkError, Result};
pub use modes::{CpuMode, GpuMode, GpuModeRequest, ModeState, SetModesRequest};
pub use service::TelemetryService;
pub use snapshot::Snapshot;

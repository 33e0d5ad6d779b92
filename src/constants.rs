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

//! Constants and configuration values for atkmon
//!
//! Protocol numbers of the ATK ACPI interface, filesystem locations and unit
//! conversions live here. Per-model device IDs do not: they belong to
//! [`crate::platform::DeviceTable`].

/// ATK ACPI device-control protocol
pub mod atk {
    /// Windows device namespace path of the ATK ACPI driver
    pub const DEVICE_PATH: &str = r"\\.\ATKACPI";

    /// IOCTL code accepted by the ATK ACPI driver
    pub const IOCTL_CODE: u32 = 0x0022_240C;

    /// "DSTS" - read device status
    pub const METHOD_DSTS: u32 = 0x5354_5344;

    /// "DEVS" - write device value
    pub const METHOD_DEVS: u32 = 0x5356_4544;

    /// Length of the argument block following the method ID
    pub const ARGS_LEN: u32 = 8;

    /// Size of the request and response buffers in bytes
    pub const PACKET_LEN: usize = 16;

    /// Set in a DSTS result when the device exists on this machine
    pub const PRESENCE_BIT: u32 = 0x0001_0000;

    /// Mask selecting the device value from a DSTS result
    pub const VALUE_MASK: u32 = 0x0000_FFFF;

    /// Returned by the firmware for unknown methods or devices
    pub const UNSUPPORTED_METHOD: u32 = 0xFFFF_FFFE;
}

/// Fan unit conversion
pub mod fan {
    /// Maximum fan speed of the TUF Dash F15 family
    pub const DEFAULT_MAX_RPM: u32 = 6600;

    /// Fan status values are reported in hundreds of RPM
    pub const RPM_PER_UNIT: u32 = 100;

    /// Largest documented fan status value
    pub const MAX_STATUS_VALUE: u32 = 100;
}

/// Filesystem locations
pub mod paths {
    use std::path::PathBuf;

    /// asus-nb-wmi debugfs directory (needs root and a mounted debugfs)
    pub const DEBUGFS_ROOT: &str = "/sys/kernel/debug/asus-nb-wmi";

    /// hwmon class directory
    pub const HWMON_BASE: &str = "/sys/class/hwmon";

    /// power_supply class directory
    pub const POWER_SUPPLY_BASE: &str = "/sys/class/power_supply";

    /// System-wide configuration directory
    pub const SYSTEM_CONFIG_DIR: &str = "/etc/atkmon";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";

    /// Mode cache file name
    pub const MODE_CACHE_FILE: &str = "mode_cache.json";

    /// Directory holding the mode cache when the config does not name one
    pub fn default_state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|d| d.join("atkmon"))
            .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_DIR))
    }
}

/// Byte unit conversion
pub mod units {
    pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

    /// Convert bytes to gigabytes, rounded to 2 decimal places
    pub fn gb(bytes: u64) -> f64 {
        (bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0
    }

    /// Round to one decimal place
    pub fn round1(value: f32) -> f32 {
        (value * 10.0).round() / 10.0
    }
}

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

//! Runtime configuration
//!
//! Read from `$XDG_CONFIG_HOME/atkmon/config.json`, `~/.config/atkmon/config.json`
//! or `/etc/atkmon/config.json`, whichever exists first. Every field is
//! optional; an absent file means defaults.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::paths;
use crate::device::DeviceBackendKind;
use crate::error::{AtkError, Result};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default)]
    pub backend: DeviceBackendKind,
    /// Override for the asus-nb-wmi debugfs directory
    #[serde(default)]
    pub debugfs_root: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorsConfig {
    #[serde(default = "default_true")]
    pub hwmon: bool,
    #[serde(default)]
    pub hwmon_root: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub nvidia_smi: bool,
    /// Program and arguments of an external sensor probe
    #[serde(default)]
    pub probe_command: Option<Vec<String>>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            hwmon: true,
            hwmon_root: None,
            nvidia_smi: true,
            probe_command: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// JSON-lines event log; disabled when unset
    #[serde(default)]
    pub event_log: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            event_log: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default)]
    pub device: DeviceConfig,
    /// JSON device table replacing the built-in one
    #[serde(default)]
    pub device_table: Option<PathBuf>,
    /// Mount point reported in the disk section
    #[serde(default)]
    pub disk_mount: Option<PathBuf>,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Mode cache location, falling back to the per-user state directory
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| paths::default_state_dir().join(paths::MODE_CACHE_FILE))
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("atkmon").join(paths::CONFIG_FILE);
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("atkmon")
            .join(paths::CONFIG_FILE);
    }
    system_config_path()
}

pub fn system_config_path() -> PathBuf {
    Path::new(paths::SYSTEM_CONFIG_DIR).join(paths::CONFIG_FILE)
}

pub fn validate_config(cfg: &AppConfig) -> std::result::Result<(), String> {
    if let Some(cmd) = &cfg.sensors.probe_command {
        match cmd.first() {
            None => return Err("sensors.probe_command must not be empty".to_string()),
            Some(p) if p.trim().is_empty() => {
                return Err("sensors.probe_command program must not be blank".to_string())
            }
            _ => {}
        }
    }
    if let Some(log) = &cfg.logging.event_log {
        if !log.is_absolute() {
            return Err(format!("logging.event_log must be an absolute path: {}", log.display()));
        }
    }
    if let Some(mount) = &cfg.disk_mount {
        if mount.as_os_str().is_empty() {
            return Err("disk_mount must not be empty".to_string());
        }
    }
    let level = cfg.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(format!(
            "invalid logging.level '{}' (valid: {})",
            cfg.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }
    Ok(())
}

/// Read, parse and validate one config file
pub fn try_load_config(path: &Path) -> Result<AppConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: AppConfig = serde_json::from_str(&data)
        .map_err(|e| AtkError::config(format!("{}: parse error: {}", path.display(), e)))?;
    validate_config(&cfg).map_err(|e| AtkError::config(format!("{}: {}", path.display(), e)))?;
    Ok(cfg)
}

/// Load the configuration.
///
/// An explicit path must exist. Otherwise the user config is tried, then the
/// system config, then defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let cfg = try_load_config(path)?;
        info!("Loaded config from {:?}", path);
        return Ok(cfg);
    }

    for path in [config_path(), system_config_path()] {
        match try_load_config(&path) {
            Ok(cfg) => {
                info!("Loaded config from {:?}", path);
                return Ok(cfg);
            }
            Err(AtkError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {:?}", path);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(AppConfig::default())
}

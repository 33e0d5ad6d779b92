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

//! Error type shared by every atkmon component.
//!
//! Failures below the snapshot aggregator are converted into per-field
//! "unavailable" markers; only mode changes surface these errors to callers.

use std::io;
use std::path::PathBuf;

/// Result type alias using AtkError
pub type Result<T> = std::result::Result<T, AtkError>;

#[derive(thiserror::Error, Debug)]
pub enum AtkError {
    // ============================================================================
    // Device channel
    // ============================================================================
    #[error("ACPI control device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Device call {device_id:#010x} failed: {reason}")]
    DeviceIo {
        device_id: u32,
        reason: String,
    },

    // ============================================================================
    // Sensors
    // ============================================================================
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    // ============================================================================
    // Mode cache and mode control
    // ============================================================================
    #[error("Mode cache {} is corrupt: {reason}", .path.display())]
    CacheCorrupt {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to persist mode cache {}: {source}", .path.display())]
    CachePersist {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Mode transition not supported at runtime: {0}")]
    UnsupportedModeTransition(String),

    #[error("Invalid {kind} '{value}' (valid: {valid})")]
    InvalidMode {
        kind: &'static str,
        value: String,
        valid: &'static str,
    },

    // ============================================================================
    // Configuration and generic
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl AtkError {
    /// Create a device I/O error for the given device ID
    pub fn device_io(device_id: u32, reason: impl Into<String>) -> Self {
        Self::DeviceIo {
            device_id,
            reason: reason.into(),
        }
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure means the hardware is absent rather than misbehaving
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::SensorUnavailable(_))
    }
}

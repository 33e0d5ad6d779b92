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

//! Device channel to the ATK ACPI control interface
//!
//! A [`DeviceChannel`] owns the single open handle to the driver. Every call,
//! read or write, goes through one mutex so IOCTL sequences never interleave.
//! The channel interprets nothing: it returns the raw 32-bit result and leaves
//! decoding to its callers.
//!
//! # Backends
//!
//! - `debugfs` - Linux `asus-nb-wmi` debugfs files (root only)
//! - `atkacpi` - Windows `\\.\ATKACPI` device via `DeviceIoControl`

pub mod debugfs;
pub mod packet;

#[cfg(windows)]
pub mod atkacpi;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{atk, paths};
use crate::error::{AtkError, Result};

/// One device-control call: a status read when `payload` is `None`, a set
/// otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub device_id: u32,
    pub payload: Option<u32>,
}

impl DeviceRequest {
    pub fn read(device_id: u32) -> Self {
        Self { device_id, payload: None }
    }

    pub fn write(device_id: u32, value: u32) -> Self {
        Self { device_id, payload: Some(value) }
    }

    /// ATK method ID for this request (DSTS or DEVS)
    pub fn method(&self) -> u32 {
        match self.payload {
            None => atk::METHOD_DSTS,
            Some(_) => atk::METHOD_DEVS,
        }
    }
}

/// A blocking request/response connection to the driver.
///
/// Implementations release their OS handle when dropped.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceTransport: Send {
    fn call(&mut self, request: DeviceRequest) -> Result<u32>;

    /// Human-readable backend description for diagnostics
    fn describe(&self) -> String;
}

/// Which transport to open
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackendKind {
    /// `atkacpi` on Windows, `debugfs` elsewhere
    #[default]
    Auto,
    Debugfs,
    Atkacpi,
    /// Never touch the hardware
    None,
}

pub struct DeviceChannel {
    transport: Mutex<Option<Box<dyn DeviceTransport>>>,
    description: String,
}

impl DeviceChannel {
    /// Wrap an already opened transport
    pub fn new(transport: Box<dyn DeviceTransport>) -> Self {
        let description = transport.describe();
        Self {
            transport: Mutex::new(Some(transport)),
            description,
        }
    }

    /// Open the configured backend.
    ///
    /// Fails with [`AtkError::DeviceUnavailable`] when the driver is missing or
    /// access is denied.
    pub fn open(kind: DeviceBackendKind, debugfs_root: &Path) -> Result<Self> {
        let transport: Box<dyn DeviceTransport> = match kind {
            DeviceBackendKind::None => {
                return Err(AtkError::DeviceUnavailable(
                    "device access disabled by configuration".to_string(),
                ))
            }
            DeviceBackendKind::Debugfs => Box::new(debugfs::DebugfsTransport::open(debugfs_root)?),
            DeviceBackendKind::Atkacpi => open_atkacpi()?,
            DeviceBackendKind::Auto => {
                if cfg!(windows) {
                    open_atkacpi()?
                } else {
                    Box::new(debugfs::DebugfsTransport::open(debugfs_root)?)
                }
            }
        };
        Ok(Self::new(transport))
    }

    /// Issue one device-control call. No retries.
    pub fn send(&self, request: DeviceRequest) -> Result<u32> {
        let mut guard = self.transport.lock();
        let transport = guard
            .as_mut()
            .ok_or_else(|| AtkError::DeviceUnavailable("device channel is closed".to_string()))?;
        let result = transport.call(request);
        match &result {
            Ok(raw) => debug!(
                "device call {:#010x} payload={:?} -> {:#010x}",
                request.device_id, request.payload, raw
            ),
            Err(e) => debug!("device call {:#010x} failed: {}", request.device_id, e),
        }
        result
    }

    /// Release the handle. Later calls fail with `DeviceUnavailable`.
    pub fn close(&self) {
        if self.transport.lock().take().is_some() {
            debug!("Closed device channel ({})", self.description);
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl Drop for DeviceChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(windows)]
fn open_atkacpi() -> Result<Box<dyn DeviceTransport>> {
    Ok(Box::new(atkacpi::AtkAcpiTransport::open()?))
}

#[cfg(not(windows))]
fn open_atkacpi() -> Result<Box<dyn DeviceTransport>> {
    Err(AtkError::DeviceUnavailable(format!(
        "{} is only available on Windows",
        atk::DEVICE_PATH
    )))
}

/// Decode a DSTS result into its value bits.
///
/// Most firmware sets the presence bit above the value; some return the bare
/// value. Both are accepted. `None` for the unsupported-method marker and for
/// anything else outside the 16-bit value range.
pub fn decode_status(raw: u32) -> Option<u32> {
    if raw == atk::UNSUPPORTED_METHOD {
        None
    } else if raw & atk::PRESENCE_BIT != 0 {
        Some(raw & atk::VALUE_MASK)
    } else if raw <= atk::VALUE_MASK {
        Some(raw)
    } else {
        None
    }
}

/// Whether a DEVS result means the firmware accepted the write
pub fn write_accepted(raw: u32) -> bool {
    raw != atk::UNSUPPORTED_METHOD
}

/// Shared device handle, or the reason there is none.
#[derive(Clone)]
pub enum DeviceAccess {
    Open(Arc<DeviceChannel>),
    Unavailable(String),
}

impl DeviceAccess {
    /// Try to open the device; failure is logged and captured, never fatal.
    pub fn open(kind: DeviceBackendKind, debugfs_root: Option<&Path>) -> Self {
        let root: PathBuf = debugfs_root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(paths::DEBUGFS_ROOT));
        match DeviceChannel::open(kind, &root) {
            Ok(channel) => {
                info!("Opened ATK device channel: {}", channel.describe());
                DeviceAccess::Open(Arc::new(channel))
            }
            Err(e) => {
                warn!("ATK device channel unavailable: {}", e);
                DeviceAccess::Unavailable(e.to_string())
            }
        }
    }

    pub fn from_transport(transport: Box<dyn DeviceTransport>) -> Self {
        DeviceAccess::Open(Arc::new(DeviceChannel::new(transport)))
    }

    pub fn is_available(&self) -> bool {
        match self {
            DeviceAccess::Open(channel) => channel.is_open(),
            DeviceAccess::Unavailable(_) => false,
        }
    }

    pub fn channel(&self) -> Result<&DeviceChannel> {
        match self {
            DeviceAccess::Open(channel) => Ok(channel),
            DeviceAccess::Unavailable(reason) => Err(AtkError::DeviceUnavailable(reason.clone())),
        }
    }

    pub fn send(&self, request: DeviceRequest) -> Result<u32> {
        self.channel()?.send(request)
    }

    pub fn describe(&self) -> String {
        match self {
            DeviceAccess::Open(channel) => channel.describe().to_string(),
            DeviceAccess::Unavailable(reason) => format!("unavailable: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn mock_transport() -> MockDeviceTransport {
        let mut mock = MockDeviceTransport::new();
        mock.expect_describe().return_const("mock".to_string());
        mock
    }

    #[test]
    fn test_request_method() {
        assert_eq!(DeviceRequest::read(1).method(), atk::METHOD_DSTS);
        assert_eq!(DeviceRequest::write(1, 0).method(), atk::METHOD_DEVS);
    }

    #[test]
    fn test_send_forwards_request_and_result() {
        let mut mock = mock_transport();
        mock.expect_call()
            .with(eq(DeviceRequest::read(0x0011_0013)))
            .times(1)
            .returning(|_| Ok(0x0001_0024));
        let channel = DeviceChannel::new(Box::new(mock));
        assert_eq!(channel.send(DeviceRequest::read(0x0011_0013)).unwrap(), 0x0001_0024);
    }

    #[test]
    fn test_send_does_not_retry() {
        let mut mock = mock_transport();
        mock.expect_call()
            .times(1)
            .returning(|r| Err(AtkError::device_io(r.device_id, "busy")));
        let channel = DeviceChannel::new(Box::new(mock));
        assert!(matches!(
            channel.send(DeviceRequest::write(7, 1)),
            Err(AtkError::DeviceIo { device_id: 7, .. })
        ));
    }

    #[test]
    fn test_closed_channel_is_unavailable() {
        let mut mock = mock_transport();
        mock.expect_call().never();
        let channel = DeviceChannel::new(Box::new(mock));
        assert!(channel.is_open());
        channel.close();
        assert!(!channel.is_open());
        assert!(matches!(
            channel.send(DeviceRequest::read(1)),
            Err(AtkError::DeviceUnavailable(_))
        ));
        // closing twice is harmless
        channel.close();
    }

    #[test]
    fn test_open_none_backend_is_unavailable() {
        let res = DeviceChannel::open(DeviceBackendKind::None, Path::new("/nonexistent"));
        assert!(matches!(res, Err(AtkError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_open_missing_debugfs_is_unavailable() {
        let access = DeviceAccess::open(
            DeviceBackendKind::Debugfs,
            Some(Path::new("/nonexistent/asus-nb-wmi")),
        );
        assert!(!access.is_available());
        assert!(matches!(access.send(DeviceRequest::read(1)), Err(AtkError::DeviceUnavailable(_))));
        assert!(access.describe().starts_with("unavailable"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_atkacpi_unavailable_off_windows() {
        let res = DeviceChannel::open(DeviceBackendKind::Atkacpi, Path::new("/"));
        assert!(matches!(res, Err(AtkError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_decode_status() {
        assert_eq!(decode_status(0x0001_0024), Some(0x24));
        assert_eq!(decode_status(0x0001_0000), Some(0));
        // bare encoding without the presence bit
        assert_eq!(decode_status(0x0000_0024), Some(0x24));
        assert_eq!(decode_status(0x0000_0000), Some(0));
        assert_eq!(decode_status(0x0002_0024), None);
        assert_eq!(decode_status(atk::UNSUPPORTED_METHOD), None);
    }

    #[test]
    fn test_write_accepted() {
        assert!(write_accepted(1));
        assert!(write_accepted(0));
        assert!(!write_accepted(atk::UNSUPPORTED_METHOD));
    }

    #[test]
    fn test_default_backend_kind() {
        assert_eq!(DeviceBackendKind::default(), DeviceBackendKind::Auto);
        let kind: DeviceBackendKind = serde_json::from_str("\"debugfs\"").unwrap();
        assert_eq!(kind, DeviceBackendKind::Debugfs);
    }
}

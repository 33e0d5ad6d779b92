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

//! Linux `asus-nb-wmi` debugfs transport
//!
//! The driver exposes the same DSTS/DEVS calls as the Windows ATK device:
//!
//! - write the device ID to `dev_id`
//! - for a set, write the value to `ctrl_param`
//! - read `dsts` or `devs`; the driver performs the call and prints
//!   `DSTS(0x110013) = 0x10024` / `DEVS(0x120075, 0x1) = 0x1`
//!
//! debugfs is only readable by root.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::device::{DeviceRequest, DeviceTransport};
use crate::error::{AtkError, Result};

const DEV_ID: &str = "dev_id";
const CTRL_PARAM: &str = "ctrl_param";
const DSTS: &str = "dsts";
const DEVS: &str = "devs";

pub struct DebugfsTransport {
    root: PathBuf,
    // Device selector, open for the transport's lifetime. Every call goes
    // through it, so a permission problem surfaces at open time.
    dev_id: File,
}

impl DebugfsTransport {
    pub fn open(root: &Path) -> Result<Self> {
        for name in [DEV_ID, CTRL_PARAM, DSTS, DEVS] {
            if !root.join(name).exists() {
                return Err(AtkError::DeviceUnavailable(format!(
                    "{} not found (is asus-nb-wmi loaded and debugfs mounted?)",
                    root.join(name).display()
                )));
            }
        }
        let dev_id = OpenOptions::new()
            .write(true)
            .open(root.join(DEV_ID))
            .map_err(|e| match e.kind() {
                io::ErrorKind::PermissionDenied => AtkError::DeviceUnavailable(format!(
                    "permission denied opening {} - need root",
                    root.join(DEV_ID).display()
                )),
                _ => AtkError::DeviceUnavailable(format!("{}: {}", root.join(DEV_ID).display(), e)),
            })?;
        debug!("Opened asus-nb-wmi debugfs at {:?}", root);
        Ok(Self {
            root: root.to_path_buf(),
            dev_id,
        })
    }

    /// Point the driver at `device_id`. Fixed width, so rewriting from the
    /// start always replaces the whole previous value.
    fn select(&mut self, device_id: u32) -> Result<()> {
        let line = format!("{:#010x}\n", device_id);
        self.dev_id
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.dev_id.write_all(line.as_bytes()))
            .and_then(|_| self.dev_id.flush())
            .map_err(|e| AtkError::device_io(device_id, format!("write {}: {}", DEV_ID, e)))
    }

    fn write_hex(&self, name: &str, value: u32, device_id: u32) -> Result<()> {
        fs::write(self.root.join(name), format!("{:#x}\n", value))
            .map_err(|e| AtkError::device_io(device_id, format!("write {}: {}", name, e)))
    }
}

impl DeviceTransport for DebugfsTransport {
    fn call(&mut self, request: DeviceRequest) -> Result<u32> {
        self.select(request.device_id)?;
        let result_file = match request.payload {
            None => DSTS,
            Some(value) => {
                self.write_hex(CTRL_PARAM, value, request.device_id)?;
                DEVS
            }
        };
        let output = fs::read_to_string(self.root.join(result_file))
            .map_err(|e| AtkError::device_io(request.device_id, format!("read {}: {}", result_file, e)))?;
        parse_result(&output).ok_or_else(|| {
            AtkError::device_io(
                request.device_id,
                format!("unexpected {} output '{}'", result_file, output.trim()),
            )
        })
    }

    fn describe(&self) -> String {
        format!("asus-nb-wmi debugfs ({})", self.root.display())
    }
}

/// Parse the value after `=` in a `DSTS(..) = 0x..` line.
///
/// Negative numbers are accepted and reinterpreted as `u32`.
pub fn parse_result(output: &str) -> Option<u32> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let (_, value) = line.rsplit_once('=')?;
    parse_number(value.trim())
}

fn parse_number(s: &str) -> Option<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if let Some(neg) = s.strip_prefix('-') {
        return neg.parse::<i64>().ok().map(|v| (-v) as i32 as u32);
    }
    s.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_debugfs(dsts: &str, devs: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEV_ID), "0x0\n").unwrap();
        fs::write(dir.path().join(CTRL_PARAM), "0x0\n").unwrap();
        fs::write(dir.path().join(DSTS), dsts).unwrap();
        fs::write(dir.path().join(DEVS), devs).unwrap();
        dir
    }

    #[test]
    fn test_parse_result_formats() {
        assert_eq!(parse_result("DSTS(0x110013) = 0x10024\n"), Some(0x0001_0024));
        assert_eq!(parse_result("DEVS(0x120075, 0x1) = 0x1\n"), Some(1));
        assert_eq!(parse_result("\nDSTS(0x1) = 42"), Some(42));
        assert_eq!(parse_result("DSTS(0x1) = -2"), Some(0xFFFF_FFFE));
        assert_eq!(parse_result("garbage"), None);
        assert_eq!(parse_result(""), None);
    }

    #[test]
    fn test_open_requires_all_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEV_ID), "").unwrap();
        assert!(matches!(
            DebugfsTransport::open(dir.path()),
            Err(AtkError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_status_read_writes_dev_id() {
        let dir = fake_debugfs("DSTS(0x110013) = 0x10024\n", "");
        let mut t = DebugfsTransport::open(dir.path()).unwrap();
        let raw = t.call(DeviceRequest::read(0x0011_0013)).unwrap();
        assert_eq!(raw, 0x0001_0024);
        let dev_id = fs::read_to_string(dir.path().join(DEV_ID)).unwrap();
        assert_eq!(dev_id.trim(), "0x00110013");
    }

    #[test]
    fn test_calls_reuse_selector_handle() {
        let dir = fake_debugfs("DSTS(0x1) = 0x10000\n", "");
        let mut t = DebugfsTransport::open(dir.path()).unwrap();
        t.call(DeviceRequest::read(0x0012_0075)).unwrap();
        t.call(DeviceRequest::read(0x5)).unwrap();
        let dev_id = fs::read_to_string(dir.path().join(DEV_ID)).unwrap();
        assert_eq!(dev_id, "0x00000005\n");

        // the selector was opened once; replacing the path does not reach it
        fs::remove_file(dir.path().join(DEV_ID)).unwrap();
        fs::write(dir.path().join(DEV_ID), "untouched").unwrap();
        t.call(DeviceRequest::read(0x0011_0013)).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(DEV_ID)).unwrap(), "untouched");
    }

    #[test]
    fn test_write_sets_ctrl_param() {
        let dir = fake_debugfs("", "DEVS(0x120075, 0x2) = 0x1\n");
        let mut t = DebugfsTransport::open(dir.path()).unwrap();
        let raw = t.call(DeviceRequest::write(0x0012_0075, 2)).unwrap();
        assert_eq!(raw, 1);
        let param = fs::read_to_string(dir.path().join(CTRL_PARAM)).unwrap();
        assert_eq!(param.trim(), "0x2");
    }

    #[test]
    fn test_unparseable_output_is_io_error() {
        let dir = fake_debugfs("oops", "");
        let mut t = DebugfsTransport::open(dir.path()).unwrap();
        assert!(matches!(
            t.call(DeviceRequest::read(5)),
            Err(AtkError::DeviceIo { device_id: 5, .. })
        ));
    }

    #[test]
    fn test_describe_names_root() {
        let dir = fake_debugfs("", "");
        let t = DebugfsTransport::open(dir.path()).unwrap();
        assert!(t.describe().contains("debugfs"));
    }
}

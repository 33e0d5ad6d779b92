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

//! Windows `\\.\ATKACPI` transport
//!
//! Talks to the ATK ACPI driver installed with the vendor's system software.
//! The driver does not require administrator rights.

use windows::core::w;
use windows::Win32::Foundation::{CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::DeviceIoControl;

use crate::constants::atk;
use crate::device::{packet, DeviceRequest, DeviceTransport};
use crate::error::{AtkError, Result};

pub struct AtkAcpiTransport {
    handle: HANDLE,
}

// The handle is only used behind the channel mutex.
unsafe impl Send for AtkAcpiTransport {}

impl AtkAcpiTransport {
    pub fn open() -> Result<Self> {
        // SAFETY: the path is a static wide string and every pointer argument
        // is either null or owned by this frame.
        let handle = unsafe {
            CreateFileW(
                w!(r"\\.\ATKACPI"),
                (GENERIC_READ | GENERIC_WRITE).0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                HANDLE::default(),
            )
        }
        .map_err(|e| AtkError::DeviceUnavailable(format!("{}: {}", atk::DEVICE_PATH, e)))?;
        Ok(Self { handle })
    }
}

impl DeviceTransport for AtkAcpiTransport {
    fn call(&mut self, request: DeviceRequest) -> Result<u32> {
        let input = packet::encode(&request);
        let mut output = [0u8; atk::PACKET_LEN];
        let mut returned = 0u32;
        // SAFETY: both buffers outlive the synchronous call and their lengths
        // are passed alongside.
        unsafe {
            DeviceIoControl(
                self.handle,
                atk::IOCTL_CODE,
                Some(input.as_ptr().cast()),
                input.len() as u32,
                Some(output.as_mut_ptr().cast()),
                output.len() as u32,
                Some(&mut returned),
                None,
            )
        }
        .map_err(|e| AtkError::device_io(request.device_id, e.to_string()))?;
        packet::decode(&output)
            .ok_or_else(|| AtkError::device_io(request.device_id, "short IOCTL response"))
    }

    fn describe(&self) -> String {
        format!("ATK ACPI driver ({})", atk::DEVICE_PATH)
    }
}

impl Drop for AtkAcpiTransport {
    fn drop(&mut self) {
        // SAFETY: the handle came from CreateFileW and is closed exactly once.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

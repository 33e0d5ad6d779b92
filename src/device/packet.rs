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

//! ATK ACPI IOCTL packet layout
//!
//! ```text
//! bytes 0-3   method ID (DSTS / DEVS), little-endian
//! bytes 4-7   argument length, always 8
//! bytes 8-11  device ID
//! bytes 12-15 payload (0 for DSTS)
//! ```
//!
//! The response buffer has the same size; its first four bytes hold the result.

use crate::constants::atk;
use crate::device::DeviceRequest;

pub fn encode(request: &DeviceRequest) -> [u8; atk::PACKET_LEN] {
    let mut buf = [0u8; atk::PACKET_LEN];
    buf[0..4].copy_from_slice(&request.method().to_le_bytes());
    buf[4..8].copy_from_slice(&atk::ARGS_LEN.to_le_bytes());
    buf[8..12].copy_from_slice(&request.device_id.to_le_bytes());
    buf[12..16].copy_from_slice(&request.payload.unwrap_or(0).to_le_bytes());
    buf
}

/// Extract the result word from a response buffer
pub fn decode(response: &[u8]) -> Option<u32> {
    let word: [u8; 4] = response.get(0..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(word))
}

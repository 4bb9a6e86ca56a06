/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Fixed-layout binary header at byte offset 0 of every dispatcher
//! message. Wire bytes are host-endian: the transport is always a
//! local Unix-domain socket, so there is never a cross-host byte
//! order to reconcile.

use crate::error::{Error, Result};

/// Ids with the top nibble set are reserved for daemon-internal
/// control traffic (`SERV_ACTIVE` and friends) and are exempt from
/// the per-service published-list check.
pub const RESERVED_MSG_ID_MASK: u32 = 0xF000_0000;

/// `SERV_ACTIVE` is sent by a service immediately after connecting its
/// inbound channel, carrying its own process id as payload so the
/// daemon can bind the connection to a `ServiceConfig`.
pub const SERV_ACTIVE_MSG_ID: u32 = RESERVED_MSG_ID_MASK | 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Mid = 1,
    High = 2,
}

impl Priority {
    fn from_u8(v: u8) -> Priority {
        match v {
            0 => Priority::Low,
            2 => Priority::High,
            _ => Priority::Mid,
        }
    }
}

/// `msg_id(4) | priority(1) | reserved(3) | transaction_id(4) |
/// payload_size(4) | source_id(4) | destination_id(4)`
pub const HEADER_SIZE: usize = 4 + 1 + 3 + 4 + 4 + 4 + 4;

const OFF_MSG_ID: usize = 0;
const OFF_PRIORITY: usize = 4;
const OFF_TRANSACTION_ID: usize = 8;
const OFF_PAYLOAD_SIZE: usize = 12;
const OFF_SOURCE_ID: usize = 16;
const OFF_DESTINATION_ID: usize = 20;

/// A view over the fixed header fields of a message buffer. Holds no
/// data of its own; every accessor reads or writes directly through
/// the byte slice it's given, the way `jf_messaging_getMsgId` and
/// friends operate directly on `u8 *pu8Msg` in the original.
pub struct MessagingHeader;

impl MessagingHeader {
    /// Writes a fresh header into `buf[0..HEADER_SIZE]`, stamping
    /// `source_id` with the calling process's pid as
    /// `jf_messaging_initMsgHeader` does.
    pub fn init(buf: &mut [u8], msg_id: u32, priority: Priority, payload_size: u32) {
        assert!(buf.len() >= HEADER_SIZE);
        buf[OFF_MSG_ID..OFF_MSG_ID + 4].copy_from_slice(&msg_id.to_ne_bytes());
        buf[OFF_PRIORITY] = priority as u8;
        buf[OFF_PRIORITY + 1..OFF_TRANSACTION_ID].fill(0);
        buf[OFF_TRANSACTION_ID..OFF_TRANSACTION_ID + 4].copy_from_slice(&0u32.to_ne_bytes());
        buf[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + 4]
            .copy_from_slice(&payload_size.to_ne_bytes());
        buf[OFF_SOURCE_ID..OFF_SOURCE_ID + 4]
            .copy_from_slice(&(std::process::id()).to_ne_bytes());
        buf[OFF_DESTINATION_ID..OFF_DESTINATION_ID + 4].copy_from_slice(&0u32.to_ne_bytes());
    }

    pub fn get_msg_id(buf: &[u8]) -> u32 {
        u32::from_ne_bytes(buf[OFF_MSG_ID..OFF_MSG_ID + 4].try_into().unwrap())
    }

    pub fn set_msg_id(buf: &mut [u8], msg_id: u32) {
        buf[OFF_MSG_ID..OFF_MSG_ID + 4].copy_from_slice(&msg_id.to_ne_bytes());
    }

    pub fn get_priority(buf: &[u8]) -> Priority {
        Priority::from_u8(buf[OFF_PRIORITY])
    }

    pub fn get_transaction_id(buf: &[u8]) -> u32 {
        u32::from_ne_bytes(buf[OFF_TRANSACTION_ID..OFF_TRANSACTION_ID + 4].try_into().unwrap())
    }

    pub fn set_transaction_id(buf: &mut [u8], transaction_id: u32) {
        buf[OFF_TRANSACTION_ID..OFF_TRANSACTION_ID + 4]
            .copy_from_slice(&transaction_id.to_ne_bytes());
    }

    pub fn get_payload_size(buf: &[u8]) -> u32 {
        u32::from_ne_bytes(buf[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + 4].try_into().unwrap())
    }

    pub fn set_payload_size(buf: &mut [u8], payload_size: u32) {
        buf[OFF_PAYLOAD_SIZE..OFF_PAYLOAD_SIZE + 4].copy_from_slice(&payload_size.to_ne_bytes());
    }

    pub fn get_source_id(buf: &[u8]) -> u32 {
        u32::from_ne_bytes(buf[OFF_SOURCE_ID..OFF_SOURCE_ID + 4].try_into().unwrap())
    }

    pub fn set_source_id(buf: &mut [u8], source_id: u32) {
        buf[OFF_SOURCE_ID..OFF_SOURCE_ID + 4].copy_from_slice(&source_id.to_ne_bytes());
    }

    pub fn get_destination_id(buf: &[u8]) -> u32 {
        u32::from_ne_bytes(buf[OFF_DESTINATION_ID..OFF_DESTINATION_ID + 4].try_into().unwrap())
    }

    pub fn set_destination_id(buf: &mut [u8], destination_id: u32) {
        buf[OFF_DESTINATION_ID..OFF_DESTINATION_ID + 4]
            .copy_from_slice(&destination_id.to_ne_bytes());
    }

    /// `header_size + header.payload_size`. Only valid once
    /// `is_full_msg` has confirmed the header itself is present.
    pub fn msg_size(buf: &[u8]) -> usize {
        HEADER_SIZE + Self::get_payload_size(buf) as usize
    }

    /// `Ok(())` once `available` covers a whole framed message;
    /// `Err(IncompleteData)` otherwise. Never advances any cursor —
    /// that's the caller's job once it decides what to do with the
    /// framed bytes.
    pub fn is_full_msg(buf: &[u8], available: usize) -> Result<()> {
        if available < HEADER_SIZE {
            return Err(Error::IncompleteData)
        }
        if available < Self::msg_size(buf) {
            return Err(Error::IncompleteData)
        }
        Ok(())
    }

    pub fn is_reserved_id(msg_id: u32) -> bool {
        msg_id & RESERVED_MSG_ID_MASK == RESERVED_MSG_ID_MASK
    }
}

/// Payload of the `SERV_ACTIVE` control message: a single `service_id`
/// (the sender's pid), used to bind an inbound connection to the
/// `ServiceConfig` it belongs to. The original's exact struct layout
/// lives in a header not present in the retained source; this is the
/// used-field contract per spec §9.
pub struct ServActivePayload {
    pub service_id: u32,
}

impl ServActivePayload {
    pub const SIZE: usize = 4;

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::InvalidMessage("SERV_ACTIVE payload too short"))
        }
        Ok(Self { service_id: u32::from_ne_bytes(buf[0..4].try_into().unwrap()) })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.service_id.to_ne_bytes());
    }
}

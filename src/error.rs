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

/// Crate-wide error type. Per-message and per-connection failures
/// (`QueueFull`, `IncompleteData`, `MsgNotPublished`, ...) are handled
/// locally wherever they're returned; only fatal startup failures ever
/// reach `main` and abort the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Message not yet complete")]
    IncompleteData,

    #[error("Invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("Message id {0:#010x} is not in the service's published list")]
    MsgNotPublished(u32),

    #[error("Peer uid {0} is not authorized for this service")]
    UnauthorizedUser(u32),

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Connector pool is exhausted")]
    PoolEmpty,

    #[error("Socket is not connected")]
    NotConnected,

    #[error("Duplicate service name in config: {0}")]
    DuplicateService(String),
}

pub type Result<T> = std::result::Result<T, Error>;

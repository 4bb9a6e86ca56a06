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

//! `dispatcherd`: a local-host publish/subscribe message dispatcher.
//! Split into a library and a thin `main.rs` binary shell the way the
//! teacher's own `bin/*` daemons are, so integration tests under
//! `tests/` can drive a real `Daemon` over real Unix-domain sockets.

pub mod config;
pub mod daemon;
pub mod error;
pub mod header;
pub mod ingress;
pub mod message;
pub mod net;
pub mod peer_cred;
pub mod routing;
pub mod settings;
pub mod signals;
pub mod system;
pub mod xfer;

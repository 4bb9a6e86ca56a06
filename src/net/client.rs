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

//! Async client socket (C5). The original pools connectors behind a
//! free-list so many outbound slots can share one chain; every
//! connector this daemon ever creates belongs to exactly one `xfer`
//! (pool size 1 per service, per §4.6), so this is reduced to a plain
//! connect-on-demand helper. `xfer` owns the state machine
//! (`Idle`/`Connecting`/`Connected`) and the retry/backoff loop.

use std::path::PathBuf;

use async_std::os::unix::net::UnixStream;

use crate::error::Result;

pub struct Connector {
    path: PathBuf,
}

impl Connector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn connect(&self) -> Result<UnixStream> {
        Ok(UnixStream::connect(&self.path).await?)
    }
}

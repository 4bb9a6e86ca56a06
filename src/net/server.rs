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

//! Async server socket (C4): one listening UDS fd plus the pool that
//! caps how many accepted connections may be live at once. Framing
//! and per-service validation live one layer up, in `ingress`.

use std::path::Path;

use async_std::os::unix::net::{UnixListener, UnixStream};
use log::warn;

use crate::error::{Error, Result};
use crate::net::pool::{Pool, PoolGuard};

pub struct Listener {
    inner: UnixListener,
    pool: std::sync::Arc<Pool>,
}

impl Listener {
    /// Binds `path`, removing a stale socket file left behind by an
    /// unclean shutdown first (there is no prior owner to disturb:
    /// this daemon is the only writer of files under the socket
    /// directory).
    pub async fn bind(path: &Path, pool_capacity: usize) -> Result<Self> {
        let _ = std::fs::remove_file(path);
        let inner = UnixListener::bind(path).await?;
        Ok(Self { inner, pool: Pool::new(pool_capacity) })
    }

    /// `Ok(None)` means a connection arrived but the pool was at
    /// capacity (`POOL_EMPTY`); the fd has already been closed by the
    /// time this returns, and the caller should just loop back to
    /// `accept` again.
    pub async fn accept(&self) -> Result<Option<(UnixStream, PoolGuard)>> {
        let (stream, _addr) = self.inner.accept().await?;
        match self.pool.try_acquire() {
            Some(guard) => Ok(Some((stream, guard))),
            None => {
                warn!(target: "dispatcherd::net::server", "{}", Error::PoolEmpty);
                drop(stream);
                Ok(None)
            }
        }
    }
}

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

//! `SIGTERM`/`SIGINT` graceful shutdown. The teacher's own daemons
//! (`bin/darkirc/src/main.rs`) get this from `darkfi::system::SignalHandler`,
//! which isn't in this crate's dependency tree; this is that type's
//! used-field contract reimplemented directly on `signal-hook` +
//! `signal-hook-async-std`.

use futures::StreamExt;
use log::info;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_async_std::Signals;

use crate::error::Result;

pub struct SignalHandler {
    term_recv: smol::channel::Receiver<()>,
}

/// The background task draining the signal stream; kept alive until
/// `wait_termination` returns so it isn't dropped mid-wait.
pub struct SignalsTask {
    handle: signal_hook::iterator::Handle,
    _task: async_std::task::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new() -> Result<(Self, SignalsTask)> {
        let signals = Signals::new([SIGTERM, SIGINT])?;
        let handle = signals.handle();

        let (term_send, term_recv) = smol::channel::bounded(1);
        let task = async_std::task::spawn(async move {
            let mut signals = signals;
            while let Some(sig) = signals.next().await {
                info!(target: "dispatcherd::signals", "received signal {}", sig);
                let _ = term_send.try_send(());
            }
        });

        Ok((Self { term_recv }, SignalsTask { handle, _task: task }))
    }

    /// Blocks until `SIGTERM`/`SIGINT` arrives, then tears down the
    /// signal-handling task itself.
    pub async fn wait_termination(&self, task: SignalsTask) -> Result<()> {
        let _ = self.term_recv.recv().await;
        task.handle.close();
        task._task.await;
        Ok(())
    }
}

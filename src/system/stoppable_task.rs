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

//! A task that can be cancelled from outside the future it wraps, the
//! same shape the teacher uses for every listener/worker loop
//! (`bin/darkirc/src/irc/server.rs`, `example/dchat/src/rpc.rs`'s
//! `rpc_connections: Mutex<HashSet<StoppableTaskPtr>>`).

use std::{
    future::Future,
    sync::Arc,
};

use async_std::sync::Mutex;
use futures::FutureExt;
use smol::channel;

use crate::error::Error;

pub type StoppableTaskPtr = Arc<StoppableTask>;

/// One task's stop handle. `new()` returns the `Arc`; `start` spawns
/// the wrapped future onto `executor` and races it against the stop
/// signal, invoking `on_stop` with whichever side finished first.
pub struct StoppableTask {
    stop_send: channel::Sender<()>,
    stop_recv: Mutex<Option<channel::Receiver<()>>>,
}

impl StoppableTask {
    pub fn new() -> StoppableTaskPtr {
        let (stop_send, stop_recv) = channel::bounded(1);
        Arc::new(Self { stop_send, stop_recv: Mutex::new(Some(stop_recv)) })
    }

    /// Spawns `main` on `executor`. If the task is stopped first,
    /// `main` is dropped (cancelled) and `on_stop` is invoked with
    /// `Err(stop_value)`; otherwise `on_stop` gets `main`'s own
    /// result. `stop_value` is the sentinel the caller uses to tell
    /// "stopped deliberately" apart from "failed" in `on_stop`.
    pub fn start<Fut, Cb, CbFut>(
        self: Arc<Self>,
        main: Fut,
        on_stop: Cb,
        stop_value: Error,
        executor: Arc<smol::Executor<'_>>,
    ) where
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
        Cb: FnOnce(Result<(), Error>) -> CbFut + Send + 'static,
        CbFut: Future<Output = ()> + Send + 'static,
    {
        let task = self;
        executor
            .spawn(async move {
                let stop_recv = task.stop_recv.lock().await.take();
                let result = match stop_recv {
                    Some(stop_recv) => futures::select! {
                        res = Box::pin(main).fuse() => res,
                        _ = Box::pin(stop_recv.recv()).fuse() => Err(stop_value),
                    },
                    None => Err(Error::InvalidMessage("task already started")),
                };
                on_stop(result).await
            })
            .detach();
    }

    /// Signals the running task to cancel. A no-op if it already
    /// finished or was never started.
    pub async fn stop(&self) {
        let _ = self.stop_send.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn stop_cancels_before_completion() {
        smol::block_on(async {
            let executor = Arc::new(smol::Executor::new());
            let stopped = Arc::new(AtomicBool::new(false));
            let stopped2 = stopped.clone();

            let task = StoppableTask::new();
            task.clone().start(
                async {
                    smol::Timer::after(std::time::Duration::from_secs(3600)).await;
                    Ok(())
                },
                move |res| {
                    let stopped2 = stopped2.clone();
                    async move {
                        if matches!(res, Err(Error::NotConnected)) {
                            stopped2.store(true, Ordering::SeqCst);
                        }
                    }
                },
                Error::NotConnected,
                executor.clone(),
            );

            executor
                .run(async {
                    task.stop().await;
                    smol::Timer::after(std::time::Duration::from_millis(10)).await;
                })
                .await;

            assert!(stopped.load(Ordering::SeqCst));
        });
    }
}

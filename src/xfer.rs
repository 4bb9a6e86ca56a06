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

//! Dispatcher transfer (C6): one bounded outbound queue per
//! subscriber, wrapping a lazily (re)connected outbound socket. The
//! queue's bound is the channel's own capacity, so `QUEUE_FULL` is
//! just `try_send` returning `Full` — no separate length bookkeeping.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_std::io::WriteExt;
use async_std::os::unix::net::UnixStream;
use log::warn;

use crate::error::{Error, Result};
use crate::message::DispatcherMessage;
use crate::net::client::Connector;
use crate::system::StoppableTask;

const RECONNECT_DELAY: Duration = Duration::from_millis(500);

pub struct Xfer {
    remote_path: PathBuf,
    queue_send: smol::channel::Sender<DispatcherMessage>,
    queue_recv: smol::channel::Receiver<DispatcherMessage>,
    paused: AtomicBool,
    resume_send: smol::channel::Sender<()>,
    resume_recv: smol::channel::Receiver<()>,
}

pub type XferPtr = Arc<Xfer>;

impl Xfer {
    /// New subscribers start paused (per §4.7: "the subscriber may
    /// not have started yet") until routing resumes them on that
    /// service's first valid `SERV_ACTIVE`.
    pub fn new(remote_path: PathBuf, max_queued_msgs: usize) -> XferPtr {
        let (queue_send, queue_recv) = smol::channel::bounded(max_queued_msgs.max(1));
        let (resume_send, resume_recv) = smol::channel::bounded(1);
        Arc::new(Self {
            remote_path,
            queue_send,
            queue_recv,
            paused: AtomicBool::new(true),
            resume_send,
            resume_recv,
        })
    }

    /// A paused xfer still queues up to `max_queued_msgs` — the point
    /// of pausing is to hold messages for a subscriber that hasn't
    /// connected yet, not to discard them — and `run_loop` won't drain
    /// the queue until `resume`. `Err(QueueFull)` only once the queue
    /// itself is at capacity; the caller (routing) must then drop its
    /// own reference to the message.
    pub fn send_msg(&self, msg: DispatcherMessage) -> Result<()> {
        self.queue_send.try_send(msg).map_err(|_| Error::QueueFull)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        let _ = self.resume_send.try_send(());
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn queue_len(&self) -> usize {
        self.queue_send.len()
    }

    /// Spawns the send loop under a [`StoppableTask`]. Reconnects on
    /// every send error or closed connection; never gives up.
    pub fn run(self: XferPtr, executor: Arc<smol::Executor<'static>>) -> Arc<StoppableTask> {
        let task = StoppableTask::new();
        let xfer = self;
        task.clone().start(
            async move {
                xfer.run_loop().await;
                Ok(())
            },
            |_| async {},
            Error::NotConnected,
            executor,
        );
        task
    }

    async fn run_loop(self: Arc<Self>) {
        let connector = Connector::new(self.remote_path.clone());
        let mut stream: Option<UnixStream> = None;
        let mut pending: Option<DispatcherMessage> = None;

        loop {
            while self.paused.load(Ordering::Acquire) {
                let _ = self.resume_recv.recv().await;
            }

            let msg = match pending.take() {
                Some(m) => m,
                None => match self.queue_recv.recv().await {
                    Ok(m) => m,
                    Err(_) => return,
                },
            };

            loop {
                if stream.is_none() {
                    match connector.connect().await {
                        Ok(s) => stream = Some(s),
                        Err(e) => {
                            warn!(target: "dispatcherd::xfer", "connect to {} failed: {}",
                                self.remote_path.display(), e);
                            smol::Timer::after(RECONNECT_DELAY).await;
                            continue
                        }
                    }
                }

                let s = stream.as_mut().expect("just ensured connected");
                match s.write_all(msg.bytes()).await {
                    Ok(()) => break,
                    Err(e) => {
                        warn!(target: "dispatcherd::xfer", "send to {} failed: {}",
                            self.remote_path.display(), e);
                        stream = None;
                        pending = Some(msg);
                        smol::Timer::after(RECONNECT_DELAY).await;
                        break
                    }
                }
            }
        }
    }

    /// Synchronously drains the queue; each `DispatcherMessage`'s ref
    /// drops as it's discarded here. The caller is responsible for
    /// stopping the send loop (via the `StoppableTask` returned by
    /// [`Xfer::run`]) first.
    pub fn destroy(&self) {
        while self.queue_recv.try_recv().is_ok() {}
    }
}

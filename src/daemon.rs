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

//! Dispatcher daemon glue (C9): the single FIFO between every
//! service's ingress and the routing layer, driven by one worker
//! task. `smol::channel::unbounded` is the async equivalent of the
//! original's mutex-protected FIFO plus counting semaphore — `send`
//! is the lock-enqueue-unlock-then-sem-up sequence, `recv().await` is
//! `sem_wait` followed by the locked dequeue.

use std::{path::PathBuf, sync::Arc};

use log::{error, info, warn};

use crate::config::ConfigStore;
use crate::error::Result;
use crate::ingress::Ingress;
use crate::message::DispatcherMessage;
use crate::routing::Router;
use crate::system::StoppableTask;

/// One service's listen backlog / concurrent-connection cap. The
/// original sizes this per service from config; absent a configured
/// value we use a fixed daemon-wide default, matching the single
/// `pool_capacity` constant the reference implementation's
/// `servmgmt` wires into every `asrv`.
const SERVER_POOL_CAPACITY: usize = 16;

pub struct Daemon {
    socket_dir: PathBuf,
    config: ConfigStore,
    router: Arc<Router>,
    in_send: smol::channel::Sender<DispatcherMessage>,
    in_recv: smol::channel::Receiver<DispatcherMessage>,
}

impl Daemon {
    pub fn new(socket_dir: PathBuf, config: ConfigStore) -> Self {
        std::fs::create_dir_all(&socket_dir).ok();
        let router = Arc::new(Router::build(config.services(), &socket_dir));
        let (in_send, in_recv) = smol::channel::unbounded();
        Self { socket_dir, config, router, in_send, in_recv }
    }

    /// Copy of the channel handle ingress connections enqueue onto;
    /// equivalent to `queue_from_server` in §4.9.
    fn queue_handle(&self) -> smol::channel::Sender<DispatcherMessage> {
        self.in_send.clone()
    }

    /// Spawns every service's ingress listener, every service's
    /// outbound xfer send loop, and the single worker task, all under
    /// [`StoppableTask`]s collected here so `shutdown` can stop them
    /// in order.
    pub async fn run(&self, executor: Arc<smol::Executor<'static>>) -> Result<Vec<Arc<StoppableTask>>> {
        let mut tasks = Vec::new();

        for (service, xfer) in self.router.clients() {
            let task = xfer.clone().run(executor.clone());
            tasks.push(task);
            info!(target: "dispatcherd::daemon", "xfer for '{}' started", service.name);
        }

        for service in self.config.services() {
            let ingress = Ingress::bind(service.clone(), &self.socket_dir, SERVER_POOL_CAPACITY).await?;
            let router = self.router.clone();
            let queue = self.queue_handle();
            let name = service.name.clone();
            let task = StoppableTask::new();
            task.clone().start(
                async move {
                    ingress
                        .run(router, move |bytes| {
                            let _ = queue.try_send(DispatcherMessage::new(&bytes));
                        })
                        .await
                },
                move |res| async move {
                    if let Err(e) = res {
                        error!(target: "dispatcherd::daemon", "ingress for '{}' stopped: {}", name, e);
                    }
                },
                crate::error::Error::NotConnected,
                executor.clone(),
            );
            tasks.push(task);
        }

        let worker = self.spawn_worker(executor.clone());
        tasks.push(worker);

        Ok(tasks)
    }

    fn spawn_worker(&self, executor: Arc<smol::Executor<'static>>) -> Arc<StoppableTask> {
        let router = self.router.clone();
        let in_recv = self.in_recv.clone();
        let task = StoppableTask::new();
        task.clone().start(
            async move {
                loop {
                    match in_recv.recv().await {
                        Ok(msg) => router.dispatch(&msg),
                        Err(_) => return Ok(()),
                    }
                }
            },
            |_| async {},
            crate::error::Error::NotConnected,
            executor,
        );
        task
    }

    /// Stops every task (worker first, so no more dispatch happens
    /// mid-teardown), then drains each xfer. A brief pause lets
    /// in-flight chain callbacks that were already scheduled settle,
    /// mirroring the original's "final small sleep before primitive
    /// destruction".
    pub async fn shutdown(&self, tasks: Vec<Arc<StoppableTask>>) {
        for task in &tasks {
            task.stop().await;
        }
        for (service, xfer) in self.router.clients() {
            xfer.destroy();
            warn!(target: "dispatcherd::daemon", "xfer for '{}' drained", service.name);
        }
        smol::Timer::after(std::time::Duration::from_millis(50)).await;
    }
}

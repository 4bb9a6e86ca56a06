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

//! Service server / ingress (C8): one listener per service, peer-cred
//! auth on connect, message framing and the published-list / reserved-id
//! validation on data, with successfully validated bytes handed to the
//! injected queue callback (the daemon's in-queue, C9).

use std::{path::Path, sync::Arc};

use async_std::io::ReadExt;
use async_std::os::unix::net::UnixStream;
use log::{debug, info, warn};

use crate::config::ServiceConfigPtr;
use crate::error::{Error, Result};
use crate::header::{MessagingHeader, ServActivePayload, SERV_ACTIVE_MSG_ID};
use crate::net::server::Listener;
use crate::peer_cred::peer_cred;
use crate::routing::Router;

/// Read buffer starting capacity; grows to fit `max_msg_size` as
/// needed but never beyond it (an oversized claimed `payload_size` is
/// an invalid message, not a reason to grow unbounded).
const INITIAL_BUF_CAPACITY: usize = 4096;

pub struct Ingress {
    service: ServiceConfigPtr,
    listener: Listener,
}

impl Ingress {
    pub async fn bind(service: ServiceConfigPtr, socket_dir: &Path, pool_capacity: usize) -> Result<Self> {
        let path = socket_dir.join(&service.messaging_out_path);
        let listener = Listener::bind(&path, pool_capacity).await?;
        Ok(Self { service, listener })
    }

    /// Accepts connections forever, authenticating and framing each
    /// on its own task. Stops only when the listener errors or the
    /// caller drops the returned future (via `StoppableTask::stop`).
    pub async fn run<F>(self, router: Arc<Router>, on_message: F) -> Result<()>
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let on_message = Arc::new(on_message);
        loop {
            let (stream, guard) = match self.listener.accept().await? {
                Some(pair) => pair,
                None => continue,
            };

            let cred = match peer_cred(&stream) {
                Ok(cred) => cred,
                Err(e) => {
                    warn!(target: "dispatcherd::ingress", "peer-cred lookup failed: {}", e);
                    continue
                }
            };

            if cred.uid != self.service.user_id {
                warn!(target: "dispatcherd::ingress", "service '{}': {}",
                    self.service.name, Error::UnauthorizedUser(cred.uid));
                continue
            }

            info!(target: "dispatcherd::ingress", "service '{}' connected (uid {})", self.service.name, cred.uid);

            let service = self.service.clone();
            let router = router.clone();
            let on_message = on_message.clone();
            async_std::task::spawn(async move {
                let _guard = guard;
                if let Err(e) = handle_connection(stream, service, router, on_message).await {
                    debug!(target: "dispatcherd::ingress", "connection closed: {}", e);
                }
            });
        }
    }
}

async fn handle_connection<F>(
    mut stream: UnixStream,
    service: ServiceConfigPtr,
    router: Arc<Router>,
    on_message: Arc<F>,
) -> Result<()>
where
    F: Fn(Vec<u8>) + Send + Sync + 'static,
{
    let mut buf = vec![0u8; INITIAL_BUF_CAPACITY.min(service.max_msg_size.max(crate::header::HEADER_SIZE))];
    let mut end = 0usize;

    loop {
        if end == buf.len() {
            if buf.len() >= service.max_msg_size {
                warn!(target: "dispatcherd::ingress", "buffer full for service '{}', closing", service.name);
                return Err(Error::InvalidMessage("buffer full"))
            }
            buf.resize((buf.len() * 2).min(service.max_msg_size.max(buf.len() + 1)), 0);
        }

        let n = stream.read(&mut buf[end..]).await?;
        if n == 0 {
            return Ok(()) // PEER_CLOSED
        }
        end += n;

        let mut begin = 0usize;
        loop {
            let available = end - begin;
            if MessagingHeader::is_full_msg(&buf[begin..end], available).is_err() {
                break // INCOMPLETE_DATA: leave bytes, read more
            }
            let msg_size = MessagingHeader::msg_size(&buf[begin..end]);
            process_framed_message(&buf[begin..begin + msg_size], &service, &router, &*on_message);
            begin += msg_size;
        }

        if begin == end {
            end = 0;
        } else if begin > 0 {
            buf.copy_within(begin..end, 0);
            end -= begin;
        }
    }
}

fn process_framed_message<F>(
    frame: &[u8],
    service: &ServiceConfigPtr,
    router: &Router,
    on_message: &F,
) where
    F: Fn(Vec<u8>) + Send + Sync + 'static,
{
    let msg_id = MessagingHeader::get_msg_id(frame);

    if MessagingHeader::is_reserved_id(msg_id) {
        if msg_id == SERV_ACTIVE_MSG_ID {
            handle_serv_active(frame, service, router);
        }
        return
    }

    if !service.is_published(msg_id) {
        warn!(target: "dispatcherd::ingress", "service '{}': {}",
            service.name, Error::MsgNotPublished(msg_id));
        return
    }

    on_message(frame.to_vec());
}

fn handle_serv_active(frame: &[u8], service: &ServiceConfigPtr, router: &Router) {
    let source_id = MessagingHeader::get_source_id(frame);
    let payload = &frame[crate::header::HEADER_SIZE..];

    let decoded = match ServActivePayload::decode(payload) {
        Ok(p) => p,
        Err(e) => {
            warn!(target: "dispatcherd::ingress", "malformed SERV_ACTIVE from '{}': {}", service.name, e);
            return
        }
    };

    if decoded.service_id != source_id {
        warn!(target: "dispatcherd::ingress",
            "SERV_ACTIVE service_id {} does not match source_id {} for '{}'",
            decoded.service_id, source_id, service.name);
        return
    }

    service.set_runtime_service_id(source_id);
    router.resume_service(service.config_id);
    info!(target: "dispatcherd::ingress", "service '{}' active (runtime id {})", service.name, source_id);
}

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

//! Service client set + subscribed-message index (C7). Built once at
//! startup from the loaded `ServiceConfig` list and never mutated
//! afterward — the only thing that changes post-build is each
//! service's `runtime_service_id` and its xfer's pause state, both of
//! which live on the `ServiceConfig`/`Xfer` themselves.

use std::path::Path;

use crate::config::ServiceConfigPtr;
use crate::message::DispatcherMessage;
use crate::xfer::{Xfer, XferPtr};

const NUM_BUCKETS: usize = 256;

fn bucket_of(msg_id: u32) -> usize {
    (msg_id.wrapping_mul(2_654_435_761)) as usize & (NUM_BUCKETS - 1)
}

struct RouteEntry {
    service: ServiceConfigPtr,
    msg_id: u32,
    xfer: XferPtr,
}

struct ClientEntry {
    service: ServiceConfigPtr,
    xfer: XferPtr,
}

/// Owns one `Xfer` per configured service (the outbound "service
/// client" side) plus the 256-bucket subscribed-message index used
/// to fan a dispatched message out to every matching xfer.
pub struct Router {
    buckets: Vec<Vec<RouteEntry>>,
    clients: Vec<ClientEntry>,
}

impl Router {
    /// `socket_dir` joined with each service's `messaging_in_path`
    /// gives the UDS this service's xfer connects out to.
    pub fn build(services: &[ServiceConfigPtr], socket_dir: &Path) -> Self {
        let mut buckets: Vec<Vec<RouteEntry>> = (0..NUM_BUCKETS).map(|_| Vec::new()).collect();
        let mut clients = Vec::with_capacity(services.len());

        for service in services {
            let remote = socket_dir.join(&service.messaging_in_path);
            let xfer = Xfer::new(remote, service.max_queued_msgs);
            clients.push(ClientEntry { service: service.clone(), xfer: xfer.clone() });

            for sub in &service.subscribed {
                buckets[bucket_of(sub.msg_id)].push(RouteEntry {
                    service: service.clone(),
                    msg_id: sub.msg_id,
                    xfer: xfer.clone(),
                });
            }
        }

        Self { buckets, clients }
    }

    pub fn clients(&self) -> impl Iterator<Item = (&ServiceConfigPtr, &XferPtr)> {
        self.clients.iter().map(|c| (&c.service, &c.xfer))
    }

    pub fn xfer_for(&self, config_id: u16) -> Option<XferPtr> {
        self.clients.iter().find(|c| c.service.config_id == config_id).map(|c| c.xfer.clone())
    }

    /// Called once a service's first valid `SERV_ACTIVE` has set its
    /// `runtime_service_id`: its xfer can finally carry traffic.
    pub fn resume_service(&self, config_id: u16) {
        if let Some(xfer) = self.xfer_for(config_id) {
            xfer.resume();
        }
    }

    /// For every subscribed match in `msg`'s bucket — configured
    /// `msg_id` equal, and the unicast filter satisfied if
    /// `destination_id` is nonzero — clones the message (refcount++)
    /// and hands it to that subscriber's xfer. A `QUEUE_FULL` from
    /// one xfer only drops that subscriber's copy; the clone is
    /// dropped along with the error, releasing the ref.
    pub fn dispatch(&self, msg: &DispatcherMessage) {
        let dest = msg.destination_id();
        for entry in &self.buckets[bucket_of(msg.msg_id())] {
            if entry.msg_id != msg.msg_id() {
                continue
            }
            if dest != 0 && entry.service.runtime_service_id() != dest {
                continue
            }
            let _ = entry.xfer.send_msg(msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MsgConfig;
    use crate::header::{MessagingHeader, Priority};

    fn svc(config_id: u16, subscribed: Vec<u32>) -> ServiceConfigPtr {
        crate::config::ServiceConfig::for_test(
            config_id,
            subscribed.into_iter().map(|msg_id| MsgConfig { msg_id, description: String::new() }).collect(),
        )
    }

    fn msg(msg_id: u32, destination_id: u32) -> DispatcherMessage {
        let mut buf = vec![0u8; crate::header::HEADER_SIZE];
        MessagingHeader::init(&mut buf, msg_id, Priority::Low, 0);
        MessagingHeader::set_destination_id(&mut buf, destination_id);
        DispatcherMessage::new(&buf)
    }

    #[test]
    fn broadcast_reaches_every_subscriber_when_active() {
        let b = svc(1, vec![0x100]);
        let c = svc(2, vec![0x100]);
        b.set_runtime_service_id(111);
        c.set_runtime_service_id(222);
        let router = Router::build(&[b.clone(), c.clone()], Path::new("/tmp"));
        router.resume_service(1);
        router.resume_service(2);

        router.dispatch(&msg(0x100, 0));

        assert_eq!(router.xfer_for(1).unwrap().queue_len(), 1);
        assert_eq!(router.xfer_for(2).unwrap().queue_len(), 1);
    }

    #[test]
    fn unicast_reaches_only_matching_destination() {
        let b = svc(1, vec![0x100]);
        let c = svc(2, vec![0x100]);
        b.set_runtime_service_id(111);
        c.set_runtime_service_id(222);
        let router = Router::build(&[b.clone(), c.clone()], Path::new("/tmp"));
        router.resume_service(1);
        router.resume_service(2);

        router.dispatch(&msg(0x100, 111));

        assert_eq!(router.xfer_for(1).unwrap().queue_len(), 1);
        assert_eq!(router.xfer_for(2).unwrap().queue_len(), 0);
    }

    #[test]
    fn inactive_subscriber_never_receives_unicast() {
        let b = svc(1, vec![0x100]);
        let router = Router::build(&[b.clone()], Path::new("/tmp"));
        router.resume_service(1);

        router.dispatch(&msg(0x100, 999));

        assert_eq!(router.xfer_for(1).unwrap().queue_len(), 0);
    }
}

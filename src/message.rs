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

//! The unit routed between services. The original's ad-hoc reference
//! counter (`createDispatcherMsg`/`freeDispatcherMsg`, refcount
//! bumped by every queue that holds a copy) maps directly onto
//! `Arc<[u8]>`: `Clone` is `retain`, `Drop` is `release`, and the
//! buffer frees itself the moment the last holder goes away. No
//! cycles are possible (a message never references the queues that
//! hold it), so plain atomic refcounting is sufficient without a
//! collector.

use std::sync::Arc;

use crate::header::MessagingHeader;

/// Reference-counted, immutable-after-construction framed message.
/// Every outbound queue that references a `DispatcherMessage` holds
/// one clone of the inner `Arc`; `strong_count` is exactly the
/// invariant spec §8.1 requires.
#[derive(Clone)]
pub struct DispatcherMessage {
    payload: Arc<[u8]>,
}

impl DispatcherMessage {
    /// Deep-copies `bytes` into a freshly owned buffer, refcount
    /// starts at 1 (the caller's reference). Mirrors
    /// `createDispatcherMsg`, which exists specifically to decouple
    /// the ingress read buffer's lifetime from every egress queue.
    pub fn new(bytes: &[u8]) -> Self {
        Self { payload: Arc::from(bytes) }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn msg_id(&self) -> u32 {
        MessagingHeader::get_msg_id(&self.payload)
    }

    pub fn destination_id(&self) -> u32 {
        MessagingHeader::get_destination_id(&self.payload)
    }

    pub fn source_id(&self) -> u32 {
        MessagingHeader::get_source_id(&self.payload)
    }

    /// Number of queues (plus, transiently, the worker) currently
    /// holding this message. Exposed for the shutdown-leak invariant
    /// check (spec §8.6); not used for any control-flow decision.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.payload)
    }
}

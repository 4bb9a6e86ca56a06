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

//! Fixed-capacity connection pool shared by C4 (server) and C5
//! (client). The original tracks free slots as indices into a
//! pre-allocated array; under one task per connection there's nothing
//! to pre-allocate, so the array collapses to a permit counter —
//! `try_acquire` is the free-list pop, dropping the returned
//! [`PoolGuard`] is the free-list push. Capacity and `POOL_EMPTY`
//! behavior are unchanged.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub struct Pool {
    capacity: usize,
    in_use: AtomicUsize,
}

/// Held for the lifetime of one accepted/connected slot. Returns the
/// permit to the pool on drop, same as the original returning a slot
/// index to the free list on `on_disconnect`.
pub struct PoolGuard {
    pool: Arc<Pool>,
}

impl Pool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { capacity, in_use: AtomicUsize::new(0) })
    }

    /// `None` means the pool is at capacity (`POOL_EMPTY`): the
    /// caller must close the accepted fd without reading from it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<PoolGuard> {
        loop {
            let cur = self.in_use.load(Ordering::Acquire);
            if cur >= self.capacity {
                return None
            }
            if self
                .in_use
                .compare_exchange(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(PoolGuard { pool: self.clone() })
            }
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_capacity_guards_can_be_held_at_once() {
        let pool = Pool::new(2);
        let a = pool.try_acquire().unwrap();
        let b = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        drop(a);
        let c = pool.try_acquire().unwrap();
        drop(b);
        drop(c);
        assert_eq!(pool.in_use(), 0);
    }
}

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

//! `SO_PEERCRED`, the only authentication the daemon ever does. Raw
//! `libc` syscall, same register the teacher reaches for elsewhere
//! for anything `std` doesn't expose stably (`O_NONBLOCK` via
//! `custom_flags` in `bin/tau/taud/src/util.rs`).

use std::{mem, os::unix::io::AsRawFd};

use async_std::os::unix::net::UnixStream;

use crate::error::{Error, Result};

pub struct PeerCred {
    pub pid: libc::pid_t,
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
}

pub fn peer_cred(stream: &UnixStream) -> Result<PeerCred> {
    let fd = stream.as_raw_fd();
    let mut cred: libc::ucred = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::ucred>() as libc::socklen_t;

    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut libc::ucred as *mut libc::c_void,
            &mut len,
        )
    };

    if ret != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()))
    }

    Ok(PeerCred { pid: cred.pid, uid: cred.uid, gid: cred.gid })
}

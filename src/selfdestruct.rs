// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::unix::io::RawFd;

use nix::unistd::{close, setpgid, write, Pid};

use crate::diag::{die, OrDie};

/// Arranges that this process is killed if its parent dies, moves it into
/// its own process group, and confirms the parent is still alive via a
/// three-step handshake over `sync_pipe`: close the read end, write one
/// byte to the write end, close the write end.
///
/// Both ends of `sync_pipe` are closed by the time this returns.
pub(crate) fn setup_self_destruction(sync_pipe: (RawFd, RawFd)) {
    let (read_fd, write_fd) = sync_pipe;

    // SAFETY: PR_SET_PDEATHSIG's only meaningful argument is the signal
    // number to deliver; the remaining prctl() varargs are ignored for it.
    let rc =
        unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong, 0, 0, 0) };
    if rc < 0 {
        die("prctl(PR_SET_PDEATHSIG, SIGKILL)", nix::Error::last());
    }

    // Move to a new process group so that `kill(0, sig)` or `kill(-pgid,
    // sig)` from this point on can never reach the outer process group.
    setpgid(Pid::from_raw(0), Pid::from_raw(0)).or_die("setpgid(0, 0)");

    close(read_fd).or_die("close(sync_pipe.read)");
    write(unsafe { std::os::fd::BorrowedFd::borrow_raw(write_fd) }, &[0u8])
        .or_die("write(sync_pipe.write)");
    close(write_fd).or_die("close(sync_pipe.write)");
}

// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow};

use crate::diag::OrDie;

/// The child's pid, exposed to the signal-forwarding handler as the one
/// piece of shared mutable state it needs. Set once by
/// [`crate::supervisor::spawn_child`] before [`setup_handlers`] installs any
/// handler that reads it.
static GLOBAL_CHILD_PID: AtomicI32 = AtomicI32::new(0);

pub(crate) fn set_child_pid(pid: i32) {
    GLOBAL_CHILD_PID.store(pid, Ordering::SeqCst);
}

fn max_signal() -> libc::c_int {
    unsafe { libc::SIGRTMAX() }
}

fn install_raw(signum: libc::c_int, handler: libc::sighandler_t) {
    unsafe {
        let mut sa: MaybeUninit<libc::sigaction> = MaybeUninit::zeroed();
        let sa_ptr = sa.as_mut_ptr();
        (*sa_ptr).sa_sigaction = handler;
        (*sa_ptr).sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut (*sa_ptr).sa_mask);
        // Errors are intentionally ignored: some signals (SIGKILL, SIGSTOP)
        // can never be handled, and we still want to try the rest.
        libc::sigaction(signum, sa.as_ptr(), std::ptr::null_mut());
    }
}

/// Unblocks every signal and installs the default disposition for signals 1
/// through the platform's maximum (including real-time signals).
pub(crate) fn restore_defaults() {
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
        .or_die("sigprocmask(SIG_SETMASK, <empty set>, NULL)");

    for signum in 1..=max_signal() {
        install_raw(signum, libc::SIG_DFL);
    }
}

/// The signal-safe forwarding handler: re-raises the received signal to the
/// child's entire process group. This is the only logic that may run in
/// signal-handler context, so it does exactly one system call and nothing
/// else (no logging, no allocation).
extern "C" fn forward_signal(signum: libc::c_int) {
    let pid = GLOBAL_CHILD_PID.load(Ordering::SeqCst);
    if pid > 0 {
        unsafe {
            libc::kill(-pid, signum);
        }
    }
}

/// Resets to default dispositions, then installs the sandbox's signal plane:
/// synchronous-fatal signals and `SIGCHLD` keep killing PID 1 directly;
/// `SIGKILL`/`SIGSTOP` are left untouched; `SIGTTIN`/`SIGTTOU` are ignored
/// (the child owns the terminal); everything else is forwarded to the
/// child's process group.
pub(crate) fn setup_handlers() {
    restore_defaults();

    for signum in 1..=max_signal() {
        match signum {
            s if s == libc::SIGABRT
                || s == libc::SIGBUS
                || s == libc::SIGFPE
                || s == libc::SIGILL
                || s == libc::SIGSEGV
                || s == libc::SIGSYS
                || s == libc::SIGTRAP
                || s == libc::SIGCHLD =>
            {
                // Default disposition already installed by restore_defaults.
            }
            s if s == libc::SIGKILL || s == libc::SIGSTOP => {
                // One does not simply install a handler for these two.
            }
            s if s == libc::SIGTTIN || s == libc::SIGTTOU => {
                install_raw(s, libc::SIG_IGN);
            }
            s => install_raw(s, forward_signal as libc::sighandler_t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_pid_round_trips_through_atomic() {
        set_child_pid(4242);
        assert_eq!(GLOBAL_CHILD_PID.load(Ordering::SeqCst), 4242);
        set_child_pid(0);
    }
}

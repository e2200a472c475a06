// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CString;

use nix::errno::Errno;
use nix::sys::stat::{umask, Mode};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, getpgrp, setpgid, tcsetpgrp, ForkResult, Pid};

use crate::diag::{die, OrDie};
use crate::options::Options;
use crate::signals;

/// Forks the child, reinstates default signal dispositions and process-group
/// plumbing in it, then `execvp`s `opt.args`. Returns the child's pid to the
/// caller (PID 1 itself); never returns from within the child.
pub(crate) fn spawn_child(opt: &Options) -> Pid {
    // SAFETY: PID 1 is single-threaded at this point; the child's path to
    // `execvp` touches only async-signal-safe primitives.
    match unsafe { fork() }.or_die("fork") {
        ForkResult::Child => {
            setpgid(Pid::from_raw(0), Pid::from_raw(0)).or_die("setpgid(0, 0)");

            match tcsetpgrp(std::io::stdin(), getpgrp()) {
                Ok(()) | Err(Errno::ENOTTY) => {}
                Err(e) => die("tcsetpgrp(STDIN_FILENO, getpgrp())", e),
            }

            signals::restore_defaults();
            umask(Mode::from_bits_truncate(0o022));

            let args = cstring_argv(&opt.args);
            let err = execvp(&args[0], &args).expect_err("execvp only returns on failure");
            die(&format!("execvp({})", opt.args[0]), err)
        }
        ForkResult::Parent { child } => {
            signals::set_child_pid(child.as_raw());
            child
        }
    }
}

fn cstring_argv(args: &[String]) -> Vec<CString> {
    args.iter()
        .map(|a| CString::new(a.as_str()).expect("argv entries must not contain NUL bytes"))
        .collect()
}

/// Reaps children until `target` itself exits, translating its exit status
/// into a process exit code the same way upstream does: a clean exit passes
/// the exit code through unchanged; death by signal maps to `128 + signum`.
/// Never returns.
pub(crate) fn wait_for_child(target: Pid) -> ! {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::empty())) {
            Err(Errno::EINTR) => continue,
            Err(e) => die("waitpid(-1, NULL, 0)", e),
            Ok(WaitStatus::Exited(pid, code)) if pid == target => {
                // SAFETY: `_exit` immediately terminates the process; no
                // destructors or atexit handlers need to run here.
                unsafe { libc::_exit(code) };
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) if pid == target => {
                unsafe { libc::_exit(128 + sig as libc::c_int) };
            }
            // Some other reparented process or a stopped/continued target;
            // keep waiting, PID 1 is the only one allowed to exit.
            Ok(_) => continue,
        }
    }
}

// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The core's only two logging primitives: "emit debug line" and "die with
//! diagnostic". There is no structured error propagation across pipeline
//! stages — every unexpected failure is unrecoverable, so the only sane
//! thing to do with it is log it and terminate.

/// Logs `context: err` at error level and terminates the whole process.
///
/// Never panics: PID 1 panicking would unwind into a Rust backtrace printed
/// into the child's namespace, which is not what a well-behaved init does.
pub(crate) fn die(context: &str, err: impl std::fmt::Display) -> ! {
    tracing::error!("{context}: {err}");
    // `_exit`, not `exit`: this may run after `fork()` and before `execvp`,
    // where running atexit handlers or re-flushing inherited stdio buffers
    // would be wrong.
    unsafe { libc::_exit(libc::EXIT_FAILURE) };
}

/// Convenience trait to turn a `Result` into its `Ok` value or an immediate
/// process termination, mirroring the original `DIE(...)` macro.
pub(crate) trait OrDie<T> {
    fn or_die(self, context: &str) -> T;
}

impl<T, E: std::fmt::Display> OrDie<T> for Result<T, E> {
    fn or_die(self, context: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => die(context, e),
        }
    }
}

// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::Path;

use nix::mount::{mount, MsFlags};

use crate::diag::OrDie;
use crate::pathmaker::{ensure, Kind};

/// Mounts a fresh `proc` at `<cwd>/proc`, because the one inherited from the
/// outer namespace still refers to the parent PID namespace. This is what
/// makes PID 1 (and everything it spawns) see only processes in its own PID
/// namespace.
pub(crate) fn mount_proc() {
    ensure(Path::new("proc"), Kind::Directory);
    mount(
        Some("proc"),
        "proc",
        Some("proc"),
        MsFlags::MS_NODEV | MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID,
        Option::<&Path>::None,
    )
    .or_die("mount(proc, proc, proc, MS_NODEV|MS_NOEXEC|MS_NOSUID, NULL)");
}

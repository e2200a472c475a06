// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::unix::io::RawFd;

use nix::unistd::getpid;

use crate::diag::die;
use crate::options::Options;
use crate::{filesystem, namespace, network, procmount, rootpivot, selfdestruct, signals, supervisor};

/// Runs the whole PID 1 pipeline: self-destruction wiring, namespace setup,
/// filesystem assembly, the pivot into the sandbox, signal plumbing, and
/// finally forking and supervising the real child. Called by the outer
/// driver from inside the freshly unshared namespaces, after `clone(2)`
/// returns 0 in the child.
///
/// Aborts (via [`die`]) if this process is not actually PID 1 within its
/// namespace, and never returns: [`supervisor::wait_for_child`] always exits
/// the process directly.
pub fn pid1_main(opt: Options, sync_pipe: (RawFd, RawFd)) -> ! {
    if getpid().as_raw() != 1 {
        die("pid1_main", "must be called as pid 1 of a fresh PID namespace");
    }

    selfdestruct::setup_self_destruction(sync_pipe);

    namespace::setup_mount_namespace();
    namespace::setup_user_namespace(&opt);
    if opt.fake_hostname {
        namespace::setup_uts_namespace();
    }

    let fs_state = filesystem::assemble(&opt);
    procmount::mount_proc();
    filesystem::setup_devices(&fs_state);
    filesystem::make_mostly_readonly(&opt, &fs_state);

    network::setup_networking(&opt);

    rootpivot::enter_sandbox(&opt, &fs_state);

    signals::setup_handlers();
    let child = supervisor::spawn_child(&opt);
    supervisor::wait_for_child(child);
}

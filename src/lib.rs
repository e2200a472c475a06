// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Core of a Linux namespace sandbox's PID 1.
//!
//! This crate implements everything that runs *inside* a freshly created
//! user/mount/UTS/IPC/PID namespace set: finishing construction of the
//! isolated filesystem, spawning the target command, and acting as a
//! minimal init (signal forwarder, zombie reaper, exit code translator).
//!
//! Creating the namespaces themselves, wiring up the synchronization pipe,
//! and assembling an [`Options`] value from command-line flags is left to
//! the `sandbox-init` binary in this crate's `src/bin` — see [`entrypoint`].

mod diag;
mod entrypoint;
mod filesystem;
mod namespace;
mod network;
mod options;
mod pathmaker;
mod procmount;
mod rootpivot;
mod selfdestruct;
mod signals;
mod supervisor;

pub use entrypoint::pid1_main;
pub use options::Options;

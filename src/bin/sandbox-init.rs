// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nix::sched::{clone, CloneFlags};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, getgid, getuid, pipe, read};
use std::os::fd::IntoRawFd;
use thiserror::Error;

use sandbox_pid1::Options;

/// Errors in translating command-line arguments into [`Options`], kept
/// distinct from the `anyhow` context used everywhere else in this binary
/// because these are user-facing usage mistakes, not operational failures.
#[derive(Debug, Error)]
enum CliError {
    #[error("--bind-mount {0}: expected SRC=DST")]
    MalformedBindMount(String),
}

/// Runs a command inside a fresh user/mount/UTS/IPC/PID (and optionally
/// network) namespace sandbox.
#[derive(Parser, Debug)]
#[command(name = "sandbox-init", about)]
struct Cli {
    /// Absolute path, inside the sandbox, to run the command from.
    #[arg(long)]
    working_dir: PathBuf,

    /// A host-path=sandbox-path bind mount. May be repeated.
    #[arg(long = "bind-mount", value_name = "SRC=DST")]
    bind_mounts: Vec<String>,

    /// An absolute sandbox path to cover with a fresh tmpfs. May be repeated.
    #[arg(long = "tmpfs-dir")]
    tmpfs_dirs: Vec<PathBuf>,

    /// An absolute sandbox path to leave writable after the read-only
    /// remount pass. May be repeated.
    #[arg(long = "writable-file")]
    writable_files: Vec<PathBuf>,

    /// Present the child with uid/gid 0 inside the sandbox.
    #[arg(long)]
    fake_root: bool,

    /// Present the child with the `nobody` uid/gid inside the sandbox.
    #[arg(long)]
    fake_username: bool,

    /// Set hostname/domainname to `localhost`/`localdomain`.
    #[arg(long)]
    fake_hostname: bool,

    /// Create a network namespace and bring up loopback inside it.
    #[arg(long)]
    create_netns: bool,

    /// Raise log verbosity to debug.
    #[arg(short, long)]
    verbose: bool,

    /// The child command and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    args: Vec<String>,
}

impl Cli {
    fn into_options(self) -> Result<Options> {
        let mut bind_mount_sources = Vec::with_capacity(self.bind_mounts.len());
        let mut bind_mount_targets = Vec::with_capacity(self.bind_mounts.len());
        for spec in &self.bind_mounts {
            let (src, dst) = spec
                .split_once('=')
                .ok_or_else(|| CliError::MalformedBindMount(spec.clone()))?;
            bind_mount_sources.push(PathBuf::from(src));
            bind_mount_targets.push(PathBuf::from(dst));
        }

        Ok(Options {
            working_dir: self.working_dir,
            bind_mount_sources,
            bind_mount_targets,
            tmpfs_dirs: self.tmpfs_dirs,
            writable_files: self.writable_files,
            fake_root: self.fake_root,
            fake_username: self.fake_username,
            fake_hostname: self.fake_hostname,
            create_netns: self.create_netns,
            args: self.args,
            global_outer_uid: getuid().as_raw(),
            global_outer_gid: getgid().as_raw(),
        })
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Mirrors the teacher's `handle_top_level_result`: anything that fails
/// before the namespace dance starts is an ordinary, reportable error, not
/// the core's "abort with a diagnostic" class.
fn handle_top_level_result(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let program = std::env::current_exe()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "sandbox-init".to_string());
            eprintln!("FATAL: {program}: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    handle_top_level_result(run(cli))
}

fn run(cli: Cli) -> Result<()> {
    if cli.fake_root && cli.fake_username {
        bail!("--fake-root and --fake-username are mutually exclusive");
    }

    let opt = cli.into_options()?;

    let escaped_args = opt
        .args
        .iter()
        .map(|a| shell_escape::escape(std::borrow::Cow::Borrowed(a.as_str())))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!(command = %escaped_args, "sandboxed command");

    let mut flags = CloneFlags::CLONE_NEWUSER
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWIPC
        | CloneFlags::CLONE_NEWPID;
    if opt.create_netns {
        flags |= CloneFlags::CLONE_NEWNET;
    }

    let (read_fd, write_fd) = pipe().context("pipe()")?;
    let read_fd = read_fd.into_raw_fd();
    let write_fd = write_fd.into_raw_fd();

    // 2 MiB is generously larger than anything pid1_main's call stack needs.
    let mut child_stack = vec![0u8; 2 * 1024 * 1024];

    let run_pid1 = {
        let opt = opt.clone();
        move || -> isize { sandbox_pid1::pid1_main(opt.clone(), (read_fd, write_fd)) }
    };

    // SAFETY: `child_stack` outlives the cloned process (we only return
    // after it has exited); `run_pid1` never unwinds across the clone
    // boundary because `pid1_main` never returns.
    let child = unsafe { clone(Box::new(run_pid1), &mut child_stack, flags, None) }
        .context("clone(CLONE_NEWUSER|CLONE_NEWNS|CLONE_NEWUTS|CLONE_NEWIPC|CLONE_NEWPID)")?;

    close(write_fd).context("close(sync_pipe.write) in driver")?;

    let mut ack = [0u8; 1];
    // A short read (zero bytes) means the child died before completing the
    // handshake; either way there is nothing further to synchronize on.
    let _ = read(read_fd, &mut ack);
    close(read_fd).context("close(sync_pipe.read) in driver")?;

    loop {
        match waitpid(child, None).context("waitpid(pid1)")? {
            WaitStatus::Exited(pid, code) if pid == child => {
                std::process::exit(code);
            }
            WaitStatus::Signaled(pid, sig, _) if pid == child => {
                std::process::exit(128 + sig as i32);
            }
            _ => continue,
        }
    }
}

// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;

/// Immutable configuration for the sandbox's PID 1.
///
/// Constructed once by the outer driver (before any namespace is entered)
/// and consumed read-only by every pipeline stage.
#[derive(Clone, Debug)]
pub struct Options {
    /// Absolute path, inside the sandbox, where the child will be executed.
    pub working_dir: PathBuf,

    /// Bind-mount sources, host side. `bind_mount_sources[i]` is mounted at
    /// `bind_mount_targets[i]`.
    pub bind_mount_sources: Vec<PathBuf>,
    /// Bind-mount targets, absolute sandbox paths. Same length as
    /// `bind_mount_sources`.
    pub bind_mount_targets: Vec<PathBuf>,

    /// Absolute sandbox paths to cover with fresh tmpfs.
    pub tmpfs_dirs: Vec<PathBuf>,

    /// Absolute sandbox paths that must remain writable after the read-only
    /// remount pass.
    pub writable_files: Vec<PathBuf>,

    /// Present the child with uid/gid 0 inside the sandbox.
    pub fake_root: bool,
    /// Present the child with the `nobody` uid/gid inside the sandbox.
    pub fake_username: bool,
    /// Set hostname/domainname to `localhost`/`localdomain`.
    pub fake_hostname: bool,
    /// A network namespace was created by the outer driver; bring up `lo`.
    pub create_netns: bool,

    /// Non-empty argv for the child command; `args[0]` is the program.
    pub args: Vec<String>,

    /// The unprivileged caller's uid, captured before entering the user
    /// namespace.
    pub global_outer_uid: u32,
    /// The unprivileged caller's gid, captured before entering the user
    /// namespace.
    pub global_outer_gid: u32,
}

impl Options {
    /// Returns whether a rootfs layout is in use, detected the same way
    /// upstream does: `/usr` among the bind-mount targets.
    ///
    /// This heuristic is fragile by design (see DESIGN.md) but is preserved
    /// bit-for-bit for compatibility.
    pub fn rootfs(&self) -> bool {
        self.bind_mount_targets
            .iter()
            .any(|t| t.as_os_str() == "/usr")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_options() -> Options {
        Options {
            working_dir: PathBuf::from("/tmp/work"),
            bind_mount_sources: vec![],
            bind_mount_targets: vec![],
            tmpfs_dirs: vec![],
            writable_files: vec![],
            fake_root: false,
            fake_username: false,
            fake_hostname: false,
            create_netns: false,
            args: vec!["/bin/true".to_string()],
            global_outer_uid: 1000,
            global_outer_gid: 1000,
        }
    }

    #[test]
    fn rootfs_false_without_usr_target() {
        assert!(!base_options().rootfs());
    }

    #[test]
    fn rootfs_true_with_usr_target() {
        let mut opt = base_options();
        opt.bind_mount_sources.push(PathBuf::from("/real/usr"));
        opt.bind_mount_targets.push(PathBuf::from("/usr"));
        assert!(opt.rootfs());
    }

    #[test]
    fn rootfs_ignores_prefix_matches() {
        // "/usr-local" must not be confused with "/usr".
        let mut opt = base_options();
        opt.bind_mount_sources.push(PathBuf::from("/real"));
        opt.bind_mount_targets.push(PathBuf::from("/usr-local"));
        assert!(!opt.rootfs());
    }
}

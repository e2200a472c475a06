// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use nix::mount::{mount, MsFlags};

use crate::diag::{die, OrDie};
use crate::options::Options;
use crate::pathmaker::{copy, ensure, is_directory, Kind};

/// Process-wide state computed while assembling the sandbox filesystem.
///
/// `rootfs` and `sandbox_root_dir` satisfy the invariant
/// `rootfs ⇔ sandbox_root_dir != ""`.
pub(crate) struct FsState {
    pub sandbox_root_dir: PathBuf,
    pub rootfs: bool,
}

fn bind_mount(source: &Path, target: &Path, extra: MsFlags) {
    mount(
        Some(source),
        target,
        Option::<&Path>::None,
        MsFlags::MS_BIND | extra,
        Option::<&Path>::None,
    )
    .or_die(&format!(
        "mount({}, {}, NULL, MS_BIND, NULL)",
        source.display(),
        target.display()
    ));
}

fn mount_tmpfs(target: &Path) {
    mount(
        Some("tmpfs"),
        target,
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOATIME,
        Option::<&Path>::None,
    )
    .or_die(&format!(
        "mount(tmpfs, {}, tmpfs, MS_NOSUID|MS_NODEV|MS_NOATIME, NULL)",
        target.display()
    ));
}

/// Strips the leading `/` from an absolute path so it can be joined onto
/// the current directory, matching upstream's pointer-arithmetic trick of
/// skipping the first character of an absolute path string.
fn relative(absolute: &Path) -> &Path {
    absolute
        .strip_prefix("/")
        .expect("sandbox paths are always absolute")
}

/// Detects a rootfs layout, assembles tmpfs mounts, bind mounts, and
/// writable carve-outs. Returns the resulting [`FsState`].
pub(crate) fn assemble(opt: &Options) -> FsState {
    let rootfs = opt.rootfs();

    let sandbox_root_dir = if rootfs {
        // working_dir looks like .../<session>/execroot/<workspace>; the
        // sandbox root sits two path components up, with "root" appended.
        let grandparent = opt
            .working_dir
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| die("derive sandbox_root_dir", "working_dir too shallow"));
        let dir = grandparent.join("root");
        tracing::debug!(dir = %dir.display(), "sandbox root dir");

        ensure(&dir, Kind::Directory);
        bind_mount(&dir, &dir, MsFlags::MS_NOSUID);
        dir
    } else {
        PathBuf::new()
    };

    std::env::set_current_dir(if rootfs {
        &sandbox_root_dir
    } else {
        Path::new("/")
    })
    .or_die(&format!("chdir({}/)", sandbox_root_dir.display()));

    for tmpfs_dir in &opt.tmpfs_dirs {
        if rootfs && sandbox_root_dir.starts_with(tmpfs_dir) {
            // The sandbox root lives inside a directory we are about to
            // cover with tmpfs (e.g. /dev/shm). Preserve it by bind-mounting
            // the host directory aside (under its relative path) before
            // replacing it, then re-create working_dir inside the fresh
            // tmpfs and bind it back onto the absolute working_dir path.
            //
            // IMPORTANT: `sandbox_root_dir` keeps referring to the *old*
            // mount of `tmpfs_dir` after this; both mounts must exist
            // simultaneously for the upcoming pivot_root to work.
            tracing::debug!(dir = %tmpfs_dir.display(), "tmpfs overlaps with working dir");

            let rel = relative(tmpfs_dir);
            ensure(rel, Kind::Directory);
            bind_mount(tmpfs_dir, rel, MsFlags::empty());

            ensure(tmpfs_dir, Kind::Directory);
            mount_tmpfs(tmpfs_dir);

            ensure(&opt.working_dir, Kind::Directory);
            bind_mount(relative(&opt.working_dir), &opt.working_dir, MsFlags::empty());
        } else {
            tracing::debug!(dir = %tmpfs_dir.display(), "tmpfs");
            ensure(tmpfs_dir, Kind::Directory);
            mount_tmpfs(tmpfs_dir);
        }
    }

    // Make sure our working directory is itself a mount point, the easiest
    // way being to bind-mount it upon itself.
    tracing::debug!(dir = %opt.working_dir.display(), "working dir");
    let rel_working_dir = relative(&opt.working_dir);
    ensure(rel_working_dir, Kind::Directory);
    bind_mount(&opt.working_dir, rel_working_dir, MsFlags::empty());

    for (source, target) in opt.bind_mount_sources.iter().zip(&opt.bind_mount_targets) {
        let rel_target = relative(target);
        if target.as_os_str() == "/etc/hosts" {
            tracing::debug!(src = %source.display(), dst = %rel_target.display(), "copy");
            copy(source, rel_target);
            continue;
        }
        let kind = if is_directory(source) {
            Kind::Directory
        } else {
            Kind::RegularFile
        };
        ensure(rel_target, kind);
        tracing::debug!(src = %source.display(), dst = %target.display(), "bind mount");
        bind_mount(source, rel_target, MsFlags::MS_REC);
    }

    for writable_file in &opt.writable_files {
        tracing::debug!(file = %writable_file.display(), "writable");
        let rel = relative(writable_file);
        let kind = if is_directory(writable_file) {
            Kind::Directory
        } else {
            Kind::RegularFile
        };
        ensure(rel, kind);
        bind_mount(writable_file, rel, MsFlags::MS_REC);
    }

    FsState {
        sandbox_root_dir,
        rootfs,
    }
}

/// Creates `dev` and bind-mounts the essential host device files into it,
/// plus a `dev/fd` symlink to `/proc/self/fd`. Only runs under a rootfs
/// layout: without one, the sandbox shares the host's `/dev`.
pub(crate) fn setup_devices(state: &FsState) {
    if !state.rootfs {
        return;
    }

    ensure(Path::new("dev"), Kind::Directory);
    for dev in ["/dev/null", "/dev/random", "/dev/urandom", "/dev/zero"] {
        let rel = relative(Path::new(dev));
        ensure(rel, Kind::RegularFile);
        bind_mount(Path::new(dev), rel, MsFlags::empty());
    }

    std::os::unix::fs::symlink("/proc/self/fd", "dev/fd").or_die("symlink(/proc/self/fd, dev/fd)");
}

/// Returns whether the mount point `p` (an absolute path as read from
/// `/proc/self/mounts`) must remain writable after the read-only remount
/// pass.
fn should_be_writable(opt: &Options, state: &FsState, p: &Path) -> bool {
    if p == opt.working_dir {
        return true;
    }

    let Ok(tail) = p.strip_prefix(&state.sandbox_root_dir) else {
        return false;
    };

    if tail.as_os_str().is_empty() {
        return true;
    }

    let tail = Path::new("/").join(tail);
    opt.writable_files.contains(&tail) || opt.tmpfs_dirs.contains(&tail)
}

/// The closed set of mount options this implementation understands when
/// reconstructing flags from `/proc/self/mounts`. Matched as whole tokens,
/// never substrings.
const RECOGNIZED_OPTIONS: &[(&str, MsFlags)] = &[
    ("nodev", MsFlags::MS_NODEV),
    ("noexec", MsFlags::MS_NOEXEC),
    ("nosuid", MsFlags::MS_NOSUID),
    ("noatime", MsFlags::MS_NOATIME),
    ("nodiratime", MsFlags::MS_NODIRATIME),
    ("relatime", MsFlags::MS_RELATIME),
];

/// Reverses the escaping `/proc/self/mounts` applies to spaces, tabs,
/// backslashes, and newlines in paths (octal `\NNN` sequences).
fn unescape_mtab(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            if let Ok(code) = u8::from_str_radix(&field[i + 1..i + 4], 8) {
                out.push(code as char);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn parse_flags(options_field: &str) -> MsFlags {
    let mut flags = MsFlags::empty();
    for token in options_field.split(',') {
        for (name, flag) in RECOGNIZED_OPTIONS {
            if token == *name {
                flags |= *flag;
            }
        }
    }
    flags
}

/// Makes everything under `state.sandbox_root_dir` read-only, except the
/// mount points for which [`should_be_writable`] returns true.
pub(crate) fn make_mostly_readonly(opt: &Options, state: &FsState) {
    let file = File::open("/proc/self/mounts").or_die("open(/proc/self/mounts)");
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line.or_die("read(/proc/self/mounts)");
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let mount_point = PathBuf::from(unescape_mtab(fields[1]));

        if !mount_point.starts_with(&state.sandbox_root_dir) {
            continue;
        }

        let mut flags = MsFlags::MS_BIND | MsFlags::MS_REMOUNT | parse_flags(fields[3]);
        if !should_be_writable(opt, state, &mount_point) {
            flags |= MsFlags::MS_RDONLY;
        }

        tracing::debug!(
            mount = %mount_point.display(),
            mode = if flags.contains(MsFlags::MS_RDONLY) { "ro" } else { "rw" },
            "remount",
        );

        if let Err(e) = mount(
            Option::<&Path>::None,
            &mount_point,
            Option::<&Path>::None,
            flags,
            Option::<&Path>::None,
        ) {
            use nix::errno::Errno;
            // Inaccessible mounts, shadowed mounts, and stale NFS handles
            // are expected and harmless to skip.
            if !matches!(
                e,
                Errno::EACCES | Errno::EPERM | Errno::EINVAL | Errno::ENOENT | Errno::ESTALE
            ) {
                die(&format!("remount({}, {flags:?})", mount_point.display()), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(sandbox_root_dir: &str) -> FsState {
        FsState {
            sandbox_root_dir: PathBuf::from(sandbox_root_dir),
            rootfs: true,
        }
    }

    fn opt_for(working_dir: &str) -> Options {
        Options {
            working_dir: PathBuf::from(working_dir),
            bind_mount_sources: vec![],
            bind_mount_targets: vec![PathBuf::from("/usr")],
            tmpfs_dirs: vec![PathBuf::from("/tmp")],
            writable_files: vec![PathBuf::from("/output")],
            fake_root: false,
            fake_username: false,
            fake_hostname: false,
            create_netns: false,
            args: vec!["/bin/true".into()],
            global_outer_uid: 0,
            global_outer_gid: 0,
        }
    }

    #[test]
    fn working_dir_is_always_writable() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(should_be_writable(&opt, &state, &opt.working_dir));
    }

    #[test]
    fn root_itself_is_writable() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(should_be_writable(
            &opt,
            &state,
            Path::new("/sandbox/root")
        ));
    }

    #[test]
    fn writable_file_entry_is_writable() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(should_be_writable(
            &opt,
            &state,
            Path::new("/sandbox/root/output")
        ));
    }

    #[test]
    fn tmpfs_dir_entry_is_writable() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(should_be_writable(
            &opt,
            &state,
            Path::new("/sandbox/root/tmp")
        ));
    }

    #[test]
    fn unrelated_mount_point_is_read_only() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(!should_be_writable(
            &opt,
            &state,
            Path::new("/sandbox/root/usr")
        ));
    }

    #[test]
    fn mounts_outside_sandbox_root_are_never_writable() {
        let opt = opt_for("/sandbox/root/execroot/ws");
        let state = state_for("/sandbox/root");
        assert!(!should_be_writable(&opt, &state, Path::new("/proc")));
    }

    #[test]
    fn parse_flags_matches_whole_tokens_only() {
        // "noatime" must not be matched by the substring "atime" inside
        // "relatime", nor vice versa.
        let flags = parse_flags("relatime,nosuid");
        assert!(flags.contains(MsFlags::MS_RELATIME));
        assert!(flags.contains(MsFlags::MS_NOSUID));
        assert!(!flags.contains(MsFlags::MS_NOATIME));
    }

    #[test]
    fn parse_flags_ignores_unknown_tokens() {
        let flags = parse_flags("rw,noatime,unknown-option");
        assert_eq!(flags, MsFlags::MS_NOATIME);
    }

    #[test]
    fn unescape_mtab_handles_octal_space() {
        assert_eq!(unescape_mtab(r"/mnt/with\040space"), "/mnt/with space");
    }

    #[test]
    fn unescape_mtab_passes_through_plain_paths() {
        assert_eq!(unescape_mtab("/mnt/plain"), "/mnt/plain");
    }
}

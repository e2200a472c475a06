// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CString;
use std::path::{Path, PathBuf};

use nix::mount::{umount2, MntFlags};
use nix::unistd::{chdir, chroot, pivot_root};

use crate::diag::{die, OrDie};
use crate::filesystem::FsState;
use crate::options::Options;

/// Enters the pivoted sandbox root. Under a rootfs layout, this moves the
/// real root aside into a uniquely named temporary directory, pivots onto
/// the current directory, locks the view with `chroot`, then detaches and
/// removes the old root. Always finishes by `chdir`-ing into
/// `opt.working_dir`.
///
/// Requires that `opt.working_dir` and (when `state.rootfs`) the current
/// directory are already mount points — [`crate::filesystem::assemble`]
/// guarantees this.
pub(crate) fn enter_sandbox(opt: &Options, state: &FsState) {
    if state.rootfs {
        let old_root = make_old_root_dir();

        pivot_root(".", &old_root).or_die(&format!("pivot_root(., {})", old_root.display()));
        chroot(".").or_die("chroot(.)");
        umount2(&old_root, MntFlags::MNT_DETACH)
            .or_die(&format!("umount2({}, MNT_DETACH)", old_root.display()));
        std::fs::remove_dir(&old_root).or_die(&format!("rmdir({})", old_root.display()));
    }

    chdir(&opt.working_dir).or_die(&format!("chdir({})", opt.working_dir.display()));
}

/// Creates a uniquely named empty directory `tmp/old-root-XXXXXX` under the
/// current directory via `mkdtemp(3)`, the same primitive upstream uses.
fn make_old_root_dir() -> PathBuf {
    crate::pathmaker::ensure(Path::new("tmp"), crate::pathmaker::Kind::Directory);

    let template = CString::new("tmp/old-root-XXXXXX").unwrap();
    let mut buf = template.into_bytes_with_nul();

    // SAFETY: `buf` is NUL-terminated and owns its storage; mkdtemp writes
    // into the `XXXXXX` suffix in place and returns a pointer into `buf`
    // itself on success.
    let rc = unsafe { libc::mkdtemp(buf.as_mut_ptr().cast::<libc::c_char>()) };
    if rc.is_null() {
        die("mkdtemp(tmp/old-root-XXXXXX)", std::io::Error::last_os_error());
    }

    buf.truncate(buf.len() - 1); // drop the trailing NUL
    PathBuf::from(String::from_utf8(buf).expect("mkdtemp template is ASCII"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_root_dir_is_created_and_named_as_expected() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let a = make_old_root_dir();
        assert!(a.starts_with("tmp/old-root-"));
        assert!(dir.path().join(&a).is_dir());

        let b = make_old_root_dir();
        assert_ne!(a, b);

        std::fs::remove_dir(dir.path().join(&a)).unwrap();
        std::fs::remove_dir(dir.path().join(&b)).unwrap();
    }
}

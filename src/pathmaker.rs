// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

use crate::diag::{die, OrDie};

/// The kind of filesystem entry [`ensure`] should idempotently materialize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Directory,
    RegularFile,
}

/// Idempotently materializes `path` as `kind`, creating parent directories
/// (mode 0755) as needed. If `path` already exists with the matching kind,
/// this is a no-op. Any other outcome is an unrecoverable setup error.
pub(crate) fn ensure(path: &Path, kind: Kind) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let matches = match kind {
                Kind::Directory => meta.is_dir(),
                Kind::RegularFile => meta.is_file(),
            };
            if !matches {
                die(
                    &format!("ensure({}, {kind:?})", path.display()),
                    "path exists with the wrong kind",
                );
            }
            return;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => die(&format!("stat({})", path.display()), e),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure(parent, Kind::Directory);
        }
    }

    match kind {
        Kind::Directory => {
            let mut builder = std::fs::DirBuilder::new();
            builder.mode(0o755);
            match builder.create(path) {
                Ok(()) => {}
                // Another `ensure()` call for an overlapping ancestor may
                // have raced us; treat "already exists" as success.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => die(&format!("mkdir({}, 0755)", path.display()), e),
            }
        }
        Kind::RegularFile => {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o666)
                .open(path)
                .or_die(&format!("open({}, O_CREAT|O_EXCL, 0666)", path.display()));
        }
    }
}

/// Returns whether `path` is a directory. Aborts if `path` does not exist.
pub(crate) fn is_directory(path: &Path) -> bool {
    std::fs::metadata(path)
        .or_die(&format!("stat({})", path.display()))
        .is_dir()
}

/// Copies `src` to `dst`, creating `dst` exclusively (mode 0666). Used for
/// `/etc/hosts`, which must be writable rather than bind-mounted.
pub(crate) fn copy(src: &Path, dst: &Path) {
    let mut in_file =
        std::fs::File::open(src).or_die(&format!("open({}, O_RDONLY)", src.display()));
    let mut out_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o666)
        .open(dst)
        .or_die(&format!("open({}, O_CREAT|O_EXCL, 0666)", dst.display()));

    let mut buf = [0u8; 8192];
    loop {
        let n = match in_file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => die(
                &format!("read({} -> {})", src.display(), dst.display()),
                e,
            ),
        };
        out_file
            .write_all(&buf[..n])
            .or_die(&format!("write({} -> {})", src.display(), dst.display()));
    }

    drop(in_file);
    drop(out_file);
}

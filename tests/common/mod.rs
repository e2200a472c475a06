use std::path::PathBuf;
use std::process::{Command, Output};

/// Path to the built `sandbox-init` binary, provided by cargo for
/// integration tests.
pub fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sandbox-init"))
}

/// Whether this environment can actually create unprivileged user
/// namespaces. Several CI/sandbox environments disable this via
/// `kernel.unprivileged_userns_clone=0` or an LSM policy; tests that need a
/// real namespace skip themselves rather than fail when it is unavailable.
pub fn userns_available() -> bool {
    if let Ok(contents) = std::fs::read_to_string("/proc/sys/kernel/unprivileged_userns_clone") {
        if contents.trim() == "0" {
            return false;
        }
    }

    Command::new(binary())
        .args(["--working-dir", "/tmp", "--", "/bin/true"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Runs `sandbox-init` with the given arguments and returns its output.
pub fn run(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .output()
        .expect("failed to spawn sandbox-init")
}

/// Bind-mount flags that approximate a full host rootfs under the sandbox,
/// enough to make `/bin/sh` (and its dynamic loader) runnable after
/// `pivot_root`. Real sandboxes normally bind-mount a purpose-built toolchain
/// tree instead of the whole host; this is test-only scaffolding.
pub fn host_rootfs_bind_mounts() -> Vec<String> {
    ["/usr", "/bin", "/lib", "/lib64", "/etc"]
        .iter()
        .filter(|p| std::path::Path::new(p).exists())
        .map(|p| format!("--bind-mount={p}={p}"))
        .collect()
}

//! End-to-end scenarios exercising the built `sandbox-init` binary.
//!
//! These need a real kernel that allows unprivileged user namespaces; they
//! skip themselves (printing a message instead of failing) when that is not
//! available, since that is a property of the test environment, not a bug
//! in the sandbox.

mod common;

use std::os::unix::process::ExitStatusExt;

macro_rules! require_userns {
    () => {
        if !common::userns_available() {
            eprintln!("skipping: unprivileged user namespaces unavailable in this environment");
            return;
        }
    };
}

#[test]
fn trivial_no_rootfs_exits_zero() {
    require_userns!();

    let out = common::run(&["--working-dir", "/tmp", "--", "/bin/true"]);
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn child_exit_code_is_propagated() {
    require_userns!();

    let out = common::run(&[
        "--working-dir",
        "/tmp",
        "--",
        "/bin/sh",
        "-c",
        "exit 7",
    ]);
    assert_eq!(out.status.code(), Some(7));
}

#[test]
fn child_death_by_signal_maps_to_128_plus_signum() {
    require_userns!();

    let out = common::run(&[
        "--working-dir",
        "/tmp",
        "--",
        "/bin/sh",
        "-c",
        "kill -9 $$",
    ]);
    assert_eq!(out.status.code(), Some(137));
}

#[test]
fn etc_hosts_bind_mount_is_a_copy_not_a_mount() {
    require_userns!();

    let tmp = tempfile::tempdir().unwrap();
    let hosts_a = tmp.path().join("hosts-A");
    std::fs::write(&hosts_a, "127.0.0.1 localhost\n").unwrap();

    let mut args = vec!["--working-dir".to_string(), "/tmp".to_string()];
    args.extend(common::host_rootfs_bind_mounts());
    args.push(format!("--bind-mount={}=/etc/hosts", hosts_a.display()));
    args.push("--".to_string());
    args.push("/bin/sh".to_string());
    args.push("-c".to_string());
    args.push("echo appended >> /etc/hosts".to_string());

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = common::run(&arg_refs);
    assert_eq!(out.status.code(), Some(0));

    let after = std::fs::read_to_string(&hosts_a).unwrap();
    assert_eq!(after, "127.0.0.1 localhost\n");
}

#[test]
fn writable_carve_out_vs_read_only_rootfs() {
    require_userns!();

    let tmp = tempfile::tempdir().unwrap();
    let output_dir = tmp.path().join("output");
    std::fs::create_dir(&output_dir).unwrap();

    let mut args = vec!["--working-dir".to_string(), "/tmp".to_string()];
    args.extend(common::host_rootfs_bind_mounts());
    args.push(format!("--bind-mount={}=/output", output_dir.display()));
    args.push("--writable-file=/output".to_string());
    args.push("--".to_string());
    args.push("/bin/sh".to_string());
    args.push("-c".to_string());
    args.push(
        "echo ok > /output/x && { echo ok > /usr/x 2>/dev/null && exit 1 || exit 0; }".to_string(),
    );

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = common::run(&arg_refs);
    assert_eq!(out.status.code(), Some(0));
    assert!(output_dir.join("x").exists());
}

#[test]
fn sigusr1_is_forwarded_without_killing_pid1() {
    require_userns!();

    // The child blocks on `read`, traps SIGUSR1, and on receiving it writes
    // a marker before exiting cleanly. If PID 1 died instead of forwarding
    // the signal, the process would exit by a different code/signal.
    let out = common::run(&[
        "--working-dir",
        "/tmp",
        "--",
        "/bin/sh",
        "-c",
        "trap 'exit 42' USR1; kill -USR1 $$; sleep 5",
    ]);

    assert!(out.status.signal().is_none(), "PID 1 must not die from SIGUSR1");
    assert_eq!(out.status.code(), Some(42));
}

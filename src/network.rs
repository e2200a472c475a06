// Copyright 2026 The Sandbox Init Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::fd::AsRawFd;

use nix::sys::socket::{socket, AddressFamily, SockFlag, SockType};

use crate::diag::{die, OrDie};
use crate::options::Options;

/// When `opt.create_netns` is set, brings up the loopback interface so
/// applications that assume `lo` is usable (e.g. connecting to
/// `127.0.0.1`) keep working inside an otherwise networkless namespace.
pub(crate) fn setup_networking(opt: &Options) {
    if !opt.create_netns {
        return;
    }

    let sock = socket(AddressFamily::Inet, SockType::Datagram, SockFlag::empty(), None)
        .or_die("socket(AF_INET, SOCK_DGRAM)");

    let mut ifr_name = [0 as libc::c_char; libc::IFNAMSIZ];
    for (dst, src) in ifr_name.iter_mut().zip(b"lo".iter()) {
        *dst = *src as libc::c_char;
    }
    let mut ifreq = libc::ifreq {
        ifr_name,
        ifr_ifru: libc::__c_anonymous_ifr_ifru { ifru_flags: 0 },
    };

    // SAFETY: `ifreq` is a plain-old-data struct sized and laid out exactly
    // as the kernel ioctl expects; `sock` outlives both calls.
    if unsafe { libc::if_nametoindex(ifreq.ifr_name.as_ptr()) } == 0 {
        die("if_nametoindex(lo)", std::io::Error::last_os_error());
    }

    let rc = unsafe { libc::ioctl(sock.as_raw_fd(), libc::SIOCGIFFLAGS, &mut ifreq) };
    if rc < 0 {
        die("ioctl(SIOCGIFFLAGS)", std::io::Error::last_os_error());
    }

    unsafe {
        ifreq.ifr_ifru.ifru_flags |= libc::IFF_UP as libc::c_short;
    }

    let rc = unsafe { libc::ioctl(sock.as_raw_fd(), libc::SIOCSIFFLAGS, &ifreq) };
    if rc < 0 {
        die("ioctl(SIOCSIFFLAGS)", std::io::Error::last_os_error());
    }

    drop(sock);
}

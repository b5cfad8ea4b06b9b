//! Interface address lookup
//!
//! Thin wrapper around `getifaddrs(3)` returning the addresses worth
//! publishing in DNS.

use std::net::IpAddr;

/// Whether an address may be published as the host's A/AAAA record
///
/// Loopback, link-local, unspecified and multicast addresses are skipped.
pub fn is_publishable(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_loopback() || v4.is_link_local() || v4.is_unspecified() || v4.is_multicast())
        }
        IpAddr::V6(v6) => {
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || link_local || v6.is_unspecified() || v6.is_multicast())
        }
    }
}

/// Publishable addresses configured on interface `name`
#[cfg(unix)]
pub fn interface_addresses(name: &str) -> std::io::Result<Vec<IpAddr>> {
    use std::ffi::CStr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `head` is a valid out-pointer; on success it owns a list that
    // is released with freeifaddrs below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut addrs = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: `cursor` points into the list returned by getifaddrs,
        // which stays alive until freeifaddrs.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_name.is_null() || entry.ifa_addr.is_null() {
            continue;
        }
        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let ifname = unsafe { CStr::from_ptr(entry.ifa_name) };
        if ifname.to_bytes() != name.as_bytes() {
            continue;
        }
        // SAFETY: ifa_addr is non-null and points to a sockaddr owned by the list.
        if let Some(addr) = unsafe { sockaddr_ip(entry.ifa_addr) } {
            if is_publishable(&addr) {
                addrs.push(addr);
            }
        }
    }

    // SAFETY: `head` came from a successful getifaddrs and is freed exactly once.
    unsafe { libc::freeifaddrs(head) };

    Ok(addrs)
}

#[cfg(not(unix))]
pub fn interface_addresses(_name: &str) -> std::io::Result<Vec<IpAddr>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "interface enumeration is only supported on unix",
    ))
}

/// # Safety
///
/// `addr` must point to a valid `sockaddr` whose storage matches its family.
#[cfg(unix)]
unsafe fn sockaddr_ip(addr: *const libc::sockaddr) -> Option<IpAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr};

    // SAFETY: guaranteed by the caller.
    let family = unsafe { (*addr).sa_family } as libc::c_int;
    match family {
        libc::AF_INET => {
            // SAFETY: AF_INET entries are backed by sockaddr_in.
            let sin = unsafe { &*(addr as *const libc::sockaddr_in) };
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            // SAFETY: AF_INET6 entries are backed by sockaddr_in6.
            let sin6 = unsafe { &*(addr as *const libc::sockaddr_in6) };
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}

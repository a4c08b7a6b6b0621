// Copyright (C) 2025 rrrrrzy
// SPDX-License-Identifier: GPL-3.0-or-later
//
// --------------------------------------------------
// 致敬所有在深夜调试代码的灵魂。
// 即便 Bug 如山，我亦往矣。
// --------------------------------------------------
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Linux 后端：打开 `/dev/net/tun`，再用 `TUNSETIFF` 配置接口

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::time::Duration;

use libc::{IFF_NO_PI, IFF_TAP, IFF_TUN, IFNAMSIZ, c_char, c_int, c_short, c_void};
use tracing::{debug, warn};

use super::{Backend, Descriptor, MAX_NAME_LEN, Mode};
use crate::error::{DeviceError, Result};

pub const CLONE_DEVICE: &str = "/dev/net/tun";

/// `_IOW('T', 202, int)`
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

/// `struct ifreq`，只用到名字和标志位
#[repr(C)]
struct IfReq {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_flags: c_short,
    _pad: [u8; 22],
}

impl IfReq {
    fn new(name: &str, mode: Mode, packet_info: bool) -> Self {
        let mut flags = match mode {
            Mode::Tun => IFF_TUN,
            Mode::Tap => IFF_TAP,
        };
        if !packet_info {
            flags |= IFF_NO_PI;
        }

        let mut ifr = Self {
            ifr_name: [0; IFNAMSIZ],
            ifr_flags: flags as c_short,
            _pad: [0; 22],
        };
        for (slot, byte) in ifr.ifr_name.iter_mut().zip(name.bytes().take(MAX_NAME_LEN)) {
            *slot = byte as c_char;
        }
        ifr
    }

    fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .ifr_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// 通过克隆设备创建接口，默认是 `/dev/net/tun`
#[derive(Debug, Clone)]
pub struct LinuxTun {
    clone_device: PathBuf,
}

impl Default for LinuxTun {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTun {
    pub fn new() -> Self {
        Self::with_clone_device(CLONE_DEVICE)
    }

    pub fn with_clone_device(path: impl Into<PathBuf>) -> Self {
        Self {
            clone_device: path.into(),
        }
    }

    fn open_clone_device(&self) -> Result<OwnedFd> {
        let unavailable = |source| DeviceError::DeviceUnavailable {
            path: self.clone_device.display().to_string(),
            source,
        };

        let path = CString::new(self.clone_device.as_os_str().as_bytes())
            .map_err(|err| unavailable(io::Error::new(io::ErrorKind::InvalidInput, err)))?;
        // SAFETY: `path` is a NUL-terminated string that outlives the call.
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(unavailable(io::Error::last_os_error()));
        }
        // SAFETY: `fd` was just returned by open(2) and is owned by nobody else.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

impl Backend for LinuxTun {
    type Descriptor = TunFd;

    fn open(&mut self, name: &str, mode: Mode, packet_info: bool) -> Result<(TunFd, String)> {
        if name.len() > MAX_NAME_LEN {
            warn!(
                "interface name {:?} is longer than {} bytes, truncating",
                name, MAX_NAME_LEN
            );
        }

        let fd = self.open_clone_device()?;
        let mut ifr = IfReq::new(name, mode, packet_info);

        // 失败时 `fd` 被 drop，克隆设备随之关闭
        let request = &mut ifr as *mut IfReq as *mut c_void;
        // SAFETY: `fd` is open and `request` points to a live, `ifreq`-sized `IfReq`.
        if unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF as _, request) } < 0 {
            return Err(DeviceError::ConfigurationRejected(io::Error::last_os_error()));
        }

        let assigned = ifr.name();
        debug!("TUNSETIFF assigned {} (flags {:#06x})", assigned, ifr.ifr_flags);
        Ok((TunFd { fd }, assigned))
    }
}

/// 已打开的 TUN/TAP 描述符
#[derive(Debug)]
pub struct TunFd {
    fd: OwnedFd,
}

impl AsRawFd for TunFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Descriptor for TunFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ptr = buf.as_mut_ptr() as *mut c_void;
        // SAFETY: `ptr` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(self.fd.as_raw_fd(), ptr, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(c_int::MAX as u128) as c_int;

        // SAFETY: `pfd` is a single valid pollfd for the duration of the call.
        match unsafe { libc::poll(&mut pfd, 1, millis) } {
            n if n < 0 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    fn close(self) -> io::Result<()> {
        let fd = self.fd.into_raw_fd();
        // SAFETY: ownership of `fd` was released above, so it is closed exactly once.
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_clone_device_is_unavailable() {
        let mut backend = LinuxTun::with_clone_device("/nonexistent/net/tun");
        let err = backend.open("", Mode::Tun, true).unwrap_err();
        match err {
            DeviceError::DeviceUnavailable { path, source } => {
                assert_eq!(path, "/nonexistent/net/tun");
                assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
            }
            other => panic!("expected DeviceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn ifreq_flags() {
        assert_eq!(IfReq::new("", Mode::Tun, true).ifr_flags, IFF_TUN as c_short);
        assert_eq!(
            IfReq::new("", Mode::Tap, false).ifr_flags,
            (IFF_TAP | IFF_NO_PI) as c_short
        );
    }

    #[test]
    fn ifreq_name_is_truncated_and_terminated() {
        let ifr = IfReq::new("averyveryverylongname", Mode::Tun, true);
        assert_eq!(ifr.name(), "averyveryverylo");
        assert_eq!(ifr.ifr_name[IFNAMSIZ - 1], 0);
        assert_eq!(IfReq::new("dump0", Mode::Tap, true).name(), "dump0");
    }

    #[test]
    fn ifreq_matches_kernel_layout() {
        assert_eq!(std::mem::size_of::<IfReq>(), 40);
    }
}

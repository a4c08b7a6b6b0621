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

//! 虚拟网卡句柄
//!
//! `DeviceHandle` 持有打开的描述符，生命周期为
//! `Unopened -> open -> Opened -> close -> Unopened`。
//! 内核侧藏在 [`Backend`] / [`Descriptor`] 两个 trait 后面，
//! Linux 下走克隆设备，测试里走内存后端。

#[cfg(target_os = "linux")]
mod linux;

#[cfg(test)]
pub(crate) mod dummy;

#[cfg(target_os = "linux")]
pub use linux::{CLONE_DEVICE, LinuxTun, TunFd};

use std::io;
use std::time::Duration;

use protocol::LinkLayer;
use tracing::{debug, info};

use crate::error::{DeviceError, Result};
use crate::frame::{Frame, MAX_BUFFER};

/// 内核接受的最长接口名，不含结尾的 NUL
pub const MAX_NAME_LEN: usize = libc::IFNAMSIZ - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// 三层包，没有链路层头
    #[default]
    Tun,
    /// 完整的以太网帧
    Tap,
}

impl Mode {
    pub fn link_layer(self) -> LinkLayer {
        match self {
            Mode::Tun => LinkLayer::RawIp,
            Mode::Tap => LinkLayer::Ethernet,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Tun => write!(f, "tun"),
            Mode::Tap => write!(f, "tap"),
        }
    }
}

pub trait Backend {
    type Descriptor: Descriptor;

    /// 创建接口，`name` 为空时由内核取名
    ///
    /// 返回描述符和实际分配的名字
    fn open(
        &mut self,
        name: &str,
        mode: Mode,
        packet_info: bool,
    ) -> Result<(Self::Descriptor, String)>;
}

pub trait Descriptor {
    /// 一次底层读取，最多 `buf.len()` 字节
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// 阻塞到有帧可读或超时，超时返回 `Ok(false)`
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;

    fn close(self) -> io::Result<()>;
}

pub struct DeviceHandle<B: Backend> {
    backend: B,
    name: String,
    descriptor: Option<B::Descriptor>,
    mode: Mode,
    packet_info: bool,
}

impl<B: Backend> DeviceHandle<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            name: String::new(),
            descriptor: None,
            mode: Mode::default(),
            packet_info: true,
        }
    }

    /// 打开接口，返回内核分配的名字
    pub fn open(&mut self, requested: &str, mode: Mode, packet_info: bool) -> Result<&str> {
        if self.descriptor.is_some() {
            return Err(DeviceError::AlreadyOpen(self.name.clone()));
        }

        let (descriptor, name) = self.backend.open(requested, mode, packet_info)?;
        info!(
            "opened {} device {} (packet information {})",
            mode,
            name,
            if packet_info { "on" } else { "off" }
        );

        self.descriptor = Some(descriptor);
        self.name = name;
        self.mode = mode;
        self.packet_info = packet_info;
        Ok(&self.name)
    }

    /// 读一帧，最多 `max_size` 字节（启用时含 PI 头）
    pub fn read(&mut self, max_size: usize) -> Result<Frame> {
        let descriptor = self.descriptor.as_mut().ok_or(DeviceError::Closed)?;
        if max_size > MAX_BUFFER {
            return Err(DeviceError::BufferTooLarge {
                requested: max_size,
                maximum: MAX_BUFFER,
            });
        }

        let mut buf = vec![0u8; max_size];
        let len = descriptor.read(&mut buf)?;
        buf.truncate(len);
        debug!("read {} bytes from {}", len, self.name);

        Frame::from_read(buf, self.packet_info)
    }

    pub fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let descriptor = self.descriptor.as_ref().ok_or(DeviceError::Closed)?;
        Ok(descriptor.wait_readable(timeout)?)
    }

    pub fn close(&mut self) -> Result<()> {
        let descriptor = self.descriptor.take().ok_or(DeviceError::AlreadyClosed)?;
        info!("closing device {}", self.name);
        self.name.clear();
        descriptor.close()?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.descriptor.is_some()
    }

    /// 未打开时为空
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn packet_info(&self) -> bool {
        self.packet_info
    }
}

#[cfg(test)]
mod tests {
    use super::dummy::DummyTun;
    use super::*;

    #[test]
    fn open_assigns_a_name() {
        let mut device = DeviceHandle::new(DummyTun::new());
        let name = device.open("", Mode::Tun, true).unwrap().to_string();
        assert!(!name.is_empty());
        assert_eq!(device.name(), name);
        assert!(device.is_open());
        assert_eq!(device.mode(), Mode::Tun);
        assert!(device.packet_info());
    }

    #[test]
    fn requested_name_is_kept() {
        let mut device = DeviceHandle::new(DummyTun::new());
        assert_eq!(device.open("dump0", Mode::Tap, false).unwrap(), "dump0");
    }

    #[test]
    fn second_open_is_rejected() {
        let mut device = DeviceHandle::new(DummyTun::new());
        device.open("", Mode::Tun, true).unwrap();
        let err = device.open("other", Mode::Tap, false).unwrap_err();
        assert!(matches!(err, DeviceError::AlreadyOpen(ref name) if name == "tun0"));
        assert_eq!(device.name(), "tun0");
        assert_eq!(device.mode(), Mode::Tun);
    }

    #[test]
    fn rejected_configuration_leaves_handle_unopened() {
        let mut device = DeviceHandle::new(DummyTun::rejecting());
        let err = device.open("", Mode::Tap, true).unwrap_err();
        assert!(matches!(err, DeviceError::ConfigurationRejected(_)));
        assert!(!device.is_open());
        assert!(matches!(device.read(1500), Err(DeviceError::Closed)));
    }

    #[test]
    fn short_read_with_packet_info_is_truncated() {
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(vec![0x00, 0x00, 0x08]));
        device.open("", Mode::Tun, true).unwrap();
        let err = device.read(1500).unwrap_err();
        assert!(matches!(err, DeviceError::Truncated { got: 3, needed: 4 }));
        assert!(!err.is_fatal());
        assert!(device.is_open());
    }

    #[test]
    fn read_splits_packet_info() {
        let mut bytes = vec![0x00, 0x00, 0x86, 0xDD];
        bytes.extend_from_slice(&[0x60; 40]);
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(bytes));
        device.open("", Mode::Tun, true).unwrap();
        let frame = device.read(1500).unwrap();
        assert_eq!(frame.info().map(|pi| pi.protocol), Some(0x86DD));
        assert_eq!(frame.len(), 40);
    }

    #[test]
    fn read_never_exceeds_max_size() {
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(vec![0xEE; 200]));
        device.open("", Mode::Tap, false).unwrap();
        let frame = device.read(64).unwrap();
        assert!(frame.info().is_none());
        assert_eq!(frame.len(), 64);
    }

    #[test]
    fn oversized_read_is_rejected_before_allocating() {
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(vec![0; 64]));
        device.open("", Mode::Tap, false).unwrap();
        assert!(matches!(
            device.read(usize::MAX),
            Err(DeviceError::BufferTooLarge { maximum: MAX_BUFFER, .. })
        ));
        assert_eq!(device.read(MAX_BUFFER).unwrap().len(), 64);
    }

    #[test]
    fn io_errors_propagate_with_code() {
        let mut device = DeviceHandle::new(DummyTun::new().with_error(libc::EIO));
        device.open("", Mode::Tun, true).unwrap();
        let err = device.read(1500).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.os_code(), Some(libc::EIO));
    }

    #[test]
    fn double_close_is_reported() {
        let mut device = DeviceHandle::new(DummyTun::new());
        device.open("", Mode::Tun, true).unwrap();
        device.close().unwrap();
        assert!(!device.is_open());
        assert_eq!(device.name(), "");

        assert!(matches!(device.close(), Err(DeviceError::AlreadyClosed)));
        assert!(!device.is_open());
        assert_eq!(device.name(), "");
    }

    #[test]
    fn read_after_close_is_closed() {
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(vec![0; 64]));
        device.open("", Mode::Tun, false).unwrap();
        device.close().unwrap();
        assert!(matches!(device.read(1500), Err(DeviceError::Closed)));
        assert!(matches!(
            device.wait_readable(Duration::from_millis(1)),
            Err(DeviceError::Closed)
        ));
    }

    #[test]
    fn reopen_after_close() {
        let mut device = DeviceHandle::new(DummyTun::new());
        device.open("", Mode::Tun, true).unwrap();
        device.close().unwrap();
        assert_eq!(device.open("", Mode::Tap, false).unwrap(), "tap1");
    }

    #[test]
    fn mode_selects_link_layer() {
        assert_eq!(Mode::Tun.link_layer(), LinkLayer::RawIp);
        assert_eq!(Mode::Tap.link_layer(), LinkLayer::Ethernet);
    }
}

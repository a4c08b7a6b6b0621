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

//! 一次读取对应一帧

use std::time::Duration;

use protocol::cursor::Cursor;
use protocol::decode::MAX_HEADER_CHAIN;
use protocol::packet_info::PacketInfo;
use protocol::{HeaderChain, LinkLayer, decode_chain};
use static_assertions::const_assert;

use crate::device::{Backend, DeviceHandle};
use crate::error::{DeviceError, Result};

/// 最小缓冲：PI 头 + 最长的头部链（以太网 + 802.1Q + IPv6）
pub const MIN_BUFFER: usize = PacketInfo::LEN + MAX_HEADER_CHAIN;

/// 最大缓冲：PI 头 + IPv4 总长度字段能表示的最大包
pub const MAX_BUFFER: usize = PacketInfo::LEN + u16::MAX as usize;
const_assert!(MIN_BUFFER < MAX_BUFFER);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    info: Option<PacketInfo>,
    payload: Vec<u8>,
}

impl Frame {
    pub fn new(info: Option<PacketInfo>, payload: Vec<u8>) -> Self {
        Self { info, payload }
    }

    /// 拆分一次读取的字节，`buf` 已截断到实际读到的长度
    pub fn from_read(mut buf: Vec<u8>, packet_info: bool) -> Result<Self> {
        if !packet_info {
            return Ok(Self::new(None, buf));
        }

        let info = PacketInfo::decode(&mut Cursor::new(&buf)).map_err(|_| {
            DeviceError::Truncated {
                got: buf.len(),
                needed: PacketInfo::LEN,
            }
        })?;
        buf.drain(..PacketInfo::LEN);
        Ok(Self::new(Some(info), buf))
    }

    pub fn info(&self) -> Option<PacketInfo> {
        self.info
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn decode(&self, link: LinkLayer) -> HeaderChain<'_> {
        decode_chain(&self.payload, self.info, link)
    }
}

/// 以固定大小的缓冲从已打开的设备读帧
pub struct FrameReader<'d, B: Backend> {
    device: &'d mut DeviceHandle<B>,
    buffer: usize,
}

impl<'d, B: Backend> FrameReader<'d, B> {
    pub fn new(device: &'d mut DeviceHandle<B>, buffer: usize) -> Result<Self> {
        if buffer < MIN_BUFFER {
            return Err(DeviceError::BufferTooSmall {
                requested: buffer,
                minimum: MIN_BUFFER,
            });
        }
        if buffer > MAX_BUFFER {
            return Err(DeviceError::BufferTooLarge {
                requested: buffer,
                maximum: MAX_BUFFER,
            });
        }
        Ok(Self { device, buffer })
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        self.device.read(self.buffer)
    }

    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        self.device.wait_readable(timeout)
    }

    pub fn link_layer(&self) -> LinkLayer {
        self.device.mode().link_layer()
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn buffer(&self) -> usize {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Mode;
    use crate::device::dummy::DummyTun;

    #[test]
    fn minimum_buffer_covers_header_chain() {
        assert_eq!(MIN_BUFFER, 4 + 14 + 4 + 40);
    }

    #[test]
    fn small_buffer_is_rejected() {
        let mut device = DeviceHandle::new(DummyTun::new());
        device.open("", Mode::Tap, true).unwrap();
        let err = FrameReader::new(&mut device, MIN_BUFFER - 1).err().unwrap();
        assert!(matches!(
            err,
            DeviceError::BufferTooSmall {
                requested: 61,
                minimum: 62
            }
        ));
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let mut device = DeviceHandle::new(DummyTun::new());
        device.open("", Mode::Tap, true).unwrap();
        assert!(FrameReader::new(&mut device, MAX_BUFFER).is_ok());
        let err = FrameReader::new(&mut device, usize::MAX).err().unwrap();
        assert!(matches!(
            err,
            DeviceError::BufferTooLarge {
                requested: usize::MAX,
                maximum: 65539
            }
        ));
    }

    #[test]
    fn packet_info_round_trip() {
        let info = PacketInfo::new(0x0001, 0x0800);
        let mut bytes = info.to_bytes().to_vec();
        bytes.extend_from_slice(&[0x45; 20]);

        let frame = Frame::from_read(bytes, true).unwrap();
        assert_eq!(frame.info(), Some(info));
        assert_eq!(frame.len(), 20);
    }

    #[test]
    fn packet_info_only_gives_empty_payload() {
        let frame = Frame::from_read(vec![0, 0, 0x08, 0x00], true).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.info().map(|pi| pi.protocol), Some(0x0800));
    }

    #[test]
    fn without_packet_info_everything_is_payload() {
        let frame = Frame::from_read(vec![1, 2, 3], false).unwrap();
        assert!(frame.info().is_none());
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }

    #[test]
    fn empty_read_with_packet_info_is_truncated() {
        assert!(matches!(
            Frame::from_read(Vec::new(), true),
            Err(DeviceError::Truncated { got: 0, needed: 4 })
        ));
    }

    #[test]
    fn reader_uses_device_mode() {
        let mut device = DeviceHandle::new(DummyTun::new().with_frame(vec![0; 80]));
        device.open("", Mode::Tap, false).unwrap();
        let mut reader = FrameReader::new(&mut device, 64).unwrap();
        assert_eq!(reader.link_layer(), LinkLayer::Ethernet);
        assert_eq!(reader.device_name(), "tap0");
        assert!(reader.wait(Duration::ZERO).unwrap());
        assert_eq!(reader.next_frame().unwrap().len(), 64);
        assert!(!reader.wait(Duration::ZERO).unwrap());
    }
}

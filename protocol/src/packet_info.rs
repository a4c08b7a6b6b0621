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

//! TUN/TAP 读出的每一帧前可选的 4 字节包信息头（内核的 `struct tun_pi`）。

use crate::cursor::Cursor;
use crate::error::{DecodeError, Layer};
use crate::ethernet::EtherType;

/// 内核在缓冲区太小、帧被截断时置位
pub const TUN_PKT_STRIP: u16 = 0x0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketInfo {
    /// 设备定义的标志位，原样保存（主机字节序写入，不做转换）
    pub flags: u16,
    /// 已转换为主机字节序
    pub protocol: u16,
}

impl PacketInfo {
    pub const LEN: usize = 4;

    pub fn new(flags: u16, protocol: u16) -> Self {
        Self { flags, protocol }
    }

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let mut c = cursor.for_layer(Layer::PacketInfo);
        c.ensure(Self::LEN)?;

        let flags = u16::from_ne_bytes(c.read_array()?);
        let protocol = c.read_be_u16()?;

        *cursor = c;
        Ok(Self { flags, protocol })
    }

    pub fn ethertype(&self) -> EtherType {
        EtherType::from(self.protocol)
    }

    pub fn is_stripped(&self) -> bool {
        self.flags & TUN_PKT_STRIP != 0
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0..2].copy_from_slice(&self.flags.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.protocol.to_be_bytes());
        bytes
    }
}

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

use crate::cursor::Cursor;
use crate::error::{DecodeError, Layer};
use std::fmt;
use std::net::Ipv6Addr;

/// IPv6 固定头部，40 字节，没有派生长度字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32, // 20 bits
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

impl Ipv6Header {
    pub const LEN: usize = 40;

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let mut c = cursor.for_layer(Layer::Ipv6);
        c.ensure(Self::LEN)?;

        // version(4) | traffic class(8) | flow label(20)
        let word = c.read_be_u32()?;
        let payload_len = c.read_be_u16()?;
        let next_header = c.read_u8()?;
        let hop_limit = c.read_u8()?;
        let src = Ipv6Addr::from(c.read_array::<16>()?);
        let dst = Ipv6Addr::from(c.read_array::<16>()?);

        *cursor = c;
        Ok(Self {
            version: (word >> 28) as u8,
            traffic_class: (word >> 20) as u8,
            flow_label: word & 0x000F_FFFF,
            payload_len,
            next_header,
            hop_limit,
            src,
            dst,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Cursor::new(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 40] {
        let mut bytes = [0u8; 40];
        let word = ((self.version as u32 & 0x0F) << 28)
            | ((self.traffic_class as u32) << 20)
            | (self.flow_label & 0x000F_FFFF);
        bytes[0..4].copy_from_slice(&word.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes[6] = self.next_header;
        bytes[7] = self.hop_limit;
        bytes[8..24].copy_from_slice(&self.src.octets());
        bytes[24..40].copy_from_slice(&self.dst.octets());
        bytes
    }
}

impl fmt::Display for Ipv6Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv6 Header:
    Version: {}
    Traffic Class: {:#04x}
    Flow Label: {:#07x}
    Payload Length: {}
    Next Header: {}
    Hop Limit: {}
    Source: {}
    Destination: {}",
            self.version,
            self.traffic_class,
            self.flow_label,
            self.payload_len,
            self.next_header,
            self.hop_limit,
            self.src,
            self.dst
        )
    }
}

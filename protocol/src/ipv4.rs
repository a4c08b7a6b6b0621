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
use crate::error::{DecodeError, Layer, Malformation};
use std::fmt;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header<'a> {
    pub version: u8,      // 4 bits
    pub ihl: u8,          // 4 bits (Internet Header Length, 单位 4 字节)
    pub dscp: u8,         // 6 bits
    pub ecn: u8,          // 2 bits
    pub total_len: u16,   // Total length
    pub id: u16,          // Identification
    pub flags: u8,        // 3 bits (R, DF, MF)
    pub frag_offset: u16, // 13 bits
    pub ttl: u8,          // Time to live
    pub protocol: u8,     // Protocol (TCP = 6, UDP = 17, ICMP = 1)
    pub checksum: u16,    // Header checksum, 不做校验
    pub src: Ipv4Addr,    // Source address
    pub dst: Ipv4Addr,    // Destination address
    pub options: &'a [u8], // Option + fill, 指向原始帧
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Protocol {
    ICMP,
    TCP,
    UDP,
    Unknown,
}

impl<'a> Ipv4Header<'a> {
    pub const MIN_LEN: usize = 20;

    /// 字段全部读出之后再检查 IHL：小于 20、超过剩余字节或超过总长度都算畸形。
    pub fn decode(cursor: &mut Cursor<'a>) -> Result<Self, DecodeError> {
        let available = cursor.remaining();
        let mut c = cursor.for_layer(Layer::Ipv4);
        c.ensure(Self::MIN_LEN)?;

        let first = c.read_u8()?;
        let version = first >> 4;
        let ihl = first & 0x0F;
        let tos = c.read_u8()?;
        let total_len = c.read_be_u16()?;
        let id = c.read_be_u16()?;
        let fragment = c.read_be_u16()?;
        let ttl = c.read_u8()?;
        let protocol = c.read_u8()?;
        let checksum = c.read_be_u16()?;
        let src = Ipv4Addr::from(c.read_array::<4>()?);
        let dst = Ipv4Addr::from(c.read_array::<4>()?);

        let header_len = ihl as usize * 4;
        let malformed = |reason| DecodeError::Malformed {
            layer: Layer::Ipv4,
            reason,
        };
        if header_len < Self::MIN_LEN {
            return Err(malformed(Malformation::HeaderTooShort { header_len }));
        }
        if header_len > available {
            return Err(malformed(Malformation::HeaderPastEnd {
                header_len,
                available,
            }));
        }
        if header_len > total_len as usize {
            return Err(malformed(Malformation::HeaderPastTotal {
                header_len,
                total_len,
            }));
        }
        let options = c.take(header_len - Self::MIN_LEN)?;

        *cursor = c;
        Ok(Self {
            version,
            ihl,
            dscp: tos >> 2,
            ecn: tos & 0b11,
            total_len,
            id,
            flags: (fragment >> 13) as u8,
            frag_offset: fragment & 0x1FFF,
            ttl,
            protocol,
            checksum,
            src,
            dst,
            options,
        })
    }

    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Cursor::new(bytes).for_layer(Layer::Ipv4))
    }

    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    pub fn payload_len(&self) -> usize {
        (self.total_len as usize).saturating_sub(self.header_len())
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags & 0b010 != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags & 0b001 != 0
    }

    pub fn get_protocol(&self) -> Ipv4Protocol {
        match self.protocol {
            1 => Ipv4Protocol::ICMP,
            6 => Ipv4Protocol::TCP,
            17 => Ipv4Protocol::UDP,
            _ => Ipv4Protocol::Unknown,
        }
    }

    /// 只输出固定的 20 字节，选项部分不编码
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut bytes: [u8; 20] = [0; 20];
        bytes[0] = (self.version << 4) | (self.ihl & 0x0F);
        bytes[1] = (self.dscp << 2) | (self.ecn & 0b11);
        bytes[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.id.to_be_bytes());
        let fragment = ((self.flags as u16) << 13) | (self.frag_offset & 0x1FFF);
        bytes[6..8].copy_from_slice(&fragment.to_be_bytes());
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        bytes[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.src.octets());
        bytes[16..20].copy_from_slice(&self.dst.octets());

        bytes
    }
}

impl fmt::Display for Ipv4Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4 Header:
    Version: {}
    IHL: {} ({} bytes)
    DSCP: {}  ECN: {}
    Total Length: {} (payload {})
    Identification: {}
    Flags: {:03b} (DF={}, MF={})
    Fragment Offset: {}
    TTL: {}
    Protocol: {} ({:?})
    Checksum: {:#06x}
    Source: {}
    Destination: {}",
            self.version,
            self.ihl,
            self.header_len(),
            self.dscp,
            self.ecn,
            self.total_len,
            self.payload_len(),
            self.id,
            self.flags,
            u8::from(self.dont_fragment()),
            u8::from(self.more_fragments()),
            self.frag_offset,
            self.ttl,
            self.protocol,
            self.get_protocol(),
            self.checksum,
            self.src,
            self.dst
        )
    }
}

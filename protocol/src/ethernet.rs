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
use crate::mac::MacAddr;
use std::fmt;

#[repr(C, u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    Ipv4 = 0x0800,
    Arp = 0x0806,
    Vlan = 0x8100,
    Ipv6 = 0x86DD,
    Unknown(u16),
}

impl EtherType {
    /// IP 版本号推断协议，TUN 设备没有 PI 头时使用
    pub fn from_ip_version(version: u8) -> Option<Self> {
        match version {
            4 => Some(EtherType::Ipv4),
            6 => Some(EtherType::Ipv6),
            _ => None,
        }
    }

    pub fn value(self) -> u16 {
        self.into()
    }
}

impl From<u16> for EtherType {
    fn from(val: u16) -> Self {
        match val {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            0x8100 => EtherType::Vlan,
            0x86DD => EtherType::Ipv6,
            _ => EtherType::Unknown(val),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(val: EtherType) -> Self {
        match val {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Vlan => 0x8100,
            EtherType::Ipv6 => 0x86DD,
            EtherType::Unknown(v) => v,
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4 (0x0800)"),
            EtherType::Arp => write!(f, "ARP (0x0806)"),
            EtherType::Vlan => write!(f, "802.1Q (0x8100)"),
            EtherType::Ipv6 => write!(f, "IPv6 (0x86DD)"),
            EtherType::Unknown(v) => write!(f, "Unknown (0x{:04X})", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    /// 线上的 EtherType，为 0x8100 时后面紧跟一个 802.1Q 标签
    pub ethertype: EtherType,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    pub fn new(src: MacAddr, dst: MacAddr, ethertype: EtherType) -> Self {
        Self {
            src,
            dst,
            ethertype,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(&mut Cursor::new(data))
    }

    /// 成功时游标前进 14 字节；失败时游标不动。
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let mut c = cursor.for_layer(Layer::Ethernet);
        c.ensure(Self::LEN)?;

        let dst = MacAddr::from_raw(c.read_array()?);
        let src = MacAddr::from_raw(c.read_array()?);
        let ethertype = EtherType::from(c.read_be_u16()?);

        *cursor = c;
        Ok(Self {
            dst,
            src,
            ethertype,
        })
    }

    pub fn has_vlan_tag(&self) -> bool {
        self.ethertype == EtherType::Vlan
    }

    pub fn to_bytes(&self) -> [u8; 14] {
        let mut bytes = [0u8; 14];
        bytes[0..6].copy_from_slice(self.dst.as_bytes());
        bytes[6..12].copy_from_slice(self.src.as_bytes());
        let ethertype_val: u16 = self.ethertype.into();
        bytes[12..14].copy_from_slice(&ethertype_val.to_be_bytes());
        bytes
    }
}

impl fmt::Display for EthernetHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ethernet Header:
    Source: {}
    Destination: {}
    EtherType: {}",
            self.src, self.dst, self.ethertype
        )
    }
}

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

//! 802.1Q 标签
//!
//! ```text
//! | TPID 0x8100 (以太网头的 EtherType) | PCP (3) | DEI (1) | VID (12) | 内层 EtherType (16) |
//! ```
//!
//! TPID 已经作为以太网头的 EtherType 被读掉，这里只解析后面的 4 字节。

use crate::cursor::Cursor;
use crate::error::{DecodeError, Layer};
use crate::ethernet::EtherType;
use std::fmt;

const VLAN_ID_MASK: u16 = 0x0FFF;
const DEI_MASK: u16 = 0x1000;
const PRIORITY_SHIFT: u16 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    pub vlan_id: u16,
    pub priority: u8,
    pub dei: bool,
    /// 真正的下一层协议
    pub inner_type: EtherType,
}

impl VlanTag {
    pub const LEN: usize = 4;

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let mut c = cursor.for_layer(Layer::Vlan);
        c.ensure(Self::LEN)?;

        let tci = c.read_be_u16()?;
        let inner_type = EtherType::from(c.read_be_u16()?);

        *cursor = c;
        Ok(Self {
            vlan_id: tci & VLAN_ID_MASK,
            priority: (tci >> PRIORITY_SHIFT) as u8,
            dei: tci & DEI_MASK != 0,
            inner_type,
        })
    }

    pub fn tci(&self) -> u16 {
        ((self.priority as u16 & 0x07) << PRIORITY_SHIFT)
            | if self.dei { DEI_MASK } else { 0 }
            | (self.vlan_id & VLAN_ID_MASK)
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0..2].copy_from_slice(&self.tci().to_be_bytes());
        bytes[2..4].copy_from_slice(&self.inner_type.value().to_be_bytes());
        bytes
    }
}

impl fmt::Display for VlanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VLAN: id {}  priority {}  DEI {}  type 0x{:04x}",
            self.vlan_id,
            self.priority,
            u8::from(self.dei),
            self.inner_type.value()
        )
    }
}

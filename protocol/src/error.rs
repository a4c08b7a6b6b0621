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

use thiserror::Error;

/// 单帧内的解析错误，只影响当前帧，不会终止抓包循环。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// 剩余字节不足以容纳下一个字段或头部
    #[error("{layer}: need {needed} bytes at offset {offset}, only {available} available")]
    ShortPacket {
        layer: Layer,
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// 字段齐全，但取值自相矛盾
    #[error("{layer}: {reason}")]
    Malformed { layer: Layer, reason: Malformation },
}

impl DecodeError {
    pub fn layer(&self) -> Layer {
        match self {
            Self::ShortPacket { layer, .. } | Self::Malformed { layer, .. } => *layer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    PacketInfo,
    Ethernet,
    Vlan,
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PacketInfo => write!(f, "packet information"),
            Self::Ethernet => write!(f, "Ethernet"),
            Self::Vlan => write!(f, "802.1Q"),
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformation {
    #[error("header length {header_len} is below the 20-byte minimum")]
    HeaderTooShort { header_len: usize },
    #[error("header length {header_len} exceeds the {available} bytes available")]
    HeaderPastEnd { header_len: usize, available: usize },
    #[error("header length {header_len} exceeds total length {total_len}")]
    HeaderPastTotal { header_len: usize, total_len: u16 },
}

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

//! 以太网 / 802.1Q / IPv4 / IPv6 头部解析。
//!
//! 所有解析函数都只读取传入的切片，并通过 [`cursor::Cursor`] 做边界检查，
//! 多字节字段统一按网络字节序（大端）读取、只转换一次。

pub mod cursor;
pub mod decode;
pub mod error;
pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod mac;
pub mod packet_info;
pub mod vlan;

pub use decode::{HeaderChain, IpHeader, LinkLayer, decode_chain};
pub use error::DecodeError;

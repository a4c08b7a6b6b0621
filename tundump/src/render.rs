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

//! 单帧的文本报告：先是头部摘要，后接十六进制转储

use std::io::{self, Write};

use protocol::{HeaderChain, IpHeader};

use crate::frame::Frame;

const COLUMNS: usize = 16;

pub struct Renderer<W: Write> {
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, frame: &Frame, chain: &HeaderChain<'_>) -> io::Result<()> {
        let out = &mut self.out;

        if let Some(info) = frame.info() {
            write!(
                out,
                "Flags: 0x{:04x}  Protocol: 0x{:04x}",
                info.flags, info.protocol
            )?;
            if info.is_stripped() {
                write!(out, "  (truncated by kernel)")?;
            }
            writeln!(out)?;
        }

        let resolved = chain.resolved.map(|t| t.value());
        match (chain.ethernet, resolved) {
            (Some(ethernet), Some(ethertype)) => writeln!(
                out,
                "EtherType: 0x{:04x}  To: {}  From: {}",
                ethertype, ethernet.dst, ethernet.src
            )?,
            (None, Some(ethertype)) => {
                writeln!(out, "EtherType: 0x{ethertype:04x}  (no link layer)")?
            }
            _ => {}
        }

        if let Some(tag) = chain.vlan {
            writeln!(out, "{tag}")?;
        }

        match &chain.ip {
            Some(IpHeader::V4(header)) => writeln!(out, "{header}")?,
            Some(IpHeader::V6(header)) => writeln!(out, "{header}")?,
            None => {}
        }

        if let Some(err) = &chain.error {
            writeln!(out, "Decode error: {err}")?;
        }

        hex_dump(out, frame.payload())?;
        out.flush()
    }
}

/// 每行 16 字节，行首是偏移；表头行的行首是总长度
pub fn hex_dump<W: Write + ?Sized>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    write!(out, "{:4}:", bytes.len())?;
    for column in 0..COLUMNS {
        write!(out, "{column:3}")?;
    }
    for (row, chunk) in bytes.chunks(COLUMNS).enumerate() {
        write!(out, "\n{:4}:", row * COLUMNS)?;
        for byte in chunk {
            write!(out, " {byte:02x}")?;
        }
    }
    writeln!(out)
}

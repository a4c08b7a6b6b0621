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

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, trace, warn};

use crate::device::Backend;
use crate::error::DeviceError;
use crate::frame::FrameReader;
use crate::render::Renderer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// 已读出并输出的帧
    pub frames: u64,
    /// 解码前丢弃的读取（PI 头不完整）
    pub skipped: u64,
    /// 头部链中途出错的帧
    pub decode_errors: u64,
}

/// 逐帧等待、读取、解码、输出
///
/// 输出满 `limit` 帧后返回，或在第一个致命设备错误处返回。
/// 截断的读取和解码错误只记日志，继续下一帧。
pub fn run<B, W>(
    reader: &mut FrameReader<'_, B>,
    renderer: &mut Renderer<W>,
    timeout: Duration,
    limit: Option<u64>,
) -> Result<LoopStats>
where
    B: Backend,
    W: Write,
{
    let mut stats = LoopStats::default();

    while limit.is_none_or(|limit| stats.frames < limit) {
        if !reader.wait(timeout)? {
            trace!("no frame on {} within {:?}", reader.device_name(), timeout);
            continue;
        }

        let frame = match reader.next_frame() {
            Ok(frame) => frame,
            Err(err) if !err.is_fatal() => {
                warn!("skipping frame: {}", err);
                stats.skipped += 1;
                continue;
            }
            Err(err) => return Err(err).context("read fails"),
        };

        let chain = frame.decode(reader.link_layer());
        debug!(
            "frame {}: {} bytes, {} bytes of headers",
            stats.frames + 1,
            frame.len(),
            chain.consumed()
        );
        if let Some(err) = &chain.error {
            warn!("frame {}: {}", stats.frames + 1, err);
            stats.decode_errors += 1;
        }

        renderer
            .render(&frame, &chain)
            .context("failed to write frame report")?;
        stats.frames += 1;
    }

    Ok(stats)
}

/// 合并读循环和关闭设备的结果，两者都失败时返回循环的错误
pub fn finish(
    outcome: Result<LoopStats>,
    closed: std::result::Result<(), DeviceError>,
) -> Result<LoopStats> {
    match (outcome, closed) {
        (Ok(stats), Ok(())) => Ok(stats),
        (Ok(_), Err(err)) => Err(err).context("Close fails"),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            error!("Close fails: {}", close_err);
            Err(err)
        }
    }
}

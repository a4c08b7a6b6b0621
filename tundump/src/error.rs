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

//! 设备层错误

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {0} is already open")]
    AlreadyOpen(String),

    #[error("device is already closed")]
    AlreadyClosed,

    #[error("cannot open {path}: {source}")]
    DeviceUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("interface configuration rejected: {0}")]
    ConfigurationRejected(#[source] io::Error),

    #[error("device is not open")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 读到的字节不足一个 PI 头
    #[error("short read: got {got} bytes, packet information needs {needed}")]
    Truncated { got: usize, needed: usize },

    #[error("frame buffer of {requested} bytes is smaller than the {minimum}-byte minimum")]
    BufferTooSmall { requested: usize, minimum: usize },

    #[error("frame buffer of {requested} bytes exceeds the {maximum}-byte maximum")]
    BufferTooLarge { requested: usize, maximum: usize },
}

impl DeviceError {
    /// 读循环是否必须停止，只有截断帧可以跳过
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Truncated { .. })
    }

    /// 来自内核的原始错误码
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Io(err)
            | Self::ConfigurationRejected(err)
            | Self::DeviceUnavailable { source: err, .. } => err.raw_os_error(),
            _ => None,
        }
    }
}

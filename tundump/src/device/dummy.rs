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

//! 内存后端：队列里每一项对应一次读取，和内核每次 read(2) 交出一帧一样

use std::cmp::min;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::{Backend, Descriptor, Mode};
use crate::error::{DeviceError, Result};

#[derive(Default)]
pub struct DummyTun {
    reads: VecDeque<io::Result<Vec<u8>>>,
    reject: bool,
    opened: usize,
}

pub struct DummyFd {
    reads: VecDeque<io::Result<Vec<u8>>>,
}

impl DummyTun {
    pub fn new() -> Self {
        Self::default()
    }

    /// TUNSETIFF 以 EPERM 失败
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn with_frame(mut self, bytes: Vec<u8>) -> Self {
        self.reads.push_back(Ok(bytes));
        self
    }

    pub fn with_error(mut self, code: i32) -> Self {
        self.reads.push_back(Err(io::Error::from_raw_os_error(code)));
        self
    }
}

impl Backend for DummyTun {
    type Descriptor = DummyFd;

    fn open(&mut self, name: &str, mode: Mode, _packet_info: bool) -> Result<(DummyFd, String)> {
        if self.reject {
            return Err(DeviceError::ConfigurationRejected(
                io::Error::from_raw_os_error(libc::EPERM),
            ));
        }
        let assigned = if name.is_empty() {
            format!("{}{}", mode, self.opened)
        } else {
            name.to_string()
        };
        self.opened += 1;
        let fd = DummyFd {
            reads: std::mem::take(&mut self.reads),
        };
        Ok((fd, assigned))
    }
}

impl Descriptor for DummyFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(Ok(bytes)) => {
                let n = min(buf.len(), bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(err)) => Err(err),
            None => Err(io::Error::from_raw_os_error(libc::EAGAIN)),
        }
    }

    fn wait_readable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.reads.is_empty())
    }

    fn close(self) -> io::Result<()> {
        Ok(())
    }
}

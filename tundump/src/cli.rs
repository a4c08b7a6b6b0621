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

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// 兼容旧写法的单横线长参数
const SINGLE_DASH_FLAGS: [&str; 3] = ["-tun", "-tap", "-no-pi"];

#[derive(Parser, Debug)]
#[command(
    name = "tundump",
    version,
    about = "Open a TUN/TAP interface and dump every frame it receives"
)]
pub struct Cli {
    /// 打开 TUN 设备（IP 包，没有以太网头）
    #[arg(long)]
    pub tun: bool,

    /// 打开 TAP 设备（以太网帧）
    #[arg(long)]
    pub tap: bool,

    /// 让内核不在帧前加 PI 头
    #[arg(long = "no-pi")]
    pub no_pi: bool,

    /// 申请的接口名（省略时由内核分配）
    #[arg(short, long)]
    pub name: Option<String>,

    /// 读缓冲大小（字节，含 PI 头）
    #[arg(long, value_name = "BYTES")]
    pub buffer: Option<usize>,

    /// 每次等待帧的秒数，超时后继续等待
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// 输出指定数量的帧后停止（默认持续抓取，直到 I/O 错误）
    #[arg(long)]
    pub limit: Option<u64>,

    /// 配置文件路径（每行一个 key = value）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 打开 debug 日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 解析进程参数，接受 `-tun`、`-tap`、`-no-pi`
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }
}

/// 把单横线长参数改写成 `--` 形式交给 clap
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if arg
                .to_str()
                .is_some_and(|flag| SINGLE_DASH_FLAGS.contains(&flag))
            {
                let mut long = OsString::from("-");
                long.push(&arg);
                long
            } else {
                arg
            }
        })
        .collect()
}

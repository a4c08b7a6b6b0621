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

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tundump::cli::Cli;
use tundump::config::{self, RunConfig};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config = config::load_config(&cli)?;
    info!(
        "mode {}, packet information {}, buffer {} bytes",
        config.mode,
        if config.packet_info { "on" } else { "off" },
        config.buffer
    );
    capture(config)
}

/// RUST_LOG 优先，其次 --verbose；日志走 stderr，stdout 只留给帧报告
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .ok();
}

#[cfg(target_os = "linux")]
fn capture(config: RunConfig) -> Result<()> {
    use std::io;

    use anyhow::Context;
    use tundump::device::{DeviceHandle, LinuxTun};
    use tundump::event_loop;
    use tundump::frame::FrameReader;
    use tundump::render::Renderer;

    let mut device = DeviceHandle::new(LinuxTun::new());
    let name = device
        .open(&config.name, config.mode, config.packet_info)
        .context("Failed to open device")?
        .to_string();
    info!("listening on {name}");

    let result = FrameReader::new(&mut device, config.buffer)
        .map_err(anyhow::Error::from)
        .and_then(|mut reader| {
            let mut renderer = Renderer::new(io::stdout().lock());
            event_loop::run(&mut reader, &mut renderer, config.timeout, config.limit)
        });

    // 先关设备，再报告循环的结果
    let stats = event_loop::finish(result, device.close())?;
    info!(
        "{} frames shown, {} skipped, {} with decode errors",
        stats.frames, stats.skipped, stats.decode_errors
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn capture(_config: RunConfig) -> Result<()> {
    anyhow::bail!("TUN/TAP capture is only supported on Linux");
}

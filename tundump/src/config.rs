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

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use protocol::packet_info::PacketInfo;
use static_assertions::const_assert;
use tracing::warn;

use crate::cli::Cli;
use crate::device::{MAX_NAME_LEN, Mode};
use crate::frame::{MAX_BUFFER, MIN_BUFFER};

/// 默认读缓冲：PI 头 + 最大以太网帧（1500 载荷 + 14 头 + 4 VLAN 标签）
pub const DEFAULT_BUFFER: usize = PacketInfo::LEN + 1518;
const_assert!(DEFAULT_BUFFER >= MIN_BUFFER);
const_assert!(DEFAULT_BUFFER <= MAX_BUFFER);

/// 等待下一帧的超时，单位秒
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
const_assert!(DEFAULT_TIMEOUT_SECS > 0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub name: String,
    pub mode: Mode,
    pub packet_info: bool,
    pub buffer: usize,
    pub timeout: Duration,
    pub limit: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: Mode::Tun,
            packet_info: true,
            buffer: DEFAULT_BUFFER,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            limit: None,
        }
    }
}

/// 配置文件中出现过的项，未出现的保持 `None`
#[derive(Debug, Default, PartialEq, Eq)]
struct FileConfig {
    name: Option<String>,
    mode: Option<Mode>,
    packet_info: Option<bool>,
    buffer: Option<usize>,
    timeout: Option<u64>,
    limit: Option<u64>,
}

/// 先读配置文件，再用命令行参数覆盖
pub fn load_config(cli: &Cli) -> Result<RunConfig> {
    let file = match &cli.config {
        Some(path) => load_from_file(path)?,
        None => FileConfig::default(),
    };
    merge(cli, file)
}

fn merge(cli: &Cli, file: FileConfig) -> Result<RunConfig> {
    let defaults = RunConfig::default();

    let mode = match (cli.tun, cli.tap) {
        (true, true) => bail!("Is this a tap or tun device? Pass only one of -tun / -tap"),
        (true, false) => Mode::Tun,
        (false, true) => Mode::Tap,
        (false, false) => match file.mode {
            Some(mode) => mode,
            None => {
                warn!("Assuming tun device");
                Mode::Tun
            }
        },
    };

    let name = cli.name.clone().or(file.name).unwrap_or_default();
    if name.len() > MAX_NAME_LEN {
        warn!(
            "Interface name {:?} will be truncated to {} bytes",
            name, MAX_NAME_LEN
        );
    }

    let packet_info = !cli.no_pi && file.packet_info.unwrap_or(defaults.packet_info);

    let buffer = cli.buffer.or(file.buffer).unwrap_or(defaults.buffer);
    if buffer < MIN_BUFFER {
        bail!("Buffer of {buffer} bytes is too small, need at least {MIN_BUFFER}");
    }
    if buffer > MAX_BUFFER {
        bail!("Buffer of {buffer} bytes is too large, at most {MAX_BUFFER} is allowed");
    }

    let timeout = match cli.timeout.or(file.timeout) {
        Some(0) => bail!("Timeout must be at least one second"),
        Some(secs) => Duration::from_secs(secs),
        None => defaults.timeout,
    };

    Ok(RunConfig {
        name,
        mode,
        packet_info,
        buffer,
        timeout,
        limit: cli.limit.or(file.limit),
    })
}

fn load_from_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_file(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_file(content: &str) -> Result<FileConfig> {
    let mut config = FileConfig::default();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            bail!("line {}: expected key = value", idx + 1);
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "name" => config.name = Some(value.to_string()),
            "mode" => {
                config.mode = Some(match value {
                    "tun" => Mode::Tun,
                    "tap" => Mode::Tap,
                    other => bail!("line {}: unknown mode '{other}'", idx + 1),
                })
            }
            "packet_info" => {
                config.packet_info = Some(
                    value
                        .parse()
                        .with_context(|| format!("line {}: packet_info", idx + 1))?,
                )
            }
            "buffer" => {
                config.buffer = Some(
                    value
                        .parse()
                        .with_context(|| format!("line {}: buffer", idx + 1))?,
                )
            }
            "timeout" => {
                config.timeout = Some(
                    value
                        .parse()
                        .with_context(|| format!("line {}: timeout", idx + 1))?,
                )
            }
            "limit" => {
                config.limit = Some(
                    value
                        .parse()
                        .with_context(|| format!("line {}: limit", idx + 1))?,
                )
            }
            _ => warn!("Unknown config key: {}", key),
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(crate::cli::normalize_args(
            std::iter::once("tundump").chain(args.iter().copied()),
        ))
        .unwrap()
    }

    #[test]
    fn defaults_to_tun_with_packet_info() {
        let config = merge(&cli(&[]), FileConfig::default()).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn tun_and_tap_together_is_an_error() {
        let err = merge(&cli(&["-tun", "-tap"]), FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tap or tun"));
    }

    #[test]
    fn flags_compose() {
        let config = merge(&cli(&["-tap", "-no-pi"]), FileConfig::default()).unwrap();
        assert_eq!(config.mode, Mode::Tap);
        assert!(!config.packet_info);
    }

    #[test]
    fn command_line_overrides_file() {
        let file = parse_file(
            "# capture settings\n\
             name = dump0\n\
             mode = tap\n\
             packet_info = false\n\
             buffer = 2048\n\
             timeout = 2\n\
             colour = blue\n",
        )
        .unwrap();
        assert_eq!(file.mode, Some(Mode::Tap));
        assert_eq!(file.packet_info, Some(false));

        let config = merge(&cli(&["-tun", "--buffer", "4096"]), file).unwrap();
        assert_eq!(config.mode, Mode::Tun);
        assert_eq!(config.name, "dump0");
        assert!(!config.packet_info);
        assert_eq!(config.buffer, 4096);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn small_buffer_and_zero_timeout_are_rejected() {
        assert!(merge(&cli(&["--buffer", "32"]), FileConfig::default()).is_err());
        assert!(merge(&cli(&["--timeout", "0"]), FileConfig::default()).is_err());
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let err = merge(
            &cli(&["-tap", "--buffer", "18446744073709551615"]),
            FileConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("too large"));

        let file = parse_file("buffer = 70000").unwrap();
        assert!(merge(&cli(&[]), file).is_err());

        let config = merge(&cli(&["--buffer", "65539"]), FileConfig::default()).unwrap();
        assert_eq!(config.buffer, MAX_BUFFER);
    }

    #[test]
    fn malformed_file_lines() {
        assert!(parse_file("mode = bridge").is_err());
        assert!(parse_file("buffer = lots").is_err());
        assert!(parse_file("just some words").is_err());
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_from_file(Path::new("/nonexistent/tundump.conf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tundump.conf"));
    }
}

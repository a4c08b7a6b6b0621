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

//! 逐层解析：以太网 → 可选 802.1Q → IPv4 / IPv6。
//!
//! 协议判定规则：
//! 1. 外层协议：有 PI 头时以 PI 的 `protocol` 为准，否则用以太网头的 EtherType；
//! 2. 是否存在 VLAN 标签只看线上以太网头的 EtherType（前一层）；
//! 3. 解出 VLAN 标签时，内层类型覆盖外层协议，决定 IP 层如何解析。

use std::ops::Range;

use crate::cursor::Cursor;
use crate::error::{DecodeError, Layer};
use crate::ethernet::{EtherType, EthernetHeader};
use crate::ipv4::Ipv4Header;
use crate::ipv6::Ipv6Header;
use crate::packet_info::PacketInfo;
use crate::vlan::VlanTag;

/// 最长的头部链：以太网 + 802.1Q + IPv6
pub const MAX_HEADER_CHAIN: usize = EthernetHeader::LEN + VlanTag::LEN + Ipv6Header::LEN;

pub fn decode_ethernet(payload: &[u8]) -> Result<(EthernetHeader, usize), DecodeError> {
    let header = EthernetHeader::decode(&mut Cursor::new(payload))?;
    Ok((header, EthernetHeader::LEN))
}

pub fn decode_vlan(payload: &[u8], offset: usize) -> Result<(VlanTag, usize), DecodeError> {
    let tag = VlanTag::decode(&mut Cursor::at(payload, offset))?;
    Ok((tag, VlanTag::LEN))
}

pub fn decode_ipv4(payload: &[u8], offset: usize) -> Result<Ipv4Header<'_>, DecodeError> {
    Ipv4Header::decode(&mut Cursor::at(payload, offset))
}

pub fn decode_ipv6(payload: &[u8], offset: usize) -> Result<Ipv6Header, DecodeError> {
    Ipv6Header::decode(&mut Cursor::at(payload, offset))
}

/// 帧的第一层是什么：TAP 设备是以太网帧，TUN 设备直接是 IP 报文。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpHeader<'a> {
    V4(Ipv4Header<'a>),
    V6(Ipv6Header),
}

/// 一帧的解析结果。
///
/// 所有字段都从 `payload` 中读出，`span`/`remaining` 返回的是指向原始帧的切片，
/// 生命周期不会超过帧本身。某一层解析失败时，更浅的层照常保留，失败层及更深的层为空，
/// 错误记录在 `error` 中。
#[derive(Debug, Clone)]
pub struct HeaderChain<'a> {
    payload: &'a [u8],
    spans: Vec<(Layer, Range<usize>)>,
    pub info: Option<PacketInfo>,
    pub ethernet: Option<EthernetHeader>,
    pub vlan: Option<VlanTag>,
    /// 外层权威协议（PI 头或以太网 EtherType）
    pub outer: Option<EtherType>,
    /// 用于 IP 层分发的协议，VLAN 内层类型优先
    pub resolved: Option<EtherType>,
    pub ip: Option<IpHeader<'a>>,
    pub error: Option<DecodeError>,
}

impl<'a> HeaderChain<'a> {
    fn new(payload: &'a [u8], info: Option<PacketInfo>) -> Self {
        Self {
            payload,
            spans: Vec::with_capacity(3),
            info,
            ethernet: None,
            vlan: None,
            outer: None,
            resolved: None,
            ip: None,
            error: None,
        }
    }

    fn step<T>(
        &mut self,
        cursor: &mut Cursor<'a>,
        layer: Layer,
        decode: impl FnOnce(&mut Cursor<'a>) -> Result<T, DecodeError>,
    ) -> Option<T> {
        let start = cursor.position();
        match decode(cursor) {
            Ok(header) => {
                self.spans.push((layer, start..cursor.position()));
                Some(header)
            }
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// 已解析的各层共消耗的字节数
    pub fn consumed(&self) -> usize {
        self.spans.last().map_or(0, |(_, span)| span.end)
    }

    /// 指定层在原始帧中的字节
    pub fn span(&self, layer: Layer) -> Option<&'a [u8]> {
        let payload = self.payload;
        self.spans
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|(_, span)| &payload[span.clone()])
    }

    pub fn layers(&self) -> impl Iterator<Item = Layer> + '_ {
        self.spans.iter().map(|(layer, _)| *layer)
    }

    /// 头部之后尚未解析的字节
    pub fn remaining(&self) -> &'a [u8] {
        &self.payload[self.consumed()..]
    }
}

pub fn decode_chain(payload: &[u8], info: Option<PacketInfo>, link: LinkLayer) -> HeaderChain<'_> {
    let mut chain = HeaderChain::new(payload, info);
    let mut cursor = Cursor::new(payload);
    let pi_protocol = info.map(|pi| pi.ethertype());

    match link {
        LinkLayer::Ethernet => {
            let Some(ethernet) = chain.step(&mut cursor, Layer::Ethernet, EthernetHeader::decode)
            else {
                return chain;
            };
            chain.ethernet = Some(ethernet);
            chain.outer = Some(pi_protocol.unwrap_or(ethernet.ethertype));
            chain.resolved = chain.outer;

            if ethernet.has_vlan_tag() {
                let Some(tag) = chain.step(&mut cursor, Layer::Vlan, VlanTag::decode) else {
                    return chain;
                };
                chain.vlan = Some(tag);
                chain.resolved = Some(tag.inner_type);
            }
        }
        LinkLayer::RawIp => {
            chain.outer = pi_protocol.or_else(|| {
                payload
                    .first()
                    .and_then(|first| EtherType::from_ip_version(first >> 4))
            });
            chain.resolved = chain.outer;
        }
    }

    match chain.resolved {
        Some(EtherType::Ipv4) => {
            chain.ip = chain
                .step(&mut cursor, Layer::Ipv4, Ipv4Header::decode)
                .map(IpHeader::V4);
        }
        Some(EtherType::Ipv6) => {
            chain.ip = chain
                .step(&mut cursor, Layer::Ipv6, Ipv6Header::decode)
                .map(IpHeader::V6);
        }
        _ => {}
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::MacAddr;

    fn ethernet(ethertype: EtherType) -> Vec<u8> {
        EthernetHeader::new(
            MacAddr::from_raw([0x02, 0, 0, 0, 0, 0x0A]),
            MacAddr::from_raw([0x02, 0, 0, 0, 0, 0x0B]),
            ethertype,
        )
        .to_bytes()
        .to_vec()
    }

    #[test]
    fn unknown_ethertype_stops_without_error() {
        let mut frame = ethernet(EtherType::Arp);
        frame.extend_from_slice(&[0u8; 28]);
        let chain = decode_chain(&frame, None, LinkLayer::Ethernet);
        assert!(chain.ethernet.is_some());
        assert!(chain.vlan.is_none());
        assert!(chain.ip.is_none());
        assert!(chain.error.is_none());
        assert_eq!(chain.resolved, Some(EtherType::Arp));
        assert_eq!(chain.consumed(), 14);
        assert_eq!(chain.remaining().len(), 28);
    }

    #[test]
    fn packet_info_protocol_is_authoritative() {
        // 线上写的是 ARP，PI 头说是 IPv6：按 PI 解析 IP 层
        let mut frame = ethernet(EtherType::Arp);
        frame.extend_from_slice(&[0x60; 40]);
        let chain = decode_chain(&frame, Some(PacketInfo::new(0, 0x86DD)), LinkLayer::Ethernet);
        assert_eq!(chain.ethernet.map(|e| e.ethertype), Some(EtherType::Arp));
        assert_eq!(chain.outer, Some(EtherType::Ipv6));
        assert!(matches!(chain.ip, Some(IpHeader::V6(_))));
    }

    #[test]
    fn vlan_inner_type_overrides_packet_info() {
        let mut frame = ethernet(EtherType::Vlan);
        frame.extend_from_slice(&[0x00, 0x0A, 0x08, 0x06]);
        let chain = decode_chain(&frame, Some(PacketInfo::new(0, 0x0800)), LinkLayer::Ethernet);
        assert_eq!(chain.outer, Some(EtherType::Ipv4));
        assert_eq!(chain.resolved, Some(EtherType::Arp));
        assert!(chain.ip.is_none());
        assert!(chain.error.is_none());
    }

    #[test]
    fn truncated_vlan_keeps_ethernet() {
        let mut frame = ethernet(EtherType::Vlan);
        frame.extend_from_slice(&[0x00, 0x0A]);
        let chain = decode_chain(&frame, None, LinkLayer::Ethernet);
        assert!(chain.ethernet.is_some());
        assert!(chain.vlan.is_none());
        assert_eq!(chain.error.map(|e| e.layer()), Some(Layer::Vlan));
        assert_eq!(chain.layers().collect::<Vec<_>>(), vec![Layer::Ethernet]);
        assert_eq!(chain.remaining(), &[0x00, 0x0A]);
    }

    #[test]
    fn raw_ip_infers_protocol_from_version() {
        let mut packet = [0u8; 20];
        packet[0] = 0x45;
        packet[2..4].copy_from_slice(&20u16.to_be_bytes());
        let chain = decode_chain(&packet, None, LinkLayer::RawIp);
        assert!(chain.ethernet.is_none());
        assert_eq!(chain.resolved, Some(EtherType::Ipv4));
        assert!(matches!(chain.ip, Some(IpHeader::V4(h)) if h.header_len() == 20));
        assert_eq!(chain.span(Layer::Ipv4).map(<[u8]>::len), Some(20));
    }

    #[test]
    fn raw_ip_with_unknown_version_decodes_nothing() {
        let chain = decode_chain(&[0x20, 0x00], None, LinkLayer::RawIp);
        assert!(chain.resolved.is_none());
        assert!(chain.ip.is_none());
        assert!(chain.error.is_none());
        assert_eq!(chain.consumed(), 0);
    }

    #[test]
    fn empty_raw_ip_packet() {
        let chain = decode_chain(&[], None, LinkLayer::RawIp);
        assert!(chain.outer.is_none());
        assert!(chain.remaining().is_empty());
    }

    #[test]
    fn max_header_chain_fits_ethernet_vlan_ipv6() {
        assert_eq!(MAX_HEADER_CHAIN, 58);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow key extraction.
//!
//! The L3 parsers are generic over the fixed header of their family;
//! the L4 parsers over the header of their protocol. Neither loops
//! over packet data, and each reads exactly one header after bounds
//! checking it, so the work per packet is fixed by the header sizes.

use super::ParseErr;
use super::bounds::header_at;
use super::bounds::header_at_strict;
use super::ether;
use super::ether::EtherHdrRaw;
use super::icmp::IcmpHdrRaw;
use super::ip4::Ipv4HdrRaw;
use super::ip6::Ipv6HdrRaw;
use super::tcp::TcpHdrRaw;
use super::udp::UdpHdrRaw;
use flowacct_api::AF_IPV4;
use flowacct_api::AF_IPV6;
use flowacct_api::FlowKey;
use flowacct_api::Protocol;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// The fixed base header of an L3 family.
pub trait L3Hdr: FromBytes + Immutable + KnownLayout + Unaligned + Sized {
    /// Header name used in diagnostics.
    const NAME: &'static str;
    /// The ethertype recorded as the key's `l2_proto`.
    const ETHER_TYPE: u16;
    const SIZE: usize = size_of::<Self>();

    /// The leading 32 bits of the source address, wire order.
    fn src_prefix(&self) -> [u8; 4];
    /// The leading 32 bits of the destination address, wire order.
    fn dst_prefix(&self) -> [u8; 4];
    /// The protocol of the header that immediately follows.
    fn next_proto(&self) -> u8;
}

/// An L4 header that can stand in for a pair of ports.
pub trait L4Hdr: FromBytes + Immutable + KnownLayout + Unaligned + Sized {
    const PROTO: u8;
    const SIZE: usize = size_of::<Self>();

    /// The `(src_port, dst_port)` bytes for the key.
    fn ports(&self) -> ([u8; 2], [u8; 2]);
}

/// Build a key from an L3 header of family `H` at the fixed offset
/// behind the Ethernet header.
///
/// The key is only returned once every field has been filled in.
pub fn parse_l3<H: L3Hdr>(data: &[u8]) -> Result<FlowKey, ParseErr> {
    let off = EtherHdrRaw::SIZE;
    let end = data.len();
    let ip = header_at::<H>(data, off).ok_or(ParseErr::Truncated {
        hdr: H::NAME,
        off,
        size: H::SIZE,
        end,
    })?;

    let mut key = FlowKey {
        l2_proto: H::ETHER_TYPE,
        src_addr: ip.src_prefix(),
        dst_addr: ip.dst_prefix(),
        ..Default::default()
    };

    parse_l4(ip.next_proto(), data, off + H::SIZE, &mut key)?;
    Ok(key)
}

/// Fill in the L4 portion of `key` from the header at `off`.
///
/// On error `key` is left untouched.
pub fn parse_l4(
    proto: u8,
    data: &[u8],
    off: usize,
    key: &mut FlowKey,
) -> Result<(), ParseErr> {
    match Protocol::from(proto) {
        Protocol::ICMP => key_l4::<IcmpHdrRaw>(data, off, key),
        Protocol::TCP => key_l4::<TcpHdrRaw>(data, off, key),
        Protocol::UDP => key_l4::<UdpHdrRaw>(data, off, key),
        Protocol::Unknown(p) => Err(ParseErr::Unclassified(p)),
    }
}

fn key_l4<H: L4Hdr>(
    data: &[u8],
    off: usize,
    key: &mut FlowKey,
) -> Result<(), ParseErr> {
    let hdr = header_at_strict::<H>(data, off).ok_or(
        ParseErr::L4Truncated { proto: H::PROTO, off, end: data.len() },
    )?;
    let (src_port, dst_port) = hdr.ports();
    key.l4_proto = H::PROTO;
    key.src_port = src_port;
    key.dst_port = dst_port;
    Ok(())
}

/// Derive the flow key of a frame without consulting a program array.
///
/// This is the same sequence of parsers the pipeline runs for a frame
/// whose family slot holds a program of the matching family.
pub fn parse_flow_key(data: &[u8]) -> Result<FlowKey, ParseErr> {
    match ether::classify(data)? {
        AF_IPV4 => parse_l3::<Ipv4HdrRaw>(data),
        AF_IPV6 => parse_l3::<Ipv6HdrRaw>(data),
        idx => Err(ParseErr::NoProgram(idx)),
    }
}

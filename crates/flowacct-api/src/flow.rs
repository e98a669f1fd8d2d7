// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow identity and its accumulator.
//!
//! Both types are read byte-for-byte by whatever drains the flow
//! tables, so their layouts are fixed.

use crate::proto::ETHER_TYPE_IPV4;
use crate::proto::ETHER_TYPE_IPV6;
use crate::proto::PROTO_ICMP;
use core::fmt;
use core::fmt::Display;
use core::net::IpAddr;
use core::net::Ipv4Addr;
use core::net::Ipv6Addr;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// The identity of a flow.
///
/// ```text
/// 0      2      3      4            8            12       14       16
/// +------+------+------+------------+------------+--------+--------+
/// | l2   | l4   | pad  | src_addr   | dst_addr   | sport  | dport  |
/// +------+------+------+------------+------------+--------+--------+
/// ```
///
/// The address and port fields hold the bytes exactly as they appear
/// on the wire; use the accessors for host-order values. For IPv6
/// only the first four bytes of each address are kept, so flows which
/// differ only in the remaining 96 bits share a key.
///
/// For ICMP, `src_port` holds `[type, 0]` and `dst_port` holds
/// `[code, 0]`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromBytes,
    Hash,
    Immutable,
    IntoBytes,
    KnownLayout,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(C)]
pub struct FlowKey {
    pub l2_proto: u16,
    pub l4_proto: u8,
    // Always zero. Present so the key has no implicit padding.
    pub pad: u8,
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
}

impl FlowKey {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// The source address, widened back out to its family.
    ///
    /// An IPv6 key yields the captured 32-bit prefix followed by
    /// zeros.
    pub fn src_ip(&self) -> IpAddr {
        self.widen(self.src_addr)
    }

    /// The destination address, widened back out to its family.
    pub fn dst_ip(&self) -> IpAddr {
        self.widen(self.dst_addr)
    }

    /// The source port in host order.
    pub fn sport(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    /// The destination port in host order.
    pub fn dport(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }

    /// The ICMP `(type, code)` pair, if this is an ICMP key.
    pub fn icmp_type_code(&self) -> Option<(u8, u8)> {
        if self.l4_proto == PROTO_ICMP {
            Some((self.src_port[0], self.dst_port[0]))
        } else {
            None
        }
    }

    fn widen(&self, prefix: [u8; 4]) -> IpAddr {
        match self.l2_proto {
            ETHER_TYPE_IPV6 => {
                let mut bytes = [0u8; 16];
                bytes[..4].copy_from_slice(&prefix);
                IpAddr::V6(Ipv6Addr::from(bytes))
            }
            _ => IpAddr::V4(Ipv4Addr::from(prefix)),
        }
    }

    /// Build the key portion from an address pair, keeping only the
    /// bytes a key can hold.
    pub fn set_addrs(&mut self, src: IpAddr, dst: IpAddr) {
        self.l2_proto = match src {
            IpAddr::V4(_) => ETHER_TYPE_IPV4,
            IpAddr::V6(_) => ETHER_TYPE_IPV6,
        };
        self.src_addr = prefix(src);
        self.dst_addr = prefix(dst);
    }
}

fn prefix(ip: IpAddr) -> [u8; 4] {
    match ip {
        IpAddr::V4(ip4) => ip4.octets(),
        IpAddr::V6(ip6) => {
            let o = ip6.octets();
            [o[0], o[1], o[2], o[3]]
        }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:#06x}:{}:{}:{}:{}:{}",
            self.l2_proto,
            self.l4_proto,
            self.src_ip(),
            self.sport(),
            self.dst_ip(),
            self.dport(),
        )
    }
}

/// The counters kept for each flow.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
    Serialize,
)]
#[repr(C)]
pub struct FlowAccumulator {
    /// Timestamp (ns) of the first packet.
    pub start: u64,
    /// One past the timestamp (ns) of the most recent packet; zero
    /// only between insert and the first update.
    pub end: u64,
    pub packets: u64,
    pub bytes: u64,
}

impl FlowAccumulator {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// A freshly inserted accumulator, before its first update.
    pub const fn new(start: u64) -> Self {
        Self { start, end: 0, packets: 0, bytes: 0 }
    }

    /// Account for one packet of `len` bytes seen at `now`.
    pub fn hit(&mut self, now: u64, len: u64) {
        self.packets = self.packets.wrapping_add(1);
        self.bytes = self.bytes.wrapping_add(len);
        self.end = now.wrapping_add(1);
    }
}

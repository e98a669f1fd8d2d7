// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Protocol numbers understood by the classifier.

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;
/// IEEE 802.1Q customer tag.
pub const ETHER_TYPE_VLAN: u16 = 0x8100;
/// IEEE 802.1ad service tag (QinQ).
pub const ETHER_TYPE_QINQ: u16 = 0x88A8;

pub const PROTO_ICMP: u8 = 0x1;
pub const PROTO_TCP: u8 = 0x6;
pub const PROTO_UDP: u8 = 0x11;

/// Program array index of the IPv4 parser.
pub const AF_IPV4: u32 = 4;
/// Program array index of the IPv6 parser.
pub const AF_IPV6: u32 = 6;

/// The number of slots in the L2 to L3 program array.
///
/// Only [`AF_IPV4`] and [`AF_IPV6`] are populated; the remaining slots
/// are held for future address families.
pub const PROG_ARRAY_LEN: u32 = 7;

/// The ethertypes the classifier distinguishes.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum EtherType {
    Ipv4,
    Ipv6,
    Vlan,
    QinQ,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(raw: u16) -> Self {
        match raw {
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            ETHER_TYPE_VLAN => Self::Vlan,
            ETHER_TYPE_QINQ => Self::QinQ,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(et: EtherType) -> Self {
        match et {
            EtherType::Ipv4 => ETHER_TYPE_IPV4,
            EtherType::Ipv6 => ETHER_TYPE_IPV6,
            EtherType::Vlan => ETHER_TYPE_VLAN,
            EtherType::QinQ => ETHER_TYPE_QINQ,
            EtherType::Unknown(val) => val,
        }
    }
}

impl Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", u16::from(*self))
    }
}

/// An L4 protocol value.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Protocol {
    ICMP,
    TCP,
    UDP,
    Unknown(u8),
}

impl From<u8> for Protocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_ICMP => Self::ICMP,
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::ICMP => PROTO_ICMP,
            Protocol::TCP => PROTO_TCP,
            Protocol::UDP => PROTO_UDP,
            Protocol::Unknown(v) => v,
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ICMP => write!(f, "ICMP"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::Unknown(v) => write!(f, "Unknown({v})"),
        }
    }
}

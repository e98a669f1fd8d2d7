// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The packet-processing pipeline and its flow tables.

pub mod bounds;
pub mod buffer;
pub mod dispatch;
pub mod ether;
pub mod flow_table;
pub mod icmp;
pub mod ip4;
pub mod ip6;
pub mod parse;
pub mod pipeline;
pub mod stat;
pub mod tcp;
pub mod udp;

use core::fmt;
use flowacct_api::EtherType;
use flowacct_api::XdpAction;

/// Why a packet did not produce a flow key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseErr {
    /// The named header extends past the end of the packet.
    Truncated { hdr: &'static str, off: usize, size: usize, end: usize },

    /// The frame carries an 802.1Q or 802.1ad tag.
    Vlan(EtherType),

    /// The ethertype is neither IPv4, IPv6, nor a VLAN tag.
    UnknownEtherType(u16),

    /// No program is installed in this program array slot.
    NoProgram(u32),

    /// The L4 protocol is not one a key is built for.
    Unclassified(u8),

    /// The L4 header failed its bounds check.
    L4Truncated { proto: u8, off: usize, end: usize },
}

impl ParseErr {
    /// The terminal action for a packet which failed with `self`.
    ///
    /// Structural failures always drop. A packet that made it through
    /// L3 gets the configured action whether or not it was keyed.
    pub fn action(&self, configured: XdpAction) -> XdpAction {
        match self {
            Self::Truncated { .. }
            | Self::Vlan(_)
            | Self::UnknownEtherType(_)
            | Self::NoProgram(_) => XdpAction::Drop,

            Self::Unclassified(_) | Self::L4Truncated { .. } => configured,
        }
    }
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { hdr, off, size, end } => {
                write!(f, "{hdr} header truncated: {off}+{size} > {end}")
            }
            Self::Vlan(et) => write!(f, "received ethertype VLAN ({et})"),
            Self::UnknownEtherType(et) => {
                write!(f, "ethertype {et:04X} is not IPv4/IPv6/VLAN")
            }
            Self::NoProgram(idx) => write!(f, "no program in slot {idx}"),
            Self::Unclassified(proto) => {
                write!(f, "unclassified L4 protocol {proto}")
            }
            Self::L4Truncated { proto, off, end } => {
                write!(f, "L4 ({proto}) header truncated at {off} (end {end})")
            }
        }
    }
}

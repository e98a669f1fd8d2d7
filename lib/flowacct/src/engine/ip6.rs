// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv6 headers.

use super::parse::L3Hdr;
use flowacct_api::ETHER_TYPE_IPV6;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// The fixed IPv6 header. Extension headers are never walked, so
/// `next_hdr` is taken as the L4 protocol as-is.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv6HdrRaw {
    pub vsn_class_flow: [u8; 4],
    pub payload_len: [u8; 2],
    pub next_hdr: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

// Only the leading 32 bits of each address fit in a flow key.
fn prefix(addr: &[u8; 16]) -> [u8; 4] {
    [addr[0], addr[1], addr[2], addr[3]]
}

impl L3Hdr for Ipv6HdrRaw {
    const NAME: &'static str = "ipv6";
    const ETHER_TYPE: u16 = ETHER_TYPE_IPV6;

    #[inline]
    fn src_prefix(&self) -> [u8; 4] {
        prefix(&self.src)
    }

    #[inline]
    fn dst_prefix(&self) -> [u8; 4] {
        prefix(&self.dst)
    }

    #[inline]
    fn next_proto(&self) -> u8 {
        self.next_hdr
    }
}

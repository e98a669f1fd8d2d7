// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! IPv4 headers.

use super::parse::L3Hdr;
use flowacct_api::ETHER_TYPE_IPV4;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// The fixed portion of an IPv4 header. Options are never read.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl L3Hdr for Ipv4HdrRaw {
    const NAME: &'static str = "ipv4";
    const ETHER_TYPE: u16 = ETHER_TYPE_IPV4;

    #[inline]
    fn src_prefix(&self) -> [u8; 4] {
        self.src
    }

    #[inline]
    fn dst_prefix(&self) -> [u8; 4] {
        self.dst
    }

    #[inline]
    fn next_proto(&self) -> u8 {
        self.proto
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_size() {
        assert_eq!(Ipv4HdrRaw::SIZE, 20);
    }
}

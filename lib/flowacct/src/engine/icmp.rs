// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! ICMP headers.
//!
//! ICMP has no ports, so a flow key carries the message type and code
//! in their place. Echo requests and echo replies are therefore
//! distinct flows.

use super::parse::L4Hdr;
use flowacct_api::PROTO_ICMP;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;

#[repr(C)]
#[derive(
    Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct IcmpHdrRaw {
    pub ty: u8,
    pub code: u8,
    pub csum: [u8; 2],
    pub rest_of_hdr: [u8; 4],
}

impl L4Hdr for IcmpHdrRaw {
    const PROTO: u8 = PROTO_ICMP;

    #[inline]
    fn ports(&self) -> ([u8; 2], [u8; 2]) {
        ([self.ty, 0], [self.code, 0])
    }
}

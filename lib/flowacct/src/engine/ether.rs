// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Ethernet frames and the L2 classifier.

use super::ParseErr;
use super::bounds::header_at;
use flowacct_api::AF_IPV4;
use flowacct_api::AF_IPV6;
use flowacct_api::EtherType;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ETHER_ADDR_LEN: usize = 6;

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct EtherHdrRaw {
    pub dst: [u8; ETHER_ADDR_LEN],
    pub src: [u8; ETHER_ADDR_LEN],
    pub ether_type: [u8; 2],
}

impl EtherHdrRaw {
    pub const SIZE: usize = size_of::<Self>();

    pub fn ether_type(&self) -> EtherType {
        EtherType::from(u16::from_be_bytes(self.ether_type))
    }
}

/// Decide which program array slot a frame is dispatched to.
///
/// The L3 header always begins at [`EtherHdrRaw::SIZE`]; tagged frames
/// are reported rather than unwrapped.
pub fn classify(data: &[u8]) -> Result<u32, ParseErr> {
    let eth = header_at::<EtherHdrRaw>(data, 0).ok_or(ParseErr::Truncated {
        hdr: "ether",
        off: 0,
        size: EtherHdrRaw::SIZE,
        end: data.len(),
    })?;

    match eth.ether_type() {
        EtherType::Ipv4 => Ok(AF_IPV4),
        EtherType::Ipv6 => Ok(AF_IPV6),
        et @ (EtherType::Vlan | EtherType::QinQ) => Err(ParseErr::Vlan(et)),
        EtherType::Unknown(raw) => Err(ParseErr::UnknownEtherType(raw)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(et: u16) -> [u8; 14] {
        let mut f = [0u8; 14];
        f[12..].copy_from_slice(&et.to_be_bytes());
        f
    }

    #[test]
    fn dispatch_index() {
        assert_eq!(classify(&frame(0x0800)), Ok(4));
        assert_eq!(classify(&frame(0x86DD)), Ok(6));
    }

    #[test]
    fn tagged_and_unknown() {
        assert_eq!(
            classify(&frame(0x8100)),
            Err(ParseErr::Vlan(EtherType::Vlan))
        );
        assert_eq!(
            classify(&frame(0x88A8)),
            Err(ParseErr::Vlan(EtherType::QinQ))
        );
        assert_eq!(
            classify(&frame(0x0806)),
            Err(ParseErr::UnknownEtherType(0x0806))
        );
    }

    #[test]
    fn runt() {
        let f = frame(0x0800);
        assert!(matches!(
            classify(&f[..13]),
            Err(ParseErr::Truncated { hdr: "ether", end: 13, .. })
        ));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for building packet capture files.

use flowacct_api::NANOS;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;

/// Microsecond-resolution pcap magic.
pub const PCAP_MAGIC_USEC: u32 = 0xa1b2c3d4;
/// Nanosecond-resolution pcap magic.
pub const PCAP_MAGIC_NSEC: u32 = 0xa1b23c4d;

/// Build an in-memory packet capture from a series of packets.
pub struct PcapBuilder {
    bytes: Vec<u8>,
    nanos: bool,
}

impl PcapBuilder {
    /// A capture with microsecond timestamps.
    pub fn new() -> Self {
        Self::with_magic(PCAP_MAGIC_USEC)
    }

    /// A capture with nanosecond timestamps.
    pub fn new_nanos() -> Self {
        Self::with_magic(PCAP_MAGIC_NSEC)
    }

    fn with_magic(magic_number: u32) -> Self {
        let mut hdr = PcapHeader {
            magic_number,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 1500,
            network: Linktype::ETHERNET,
        };

        Self {
            bytes: hdr.to_vec().unwrap(),
            nanos: magic_number == PCAP_MAGIC_NSEC,
        }
    }

    /// Add a packet captured at `ts_ns` nanoseconds since the epoch.
    ///
    /// A microsecond capture loses the sub-microsecond part.
    pub fn add_pkt(&mut self, ts_ns: u64, pkt: &[u8]) -> &mut Self {
        let frac = ts_ns % NANOS;
        let frac = if self.nanos { frac } else { frac / 1_000 };
        let mut block = LegacyPcapBlock {
            ts_sec: (ts_ns / NANOS) as u32,
            ts_usec: frac as u32,
            caplen: pkt.len() as u32,
            origlen: pkt.len() as u32,
            data: pkt,
        };

        self.bytes.extend_from_slice(&block.to_vec().unwrap());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for PcapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A point-in-time copy of the pipeline's diagnostic counters.

use serde::Deserialize;
use serde::Serialize;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct PipelineStatsSnap {
    /// Packets handed to the classifier.
    pub rx_pkts: u64,
    /// Dropped because a header extended past the end of the packet.
    pub drop_truncated: u64,
    /// Dropped because the frame carried a VLAN tag.
    pub drop_vlan: u64,
    /// Dropped because the ethertype was neither IPv4 nor IPv6.
    pub drop_unknown_ether: u64,
    /// Dropped because no program was installed for the family.
    pub drop_no_prog: u64,
    /// Dropped because the receiving core has no partition.
    pub drop_bad_cpu: u64,
    /// Let through by a `Null` program without being accounted.
    pub bypass: u64,
    /// Parsed through L3 but the L4 protocol was not one we key on.
    pub unclassified: u64,
    /// A new flow could not be inserted because the partition was
    /// full.
    pub flow_table_full: u64,
    /// Packets accounted in a flow table.
    pub recorded: u64,
}

impl PipelineStatsSnap {
    /// Every packet lands in exactly one outcome counter.
    pub fn outcomes(&self) -> u64 {
        self.drop_truncated
            + self.drop_vlan
            + self.drop_unknown_ether
            + self.drop_no_prog
            + self.drop_bad_cpu
            + self.bypass
            + self.unclassified
            + self.flow_table_full
            + self.recorded
    }
}

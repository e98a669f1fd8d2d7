// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Pipeline counters.

use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;
use flowacct_api::PipelineStatsSnap;

/// Where a packet's trip through the pipeline ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Truncated,
    Vlan,
    UnknownEther,
    NoProg,
    BadCpu,
    Bypass,
    Unclassified,
    FlowTableFull,
    Recorded,
}

/// Counters shared by every core running the pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    rx_pkts: AtomicU64,
    drop_truncated: AtomicU64,
    drop_vlan: AtomicU64,
    drop_unknown_ether: AtomicU64,
    drop_no_prog: AtomicU64,
    drop_bad_cpu: AtomicU64,
    bypass: AtomicU64,
    unclassified: AtomicU64,
    flow_table_full: AtomicU64,
    recorded: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&self, outcome: Outcome) {
        self.rx_pkts.fetch_add(1, Ordering::Relaxed);
        let ctr = match outcome {
            Outcome::Truncated => &self.drop_truncated,
            Outcome::Vlan => &self.drop_vlan,
            Outcome::UnknownEther => &self.drop_unknown_ether,
            Outcome::NoProg => &self.drop_no_prog,
            Outcome::BadCpu => &self.drop_bad_cpu,
            Outcome::Bypass => &self.bypass,
            Outcome::Unclassified => &self.unclassified,
            Outcome::FlowTableFull => &self.flow_table_full,
            Outcome::Recorded => &self.recorded,
        };
        ctr.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnap {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStatsSnap {
            rx_pkts: get(&self.rx_pkts),
            drop_truncated: get(&self.drop_truncated),
            drop_vlan: get(&self.drop_vlan),
            drop_unknown_ether: get(&self.drop_unknown_ether),
            drop_no_prog: get(&self.drop_no_prog),
            drop_bad_cpu: get(&self.drop_bad_cpu),
            bypass: get(&self.bypass),
            unclassified: get(&self.unclassified),
            flow_table_full: get(&self.flow_table_full),
            recorded: get(&self.recorded),
        }
    }
}

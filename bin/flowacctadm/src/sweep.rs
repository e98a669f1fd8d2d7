// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Sweeping a drained buffer into flow records.

use flowacct::engine::buffer::CpuFlow;
use flowacct_api::FlowKey;
use flowacct_api::FlowRecord;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Display;
use std::io::Write;

// Zero means "never stamped" and must not win the minimum.
fn min_nonzero(a: u64, b: u64) -> u64 {
    match (a, b) {
        (0, x) | (x, 0) => x,
        (a, b) => a.min(b),
    }
}

/// One buffer's flows merged across every core's partition.
#[derive(Debug, Default)]
pub struct Sweep {
    pub flows: BTreeMap<FlowKey, FlowRecord>,
    /// Packets accounted by each core.
    pub cpu_pkts: BTreeMap<usize, u64>,
}

impl Sweep {
    pub fn new(drained: impl IntoIterator<Item = CpuFlow>) -> Self {
        let mut sweep = Self::default();
        for (cpu, key, acc) in drained {
            *sweep.cpu_pkts.entry(cpu).or_default() += acc.packets;
            let rec = sweep.flows.entry(key).or_insert(FlowRecord {
                key,
                ..Default::default()
            });
            rec.start = min_nonzero(rec.start, acc.start);
            rec.end = rec.end.max(acc.end);
            rec.packets += acc.packets;
            rec.bytes += acc.bytes;
        }
        sweep
    }

    pub fn packets(&self) -> u64 {
        self.cpu_pkts.values().sum()
    }

    /// Write one CSV line per flow.
    pub fn write_csv(&self, out: &mut impl Write) -> std::io::Result<()> {
        for rec in self.flows.values() {
            writeln!(out, "{rec}")?;
        }
        Ok(())
    }
}

/// Per-core packet totals over a whole run.
#[derive(Debug, Default)]
pub struct Totals {
    cpu_pkts: BTreeMap<usize, u64>,
}

impl Totals {
    pub fn add(&mut self, sweep: &Sweep) {
        for (cpu, pkts) in &sweep.cpu_pkts {
            *self.cpu_pkts.entry(*cpu).or_default() += pkts;
        }
    }

    pub fn total(&self) -> u64 {
        self.cpu_pkts.values().sum()
    }

    pub fn cpu(&self, cpu: usize) -> u64 {
        self.cpu_pkts.get(&cpu).copied().unwrap_or(0)
    }
}

/// The trailing summary line: `# <total> cpuN:count ...`, busiest
/// core first.
impl Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "# {}", self.total())?;
        let busiest = self
            .cpu_pkts
            .iter()
            .sorted_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (cpu, pkts) in busiest {
            write!(f, " cpu{cpu}:{pkts}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flowacct_api::FlowAccumulator;

    fn key(sport: u16) -> FlowKey {
        let mut key = FlowKey::default();
        key.set_addrs(
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        );
        key.l4_proto = 17;
        key.src_port = sport.to_be_bytes();
        key.dst_port = 53u16.to_be_bytes();
        key
    }

    fn acc(start: u64, end: u64, packets: u64) -> FlowAccumulator {
        FlowAccumulator { start, end, packets, bytes: packets * 100 }
    }

    #[test]
    fn merge_across_cpus() {
        let sweep = Sweep::new([
            (0, key(1000), acc(50, 81, 2)),
            (1, key(1000), acc(20, 61, 3)),
            (1, key(2000), acc(0, 11, 1)),
            (2, key(2000), acc(7, 9, 1)),
        ]);

        assert_eq!(sweep.flows.len(), 2);
        let a = &sweep.flows[&key(1000)];
        assert_eq!((a.start, a.end, a.packets, a.bytes), (20, 81, 5, 500));
        let b = &sweep.flows[&key(2000)];
        assert_eq!((b.start, b.end), (7, 11));

        assert_eq!(sweep.cpu_pkts[&0], 2);
        assert_eq!(sweep.cpu_pkts[&1], 4);
        assert_eq!(sweep.packets(), 7);
    }

    #[test]
    fn totals_line() {
        let mut totals = Totals::default();
        assert_eq!(totals.to_string(), "# 0");

        totals.add(&Sweep::new([
            (0, key(1), acc(1, 2, 1)),
            (1, key(2), acc(1, 2, 4)),
        ]));
        totals.add(&Sweep::new([(0, key(1), acc(3, 4, 1))]));
        assert_eq!(totals.to_string(), "# 6 cpu1:4 cpu0:2");
        assert_eq!(totals.cpu(0), 2);
        assert_eq!(totals.cpu(9), 0);
    }
}

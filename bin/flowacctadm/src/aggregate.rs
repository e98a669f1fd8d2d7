// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Fold flow records from one or more sweeps into longer-lived flows.
//!
//! Records are taken in input order. A record whose key matches an
//! open flow extends it when it starts before the open flow's end or
//! less than `gap` after it; otherwise the open flow is closed and the
//! record takes its place.

use crate::AdmError;
use flowacct_api::FlowKey;
use flowacct_api::FlowRecord;
use flowacct_api::NANOS;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::io::Write;

pub const DEF_GAP_SECS: u64 = 60;

#[derive(Debug)]
pub struct Aggregator {
    gap: u64,
    open: BTreeMap<FlowKey, FlowRecord>,
    closed: Vec<FlowRecord>,
}

impl Aggregator {
    /// An aggregator which merges records less than `gap_secs` apart.
    pub fn new(gap_secs: u64) -> Self {
        Self {
            gap: gap_secs.saturating_mul(NANOS),
            open: BTreeMap::new(),
            closed: Vec::new(),
        }
    }

    pub fn add(&mut self, rec: FlowRecord) {
        match self.open.get_mut(&rec.key) {
            // A record that starts before the open flow ends overlaps
            // it, and always merges.
            Some(flow)
                if rec.start < flow.end || rec.start - flow.end < self.gap =>
            {
                flow.merge(&rec);
            }

            Some(flow) => {
                self.closed.push(*flow);
                *flow = rec;
            }

            None => {
                self.open.insert(rec.key, rec);
            }
        }
    }

    /// Add every record in `input`, skipping blank and `#` lines.
    ///
    /// Returns the number of records read. `name` is only used to
    /// report where a malformed line was found.
    pub fn read(
        &mut self,
        name: &str,
        input: impl BufRead,
    ) -> Result<usize, AdmError> {
        let mut n = 0;
        for (idx, line) in input.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let rec: FlowRecord =
                line.parse().map_err(|err| AdmError::Record {
                    file: name.to_string(),
                    line: idx + 1,
                    err,
                })?;
            self.add(rec);
            n += 1;
        }
        Ok(n)
    }

    pub fn num_open(&self) -> usize {
        self.open.len()
    }

    pub fn num_closed(&self) -> usize {
        self.closed.len()
    }

    /// Every flow, closed flows first.
    pub fn flows(&self) -> impl Iterator<Item = &FlowRecord> {
        self.closed.iter().chain(self.open.values())
    }

    pub fn write_csv(&self, out: &mut impl Write) -> std::io::Result<()> {
        for rec in self.flows() {
            writeln!(out, "{rec}")?;
        }
        Ok(())
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEF_GAP_SECS)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const A: &str = "10.0.0.1,10.0.0.2,443,51000,0x800,6";
    const B: &str = "10.0.0.3,10.0.0.2,53,40000,0x800,17";

    fn line(start: &str, end: &str, key: &str, pkts: u64) -> String {
        format!("{start},{end},{key},{pkts},{}", pkts * 100)
    }

    #[test]
    fn within_gap_merges() {
        let input = [
            line("100.0", "104.5", A, 2),
            line("150.0", "152.0", A, 3),
            "# 5 cpu0:5".to_string(),
        ]
        .join("\n");

        let mut agg = Aggregator::new(60);
        assert_eq!(agg.read("flows.csv", input.as_bytes()).unwrap(), 2);
        assert_eq!(agg.num_open(), 1);
        assert_eq!(agg.num_closed(), 0);

        let flow = agg.flows().next().unwrap();
        assert_eq!(flow.start, 100 * NANOS);
        assert_eq!(flow.end, 152 * NANOS);
        assert_eq!(flow.packets, 5);
        assert_eq!(flow.bytes, 500);
    }

    #[test]
    fn past_gap_closes() {
        let input = [
            line("100.0", "101.0", A, 1),
            line("10.0", "11.0", B, 1),
            line("161.0", "162.0", A, 1),
        ]
        .join("\n");

        let mut agg = Aggregator::new(60);
        agg.read("flows.csv", input.as_bytes()).unwrap();
        assert_eq!(agg.num_closed(), 1);
        assert_eq!(agg.num_open(), 2);

        let mut out = Vec::new();
        agg.write_csv(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("100.000000000,101.000000000,"));
        assert!(out.contains("161.000000000,162.000000000,10.0.0.1"));
    }

    #[test]
    fn overlap_merges() {
        let mut agg = Aggregator::new(1);
        for l in [line("100.0", "200.0", A, 1), line("150.0", "160.0", A, 1)] {
            agg.add(l.parse().unwrap());
        }
        let flow = agg.flows().next().unwrap();
        assert_eq!((flow.start, flow.end), (100 * NANOS, 200 * NANOS));
        assert_eq!(flow.packets, 2);
    }

    #[test]
    fn overlap_merges_with_zero_gap() {
        let mut agg = Aggregator::new(0);
        for l in [
            line("100.0", "200.0", A, 1),
            line("150.0", "160.0", A, 1),
            line("200.0", "201.0", A, 1),
        ] {
            agg.add(l.parse().unwrap());
        }
        // Only the record starting exactly at the end is a new flow.
        assert_eq!(agg.num_closed(), 1);
        assert_eq!(agg.num_open(), 1);
        let flow = agg.flows().next().unwrap();
        assert_eq!((flow.start, flow.end), (100 * NANOS, 200 * NANOS));
        assert_eq!(flow.packets, 2);
    }

    #[test]
    fn bad_line_is_located() {
        let input = format!("{}\nnot,a,record\n", line("1.0", "2.0", A, 1));
        let err = Aggregator::default()
            .read("x.csv", input.as_bytes())
            .unwrap_err();
        assert!(matches!(err, AdmError::Record { line: 2, .. }));
        assert!(err.to_string().starts_with("x.csv:2: "));
    }
}

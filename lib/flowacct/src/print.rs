// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print pipeline state in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both flowacctadm and integration tests.

use crate::api::FlowRecord;
use crate::api::PipelineStatsSnap;
use crate::api::Protocol;
use crate::api::Secs;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`PipelineStatsSnap`].
pub fn print_stats(stats: &PipelineStatsSnap) -> std::io::Result<()> {
    print_stats_into(&mut std::io::stdout(), stats)
}

/// Print a [`PipelineStatsSnap`] into a given writer.
pub fn print_stats_into(
    writer: &mut impl Write,
    stats: &PipelineStatsSnap,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "COUNTER\tPACKETS")?;
    let rows = [
        ("rx_pkts", stats.rx_pkts),
        ("recorded", stats.recorded),
        ("unclassified", stats.unclassified),
        ("flow_table_full", stats.flow_table_full),
        ("bypass", stats.bypass),
        ("drop_truncated", stats.drop_truncated),
        ("drop_vlan", stats.drop_vlan),
        ("drop_unknown_ether", stats.drop_unknown_ether),
        ("drop_no_prog", stats.drop_no_prog),
        ("drop_bad_cpu", stats.drop_bad_cpu),
    ];
    for (name, val) in rows {
        writeln!(t, "{name}\t{val}")?;
    }
    t.flush()
}

/// Print a list of [`FlowRecord`]s.
pub fn print_flows(flows: &[FlowRecord]) -> std::io::Result<()> {
    print_flows_into(&mut std::io::stdout(), flows)
}

/// Print a list of [`FlowRecord`]s into a given writer.
pub fn print_flows_into(
    writer: &mut impl Write,
    flows: &[FlowRecord],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(
        t,
        "PROTO\tSRC IP\tSPORT\tDST IP\tDPORT\tPKTS\tBYTES\tSTART\tEND"
    )?;
    for rec in flows {
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            Protocol::from(rec.key.l4_proto),
            rec.key.src_ip(),
            rec.key.sport(),
            rec.key.dst_ip(),
            rec.key.dport(),
            rec.packets,
            rec.bytes,
            Secs(rec.start),
            Secs(rec.end),
        )?;
    }
    t.flush()
}

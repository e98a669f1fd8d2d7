// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Replay captures end to end and check what lands in the CSV.

use flowacct::print::print_flows_into;
use flowacct_api::FlowRecord;
use flowacct_api::NANOS;
use flowacct_api::PipelineCfg;
use flowacct_api::XdpAction;
use flowacct_test_utils::*;
use flowacctadm::AdmError;
use flowacctadm::aggregate::Aggregator;
use flowacctadm::log;
use flowacctadm::replay::ReplayCfg;
use flowacctadm::replay::ReplaySummary;
use flowacctadm::replay::replay;
use std::net::IpAddr;
use std::num::NonZeroU64;
use std::num::NonZeroUsize;

const T0: u64 = 1_700_000_000 * NANOS;

fn guest() -> IpAddr {
    "172.30.0.5".parse().unwrap()
}

fn remote() -> IpAddr {
    "52.10.128.69".parse().unwrap()
}

fn tcp(sport: u16) -> Vec<u8> {
    tcp_frame(guest(), remote(), sport, 443, 100)
}

fn cfg(ncpus: usize, swap: u64) -> ReplayCfg {
    ReplayCfg {
        pipeline: PipelineCfg {
            ncpus: NonZeroUsize::new(ncpus).unwrap(),
            ..Default::default()
        },
        swap: NonZeroU64::new(swap).unwrap(),
        ..Default::default()
    }
}

fn run(cfg: &ReplayCfg, pcap: &[u8]) -> (ReplaySummary, Vec<String>) {
    let mut out = Vec::new();
    let summary = replay(cfg, pcap, &mut out, &log::discard()).unwrap();
    let out = String::from_utf8(out).unwrap();
    (summary, out.lines().map(str::to_string).collect())
}

fn records(lines: &[String]) -> Vec<FlowRecord> {
    lines
        .iter()
        .filter(|l| !l.starts_with('#'))
        .map(|l| l.parse().unwrap())
        .collect()
}

#[test]
fn single_packet() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(40000));
    let (summary, lines) = run(&cfg(1, 5), &pcap.into_bytes());

    assert_eq!(summary.packets, 1);
    assert_eq!(summary.sweeps, 2);
    assert_eq!(summary.stats.recorded, 1);
    assert_eq!(
        lines,
        [
            "1700000000.000000000,1700000000.000000001,172.30.0.5,\
             52.10.128.69,40000,443,0x800,6,1,100",
            "# 1 cpu0:1",
        ]
    );
}

#[test]
fn swap_sweeps_previous_buffer() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0 + NANOS, &tcp(40000))
        .add_pkt(T0 + 2 * NANOS, &tcp(40000))
        .add_pkt(T0 + 7 * NANOS, &tcp(40000));
    let (summary, lines) = run(&cfg(1, 5), &pcap.into_bytes());

    // One swap at T0 + 6s, then both buffers at the end.
    assert_eq!(summary.sweeps, 3);
    let recs = records(&lines);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].packets, 2);
    assert_eq!(recs[0].start, T0 + NANOS);
    assert_eq!(recs[0].end, T0 + 2 * NANOS + 1);
    assert_eq!(recs[1].packets, 1);
    assert_eq!(recs[1].start, T0 + 7 * NANOS);
    assert_eq!(lines.last().unwrap(), "# 3 cpu0:3");
}

#[test]
fn runtime_limits_capture_time() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(1))
        .add_pkt(T0 + NANOS / 2, &tcp(2))
        .add_pkt(T0 + NANOS, &tcp(3));
    let cfg = ReplayCfg { runtime: 1, ..cfg(1, 5) };
    let (summary, lines) = run(&cfg, &pcap.into_bytes());

    assert_eq!(summary.packets, 2);
    assert_eq!(summary.stats.rx_pkts, 2);
    assert_eq!(records(&lines).len(), 2);
}

#[test]
fn round_robin_cpus() {
    let mut pcap = PcapBuilder::new_nanos();
    for i in 0..5 {
        pcap.add_pkt(T0 + i, &tcp(40000));
    }
    let (summary, lines) = run(&cfg(2, 5), &pcap.into_bytes());

    let recs = records(&lines);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].packets, 5);
    assert_eq!(recs[0].bytes, 500);
    assert_eq!(recs[0].start, T0);
    assert_eq!(recs[0].end, T0 + 5);
    assert_eq!(summary.totals.cpu(0), 3);
    assert_eq!(summary.totals.cpu(1), 2);
    assert_eq!(lines.last().unwrap(), "# 5 cpu0:3 cpu1:2");
}

#[test]
fn huge_swap_interval_never_swaps() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(1))
        .add_pkt(T0 + NANOS, &tcp(1))
        .add_pkt(T0 + 2 * NANOS, &tcp(2));
    let (summary, lines) = run(&cfg(1, 20_000_000_000), &pcap.into_bytes());

    assert_eq!(summary.sweeps, 2);
    assert_eq!(summary.stats.recorded, 3);
    assert_eq!(records(&lines).len(), 2);
    assert_eq!(lines.last().unwrap(), "# 3 cpu0:3");
}

#[test]
fn swap_boundaries_skip_idle_intervals() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(1))
        .add_pkt(T0 + 23 * NANOS, &tcp(1))
        .add_pkt(T0 + 24 * NANOS, &tcp(1))
        .add_pkt(T0 + 25 * NANOS, &tcp(1));
    let (summary, lines) = run(&cfg(1, 5), &pcap.into_bytes());

    // Swaps at T0 + 23s and T0 + 25s, then both buffers at the end.
    assert_eq!(summary.sweeps, 4);
    let pkts: Vec<u64> = records(&lines).iter().map(|r| r.packets).collect();
    assert_eq!(pkts, [1, 2, 1]);
}

#[test]
fn timestamp_precision() {
    let ts = T0 + 123_456_789;

    let mut nsec = PcapBuilder::new_nanos();
    nsec.add_pkt(ts, &tcp(1));
    let (_, lines) = run(&cfg(1, 5), &nsec.into_bytes());
    assert!(
        lines[0].starts_with("1700000000.123456789,1700000000.123456790,")
    );

    let mut usec = PcapBuilder::new();
    usec.add_pkt(ts, &tcp(1));
    let (_, lines) = run(&cfg(1, 5), &usec.into_bytes());
    assert!(
        lines[0].starts_with("1700000000.123456000,1700000000.123456001,")
    );
}

#[test]
fn big_endian_capture() {
    let pkt = tcp(40000);
    let mut pcap = Vec::new();
    // magic, version 2.4, thiszone, sigfigs, snaplen, linktype
    for word in [PCAP_MAGIC_USEC, 0x0002_0004, 0, 0, 1500, 1] {
        pcap.extend_from_slice(&word.to_be_bytes());
    }
    let ts_sec = (T0 / NANOS) as u32;
    for word in [ts_sec, 250_000, pkt.len() as u32, pkt.len() as u32] {
        pcap.extend_from_slice(&word.to_be_bytes());
    }
    pcap.extend_from_slice(&pkt);

    let (summary, lines) = run(&cfg(1, 5), &pcap);
    assert_eq!(summary.stats.recorded, 1);
    assert!(lines[0].starts_with("1700000000.250000000,"));
}

#[test]
fn other_linktypes_are_refused() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(1));
    let mut bytes = pcap.into_bytes();
    // LINKTYPE_RAW
    bytes[20..24].copy_from_slice(&101u32.to_le_bytes());

    let err = replay(&cfg(1, 5), &bytes, &mut std::io::sink(), &log::discard())
        .unwrap_err();
    assert!(matches!(err, AdmError::Linktype(101)));
}

#[test]
fn truncated_capture_is_an_error() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(1));
    let mut bytes = pcap.into_bytes();
    bytes.truncate(24 + 8);

    let err = replay(&cfg(1, 5), &bytes, &mut std::io::sink(), &log::discard())
        .unwrap_err();
    assert!(matches!(err, AdmError::Pcap(_)));
}

#[test]
fn unaccounted_frames_reach_the_counters() {
    let mut pcap = PcapBuilder::new();
    let gre = build_frame(guest(), remote(), L4::Raw { proto: 47, len: 8 }, 64);
    pcap.add_pkt(T0, &ether_frame(0x8100, 64))
        .add_pkt(T0 + 1, &ether_frame(0x0806, 64))
        .add_pkt(T0 + 2, &gre)
        .add_pkt(T0 + 3, &tcp(1));
    let cfg = ReplayCfg {
        pipeline: PipelineCfg {
            action: XdpAction::Pass,
            ..Default::default()
        },
        ..cfg(1, 5)
    };
    let (summary, lines) = run(&cfg, &pcap.into_bytes());

    let stats = summary.stats;
    assert_eq!(stats.rx_pkts, 4);
    assert_eq!(stats.drop_vlan, 1);
    assert_eq!(stats.drop_unknown_ether, 1);
    assert_eq!(stats.unclassified, 1);
    assert_eq!(stats.recorded, 1);
    assert_eq!(stats.outcomes(), stats.rx_pkts);
    assert_eq!(records(&lines).len(), 1);
}

#[test]
fn replay_then_aggregate() {
    let mut pcap = PcapBuilder::new();
    pcap.add_pkt(T0, &tcp(40000))
        .add_pkt(T0 + 6 * NANOS, &tcp(40000))
        .add_pkt(T0 + 12 * NANOS, &tcp(40001));
    let mut out = Vec::new();
    replay(&cfg(1, 5), &pcap.into_bytes(), &mut out, &log::discard()).unwrap();

    let mut agg = Aggregator::new(60);
    assert_eq!(agg.read("flows.csv", out.as_slice()).unwrap(), 3);
    assert_eq!(agg.num_open(), 2);
    assert_eq!(agg.num_closed(), 0);
    let merged = agg.flows().find(|r| r.key.sport() == 40000).unwrap();
    assert_eq!(merged.packets, 2);
    assert_eq!(merged.start, T0);
    assert_eq!(merged.end, T0 + 6 * NANOS + 1);

    let mut table = Vec::new();
    let flows: Vec<FlowRecord> = agg.flows().copied().collect();
    print_flows_into(&mut table, &flows).unwrap();
    let table = String::from_utf8(table).unwrap();
    let rows: Vec<&str> = table.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("PROTO"));
    assert!(rows[1..].iter().all(|r| r.starts_with("TCP")));
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Replay a packet capture through the pipeline.
//!
//! Each packet is handed to a simulated core in round-robin order and
//! stamped with its capture time. Every `swap` seconds of capture time
//! the controller points the pipeline at the other buffer and sweeps
//! the one it just left. Packets between two swaps form a batch; each
//! core works through its share of a batch on its own thread.

use crate::AdmError;
use crate::log::SlogLog;
use crate::sweep::Sweep;
use crate::sweep::Totals;
use flowacct::engine::pipeline::Pipeline;
use flowacct::engine::pipeline::XdpMd;
use flowacct::provider::Providers;
use flowacct_api::BufferId;
use flowacct_api::NANOS;
use flowacct_api::PipelineCfg;
use flowacct_api::PipelineStatsSnap;
use pcap_parser::Linktype;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use slog::Logger;
use slog::debug;
use slog::info;
use std::io::Write;
use std::num::NonZeroU64;

pub const DEF_SWAP_SECS: u64 = 5;
pub const DEF_RUNTIME_SECS: u64 = 3600;

#[derive(Clone, Copy, Debug)]
pub struct ReplayCfg {
    pub pipeline: PipelineCfg,
    /// Seconds of capture time between buffer swaps.
    pub swap: NonZeroU64,
    /// Seconds of capture time to process before stopping.
    pub runtime: u64,
}

impl Default for ReplayCfg {
    fn default() -> Self {
        Self {
            pipeline: PipelineCfg::default(),
            swap: NonZeroU64::new(DEF_SWAP_SECS).unwrap_or(NonZeroU64::MIN),
            runtime: DEF_RUNTIME_SECS,
        }
    }
}

#[derive(Debug)]
pub struct ReplaySummary {
    /// Packets read from the capture and handed to the pipeline.
    pub packets: u64,
    /// Buffer sweeps written, including the final two.
    pub sweeps: usize,
    pub totals: Totals,
    pub stats: PipelineStatsSnap,
}

/// A packet bound for a core.
struct Pkt<'a> {
    cpu: usize,
    tstamp: u64,
    data: &'a [u8],
}

/// A capture read fully into memory.
struct Capture<'a> {
    rest: &'a [u8],
    big_endian: bool,
    nanos: bool,
}

impl<'a> Capture<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, AdmError> {
        let (rest, hdr) = pcap::parse_pcap_header(bytes)
            .map_err(|e| AdmError::Pcap(format!("bad header: {e:?}")))?;
        if hdr.network != Linktype::ETHERNET {
            return Err(AdmError::Linktype(hdr.network.0));
        }
        Ok(Self {
            rest,
            big_endian: hdr.is_bigendian(),
            nanos: hdr.is_nanosecond_precision(),
        })
    }

    fn tstamp(&self, block: &LegacyPcapBlock) -> u64 {
        let frac = u64::from(block.ts_usec);
        let frac = if self.nanos { frac } else { frac * 1_000 };
        u64::from(block.ts_sec) * NANOS + frac
    }

    /// The next packet and its capture time in nanoseconds.
    fn next_pkt(&mut self) -> Option<Result<(u64, &'a [u8]), AdmError>> {
        if self.rest.is_empty() {
            return None;
        }

        let res = if self.big_endian {
            pcap::parse_pcap_frame_be(self.rest)
        } else {
            pcap::parse_pcap_frame(self.rest)
        };

        match res {
            Ok((rest, block)) => {
                self.rest = rest;
                Some(Ok((self.tstamp(&block), block.data)))
            }
            Err(e) => {
                self.rest = &[];
                Some(Err(AdmError::Pcap(format!("bad frame: {e:?}"))))
            }
        }
    }
}

struct Replay<'a, W> {
    pipeline: Pipeline,
    active: BufferId,
    out: &'a mut W,
    totals: Totals,
    sweeps: usize,
    log: &'a Logger,
}

impl<W: Write> Replay<'_, W> {
    fn run_batch(&self, batch: &[Pkt]) {
        let ncpus = self.pipeline.cfg().ncpus.get();
        let pipeline = &self.pipeline;
        std::thread::scope(|s| {
            for cpu in 0..ncpus {
                s.spawn(move || {
                    for pkt in batch.iter().filter(|p| p.cpu == cpu) {
                        let ctx =
                            XdpMd::with_tstamp(pkt.data, cpu, pkt.tstamp);
                        pipeline.process(&ctx);
                    }
                });
            }
        });
    }

    fn sweep(&mut self, buf: BufferId) -> Result<(), AdmError> {
        debug!(self.log, "sweeping buffer";
            "buffer" => buf.name(),
            "flows_per_cpu" => ?self.pipeline.num_flows(buf)
        );
        let sweep = Sweep::new(self.pipeline.drain(buf)?);
        debug!(self.log, "swept buffer";
            "buffer" => buf.name(),
            "flows" => sweep.flows.len(),
            "packets" => sweep.packets()
        );
        sweep.write_csv(&mut *self.out)?;
        self.totals.add(&sweep);
        self.sweeps += 1;
        Ok(())
    }

    /// Point the pipeline at the idle buffer, then sweep the one it
    /// was writing to.
    fn swap(&mut self) -> Result<(), AdmError> {
        let prev = self.active;
        self.active = prev.other();
        self.pipeline.set_flow_buffer(self.active)?;
        self.sweep(prev)
    }

    /// Stop accounting and sweep both buffers.
    fn finish(&mut self) -> Result<(), AdmError> {
        self.pipeline.stop()?;
        for buf in BufferId::ALL {
            self.sweep(buf)?;
        }
        Ok(())
    }
}

/// Replay the capture in `pcap`, appending flow records to `out`.
///
/// The run ends at the end of the capture or once `cfg.runtime`
/// seconds of capture time have been processed, whichever comes
/// first. The last thing written is the per-core totals line.
pub fn replay(
    cfg: &ReplayCfg,
    pcap: &[u8],
    out: &mut impl Write,
    log: &Logger,
) -> Result<ReplaySummary, AdmError> {
    let mut cap = Capture::new(pcap)?;
    let providers = Providers { log: Box::new(SlogLog::new(log)) };
    let mut rp = Replay {
        pipeline: Pipeline::new(cfg.pipeline, providers),
        active: BufferId::Zero,
        out,
        totals: Totals::default(),
        sweeps: 0,
        log,
    };
    rp.pipeline.set_flow_buffer(rp.active)?;

    let ncpus = cfg.pipeline.ncpus.get();
    let swap_ns = cfg.swap.get().saturating_mul(NANOS);
    let runtime_ns = cfg.runtime.saturating_mul(NANOS);
    let mut first = None;
    let mut next_swap = 0;
    let mut packets = 0u64;
    let mut batch = Vec::new();

    while let Some(res) = cap.next_pkt() {
        let (tstamp, data) = res?;
        let first = *first.get_or_insert_with(|| {
            next_swap = tstamp.saturating_add(swap_ns);
            tstamp
        });

        if tstamp.saturating_sub(first) >= runtime_ns {
            info!(log, "runtime reached"; "secs" => cfg.runtime);
            break;
        }

        if tstamp >= next_swap {
            rp.run_batch(&batch);
            batch.clear();
            rp.swap()?;
            // The first swap boundary past this packet.
            let n = (tstamp - first) / swap_ns + 1;
            next_swap = first.saturating_add(n.saturating_mul(swap_ns));
        }

        let cpu = (packets % ncpus as u64) as usize;
        batch.push(Pkt { cpu, tstamp, data });
        packets += 1;
    }

    rp.run_batch(&batch);
    rp.finish()?;
    writeln!(rp.out, "{}", rp.totals)?;

    Ok(ReplaySummary {
        packets,
        sweeps: rp.sweeps,
        stats: rp.pipeline.stats(),
        totals: rp.totals,
    })
}

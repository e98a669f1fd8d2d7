// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The pipeline: classifier, program array, parsers, and buffers.
//!
//! Packet processing is `&self` and may run on any number of cores at
//! once, each passing its own core index in [`XdpMd::rx_cpu`]. The
//! control operations ([`Pipeline::set_flow_buffer`],
//! [`Pipeline::stop`], [`Pipeline::drain`]) may run concurrently with
//! packet processing.

use super::ParseErr;
use super::buffer::CpuFlow;
use super::buffer::FlowBuffers;
use super::dispatch::L3Prog;
use super::dispatch::ProgArray;
use super::ether;
use super::ip4::Ipv4HdrRaw;
use super::ip6::Ipv6HdrRaw;
use super::parse::parse_l3;
use super::stat::Outcome;
use super::stat::PipelineStats;
use crate::ddi::time::Moment;
use crate::provider::LogLevel;
use crate::provider::LogProvider;
use crate::provider::Providers;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Write;
use flowacct_api::AF_IPV4;
use flowacct_api::AF_IPV6;
use flowacct_api::BufferId;
use flowacct_api::FlowError;
use flowacct_api::PROG_ARRAY_LEN;
use flowacct_api::PipelineCfg;
use flowacct_api::PipelineStatsSnap;
use flowacct_api::XdpAction;

/// Diagnostic messages are formatted into a fixed buffer; anything
/// longer is cut off.
const DIAG_MSG_LEN: usize = 64;

// A writer that keeps as much of the message as fits.
struct DiagMsg(heapless::String<DIAG_MSG_LEN>);

impl Write for DiagMsg {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// The per-packet context handed to the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct XdpMd<'a> {
    /// The whole frame, starting at the Ethernet header.
    pub data: &'a [u8],
    /// The core the packet was received on.
    pub rx_cpu: usize,
    /// Monotonic nanoseconds at receive.
    pub tstamp: u64,
}

impl<'a> XdpMd<'a> {
    /// A context stamped with the current time.
    pub fn new(data: &'a [u8], rx_cpu: usize) -> Self {
        Self::with_tstamp(data, rx_cpu, Moment::now().raw())
    }

    pub fn with_tstamp(data: &'a [u8], rx_cpu: usize, tstamp: u64) -> Self {
        Self { data, rx_cpu, tstamp }
    }

    /// The packet length accounted in a flow's byte count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub struct Pipeline {
    cfg: PipelineCfg,
    progs: ProgArray,
    bufs: FlowBuffers,
    stats: PipelineStats,
    log: Box<dyn LogProvider>,
}

impl Pipeline {
    /// Compose a pipeline. Every program array slot starts empty, so
    /// until [`Pipeline::set_flow_buffer`] is called every packet is
    /// dropped unaccounted.
    pub fn new(cfg: PipelineCfg, providers: Providers) -> Self {
        Self {
            cfg,
            progs: ProgArray::new(),
            bufs: FlowBuffers::new(cfg.ncpus, cfg.flow_table_limit),
            stats: PipelineStats::new(),
            log: providers.log,
        }
    }

    pub fn cfg(&self) -> &PipelineCfg {
        &self.cfg
    }

    /// Run one packet through the pipeline and return its terminal
    /// action.
    pub fn process(&self, ctx: &XdpMd) -> XdpAction {
        let (outcome, action) = self.run(ctx);
        self.stats.record(outcome);
        action
    }

    fn run(&self, ctx: &XdpMd) -> (Outcome, XdpAction) {
        let idx = match ether::classify(ctx.data) {
            Ok(idx) => idx,
            Err(err) => return self.fail(err),
        };

        let Some(prog) = self.progs.get(idx) else {
            return self.fail(ParseErr::NoProgram(idx));
        };

        let (res, buf) = match prog {
            L3Prog::Null => return (Outcome::Bypass, XdpAction::Pass),
            L3Prog::Ipv4(buf) => (parse_l3::<Ipv4HdrRaw>(ctx.data), buf),
            L3Prog::Ipv6(buf) => (parse_l3::<Ipv6HdrRaw>(ctx.data), buf),
        };

        let key = match res {
            Ok(key) => key,
            Err(err) => return self.fail(err),
        };

        let len = ctx.len() as u64;
        match self.bufs.buffer(buf).upsert(ctx.rx_cpu, key, ctx.tstamp, len) {
            Ok(()) => (Outcome::Recorded, self.cfg.action),
            Err(FlowError::MaxCapacity(_)) => {
                (Outcome::FlowTableFull, self.cfg.action)
            }
            Err(err) => {
                self.diag(LogLevel::Warn, &err);
                (Outcome::BadCpu, XdpAction::Drop)
            }
        }
    }

    fn fail(&self, err: ParseErr) -> (Outcome, XdpAction) {
        let outcome = match err {
            ParseErr::Truncated { .. } => Outcome::Truncated,
            ParseErr::Vlan(_) => {
                self.diag(LogLevel::Debug, &err);
                Outcome::Vlan
            }
            ParseErr::UnknownEtherType(_) => {
                self.diag(LogLevel::Debug, &err);
                Outcome::UnknownEther
            }
            ParseErr::NoProgram(_) => Outcome::NoProg,
            ParseErr::Unclassified(_) | ParseErr::L4Truncated { .. } => {
                Outcome::Unclassified
            }
        };
        (outcome, err.action(self.cfg.action))
    }

    fn diag(&self, level: LogLevel, msg: &dyn core::fmt::Display) {
        let mut buf = DiagMsg(heapless::String::new());
        let _ = write!(buf, "{msg}");
        self.log.log(level, &buf.0);
    }

    /// Store `prog` in program array slot `idx`.
    pub fn install(
        &self,
        idx: u32,
        prog: Option<L3Prog>,
    ) -> Result<(), FlowError> {
        self.progs.install(idx, prog)
    }

    /// The program currently in slot `idx`.
    pub fn program(&self, idx: u32) -> Option<L3Prog> {
        self.progs.get(idx)
    }

    /// Point both address families at `buf`.
    ///
    /// Packets already past the classifier finish against whichever
    /// buffer they were dispatched to.
    pub fn set_flow_buffer(&self, buf: BufferId) -> Result<(), FlowError> {
        self.progs.install(AF_IPV4, Some(L3Prog::Ipv4(buf)))?;
        self.progs.install(AF_IPV6, Some(L3Prog::Ipv6(buf)))?;
        self.log.log(LogLevel::Note, &format!("swapped to buffer {buf}"));
        Ok(())
    }

    /// Stop accounting: both address families pass unparsed.
    pub fn stop(&self) -> Result<(), FlowError> {
        self.progs.install(AF_IPV4, Some(L3Prog::Null))?;
        self.progs.install(AF_IPV6, Some(L3Prog::Null))?;
        self.log.log(LogLevel::Note, "stopped flow collection");
        Ok(())
    }

    /// The buffer the family slots currently write to, if any.
    pub fn active_buffer(&self) -> Option<BufferId> {
        [AF_IPV4, AF_IPV6]
            .into_iter()
            .find_map(|idx| self.progs.get(idx).and_then(|p| p.buffer()))
    }

    // Any slot naming `buf` makes it live, not just the family slots.
    fn is_live(&self, buf: BufferId) -> bool {
        (0..PROG_ARRAY_LEN)
            .filter_map(|idx| self.progs.get(idx))
            .any(|p| p.buffer() == Some(buf))
    }

    /// Take every flow out of `buf`.
    ///
    /// # Errors
    ///
    /// [`FlowError::BufferActive`] if an installed program still
    /// writes to `buf`.
    pub fn drain(&self, buf: BufferId) -> Result<Vec<CpuFlow>, FlowError> {
        if self.is_live(buf) {
            return Err(FlowError::BufferActive(buf));
        }
        Ok(self.bufs.buffer(buf).drain())
    }

    /// Discard every flow in `buf`, with the same restriction as
    /// [`Pipeline::drain`].
    pub fn reset(&self, buf: BufferId) -> Result<(), FlowError> {
        if self.is_live(buf) {
            return Err(FlowError::BufferActive(buf));
        }
        self.bufs.buffer(buf).clear();
        Ok(())
    }

    /// Copy every flow out of `buf` without removing them.
    pub fn dump(&self, buf: BufferId) -> Vec<CpuFlow> {
        self.bufs.buffer(buf).dump()
    }

    /// The number of flows in each of `buf`'s partitions.
    pub fn num_flows(&self, buf: BufferId) -> Vec<u32> {
        self.bufs.buffer(buf).num_flows()
    }

    pub fn stats(&self) -> PipelineStatsSnap {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::CaptureLog;
    use core::num::NonZeroUsize;

    fn pipeline(log: CaptureLog) -> Pipeline {
        let cfg = PipelineCfg {
            ncpus: NonZeroUsize::new(2).unwrap(),
            ..Default::default()
        };
        Pipeline::new(cfg, Providers { log: Box::new(log) })
    }

    fn udp4() -> Vec<u8> {
        let mut pkt = vec![0u8; 14 + 20 + 8 + 4];
        pkt[12..14].copy_from_slice(&[0x08, 0x00]);
        pkt[14] = 0x45;
        pkt[23] = 17;
        pkt
    }

    #[test]
    fn empty_slot_drops() {
        let p = pipeline(CaptureLog::new());
        let pkt = udp4();
        assert_eq!(p.process(&XdpMd::new(&pkt, 0)), XdpAction::Drop);
        assert_eq!(p.stats().drop_no_prog, 1);
        assert_eq!(p.active_buffer(), None);
    }

    #[test]
    fn null_program_passes() {
        let p = pipeline(CaptureLog::new());
        p.stop().unwrap();
        let pkt = udp4();
        assert_eq!(p.process(&XdpMd::new(&pkt, 1)), XdpAction::Pass);
        assert_eq!(p.stats().bypass, 1);
        assert!(p.dump(BufferId::Zero).is_empty());
        assert!(p.dump(BufferId::One).is_empty());
    }

    #[test]
    fn live_buffer_cannot_be_drained() {
        let p = pipeline(CaptureLog::new());
        p.set_flow_buffer(BufferId::One).unwrap();
        assert_eq!(p.active_buffer(), Some(BufferId::One));
        assert_eq!(p.program(AF_IPV6), Some(L3Prog::Ipv6(BufferId::One)));
        assert_eq!(
            p.drain(BufferId::One),
            Err(FlowError::BufferActive(BufferId::One))
        );
        assert_eq!(p.drain(BufferId::Zero), Ok(vec![]));

        // A stray program in an unused slot also pins its buffer.
        p.install(2, Some(L3Prog::Ipv4(BufferId::Zero))).unwrap();
        assert_eq!(
            p.reset(BufferId::Zero),
            Err(FlowError::BufferActive(BufferId::Zero))
        );
    }

    #[test]
    fn bad_cpu_drops() {
        let log = CaptureLog::new();
        let p = pipeline(log.clone());
        p.set_flow_buffer(BufferId::Zero).unwrap();
        let pkt = udp4();
        let ctx = XdpMd::with_tstamp(&pkt, 5, 10);
        assert_eq!(p.process(&ctx), XdpAction::Drop);
        assert_eq!(p.stats().drop_bad_cpu, 1);
        assert!(log.messages().iter().any(|(lvl, _)| *lvl == LogLevel::Warn));
    }

    #[test]
    fn diag_is_bounded() {
        let log = CaptureLog::new();
        let p = pipeline(log.clone());
        p.diag(LogLevel::Debug, &"x".repeat(200));
        let msgs = log.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].1.len(), DIAG_MSG_LEN);
    }
}

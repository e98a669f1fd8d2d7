// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::num::NonZeroU32;
use std::num::NonZeroU64;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use slog::info;

use flowacct::ddi::time::Moment;
use flowacct::print::print_flows;
use flowacct::print::print_stats;
use flowacct_api::PipelineCfg;
use flowacct_api::XdpAction;
use flowacctadm::aggregate::Aggregator;
use flowacctadm::aggregate::DEF_GAP_SECS;
use flowacctadm::log;
use flowacctadm::replay::DEF_RUNTIME_SECS;
use flowacctadm::replay::ReplayCfg;
use flowacctadm::replay::replay;

/// Account packet flows and administer their output.
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Replay a packet capture through the flow accounting pipeline.
    Replay {
        /// Entry limit of each per-core flow table.
        #[arg(
            short,
            long,
            default_value_t = PipelineCfg::default().flow_table_limit
        )]
        mapsize: NonZeroU32,

        /// Verdict for every packet parsed far enough to account.
        #[arg(short = 'x', long, default_value_t = XdpAction::Drop)]
        xdpaction: XdpAction,

        /// Number of simulated receive cores.
        #[arg(short, long, default_value_t = NonZeroUsize::MIN)]
        cpus: NonZeroUsize,

        /// Seconds of capture time between buffer swaps.
        #[arg(short, long, default_value_t = ReplayCfg::default().swap)]
        swap: NonZeroU64,

        /// Seconds of capture time to process.
        #[arg(short = 't', long, default_value_t = DEF_RUNTIME_SECS)]
        runtime: u64,

        /// CSV file flow records are appended to.
        #[arg(short, long, default_value = "flows.csv")]
        output: PathBuf,

        /// Log at debug level.
        #[arg(short, long)]
        debug: bool,

        /// The capture to replay.
        pcap: PathBuf,
    },

    /// Merge flow records across sweeps.
    Aggregate {
        /// Records of a flow less than this many seconds apart merge.
        #[arg(short, long, default_value_t = DEF_GAP_SECS)]
        aggregate: u64,

        #[arg(short, long, default_value = "aggflows.csv")]
        outfile: PathBuf,

        /// Also print the merged flows as a table.
        #[arg(short, long)]
        print: bool,

        /// CSV files written by `replay`.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    match cmd {
        Command::Replay {
            mapsize,
            xdpaction,
            cpus,
            swap,
            runtime,
            output,
            debug,
            pcap,
        } => {
            let log = log::init(debug);
            let cfg = ReplayCfg {
                pipeline: PipelineCfg {
                    action: xdpaction,
                    flow_table_limit: mapsize,
                    ncpus: cpus,
                },
                swap,
                runtime,
            };

            let bytes = fs::read(&pcap).with_context(|| {
                format!("failed to read {}", pcap.display())
            })?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&output)
                .with_context(|| {
                    format!("failed to open {}", output.display())
                })?;
            let mut out = BufWriter::new(file);

            info!(log, "replaying";
                "pcap" => %pcap.display(),
                "cpus" => cpus.get()
            );
            let begin = Moment::now();
            let summary = replay(&cfg, &bytes, &mut out, &log)?;
            out.flush()?;
            info!(log, "replay done";
                "packets" => summary.packets,
                "sweeps" => summary.sweeps,
                "elapsed_ms" => Moment::now().delta_as_millis(begin)
            );

            println!("{}", summary.totals);
            print_stats(&summary.stats)?;
        }

        Command::Aggregate { aggregate, outfile, print, files } => {
            let mut agg = Aggregator::new(aggregate);
            for path in &files {
                let file = File::open(path).with_context(|| {
                    format!("failed to open {}", path.display())
                })?;
                let name = path.display().to_string();
                agg.read(&name, BufReader::new(file))?;
            }

            let mut out = BufWriter::new(File::create(&outfile)?);
            agg.write_csv(&mut out)?;
            out.flush()?;
            println!(
                "{} flows ({} closed, {} open) written to {}",
                agg.num_closed() + agg.num_open(),
                agg.num_closed(),
                agg.num_open(),
                outfile.display(),
            );
            if print {
                print_flows(&agg.flows().copied().collect::<Vec<_>>())?;
            }
        }
    }

    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! flowacct controller library.
//!
//! The controller owns a [`flowacct::engine::pipeline::Pipeline`],
//! feeds it packets, flips the live flow buffer on a schedule, and
//! sweeps the idle buffer out to CSV.

use flowacct_api::FlowError;
use thiserror::Error;

pub mod aggregate;
pub mod log;
pub mod replay;
pub mod sweep;

/// Errors related to running the controller.
#[derive(Debug, Error)]
pub enum AdmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer control or record parse failed.
    #[error("{0}")]
    Flow(#[from] FlowError),

    #[error("malformed pcap: {0}")]
    Pcap(String),

    #[error("unsupported pcap linktype: {0}")]
    Linktype(i32),

    #[error("{file}:{line}: {err}")]
    Record { file: String, line: usize, err: FlowError },
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the flow accounting engine and its
//! controllers.
//!
//! Everything in here is `no_std` so that it may be used from a
//! constrained packet-processing context as well as from userland.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod cfg;
pub mod flow;
pub mod proto;
pub mod record;
pub mod stat;

pub use cfg::*;
pub use flow::*;
pub use proto::*;
pub use record::*;
pub use stat::*;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// Errors surfaced by the flow tables and the buffer controls.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FlowError {
    /// The partition is at its entry limit; nothing was inserted.
    MaxCapacity(u64),

    /// The buffer is the live write target and may not be drained.
    BufferActive(BufferId),

    /// The packet arrived on a core that has no partition.
    BadCpu { cpu: usize, ncpus: usize },

    /// There is no such program array slot.
    BadSlot { idx: u32, len: u32 },

    /// A value read back from the external interface was malformed.
    BadRecord(String),
}

impl Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MaxCapacity(limit) => {
                write!(f, "flow table at max capacity: {limit}")
            }
            Self::BufferActive(buf) => {
                write!(f, "buffer {buf} is the active write target")
            }
            Self::BadCpu { cpu, ncpus } => {
                write!(f, "no partition for cpu {cpu} (ncpus = {ncpus})")
            }
            Self::BadSlot { idx, len } => {
                write!(f, "no program array slot {idx} (len = {len})")
            }
            Self::BadRecord(msg) => write!(f, "malformed flow record: {msg}"),
        }
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for FlowError {}

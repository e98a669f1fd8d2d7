// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow accounting engine.
//!
//! A packet enters at [`engine::pipeline::Pipeline::process`], is
//! classified by its ethertype, dispatched through the program array
//! to an L3 parser, keyed by its L4 header, and finally accounted in
//! the per-core partition of whichever buffer the installed program
//! names. Every path ends in a terminal [`api::XdpAction`].

#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

extern crate alloc;

pub use flowacct_api as api;

pub mod ddi;
pub mod engine;
#[cfg(any(feature = "std", test))]
pub mod print;
pub mod provider;

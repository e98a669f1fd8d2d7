// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Moments.

use std::sync::OnceLock;
use std::time::Instant;

pub use flowacct_api::NANOS;

/// The number of milliseconds in a second.
pub const MILLIS: u64 = 1_000;

// The zero point of the monotonic clock handed to the pipeline.
fn boot() -> Instant {
    static BOOT: OnceLock<Instant> = OnceLock::new();
    *BOOT.get_or_init(Instant::now)
}

/// A moment in time.
#[derive(Clone, Copy, Debug)]
pub struct Moment {
    inner: Instant,
}

impl Moment {
    pub fn now() -> Self {
        let _ = boot();
        Self { inner: Instant::now() }
    }

    /// Compute the delta between `self - earlier` and return as
    /// milliseconds.
    pub fn delta_as_millis(&self, earlier: Moment) -> u64 {
        let delta = self.inner.saturating_duration_since(earlier.inner);
        delta.as_secs() * MILLIS + u64::from(delta.subsec_millis())
    }

    /// Nanoseconds since the process first asked for the time.
    ///
    /// This is the value a packet is stamped with when the caller
    /// does not supply its own timestamp.
    pub fn raw(&self) -> u64 {
        let delta = self.inner.saturating_duration_since(boot());
        delta.as_secs() * NANOS + u64::from(delta.subsec_nanos())
    }
}

impl Default for Moment {
    fn default() -> Self {
        Self::now()
    }
}

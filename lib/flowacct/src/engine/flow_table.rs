// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow table implementation.
//!
//! A flow table is a single partition: the flows one core has seen
//! while its buffer was live. The table never evicts; an entry leaves
//! only when the controller drains or clears the table.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::num::NonZeroU32;
use flowacct_api::FlowAccumulator;
use flowacct_api::FlowError;
use flowacct_api::FlowKey;

type Result<T> = core::result::Result<T, FlowError>;

pub type FlowTableDump = Vec<(FlowKey, FlowAccumulator)>;

#[derive(Debug)]
pub struct FlowTable {
    limit: NonZeroU32,
    map: BTreeMap<FlowKey, FlowAccumulator>,
}

impl FlowTable {
    pub fn new(limit: NonZeroU32) -> Self {
        Self { limit, map: BTreeMap::new() }
    }

    /// Account for one packet of `len` bytes seen at `now`.
    ///
    /// A missing entry is first inserted as `{ start: now }` and then
    /// updated like any other.
    ///
    /// # Errors
    ///
    /// If the key is new and the table is at max capacity, an error is
    /// returned and no modification is made to the table.
    pub fn upsert(&mut self, key: FlowKey, now: u64, len: u64) -> Result<()> {
        if let Some(acc) = self.map.get_mut(&key) {
            acc.hit(now, len);
            return Ok(());
        }

        if self.map.len() >= self.limit.get() as usize {
            return Err(FlowError::MaxCapacity(u64::from(self.limit.get())));
        }

        let mut acc = FlowAccumulator::new(now);
        acc.hit(now, len);
        self.map.insert(key, acc);
        Ok(())
    }

    /// Clear all entries from the flow table.
    pub fn clear(&mut self) {
        self.map.clear()
    }

    /// Take every entry, leaving the table empty.
    pub fn drain(&mut self) -> FlowTableDump {
        core::mem::take(&mut self.map).into_iter().collect()
    }

    /// Copy out every entry, in key order.
    pub fn dump(&self) -> FlowTableDump {
        self.map.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn get(&self, key: &FlowKey) -> Option<&FlowAccumulator> {
        self.map.get(key)
    }

    /// Get the maximum number of entries this flow table may hold.
    pub fn limit(&self) -> NonZeroU32 {
        self.limit
    }

    /// Get the number of flows in this table.
    pub fn num_flows(&self) -> u32 {
        self.map.len() as u32
    }
}

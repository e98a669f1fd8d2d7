// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The double-buffered, per-core flow tables.

use super::flow_table::FlowTable;
use crate::ddi::sync::KMutex;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::num::NonZeroU32;
use core::num::NonZeroUsize;
use flowacct_api::BufferId;
use flowacct_api::FlowAccumulator;
use flowacct_api::FlowError;
use flowacct_api::FlowKey;

/// A flow drained from a partition, tagged with its core.
pub type CpuFlow = (usize, FlowKey, FlowAccumulator);

/// One buffer: a [`FlowTable`] per core.
#[derive(Debug)]
pub struct FlowTableSet {
    parts: Box<[KMutex<FlowTable>]>,
}

impl FlowTableSet {
    pub fn new(ncpus: NonZeroUsize, limit: NonZeroU32) -> Self {
        let parts = (0..ncpus.get())
            .map(|_| KMutex::new(FlowTable::new(limit)))
            .collect();
        Self { parts }
    }

    fn part(&self, cpu: usize) -> Result<&KMutex<FlowTable>, FlowError> {
        self.parts
            .get(cpu)
            .ok_or(FlowError::BadCpu { cpu, ncpus: self.parts.len() })
    }

    /// Account a packet in `cpu`'s partition.
    pub fn upsert(
        &self,
        cpu: usize,
        key: FlowKey,
        now: u64,
        len: u64,
    ) -> Result<(), FlowError> {
        self.part(cpu)?.lock().upsert(key, now, len)
    }

    /// Look up a flow in `cpu`'s partition.
    pub fn get(
        &self,
        cpu: usize,
        key: &FlowKey,
    ) -> Result<Option<FlowAccumulator>, FlowError> {
        Ok(self.part(cpu)?.lock().get(key).copied())
    }

    /// Take every flow out of every partition.
    ///
    /// Each partition is read and emptied under a single lock hold:
    /// an update lands either before the drain or after it.
    pub fn drain(&self) -> Vec<CpuFlow> {
        let mut flows = Vec::new();
        for (cpu, part) in self.parts.iter().enumerate() {
            let drained = part.lock().drain();
            flows.extend(drained.into_iter().map(|(k, v)| (cpu, k, v)));
        }
        flows
    }

    /// Copy every flow out of every partition without removing them.
    pub fn dump(&self) -> Vec<CpuFlow> {
        let mut flows = Vec::new();
        for (cpu, part) in self.parts.iter().enumerate() {
            let dumped = part.lock().dump();
            flows.extend(dumped.into_iter().map(|(k, v)| (cpu, k, v)));
        }
        flows
    }

    pub fn clear(&self) {
        for part in self.parts.iter() {
            part.lock().clear();
        }
    }

    /// The number of flows in each partition, indexed by core.
    pub fn num_flows(&self) -> Vec<u32> {
        self.parts.iter().map(|p| p.lock().num_flows()).collect()
    }
}

/// Buffers 0 and 1.
#[derive(Debug)]
pub struct FlowBuffers {
    sets: [FlowTableSet; 2],
}

impl FlowBuffers {
    pub fn new(ncpus: NonZeroUsize, limit: NonZeroU32) -> Self {
        Self {
            sets: [
                FlowTableSet::new(ncpus, limit),
                FlowTableSet::new(ncpus, limit),
            ],
        }
    }

    pub fn buffer(&self, id: BufferId) -> &FlowTableSet {
        &self.sets[id.index()]
    }
}

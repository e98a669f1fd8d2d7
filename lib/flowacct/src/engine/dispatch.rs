// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The L2 to L3 program array.
//!
//! The classifier picks a slot by address family; whatever program
//! the controller last stored there runs. Because a program names the
//! buffer it writes, storing into this array is also how the live
//! buffer is switched.

use core::fmt;
use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering;
use flowacct_api::BufferId;
use flowacct_api::FlowError;
use flowacct_api::PROG_ARRAY_LEN;

/// An L3 program that may be installed in a slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum L3Prog {
    /// Parse IPv4 and account in the given buffer.
    Ipv4(BufferId),
    /// Parse IPv6 and account in the given buffer.
    Ipv6(BufferId),
    /// Pass the packet without looking at it.
    Null,
}

impl L3Prog {
    const EMPTY: u8 = 0;

    fn encode(prog: Option<Self>) -> u8 {
        match prog {
            None => Self::EMPTY,
            Some(Self::Null) => 1,
            Some(Self::Ipv4(BufferId::Zero)) => 2,
            Some(Self::Ipv4(BufferId::One)) => 3,
            Some(Self::Ipv6(BufferId::Zero)) => 4,
            Some(Self::Ipv6(BufferId::One)) => 5,
        }
    }

    fn decode(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Null),
            2 => Some(Self::Ipv4(BufferId::Zero)),
            3 => Some(Self::Ipv4(BufferId::One)),
            4 => Some(Self::Ipv6(BufferId::Zero)),
            5 => Some(Self::Ipv6(BufferId::One)),
            _ => None,
        }
    }

    /// The buffer this program writes, if any.
    pub fn buffer(&self) -> Option<BufferId> {
        match self {
            Self::Ipv4(buf) | Self::Ipv6(buf) => Some(*buf),
            Self::Null => None,
        }
    }
}

impl fmt::Display for L3Prog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ipv4(buf) => write!(f, "parse_ipv4_flows{buf}"),
            Self::Ipv6(buf) => write!(f, "parse_ipv6_flows{buf}"),
            Self::Null => write!(f, "null_parser"),
        }
    }
}

/// A fixed array of [`PROG_ARRAY_LEN`] program slots.
///
/// Loads and stores are single atomic operations, so a packet sees
/// either the old or the new program of a slot, never a mix.
pub struct ProgArray {
    slots: [AtomicU8; PROG_ARRAY_LEN as usize],
}

impl ProgArray {
    pub fn new() -> Self {
        Self { slots: core::array::from_fn(|_| AtomicU8::new(L3Prog::EMPTY)) }
    }

    /// The program in slot `idx`, or `None` if the slot is empty or
    /// out of range.
    #[inline]
    pub fn get(&self, idx: u32) -> Option<L3Prog> {
        let slot = self.slots.get(idx as usize)?;
        L3Prog::decode(slot.load(Ordering::Acquire))
    }

    /// Store `prog` in slot `idx`; `None` empties the slot.
    pub fn install(
        &self,
        idx: u32,
        prog: Option<L3Prog>,
    ) -> Result<(), FlowError> {
        let slot = self
            .slots
            .get(idx as usize)
            .ok_or(FlowError::BadSlot { idx, len: PROG_ARRAY_LEN })?;
        slot.store(L3Prog::encode(prog), Ordering::Release);
        Ok(())
    }
}

impl Default for ProgArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut list = f.debug_list();
        for idx in 0..PROG_ARRAY_LEN {
            list.entry(&self.get(idx));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flowacct_api::AF_IPV4;
    use flowacct_api::AF_IPV6;

    #[test]
    fn starts_empty() {
        let pa = ProgArray::new();
        for idx in 0..PROG_ARRAY_LEN {
            assert_eq!(pa.get(idx), None);
        }
        assert_eq!(pa.get(PROG_ARRAY_LEN), None);
    }

    #[test]
    fn install_and_swap() {
        let pa = ProgArray::new();
        pa.install(AF_IPV4, Some(L3Prog::Ipv4(BufferId::Zero))).unwrap();
        pa.install(AF_IPV6, Some(L3Prog::Ipv6(BufferId::Zero))).unwrap();
        assert_eq!(pa.get(AF_IPV6), Some(L3Prog::Ipv6(BufferId::Zero)));

        pa.install(AF_IPV6, Some(L3Prog::Ipv6(BufferId::One))).unwrap();
        assert_eq!(pa.get(AF_IPV6).unwrap().buffer(), Some(BufferId::One));

        pa.install(AF_IPV4, None).unwrap();
        assert_eq!(pa.get(AF_IPV4), None);
        assert_eq!(
            pa.install(7, Some(L3Prog::Null)),
            Err(FlowError::BadSlot { idx: 7, len: 7 })
        );
    }

    #[test]
    fn names() {
        assert_eq!(
            L3Prog::Ipv6(BufferId::One).to_string(),
            "parse_ipv6_flows1"
        );
    }
}

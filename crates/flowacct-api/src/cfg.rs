// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Pipeline configuration.

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use core::num::NonZeroU32;
use core::num::NonZeroUsize;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// The default entry limit of a single flow table partition.
pub const FLOW_TABLE_DEF_MAX_ENTRIES: u32 = 1_048_576;

/// The verdict handed back to the receive path for each packet.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub enum XdpAction {
    /// Consume the packet.
    #[default]
    Drop,
    /// Forward the packet unmodified.
    Pass,
}

impl XdpAction {
    /// The numeric verdict as understood by the XDP hook.
    pub const fn code(self) -> u32 {
        match self {
            Self::Drop => 1,
            Self::Pass => 2,
        }
    }
}

impl FromStr for XdpAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "pass" => Ok(Self::Pass),
            _ => Err(format!("invalid xdp action: {s}")),
        }
    }
}

impl Display for XdpAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Drop => "drop",
            Self::Pass => "pass",
        };
        write!(f, "{s}")
    }
}

/// One of the two flow table buffers.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum BufferId {
    Zero = 0,
    One = 1,
}

impl BufferId {
    pub const ALL: [BufferId; 2] = [BufferId::Zero, BufferId::One];

    /// The buffer that is not `self`.
    pub const fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The table name this buffer is exported under.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zero => "flows0",
            Self::One => "flows1",
        }
    }
}

impl Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Everything fixed at the time the pipeline is composed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PipelineCfg {
    /// The verdict returned once a packet has been parsed far enough
    /// to be accounted for, whether or not it was recorded.
    pub action: XdpAction,

    /// The entry limit of each per-core partition.
    pub flow_table_limit: NonZeroU32,

    /// The number of execution cores, and therefore partitions per
    /// buffer.
    pub ncpus: NonZeroUsize,
}

impl Default for PipelineCfg {
    fn default() -> Self {
        Self {
            action: XdpAction::Drop,
            flow_table_limit: NonZeroU32::new(FLOW_TABLE_DEF_MAX_ENTRIES)
                .unwrap_or(NonZeroU32::MIN),
            ncpus: NonZeroUsize::MIN,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn parse_action() {
        assert_eq!("drop".parse::<XdpAction>().unwrap(), XdpAction::Drop);
        assert_eq!("PASS".parse::<XdpAction>().unwrap(), XdpAction::Pass);
        assert!("tx".parse::<XdpAction>().is_err());
        assert_eq!(XdpAction::Pass.to_string(), "pass");
        assert_eq!(XdpAction::Drop.code(), 1);
    }

    #[test]
    fn buffer_other() {
        assert_eq!(BufferId::Zero.other(), BufferId::One);
        assert_eq!(BufferId::One.other().other(), BufferId::One);
        assert_eq!(BufferId::One.name(), "flows1");
    }

    #[test]
    fn default_cfg() {
        let cfg = PipelineCfg::default();
        assert_eq!(cfg.flow_table_limit.get(), FLOW_TABLE_DEF_MAX_ENTRIES);
        assert_eq!(cfg.ncpus.get(), 1);
        assert_eq!(cfg.action, XdpAction::Drop);
    }
}

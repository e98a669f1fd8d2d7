// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Flow records as read out of a drained buffer.
//!
//! A record is one flow merged across every core's partition. Its
//! text form is a single comma separated line:
//!
//! ```text
//! start,end,src_ip,dst_ip,src_port,dst_port,l2_proto,l4_proto,packets,bytes
//! ```
//!
//! Times are seconds since the epoch with nanosecond precision, ports
//! are in host order, and `l2_proto` is written in hex.

use crate::FlowError;
use crate::flow::FlowKey;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;
use core::net::IpAddr;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

/// The number of nanoseconds in a second.
pub const NANOS: u64 = 1_000_000_000;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct FlowRecord {
    /// Time of the first packet, ns since the epoch.
    pub start: u64,
    /// Time of the last packet, ns since the epoch.
    pub end: u64,
    pub key: FlowKey,
    pub packets: u64,
    pub bytes: u64,
}

impl FlowRecord {
    /// Fold `other` into `self`: the union of the two time spans and
    /// the sum of their counters.
    pub fn merge(&mut self, other: &FlowRecord) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.packets += other.packets;
        self.bytes += other.bytes;
    }
}

/// Write `ns` as decimal seconds.
pub struct Secs(pub u64);

impl Display for Secs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / NANOS, self.0 % NANOS)
    }
}

impl FromStr for Secs {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FlowError::BadRecord(format!("bad timestamp: {s}"));
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        let secs: u64 = whole.parse().map_err(|_| bad())?;

        // Right-pad to nanoseconds and drop anything finer.
        let mut nanos = 0u64;
        let mut digits = 0;
        for c in frac.chars() {
            let d = c.to_digit(10).ok_or_else(bad)?;
            if digits < 9 {
                nanos = nanos * 10 + u64::from(d);
                digits += 1;
            }
        }
        while digits < 9 {
            nanos *= 10;
            digits += 1;
        }

        secs.checked_mul(NANOS)
            .and_then(|v| v.checked_add(nanos))
            .map(Secs)
            .ok_or_else(bad)
    }
}

impl Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{:#x},{},{},{}",
            Secs(self.start),
            Secs(self.end),
            self.key.src_ip(),
            self.key.dst_ip(),
            self.key.sport(),
            self.key.dport(),
            self.key.l2_proto,
            self.key.l4_proto,
            self.packets,
            self.bytes,
        )
    }
}

impl FromStr for FlowRecord {
    type Err = FlowError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() != 10 {
            return Err(FlowError::BadRecord(format!(
                "expected 10 fields, got {}",
                fields.len()
            )));
        }

        fn field<T: FromStr>(name: &str, val: &str) -> Result<T, FlowError> {
            val.parse()
                .map_err(|_| FlowError::BadRecord(format!("bad {name}: {val}")))
        }

        let start: Secs = fields[0].parse()?;
        let end: Secs = fields[1].parse()?;
        let src: IpAddr = field("src_ip", fields[2])?;
        let dst: IpAddr = field("dst_ip", fields[3])?;
        let sport: u16 = field("src_port", fields[4])?;
        let dport: u16 = field("dst_port", fields[5])?;
        let l2_raw = fields[6].trim_start_matches("0x");
        let l2_proto = u16::from_str_radix(l2_raw, 16).map_err(|_| {
            FlowError::BadRecord(format!("bad l2_proto: {}", fields[6]))
        })?;
        let l4_proto: u8 = field("l4_proto", fields[7])?;
        let packets: u64 = field("packets", fields[8])?;
        let bytes: u64 = field("bytes", fields[9])?;

        let mut key = FlowKey::default();
        key.set_addrs(src, dst);
        // The text form is authoritative for the family.
        key.l2_proto = l2_proto;
        key.l4_proto = l4_proto;
        key.src_port = sport.to_be_bytes();
        key.dst_port = dport.to_be_bytes();

        Ok(FlowRecord { start: start.0, end: end.0, key, packets, bytes })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proto::ETHER_TYPE_IPV4;
    use crate::proto::ETHER_TYPE_IPV6;
    use alloc::string::ToString;

    fn tcp_record() -> FlowRecord {
        let mut key = FlowKey::default();
        key.set_addrs(
            "10.0.0.1".parse().unwrap(),
            "192.168.1.20".parse().unwrap(),
        );
        key.l4_proto = 6;
        key.src_port = 443u16.to_be_bytes();
        key.dst_port = 51000u16.to_be_bytes();
        FlowRecord {
            start: 1_700_000_000_000_000_123,
            end: 1_700_000_002_500_000_000,
            key,
            packets: 3,
            bytes: 300,
        }
    }

    #[test]
    fn record_line() {
        let rec = tcp_record();
        assert_eq!(
            rec.to_string(),
            "1700000000.000000123,1700000002.500000000,10.0.0.1,\
             192.168.1.20,443,51000,0x800,6,3,300"
        );
        let back: FlowRecord = rec.to_string().parse().unwrap();
        assert_eq!(back, rec);
        assert_eq!(back.key.l2_proto, ETHER_TYPE_IPV4);
    }

    #[test]
    fn record_line_v6_prefix() {
        let line = "5.0,6.25,fd00:1122::,fd00:3344::,53,40000,0x86dd,17,1,90";
        let rec: FlowRecord = line.parse().unwrap();
        assert_eq!(rec.key.l2_proto, ETHER_TYPE_IPV6);
        assert_eq!(rec.key.src_addr, [0xfd, 0x00, 0x11, 0x22]);
        assert_eq!(rec.start, 5 * NANOS);
        assert_eq!(rec.end, 6 * NANOS + 250_000_000);
    }

    #[test]
    fn record_line_rejects_garbage() {
        assert!("1,2,3".parse::<FlowRecord>().is_err());
        assert!(
            "x,1,10.0.0.1,10.0.0.2,1,2,0x800,6,1,1"
                .parse::<FlowRecord>()
                .is_err()
        );
        assert!("1.5x".parse::<Secs>().is_err());
    }

    #[test]
    fn merge_spans() {
        let mut a = tcp_record();
        let mut b = tcp_record();
        b.start -= 10;
        b.end += 10;
        a.merge(&b);
        assert_eq!(a.start, b.start);
        assert_eq!(a.end, b.end);
        assert_eq!(a.packets, 6);
        assert_eq!(a.bytes, 600);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for building Ethernet frames.
//!
//! Every builder takes the total frame length and pads the payload out
//! to it, since the byte count accounted for a flow is the whole frame.

use flowacct_api::ETHER_TYPE_IPV4;
use flowacct_api::ETHER_TYPE_IPV6;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::Icmpv4Message;
use smoltcp::wire::Icmpv4Packet;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Address;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::Ipv6Address;
use smoltcp::wire::Ipv6Packet;
use smoltcp::wire::TcpPacket;
use smoltcp::wire::TcpSeqNumber;
use smoltcp::wire::UdpPacket;
use std::net::IpAddr;
use std::net::Ipv4Addr;

pub const ETHER_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const IPV6_HDR_LEN: usize = 40;
pub const ICMP_HDR_LEN: usize = 8;
pub const TCP_HDR_LEN: usize = 20;
pub const UDP_HDR_LEN: usize = 8;

pub const GW_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0x00, 0x00, 0x01];
pub const GUEST_MAC: [u8; 6] = [0xA8, 0x40, 0x25, 0xF7, 0x00, 0x01];

/// The L4 portion of a frame.
#[derive(Clone, Copy, Debug)]
pub enum L4 {
    Tcp { sport: u16, dport: u16 },
    Udp { sport: u16, dport: u16 },
    Icmp { ty: u8, code: u8 },
    /// `len` zero bytes under an arbitrary protocol number.
    Raw { proto: u8, len: usize },
}

impl L4 {
    pub fn proto(&self) -> u8 {
        match self {
            Self::Tcp { .. } => 6,
            Self::Udp { .. } => 17,
            Self::Icmp { .. } => 1,
            Self::Raw { proto, .. } => *proto,
        }
    }

    pub fn hdr_len(&self) -> usize {
        match self {
            Self::Tcp { .. } => TCP_HDR_LEN,
            Self::Udp { .. } => UDP_HDR_LEN,
            Self::Icmp { .. } => ICMP_HDR_LEN,
            Self::Raw { len, .. } => *len,
        }
    }
}

/// Write an Ethernet header with the given ethertype into `buf`.
fn emit_ether(buf: &mut [u8], ether_type: u16) {
    let mut eth = EthernetFrame::new_unchecked(buf);
    eth.set_dst_addr(EthernetAddress(GW_MAC));
    eth.set_src_addr(EthernetAddress(GUEST_MAC));
    eth.set_ethertype(EthernetProtocol::from(ether_type));
}

fn emit_l4(buf: &mut [u8], l4: L4, l4_len: usize) {
    match l4 {
        L4::Tcp { sport, dport } => {
            let mut tcp = TcpPacket::new_unchecked(buf);
            tcp.set_src_port(sport);
            tcp.set_dst_port(dport);
            tcp.set_seq_number(TcpSeqNumber(4224));
            tcp.set_ack_number(TcpSeqNumber(0));
            tcp.set_header_len(TCP_HDR_LEN as u8);
            tcp.clear_flags();
            tcp.set_ack(true);
            tcp.set_window_len(64240);
            tcp.set_checksum(0);
            tcp.set_urgent_at(0);
        }

        L4::Udp { sport, dport } => {
            let mut udp = UdpPacket::new_unchecked(buf);
            udp.set_src_port(sport);
            udp.set_dst_port(dport);
            udp.set_len(l4_len as u16);
            udp.set_checksum(0);
        }

        L4::Icmp { ty, code } => {
            let mut icmp = Icmpv4Packet::new_unchecked(buf);
            icmp.set_msg_type(Icmpv4Message::from(ty));
            icmp.set_msg_code(code);
            icmp.set_echo_ident(7);
            icmp.set_echo_seq_no(1);
            icmp.fill_checksum();
        }

        L4::Raw { .. } => {}
    }
}

/// Build a frame of exactly `frame_len` bytes.
///
/// # Panics
///
/// If `frame_len` cannot hold every header, or if the address
/// families of `src` and `dst` differ.
pub fn build_frame(
    src: IpAddr,
    dst: IpAddr,
    l4: L4,
    frame_len: usize,
) -> Vec<u8> {
    let l3_len = match src {
        IpAddr::V4(_) => IPV4_HDR_LEN,
        IpAddr::V6(_) => IPV6_HDR_LEN,
    };
    let min = ETHER_HDR_LEN + l3_len + l4.hdr_len();
    assert!(
        frame_len >= min,
        "frame of {frame_len} bytes needs at least {min}"
    );

    let mut buf = vec![0u8; frame_len];
    let l3_off = ETHER_HDR_LEN;
    let l4_off = l3_off + l3_len;
    let l4_len = frame_len - l4_off;

    match (src, dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            emit_ether(&mut buf, ETHER_TYPE_IPV4);
            let mut ip = Ipv4Packet::new_unchecked(&mut buf[l3_off..]);
            ip.set_version(4);
            ip.set_header_len(IPV4_HDR_LEN as u8);
            ip.set_dscp(0);
            ip.set_ecn(0);
            ip.set_total_len((l3_len + l4_len) as u16);
            ip.set_ident(0x2f1c);
            ip.clear_flags();
            ip.set_dont_frag(true);
            ip.set_frag_offset(0);
            ip.set_hop_limit(64);
            ip.set_next_header(IpProtocol::from(l4.proto()));
            ip.set_src_addr(Ipv4Address::from_bytes(&src.octets()));
            ip.set_dst_addr(Ipv4Address::from_bytes(&dst.octets()));
            ip.fill_checksum();
        }

        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            emit_ether(&mut buf, ETHER_TYPE_IPV6);
            let mut ip = Ipv6Packet::new_unchecked(&mut buf[l3_off..]);
            ip.set_version(6);
            ip.set_traffic_class(0);
            ip.set_flow_label(0);
            ip.set_payload_len(l4_len as u16);
            ip.set_next_header(IpProtocol::from(l4.proto()));
            ip.set_hop_limit(64);
            ip.set_src_addr(Ipv6Address::from_bytes(&src.octets()));
            ip.set_dst_addr(Ipv6Address::from_bytes(&dst.octets()));
        }

        (_, _) => panic!("IP src and dst versions must match"),
    }

    emit_l4(&mut buf[l4_off..], l4, l4_len);
    buf
}

pub fn tcp_frame(
    src: IpAddr,
    dst: IpAddr,
    sport: u16,
    dport: u16,
    frame_len: usize,
) -> Vec<u8> {
    build_frame(src, dst, L4::Tcp { sport, dport }, frame_len)
}

pub fn udp_frame(
    src: IpAddr,
    dst: IpAddr,
    sport: u16,
    dport: u16,
    frame_len: usize,
) -> Vec<u8> {
    build_frame(src, dst, L4::Udp { sport, dport }, frame_len)
}

pub enum IcmpEchoType {
    Req,
    Reply,
}

/// An ICMPv4 echo request or reply with 56 bytes of data.
pub fn icmp_echo(etype: IcmpEchoType, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    let ty = match etype {
        IcmpEchoType::Req => 8,
        IcmpEchoType::Reply => 0,
    };
    let len = ETHER_HDR_LEN + IPV4_HDR_LEN + ICMP_HDR_LEN + 56;
    build_frame(src.into(), dst.into(), L4::Icmp { ty, code: 0 }, len)
}

/// A frame of `frame_len` bytes which is nothing but an Ethernet
/// header with the given ethertype followed by zeros.
pub fn ether_frame(ether_type: u16, frame_len: usize) -> Vec<u8> {
    assert!(frame_len >= ETHER_HDR_LEN);
    let mut buf = vec![0u8; frame_len];
    emit_ether(&mut buf, ether_type);
    buf
}

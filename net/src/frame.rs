// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Builders for the frames the controller originates: ARP, ICMP and the
//! DHCPDISCOVER probe. Tagged variants insert one 802.1Q shim with pcp=0
//! and dei unset; originated IPv4 always carries TTL 64.

use crate::arp::Arp;
use crate::dhcp;
use crate::errors::NetError;
use crate::eth::{ETH_TYPE_8021Q, ETH_TYPE_ARP, ETH_TYPE_IP, Mac};
use crate::ipv4::DEFAULT_TTL;
use crate::vlan::Vid;
use etherparse::icmpv4::{DestUnreachableHeader, TimeExceededCode};
use etherparse::{
    EtherType, Ethernet2Header, IcmpEchoHeader, Icmpv4Header, Icmpv4Type, IpNumber, Ipv4Header,
    SingleVlanHeader, UdpHeader, VlanId, VlanPcp,
};
use std::net::Ipv4Addr;

/// ICMP messages the router can originate.
///
/// `original` carries the triggering IP datagram (header plus payload); the
/// builder caps it at 128 octets per the RFC 4884 guidance, which comfortably
/// covers "internet header + 64 bits" from RFC 792.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpKind {
    EchoRequest { id: u16, seq: u16, data: Vec<u8> },
    EchoReply { id: u16, seq: u16, data: Vec<u8> },
    DestUnreachHost { original: Vec<u8> },
    DestUnreachPort { original: Vec<u8> },
    TimeExceeded { original: Vec<u8> },
}

const MAX_ORIGINAL_LEN: usize = 128;

fn push_l2(
    buf: &mut Vec<u8>,
    vid: Option<Vid>,
    src: Mac,
    dst: Mac,
    inner: u16,
) -> Result<(), NetError> {
    let outer = if vid.is_some() { ETH_TYPE_8021Q } else { inner };
    Ethernet2Header {
        source: src.0,
        destination: dst.0,
        ether_type: EtherType(outer),
    }
    .write(buf)
    .map_err(|_| NetError::FrameBuild("ethernet"))?;
    if let Some(vid) = vid {
        SingleVlanHeader {
            #[allow(unsafe_code)] // SAFETY: zero is a valid 3-bit pcp.
            pcp: unsafe { VlanPcp::new_unchecked(0) },
            drop_eligible_indicator: false,
            #[allow(unsafe_code)] // SAFETY: overlapping validity check between libraries.
            vlan_id: unsafe { VlanId::new_unchecked(vid.as_u16()) },
            ether_type: EtherType(inner),
        }
        .write(buf)
        .map_err(|_| NetError::FrameBuild("vlan"))?;
    }
    Ok(())
}

/// Build an ARP frame, optionally 802.1Q tagged.
pub fn arp_frame(vid: Option<Vid>, arp: Arp, eth_src: Mac, eth_dst: Mac) -> Vec<u8> {
    let mut buf = Vec::with_capacity(46);
    // Writes into a Vec cannot fail.
    let _ = push_l2(&mut buf, vid, eth_src, eth_dst, ETH_TYPE_ARP);
    buf.extend_from_slice(&arp.to_bytes());
    buf
}

/// Build an ICMP frame, optionally 802.1Q tagged.
pub fn icmp_frame(
    vid: Option<Vid>,
    eth_src: Mac,
    eth_dst: Mac,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    kind: &IcmpKind,
) -> Result<Vec<u8>, NetError> {
    let (icmp_type, payload): (Icmpv4Type, &[u8]) = match kind {
        IcmpKind::EchoRequest { id, seq, data } => (
            Icmpv4Type::EchoRequest(IcmpEchoHeader { id: *id, seq: *seq }),
            data,
        ),
        IcmpKind::EchoReply { id, seq, data } => (
            Icmpv4Type::EchoReply(IcmpEchoHeader { id: *id, seq: *seq }),
            data,
        ),
        IcmpKind::DestUnreachHost { original } => (
            Icmpv4Type::DestinationUnreachable(DestUnreachableHeader::Host),
            original,
        ),
        IcmpKind::DestUnreachPort { original } => (
            Icmpv4Type::DestinationUnreachable(DestUnreachableHeader::Port),
            original,
        ),
        IcmpKind::TimeExceeded { original } => (
            Icmpv4Type::TimeExceeded(TimeExceededCode::TtlExceededInTransit),
            original,
        ),
    };
    let payload = match kind {
        IcmpKind::EchoRequest { .. } | IcmpKind::EchoReply { .. } => payload,
        _ => &payload[..payload.len().min(MAX_ORIGINAL_LEN)],
    };

    let icmp = Icmpv4Header::with_checksum(icmp_type, payload);
    let icmp_len = icmp.header_len() + payload.len();
    let ipv4 = ipv4_header(ip_src, ip_dst, IpNumber::ICMP, icmp_len)?;

    let mut buf = Vec::with_capacity(14 + 4 + 20 + icmp_len);
    push_l2(&mut buf, vid, eth_src, eth_dst, ETH_TYPE_IP)?;
    ipv4.write(&mut buf).map_err(|_| NetError::FrameBuild("ipv4"))?;
    icmp.write(&mut buf).map_err(|_| NetError::FrameBuild("icmp"))?;
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Build the broadcast DHCPDISCOVER probe originated from `src_mac`.
pub fn dhcp_discover_frame(vid: Option<Vid>, src_mac: Mac, xid: u32) -> Result<Vec<u8>, NetError> {
    let payload = dhcp::build_discover(src_mac, xid);
    let ipv4 = ipv4_header(
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::BROADCAST,
        IpNumber::UDP,
        payload.len() + 8,
    )?;
    let udp = UdpHeader::with_ipv4_checksum(dhcp::CLIENT_PORT, dhcp::SERVER_PORT, &ipv4, &payload)
        .map_err(|_| NetError::FrameBuild("udp"))?;

    let mut buf = Vec::with_capacity(14 + 4 + 20 + 8 + payload.len());
    push_l2(&mut buf, vid, src_mac, Mac::BROADCAST, ETH_TYPE_IP)?;
    ipv4.write(&mut buf).map_err(|_| NetError::FrameBuild("ipv4"))?;
    udp.write(&mut buf).map_err(|_| NetError::FrameBuild("udp"))?;
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn ipv4_header(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: IpNumber,
    payload_len: usize,
) -> Result<Ipv4Header, NetError> {
    let payload_len =
        u16::try_from(payload_len).map_err(|_| NetError::FrameBuild("ipv4"))?;
    Ipv4Header::new(payload_len, DEFAULT_TTL, protocol, src.octets(), dst.octets())
        .map_err(|_| NetError::FrameBuild("ipv4"))
}

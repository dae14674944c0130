// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Definition of [`Headers`]: the decoded view of a packet-in frame.
//!
//! One decoder populates a tagged record; downstream classification is done
//! by field presence, never by inspecting raw bytes twice.

use crate::arp::Arp;
use crate::dhcp::{self, DhcpView};
use crate::errors::NetError;
use crate::eth::{ETH_TYPE_8021Q, ETH_TYPE_ARP, ETH_TYPE_IP};
use crate::vlan::VLANID_NONE;
use etherparse::{Ethernet2Header, Icmpv4Header, Ipv4Header, SingleVlanHeader, TcpHeader, UdpHeader};

/// Parsed headers of one received frame, outermost first.
///
/// `arp` and `ipv4` are mutually exclusive; `icmp`/`tcp`/`udp` imply `ipv4`;
/// `dhcp` implies `udp` on the BOOTP ports.
#[derive(Debug, Clone, PartialEq)]
pub struct Headers {
    pub eth: Ethernet2Header,
    pub vlan: Option<SingleVlanHeader>,
    pub arp: Option<Arp>,
    pub ipv4: Option<Ipv4Header>,
    pub icmp: Option<Icmpv4Header>,
    /// Bytes following the ICMP header (echo payload for echo messages).
    pub icmp_payload: Vec<u8>,
    pub tcp: Option<TcpHeader>,
    pub udp: Option<UdpHeader>,
    pub dhcp: Option<DhcpView>,
}

impl Headers {
    /// Decode a frame starting at the Ethernet header.
    ///
    /// # Errors
    ///
    /// Fails on truncation or an ethertype the router does not speak; callers
    /// drop such frames.
    pub fn parse(data: &[u8]) -> Result<Headers, NetError> {
        let (eth, rest) =
            Ethernet2Header::from_slice(data).map_err(|_| NetError::Truncated("ethernet"))?;

        let mut headers = Headers {
            eth,
            vlan: None,
            arp: None,
            ipv4: None,
            icmp: None,
            icmp_payload: Vec::new(),
            tcp: None,
            udp: None,
            dhcp: None,
        };

        let mut ether_type = headers.eth.ether_type.0;
        let mut rest = rest;
        if ether_type == ETH_TYPE_8021Q {
            let (vlan, after) =
                SingleVlanHeader::from_slice(rest).map_err(|_| NetError::Truncated("vlan"))?;
            ether_type = vlan.ether_type.0;
            headers.vlan = Some(vlan);
            rest = after;
        }

        match ether_type {
            ETH_TYPE_ARP => {
                headers.arp = Some(Arp::parse(rest)?);
            }
            ETH_TYPE_IP => headers.parse_ipv4(rest)?,
            other => return Err(NetError::UnsupportedEtherType(other)),
        }
        Ok(headers)
    }

    fn parse_ipv4(&mut self, buf: &[u8]) -> Result<(), NetError> {
        let (ipv4, rest) =
            Ipv4Header::from_slice(buf).map_err(|_| NetError::Truncated("ipv4"))?;
        // The slice may carry ethernet padding past the datagram end.
        let payload_len = usize::from(ipv4.total_len)
            .saturating_sub(ipv4.header_len())
            .min(rest.len());
        let payload = &rest[..payload_len];

        match ipv4.protocol {
            etherparse::IpNumber::ICMP => {
                let (icmp, icmp_rest) =
                    Icmpv4Header::from_slice(payload).map_err(|_| NetError::Truncated("icmp"))?;
                self.icmp = Some(icmp);
                self.icmp_payload = icmp_rest.to_vec();
            }
            etherparse::IpNumber::TCP => {
                let (tcp, _) =
                    TcpHeader::from_slice(payload).map_err(|_| NetError::Truncated("tcp"))?;
                self.tcp = Some(tcp);
            }
            etherparse::IpNumber::UDP => {
                let (udp, udp_rest) =
                    UdpHeader::from_slice(payload).map_err(|_| NetError::Truncated("udp"))?;
                let bootp_ports = (udp.source_port == dhcp::SERVER_PORT
                    || udp.source_port == dhcp::CLIENT_PORT)
                    && (udp.destination_port == dhcp::SERVER_PORT
                        || udp.destination_port == dhcp::CLIENT_PORT);
                if bootp_ports {
                    self.dhcp = DhcpView::parse(udp_rest).ok();
                }
                self.udp = Some(udp);
            }
            _ => {}
        }
        self.ipv4 = Some(ipv4);
        Ok(())
    }

    /// Vlan id of the frame, [`VLANID_NONE`] when untagged.
    #[must_use]
    pub fn vlan_vid(&self) -> u16 {
        self.vlan
            .as_ref()
            .map_or(VLANID_NONE, |v| v.vlan_id.value())
    }

    /// Octets occupied by the Ethernet header and its optional 802.1Q shim;
    /// the IP datagram of the frame starts here.
    #[must_use]
    pub fn l2_len(&self) -> usize {
        14 + if self.vlan.is_some() { 4 } else { 0 }
    }

    #[must_use]
    pub fn ipv4_src(&self) -> Option<std::net::Ipv4Addr> {
        self.ipv4.as_ref().map(|ip| ip.source.into())
    }

    #[must_use]
    pub fn ipv4_dst(&self) -> Option<std::net::Ipv4Addr> {
        self.ipv4.as_ref().map(|ip| ip.destination.into())
    }

    /// `(id, seq)` when the frame is an ICMP echo request.
    #[must_use]
    pub fn icmp_echo_request(&self) -> Option<(u16, u16)> {
        match self.icmp.as_ref()?.icmp_type {
            etherparse::Icmpv4Type::EchoRequest(echo) => Some((echo.id, echo.seq)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_icmp_echo_reply(&self) -> bool {
        matches!(
            self.icmp.as_ref().map(|icmp| &icmp.icmp_type),
            Some(etherparse::Icmpv4Type::EchoReply(_))
        )
    }
}

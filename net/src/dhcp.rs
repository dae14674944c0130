// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Minimal BOOTP/DHCP view.
//!
//! The router only ever needs to recognise server-to-client BOOTREPLY frames
//! (to flood OFFER/ACK toward clients) and to emit a bare DISCOVER probe.
//! Nothing else of the protocol is modelled.

use crate::errors::NetError;
use crate::eth::Mac;
use std::net::Ipv4Addr;

/// BOOTP op: client to server.
pub const BOOTREQUEST: u8 = 1;
/// BOOTP op: server to client.
pub const BOOTREPLY: u8 = 2;

/// DHCP message type option values.
pub const DHCP_DISCOVER: u8 = 1;
pub const DHCP_OFFER: u8 = 2;
pub const DHCP_ACK: u8 = 5;

/// UDP port of the DHCP server side.
pub const SERVER_PORT: u16 = 67;
/// UDP port of the DHCP client side.
pub const CLIENT_PORT: u16 = 68;

const BOOTP_FIXED_LEN: usize = 236;
const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_PAD: u8 = 0;
const OPT_END: u8 = 255;

/// A decoded view over the fields the router cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpView {
    pub op: u8,
    pub xid: u32,
    pub yiaddr: Ipv4Addr,
    pub msg_type: Option<u8>,
}

impl DhcpView {
    /// Parse a UDP payload exchanged on ports 67/68.
    pub fn parse(buf: &[u8]) -> Result<DhcpView, NetError> {
        if buf.len() < BOOTP_FIXED_LEN + 4 || buf[BOOTP_FIXED_LEN..BOOTP_FIXED_LEN + 4] != MAGIC_COOKIE
        {
            return Err(NetError::Truncated("dhcp"));
        }
        let mut msg_type = None;
        let mut idx = BOOTP_FIXED_LEN + 4;
        while idx < buf.len() {
            match buf[idx] {
                OPT_PAD => idx += 1,
                OPT_END => break,
                code => {
                    let Some(&len) = buf.get(idx + 1) else { break };
                    let end = idx + 2 + len as usize;
                    if end > buf.len() {
                        break;
                    }
                    if code == OPT_MESSAGE_TYPE && len == 1 {
                        msg_type = Some(buf[idx + 2]);
                    }
                    idx = end;
                }
            }
        }
        Ok(DhcpView {
            op: buf[0],
            xid: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            yiaddr: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
            msg_type,
        })
    }

    /// True for a server BOOTREPLY carrying an OFFER or ACK.
    #[must_use]
    pub fn is_offer_or_ack(&self) -> bool {
        self.op == BOOTREPLY && matches!(self.msg_type, Some(DHCP_OFFER | DHCP_ACK))
    }
}

/// Build the UDP payload of a DHCPDISCOVER sent from `client_mac`.
#[must_use]
pub fn build_discover(client_mac: Mac, xid: u32) -> Vec<u8> {
    let mut buf = vec![0u8; BOOTP_FIXED_LEN];
    buf[0] = BOOTREQUEST;
    buf[1] = 1; // htype ethernet
    buf[2] = 6; // hlen
    buf[4..8].copy_from_slice(&xid.to_be_bytes());
    buf[10] = 0x80; // broadcast flag
    buf[28..34].copy_from_slice(&client_mac.0);
    buf.extend_from_slice(&MAGIC_COOKIE);
    buf.extend_from_slice(&[OPT_MESSAGE_TYPE, 1, DHCP_DISCOVER, OPT_END]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_round_trip() {
        let mac = Mac([0x02, 0, 0, 0, 0, 0x01]);
        let view = DhcpView::parse(&build_discover(mac, 0xdead_beef)).unwrap();
        assert_eq!(view.op, BOOTREQUEST);
        assert_eq!(view.xid, 0xdead_beef);
        assert_eq!(view.msg_type, Some(DHCP_DISCOVER));
        assert!(!view.is_offer_or_ack());
    }

    #[test]
    fn test_offer_classification() {
        let mut payload = build_discover(Mac::ZERO, 1);
        payload[0] = BOOTREPLY;
        let type_at = payload.len() - 2;
        payload[type_at] = DHCP_OFFER;
        assert!(DhcpView::parse(&payload).unwrap().is_offer_or_ack());
        payload[type_at] = DHCP_ACK;
        assert!(DhcpView::parse(&payload).unwrap().is_offer_or_ack());
        payload[type_at] = DHCP_DISCOVER;
        assert!(!DhcpView::parse(&payload).unwrap().is_offer_or_ack());
    }

    #[test]
    fn test_parse_rejects_missing_cookie() {
        let buf = vec![0u8; BOOTP_FIXED_LEN + 4];
        assert!(DhcpView::parse(&buf).is_err());
        assert!(DhcpView::parse(&buf[..100]).is_err());
    }
}

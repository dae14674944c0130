// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 address and CIDR parsing helpers for the REST surface.
//!
//! The REST body carries addresses as strings (`"10.0.0.1/24"`, `"10.0.0.254"`).
//! Parse failures surface the offending field name, which ends up verbatim in
//! the command result details.

use crate::errors::NetError;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Default TTL on IPv4 packets the controller originates.
pub const DEFAULT_TTL: u8 = 64;

/// Parse a bare dotted-quad address. `field` names the REST key being parsed.
pub fn parse_ip(value: &str, field: &str) -> Result<Ipv4Addr, NetError> {
    value
        .parse::<Ipv4Addr>()
        .map_err(|_| NetError::InvalidAddress(field.to_string()))
}

/// Parse `"A.B.C.D/M"` (or a bare `"A.B.C.D"`, treated as /32).
///
/// Returns the host address as written plus the masked network. The host part
/// is meaningful for address registration, where it is the router's own IP on
/// the subnet.
pub fn parse_cidr(value: &str, field: &str) -> Result<(Ipv4Addr, Ipv4Net), NetError> {
    let (ip_str, prefix_len) = match value.split_once('/') {
        Some((ip, mask)) => {
            let len: u8 = mask
                .parse()
                .map_err(|_| NetError::InvalidAddress(field.to_string()))?;
            (ip, len)
        }
        None => (value, 32),
    };
    let host = parse_ip(ip_str, field)?;
    let net = Ipv4Net::new(host, prefix_len)
        .map_err(|_| NetError::InvalidMaskLength(prefix_len))?
        .trunc();
    Ok((host, net))
}

/// Render `host/prefix` the way the REST surface shows registered addresses.
#[must_use]
pub fn fmt_host_cidr(host: Ipv4Addr, net: Ipv4Net) -> String {
    format!("{host}/{}", net.prefix_len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_masks_host_bits() {
        let (host, net) = parse_cidr("10.0.0.1/24", "address").unwrap();
        assert_eq!(host, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(net, "10.0.0.0/24".parse::<Ipv4Net>().unwrap());
        assert!(net.contains(&Ipv4Addr::new(10, 0, 0, 254)));
        assert!(!net.contains(&Ipv4Addr::new(10, 0, 1, 1)));
    }

    #[test]
    fn test_parse_cidr_bare_address_is_host_route() {
        let (host, net) = parse_cidr("192.168.5.7", "gateway").unwrap();
        assert_eq!(host, Ipv4Addr::new(192, 168, 5, 7));
        assert_eq!(net.prefix_len(), 32);
    }

    #[test]
    fn test_parse_cidr_rejects_garbage() {
        assert_eq!(
            parse_cidr("10.0.0.1/33", "address"),
            Err(NetError::InvalidMaskLength(33))
        );
        assert_eq!(
            parse_cidr("10.0.0/24", "address"),
            Err(NetError::InvalidAddress("address".to_string()))
        );
        assert_eq!(
            parse_cidr("10.0.0.1/x", "address"),
            Err(NetError::InvalidAddress("address".to_string()))
        );
    }

    #[test]
    fn test_fmt_host_cidr_keeps_host_bits() {
        let (host, net) = parse_cidr("10.0.0.1/24", "address").unwrap();
        assert_eq!(fmt_host_cidr(host, net), "10.0.0.1/24");
    }
}

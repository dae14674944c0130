// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Locally-attached subnets of one VLAN.

use crate::errors::RouterError;
use ipnet::Ipv4Net;
use net::ipv4::{fmt_host_cidr, parse_cidr};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// One locally-attached subnet. `default_gw` is the router's own IP on it and
/// the source address of anything the controller originates onto the subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub address_id: u32,
    pub net: Ipv4Net,
    pub default_gw: Ipv4Addr,
}

impl Address {
    #[must_use]
    pub fn netmask(&self) -> u8 {
        self.net.prefix_len()
    }

    #[must_use]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.net.contains(&ip)
    }

    /// The `"router-ip/prefix"` spelling used by the REST surface.
    #[must_use]
    pub fn rest_address(&self) -> String {
        fmt_host_cidr(self.default_gw, self.net)
    }
}

/// The set of subnets attached to one VLAN, keyed by id.
///
/// Ids are handed out monotonically over `[1, u32::MAX]`, wrapping and
/// skipping 0 and ids still in use.
#[derive(Debug, Default)]
pub struct AddressData {
    next_id: u32,
    entries: BTreeMap<u32, Address>,
}

impl AddressData {
    #[must_use]
    pub fn new() -> AddressData {
        AddressData {
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Register `"A.B.C.D/M"`. Rejects subnets overlapping an existing one
    /// in either direction.
    pub fn add(&mut self, cidr: &str) -> Result<Address, RouterError> {
        let (default_gw, net) = parse_cidr(cidr, "address")?;
        for other in self.entries.values() {
            if other.contains(default_gw) || net.contains(&other.default_gw) {
                return Err(RouterError::CommandFailure(format!(
                    "Address overlaps [address_id={}]",
                    other.address_id
                )));
            }
        }
        let address = Address {
            address_id: self.alloc_id(),
            net,
            default_gw,
        };
        self.entries.insert(address.address_id, address);
        Ok(address)
    }

    fn alloc_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if id != 0 && !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn delete(&mut self, address_id: u32) -> Option<Address> {
        self.entries.remove(&address_id)
    }

    #[must_use]
    pub fn get(&self, address_id: u32) -> Option<&Address> {
        self.entries.get(&address_id)
    }

    /// The address whose prefix contains `ip`, if any. Non-overlap makes the
    /// answer unique.
    #[must_use]
    pub fn get_by_ip(&self, ip: Ipv4Addr) -> Option<&Address> {
        self.entries.values().find(|a| a.contains(ip))
    }

    /// True when `ip` is one of the router's own IPs on this VLAN.
    #[must_use]
    pub fn is_default_gw(&self, ip: Ipv4Addr) -> bool {
        self.entries.values().any(|a| a.default_gw == ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.entries.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut data = AddressData::new();
        assert_eq!(data.add("10.0.0.1/24").unwrap().address_id, 1);
        assert_eq!(data.add("10.0.1.1/24").unwrap().address_id, 2);
    }

    #[test]
    fn test_overlap_rejected_both_directions() {
        let mut data = AddressData::new();
        data.add("10.0.0.1/24").unwrap();
        // contained within the existing prefix
        assert_eq!(
            data.add("10.0.0.65/26"),
            Err(RouterError::CommandFailure(
                "Address overlaps [address_id=1]".to_string()
            ))
        );
        // containing the existing prefix
        assert_eq!(
            data.add("10.0.1.1/16"),
            Err(RouterError::CommandFailure(
                "Address overlaps [address_id=1]".to_string()
            ))
        );
        // disjoint is fine
        assert!(data.add("10.1.0.1/24").is_ok());
    }

    #[test]
    fn test_lookup_by_ip_and_gw() {
        let mut data = AddressData::new();
        data.add("10.0.0.1/24").unwrap();
        data.add("10.0.1.1/24").unwrap();
        assert_eq!(
            data.get_by_ip(Ipv4Addr::new(10, 0, 1, 200)).unwrap().address_id,
            2
        );
        assert!(data.get_by_ip(Ipv4Addr::new(192, 168, 0, 1)).is_none());
        assert!(data.is_default_gw(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!data.is_default_gw(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_delete_frees_id_for_reuse_after_wrap() {
        let mut data = AddressData::new();
        data.add("10.0.0.1/24").unwrap();
        data.next_id = u32::MAX;
        assert_eq!(data.add("10.1.0.1/24").unwrap().address_id, u32::MAX);
        // wraps past 0 and the still-live id 1
        assert_eq!(data.add("10.2.0.1/24").unwrap().address_id, 2);
    }

    #[test]
    fn test_rest_rendering_keeps_router_ip() {
        let mut data = AddressData::new();
        let address = data.add("10.0.0.1/24").unwrap();
        assert_eq!(address.rest_address(), "10.0.0.1/24");
    }
}

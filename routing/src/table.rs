// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Static/default routes: one trie-backed table per source qualifier, with
//! fallback to the any-source table.

use crate::errors::RouterError;
use ipnet::Ipv4Net;
use net::Mac;
use prefix_trie::PrefixMap;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// One static or default route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub route_id: u32,
    pub dst: Ipv4Net,
    pub gateway_ip: Ipv4Addr,
    /// Resolved lazily from ARP; absent until the gateway answers.
    pub gateway_mac: Option<Mac>,
    /// Source-subnet qualifier; absent means any source.
    pub src: Option<Ipv4Net>,
}

impl Route {
    /// True for `0.0.0.0/0`.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.dst.prefix_len() == 0
    }
}

fn host_net(ip: Ipv4Addr) -> Ipv4Net {
    Ipv4Net::new(ip, 32).unwrap_or_else(|_| unreachable!())
}

/// Routes of one source qualifier, keyed by destination prefix.
pub struct RoutingTable {
    src_address: Option<Ipv4Net>,
    routes: PrefixMap<Ipv4Net, Route>,
}

impl RoutingTable {
    fn new(src_address: Option<Ipv4Net>) -> RoutingTable {
        RoutingTable {
            src_address,
            routes: PrefixMap::new(),
        }
    }

    fn insert(&mut self, route: Route) -> Result<(), RouterError> {
        if let Some(existing) = self.routes.get(&route.dst) {
            return Err(RouterError::CommandFailure(format!(
                "Destination overlaps [route_id={}]",
                existing.route_id
            )));
        }
        self.routes.insert(route.dst, route);
        Ok(())
    }

    /// Longest-prefix match. A mask-0 entry only matches as the last resort.
    fn lookup(&self, dst: Ipv4Addr) -> Option<&Route> {
        self.routes.get_lpm(&host_net(dst)).map(|(_, route)| route)
    }

    fn by_gateway_mac(&self, mac: Mac) -> Option<&Route> {
        self.iter().find(|route| route.gateway_mac == Some(mac))
    }

    fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|(_, route)| route)
    }

    fn is_empty(&self) -> bool {
        self.routes.iter().next().is_none()
    }
}

/// All routing tables of one VLAN: the any-source table (always present) plus
/// lazily created source-qualified tables.
pub struct PolicyRoutingTable {
    next_route_id: u32,
    any_source: RoutingTable,
    qualified: BTreeMap<Ipv4Net, RoutingTable>,
    /// Configured DHCP servers; stored, reachability never verified.
    pub dhcp_servers: Vec<Ipv4Addr>,
}

impl Default for PolicyRoutingTable {
    fn default() -> Self {
        PolicyRoutingTable::new()
    }
}

impl PolicyRoutingTable {
    #[must_use]
    pub fn new() -> PolicyRoutingTable {
        PolicyRoutingTable {
            next_route_id: 1,
            any_source: RoutingTable::new(None),
            qualified: BTreeMap::new(),
            dhcp_servers: Vec::new(),
        }
    }

    /// Insert a route, lazily creating its source-qualified table.
    pub fn add(
        &mut self,
        dst: Ipv4Net,
        gateway_ip: Ipv4Addr,
        src: Option<Ipv4Net>,
    ) -> Result<Route, RouterError> {
        let route = Route {
            route_id: self.alloc_id(),
            dst,
            gateway_ip,
            gateway_mac: None,
            src,
        };
        let table = match src {
            None => &mut self.any_source,
            Some(src_net) => self
                .qualified
                .entry(src_net)
                .or_insert_with(|| RoutingTable::new(Some(src_net))),
        };
        table.insert(route.clone())?;
        Ok(route)
    }

    fn alloc_id(&mut self) -> u32 {
        loop {
            let id = self.next_route_id;
            self.next_route_id = self.next_route_id.checked_add(1).unwrap_or(1);
            if id != 0 && !self.iter_routes().any(|r| r.route_id == id) {
                return id;
            }
        }
    }

    fn table_for_src(&self, src_ip: Option<Ipv4Addr>) -> &RoutingTable {
        if let Some(src_ip) = src_ip {
            for (src_net, table) in &self.qualified {
                if src_net.contains(&src_ip) {
                    return table;
                }
            }
        }
        &self.any_source
    }

    /// Longest-prefix lookup, honouring the source qualifier and falling back
    /// to the any-source table on a miss.
    #[must_use]
    pub fn lookup(&self, dst_ip: Ipv4Addr, src_ip: Option<Ipv4Addr>) -> Option<&Route> {
        let table = self.table_for_src(src_ip);
        table
            .lookup(dst_ip)
            .or_else(|| {
                if table.src_address.is_some() {
                    self.any_source.lookup(dst_ip)
                } else {
                    None
                }
            })
    }

    /// Find the route whose resolved gateway MAC is `mac`.
    #[must_use]
    pub fn by_gateway_mac(&self, mac: Mac, src_ip: Option<Ipv4Addr>) -> Option<&Route> {
        let table = self.table_for_src(src_ip);
        table
            .by_gateway_mac(mac)
            .or_else(|| {
                if table.src_address.is_some() {
                    self.any_source.by_gateway_mac(mac)
                } else {
                    None
                }
            })
    }

    /// Record the ARP-learned MAC on every route through `gateway_ip`.
    ///
    /// Returns whether any route uses that gateway, plus clones of the routes
    /// whose MAC actually changed (callers reinstall their flows).
    pub fn set_gateway_mac(&mut self, gateway_ip: Ipv4Addr, mac: Mac) -> (bool, Vec<Route>) {
        let mut found = false;
        let mut updated = Vec::new();
        for table in self.tables_mut() {
            let prefixes: Vec<Ipv4Net> = table
                .routes
                .iter()
                .filter(|(_, r)| r.gateway_ip == gateway_ip)
                .map(|(p, _)| *p)
                .collect();
            for prefix in prefixes {
                found = true;
                if let Some(route) = table.routes.get_mut(&prefix) {
                    if route.gateway_mac == Some(mac) {
                        continue;
                    }
                    route.gateway_mac = Some(mac);
                    updated.push(route.clone());
                }
            }
        }
        (found, updated)
    }

    /// Remove by id from every table; returns what was removed.
    pub fn delete(&mut self, route_id: u32) -> Vec<Route> {
        let mut removed = Vec::new();
        for table in self.tables_mut() {
            let prefixes: Vec<Ipv4Net> = table
                .routes
                .iter()
                .filter(|(_, r)| r.route_id == route_id)
                .map(|(p, _)| *p)
                .collect();
            for prefix in prefixes {
                if let Some(route) = table.routes.remove(&prefix) {
                    removed.push(route);
                }
            }
        }
        removed
    }

    /// Drop empty source-qualified tables. The any-source table stays.
    pub fn gc_subnet_tables(&mut self) {
        self.qualified.retain(|_, table| !table.is_empty());
    }

    /// `(gateway_ip, gateway_mac)` across all tables, deduplicated by ip.
    #[must_use]
    pub fn gateway_info(&self) -> Vec<(Ipv4Addr, Option<Mac>)> {
        let mut info: Vec<(Ipv4Addr, Option<Mac>)> = Vec::new();
        for route in self.iter_routes() {
            if !info.iter().any(|(ip, _)| *ip == route.gateway_ip) {
                info.push((route.gateway_ip, route.gateway_mac));
            }
        }
        info
    }

    pub fn iter_routes(&self) -> impl Iterator<Item = &Route> {
        self.any_source
            .iter()
            .chain(self.qualified.values().flat_map(RoutingTable::iter))
    }

    fn tables_mut(&mut self) -> impl Iterator<Item = &mut RoutingTable> {
        std::iter::once(&mut self.any_source).chain(self.qualified.values_mut())
    }

    /// True when only the empty any-source table remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.any_source.is_empty() && self.qualified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("0.0.0.0/0"), ip("10.0.0.254"), None).unwrap();
        tbl.add(net("192.168.0.0/16"), ip("10.0.0.253"), None).unwrap();
        tbl.add(net("192.168.5.0/24"), ip("10.0.0.252"), None).unwrap();

        assert_eq!(
            tbl.lookup(ip("192.168.5.7"), None).unwrap().gateway_ip,
            ip("10.0.0.252")
        );
        assert_eq!(
            tbl.lookup(ip("192.168.9.7"), None).unwrap().gateway_ip,
            ip("10.0.0.253")
        );
        // mask 0 only as last resort
        assert_eq!(
            tbl.lookup(ip("8.8.8.8"), None).unwrap().gateway_ip,
            ip("10.0.0.254")
        );
    }

    #[test]
    fn test_no_default_no_match() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("192.168.5.0/24"), ip("10.0.0.252"), None).unwrap();
        assert!(tbl.lookup(ip("8.8.8.8"), None).is_none());
    }

    #[test]
    fn test_duplicate_destination_rejected_per_table() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("192.168.5.0/24"), ip("10.0.0.254"), None).unwrap();
        assert_eq!(
            tbl.add(net("192.168.5.0/24"), ip("10.0.0.253"), None),
            Err(RouterError::CommandFailure(
                "Destination overlaps [route_id=1]".to_string()
            ))
        );
        // same destination under a source qualifier is a different table
        assert!(
            tbl.add(net("192.168.5.0/24"), ip("10.0.0.253"), Some(net("10.0.1.0/24")))
                .is_ok()
        );
    }

    #[test]
    fn test_source_qualified_lookup_with_fallback() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("0.0.0.0/0"), ip("10.0.0.254"), None).unwrap();
        tbl.add(net("0.0.0.0/0"), ip("10.0.0.253"), Some(net("10.0.1.0/24")))
            .unwrap();

        // qualified source picks its table
        assert_eq!(
            tbl.lookup(ip("8.8.8.8"), Some(ip("10.0.1.9"))).unwrap().gateway_ip,
            ip("10.0.0.253")
        );
        // unqualified source sticks to the any-source table
        assert_eq!(
            tbl.lookup(ip("8.8.8.8"), Some(ip("10.0.0.9"))).unwrap().gateway_ip,
            ip("10.0.0.254")
        );
        // qualified table miss falls back to any-source
        tbl.add(net("172.16.0.0/12"), ip("10.0.0.251"), None).unwrap();
        assert_eq!(
            tbl.lookup(ip("172.16.3.4"), Some(ip("10.0.1.9"))).unwrap().gateway_ip,
            ip("10.0.0.251")
        );
    }

    #[test]
    fn test_set_gateway_mac_updates_all_tables() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("0.0.0.0/0"), ip("10.0.0.254"), None).unwrap();
        tbl.add(net("192.168.0.0/16"), ip("10.0.0.254"), Some(net("10.0.1.0/24")))
            .unwrap();
        let mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

        let (found, updated) = tbl.set_gateway_mac(ip("10.0.0.254"), mac);
        assert!(found);
        assert_eq!(updated.len(), 2);

        // idempotent: same mac again changes nothing
        let (found, updated) = tbl.set_gateway_mac(ip("10.0.0.254"), mac);
        assert!(found);
        assert!(updated.is_empty());

        let (found, _) = tbl.set_gateway_mac(ip("10.0.0.1"), mac);
        assert!(!found);
    }

    #[test]
    fn test_delete_and_gc() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("192.168.0.0/16"), ip("10.0.0.254"), Some(net("10.0.1.0/24")))
            .unwrap();
        assert_eq!(tbl.qualified.len(), 1);
        let removed = tbl.delete(1);
        assert_eq!(removed.len(), 1);
        tbl.gc_subnet_tables();
        assert!(tbl.qualified.is_empty());
        assert!(tbl.is_empty());
    }

    #[test]
    fn test_gateway_info_dedups() {
        let mut tbl = PolicyRoutingTable::new();
        tbl.add(net("0.0.0.0/0"), ip("10.0.0.254"), None).unwrap();
        tbl.add(net("192.168.0.0/16"), ip("10.0.0.254"), None).unwrap();
        tbl.add(net("172.16.0.0/12"), ip("10.0.1.254"), None).unwrap();
        assert_eq!(tbl.gateway_info().len(), 2);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-switch port inventory.

use openflow::datapath::{PortDesc, PortNo};
use std::collections::BTreeMap;

/// The switch's physical ports, keyed by port number.
#[derive(Debug, Default, Clone)]
pub struct PortData {
    ports: BTreeMap<PortNo, PortDesc>,
}

impl PortData {
    #[must_use]
    pub fn new(ports: Vec<PortDesc>) -> PortData {
        PortData {
            ports: ports.into_iter().map(|p| (p.port_no, p)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, port_no: PortNo) -> Option<&PortDesc> {
        self.ports.get(&port_no)
    }

    pub fn add(&mut self, port: PortDesc) {
        self.ports.insert(port.port_no, port);
    }

    pub fn delete(&mut self, port_no: PortNo) {
        self.ports.remove(&port_no);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortDesc> {
        self.ports.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::Mac;

    #[test]
    fn test_port_inventory() {
        let mut ports = PortData::new(vec![PortDesc {
            port_no: 1,
            mac: Mac([2, 0, 0, 0, 0, 1]),
        }]);
        ports.add(PortDesc {
            port_no: 2,
            mac: Mac([2, 0, 0, 0, 0, 2]),
        });
        assert_eq!(ports.len(), 2);
        assert_eq!(ports.get(2).unwrap().mac, Mac([2, 0, 0, 0, 0, 2]));
        ports.delete(1);
        assert!(ports.get(1).is_none());
    }
}

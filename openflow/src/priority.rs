// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flow priority lattice.
//!
//! Larger wins. The scheme guarantees: addressed beats unaddressed, static
//! beats default, longer prefix beats shorter, and VLAN-scoped beats
//! non-VLAN-scoped within the same class.

use net::vlan::VLANID_NONE;

/// Added once for VLAN-tagged rules and for IP-handling rules.
pub const PRIORITY_VLAN_SHIFT: u16 = 1000;
/// Added once for classes above the addressed-static-route base.
pub const PRIORITY_NETMASK_SHIFT: u16 = 32;

/// Base priority classes, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    Normal,
    ArpHandling,
    DefaultRouting,
    AddressedDefaultRouting,
    MacLearning,
    StaticRouting,
    AddressedStaticRouting,
    ImplicitRouting,
    L2Switching,
    IpHandling,
}

impl PriorityClass {
    /// The base priority value of the class.
    #[must_use]
    pub fn base(self) -> u16 {
        match self {
            PriorityClass::Normal => 0,
            PriorityClass::ArpHandling | PriorityClass::DefaultRouting => 1,
            PriorityClass::AddressedDefaultRouting => 2,
            PriorityClass::MacLearning | PriorityClass::StaticRouting => 3,
            PriorityClass::AddressedStaticRouting => 4,
            PriorityClass::ImplicitRouting => 5,
            PriorityClass::L2Switching => 6,
            PriorityClass::IpHandling => 7,
        }
    }
}

/// Compute the installed priority of a flow.
///
/// `netmask` is the destination prefix length for route flows and must be
/// `None` for everything else.
#[must_use]
pub fn flow_priority(class: PriorityClass, vlan_id: u16, netmask: Option<u8>) -> u16 {
    let mut priority = class.base() + netmask.map_or(0, u16::from);
    if vlan_id != VLANID_NONE || class == PriorityClass::IpHandling {
        priority += PRIORITY_VLAN_SHIFT;
    }
    if class.base() > PriorityClass::AddressedStaticRouting.base() {
        priority += PRIORITY_NETMASK_SHIFT;
    }
    priority
}

/// Priority class of a route flow.
#[must_use]
pub fn route_class(is_default_route: bool, source_qualified: bool) -> PriorityClass {
    match (is_default_route, source_qualified) {
        (true, false) => PriorityClass::DefaultRouting,
        (true, true) => PriorityClass::AddressedDefaultRouting,
        (false, false) => PriorityClass::StaticRouting,
        (false, true) => PriorityClass::AddressedStaticRouting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_route_untagged() {
        // /24 static route on the untagged vlan: 3 + 24
        assert_eq!(
            flow_priority(PriorityClass::StaticRouting, VLANID_NONE, Some(24)),
            27
        );
    }

    #[test]
    fn test_ip_handling_gets_both_shifts() {
        assert_eq!(
            flow_priority(PriorityClass::IpHandling, VLANID_NONE, None),
            7 + PRIORITY_VLAN_SHIFT + PRIORITY_NETMASK_SHIFT
        );
    }

    #[test]
    fn test_vlan_scoped_beats_untagged_same_class() {
        let tagged = flow_priority(PriorityClass::MacLearning, 110, None);
        let untagged = flow_priority(PriorityClass::MacLearning, VLANID_NONE, None);
        assert_eq!(tagged, untagged + PRIORITY_VLAN_SHIFT);
    }

    #[test]
    fn test_implicit_beats_any_static_route() {
        let implicit = flow_priority(PriorityClass::ImplicitRouting, VLANID_NONE, None);
        let sharpest_static = flow_priority(
            PriorityClass::AddressedStaticRouting,
            VLANID_NONE,
            Some(32),
        );
        assert!(implicit > sharpest_static);
    }

    #[test]
    fn test_longer_prefix_wins() {
        let p24 = flow_priority(PriorityClass::StaticRouting, VLANID_NONE, Some(24));
        let p16 = flow_priority(PriorityClass::StaticRouting, VLANID_NONE, Some(16));
        assert!(p24 > p16);
    }

    #[test]
    fn test_route_class_selection() {
        assert_eq!(route_class(true, false), PriorityClass::DefaultRouting);
        assert_eq!(
            route_class(true, true),
            PriorityClass::AddressedDefaultRouting
        );
        assert_eq!(route_class(false, false), PriorityClass::StaticRouting);
        assert_eq!(
            route_class(false, true),
            PriorityClass::AddressedStaticRouting
        );
    }
}

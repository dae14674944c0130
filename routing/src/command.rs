// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! REST command and response models.
//!
//! The body key set is closed: anything outside
//! `{address, destination, gateway, address_id, route_id, dhcp_servers, bare}`
//! is a deserialization error.

use crate::errors::RouterError;
use serde::{Deserialize, Serialize};

pub const REST_OK: &str = "success";
pub const REST_NG: &str = "failure";
pub const REST_ALL: &str = "all";

/// Which VLAN routers a request addresses. The untagged router is `One(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanSpec {
    One(u16),
    All,
}

/// REST-addressable vlan ids: the untagged slot, or [2, 4094].
pub fn validate_vid(vid: u16) -> Result<(), RouterError> {
    if vid == 0 || (2..=4094).contains(&vid) {
        Ok(())
    } else {
        Err(RouterError::InvalidVlanId(u32::from(vid)))
    }
}

/// A mutation body for POST/DELETE.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterCommand {
    pub address: Option<String>,
    pub destination: Option<String>,
    pub gateway: Option<String>,
    pub address_id: Option<IdSpec>,
    pub route_id: Option<IdSpec>,
    pub dhcp_servers: Option<Vec<String>>,
    pub bare: Option<bool>,
}

impl RouterCommand {
    /// True when the body only toggles the `bare` flag.
    #[must_use]
    pub fn is_bare_only(&self) -> bool {
        self.bare.is_some()
            && self.address.is_none()
            && self.destination.is_none()
            && self.gateway.is_none()
            && self.address_id.is_none()
            && self.route_id.is_none()
            && self.dhcp_servers.is_none()
    }
}

/// A numeric id or the literal `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdSpec {
    Id(u32),
    Word(String),
}

impl IdSpec {
    /// True for the `"all"` spelling.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, IdSpec::Word(word) if word == REST_ALL)
    }

    /// The numeric id, if this is one.
    #[must_use]
    pub fn as_id(&self) -> Option<u32> {
        match self {
            IdSpec::Id(id) => Some(*id),
            IdSpec::Word(_) => None,
        }
    }

    /// Reject spellings that are neither an id nor `"all"`.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.as_id().is_some() || self.is_all() {
            Ok(())
        } else {
            Err(RouterError::InvalidParameter)
        }
    }
}

/// One element of `command_result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub result: &'static str,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
}

impl CommandResult {
    #[must_use]
    pub fn ok(details: String, vlan_id: Option<u16>) -> CommandResult {
        CommandResult {
            result: REST_OK,
            details,
            vlan_id,
        }
    }

    #[must_use]
    pub fn ng(details: String, vlan_id: Option<u16>) -> CommandResult {
        CommandResult {
            result: REST_NG,
            details,
            vlan_id,
        }
    }
}

/// One registered address, as rendered by GET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressEntry {
    pub address_id: u32,
    pub address: String,
}

/// One route, as rendered by GET.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub route_id: u32,
    pub destination: String,
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Per-VLAN slice of `internal_network`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VlanData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<AddressEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<RouteEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dhcp_servers: Vec<String>,
}

impl VlanData {
    /// True when GET would render nothing for this VLAN.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.route.is_empty() && self.dhcp_servers.is_empty()
    }
}

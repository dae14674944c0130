// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The boundary toward the switch-session layer.
//!
//! The wire codec owns the TCP session, the handshake and message framing; it
//! exposes each connected switch as a [`Datapath`] handle and feeds events
//! back as [`SessionEvent`] values.

use crate::flow::{FlowStatsEntry, OfMessage, OxmField};
use crate::version::OfVersion;
use net::Mac;
use std::sync::Arc;

/// A 64-bit datapath id.
pub type DatapathId = u64;

/// An OpenFlow port number (OF1.0 values widened to 32 bits).
pub type PortNo = u32;

/// Render a datapath id the way the REST surface spells it.
#[must_use]
pub fn dpid_to_str(dpid: DatapathId) -> String {
    format!("{dpid:016x}")
}

/// Parse the 16-hex-digit REST spelling of a datapath id.
#[must_use]
pub fn dpid_from_str(value: &str) -> Option<DatapathId> {
    if value.len() != 16 {
        return None;
    }
    DatapathId::from_str_radix(value, 16).ok()
}

/// One physical switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: PortNo,
    pub mac: Mac,
}

/// Handle onto one connected switch, provided by the session layer.
pub trait Datapath: Send + Sync {
    fn id(&self) -> DatapathId;
    fn version(&self) -> OfVersion;
    /// Number of flow tables from the Features reply.
    fn n_tables(&self) -> u8;
    fn ports(&self) -> Vec<PortDesc>;
    /// Allocate a fresh transaction id.
    fn next_xid(&self) -> u32;
    /// Fire-and-forget message dispatch toward the switch.
    fn send(&self, msg: OfMessage);
}

/// Why a packet-in was punted to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    Action,
    InvalidTtl,
}

/// A packet-in event.
///
/// OF1.0 carries the ingress port as a message field; OF1.2/1.3 carry it as
/// an OXM entry of the embedded match. Both spellings are preserved and
/// [`crate::ofctl::OfCtl::packetin_inport`] picks the version's one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInMsg {
    pub reason: PacketInReason,
    pub in_port: Option<PortNo>,
    pub match_fields: Vec<OxmField>,
    pub data: Vec<u8>,
}

/// One (possibly partial) flow-stats reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReplyMsg {
    pub xid: u32,
    pub flags: u16,
    pub body: Vec<FlowStatsEntry>,
}

/// Events the session layer feeds into the controller.
#[derive(Clone)]
pub enum SessionEvent {
    SwitchJoin(Arc<dyn Datapath>),
    SwitchLeave(DatapathId),
    PacketIn {
        dpid: DatapathId,
        msg: PacketInMsg,
    },
    StatsReply {
        dpid: DatapathId,
        msg: StatsReplyMsg,
    },
    PortAdded {
        dpid: DatapathId,
        port: PortDesc,
    },
    PortDeleted {
        dpid: DatapathId,
        port_no: PortNo,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpid_str_round_trip() {
        assert_eq!(dpid_to_str(1), "0000000000000001");
        assert_eq!(dpid_from_str("0000000000000001"), Some(1));
        assert_eq!(dpid_from_str("00000000000000001"), None);
        assert_eq!(dpid_from_str("1"), None);
        assert_eq!(dpid_from_str("000000000000000g"), None);
    }
}

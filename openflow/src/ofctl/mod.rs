// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The version-abstracted switch programming interface.
//!
//! One [`OfCtl`] exists per datapath, selected by negotiated version through
//! [`ofctl_for`]. Rule synthesis and packet emission go through the trait;
//! everything version-specific (match lowering, table choice, delete
//! semantics, TTL handling) lives in the per-version implementations.

pub mod v10;
pub mod v12;
pub mod v13;

use crate::cookie::Cookie;
use crate::datapath::{Datapath, PacketInMsg, PortNo};
use crate::errors::OfError;
use crate::flow::{
    Action, FlowStatsEntry, FlowStatsRequest, MatchSpec, OFPTT_ALL, OfMessage, OxmField, PacketOut,
};
use crate::stats::{OFP_REPLY_TIMER, Waiters};
use crate::version::OfVersion;
use async_trait::async_trait;
use net::arp::Arp;
use net::frame::{self, IcmpKind};
use net::headers::Headers;
use net::vlan::tag_of;
use net::Mac;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

type OfCtlFactory = fn(Arc<dyn Datapath>) -> Arc<dyn OfCtl>;

/// Version dispatch table, built once at first use.
static OFCTL_FACTORIES: Lazy<HashMap<OfVersion, OfCtlFactory>> = Lazy::new(|| {
    let mut table: HashMap<OfVersion, OfCtlFactory> = HashMap::new();
    table.insert(OfVersion::V1_0, v10::OfCtl10::create);
    table.insert(OfVersion::V1_2, v12::OfCtl12::create);
    table.insert(OfVersion::V1_3, v13::OfCtl13::create);
    table
});

/// Select the OfCtl implementation for a datapath's negotiated version.
pub fn ofctl_for(dp: Arc<dyn Datapath>) -> Result<Arc<dyn OfCtl>, OfError> {
    let version = dp.version();
    OFCTL_FACTORIES
        .get(&version)
        .map(|factory| factory(dp))
        .ok_or(OfError::UnsupportedVersion(version as u8))
}

#[async_trait]
pub trait OfCtl: Send + Sync {
    /// The datapath this controller handle programs.
    fn dp(&self) -> &Arc<dyn Datapath>;

    // Version-specific reserved port numbers.
    fn port_in_port(&self) -> PortNo;
    fn port_table(&self) -> PortNo;
    fn port_all(&self) -> PortNo;
    fn port_controller(&self) -> PortNo;
    fn port_any(&self) -> PortNo;

    /// Whether the version can decrement the IP TTL in hardware.
    fn supports_dec_ttl(&self) -> bool;

    /// Install one flow with the given actions.
    fn set_flow(
        &self,
        cookie: Cookie,
        priority: u16,
        spec: MatchSpec,
        idle_timeout: u16,
        actions: Vec<Action>,
    );

    /// Delete every flow on the datapath.
    fn clear_flows(&self);

    /// Ask the switch to punt TTL-invalid packets (where the version can).
    fn set_sw_config_for_ttl(&self);

    /// Delete one flow identified by a stats entry.
    fn delete_flow(&self, entry: &FlowStatsEntry);

    /// Version-specific ingress-port extraction from a packet-in.
    fn packetin_inport(&self, msg: &PacketInMsg) -> PortNo {
        msg.match_fields
            .iter()
            .find_map(|field| match field {
                OxmField::InPort(port) => Some(*port),
                _ => None,
            })
            .unwrap_or_else(|| self.port_any())
    }

    /// Install a flow whose only action is punting to the controller.
    fn set_packetin_flow(&self, cookie: Cookie, priority: u16, spec: MatchSpec) {
        let controller = self.port_controller();
        self.set_flow(cookie, priority, spec, 0, vec![Action::Output(controller)]);
    }

    /// Install a forwarding flow; `outport = None` installs a drop.
    #[allow(clippy::too_many_arguments)]
    fn set_routing_flow(
        &self,
        cookie: Cookie,
        priority: u16,
        outport: Option<PortNo>,
        spec: MatchSpec,
        src_mac: Option<Mac>,
        dst_mac: Option<Mac>,
        idle_timeout: u16,
        dec_ttl: bool,
    ) {
        let mut actions = Vec::new();
        if let Some(outport) = outport {
            if dec_ttl && self.supports_dec_ttl() {
                actions.push(Action::DecNwTtl);
            }
            if let Some(mac) = src_mac {
                actions.push(Action::SetEthSrc(mac));
            }
            if let Some(mac) = dst_mac {
                actions.push(Action::SetEthDst(mac));
            }
            actions.push(Action::Output(outport));
        }
        self.set_flow(cookie, priority, spec, idle_timeout, actions);
    }

    /// Fetch all installed flows, waiting up to [`OFP_REPLY_TIMER`].
    async fn get_all_flow(&self, waiters: &Waiters) -> Vec<FlowStatsEntry> {
        let dp = self.dp();
        let request = FlowStatsRequest {
            xid: dp.next_xid(),
            table_id: OFPTT_ALL,
            out_port: self.port_any(),
        };
        let notify = waiters.register(dp.id(), request.xid);
        dp.send(OfMessage::FlowStatsRequest(request));
        if tokio::time::timeout(OFP_REPLY_TIMER, notify.notified())
            .await
            .is_err()
        {
            debug!("Flow stats request timed out [{:016x}]", dp.id());
        }
        waiters
            .take(dp.id(), request.xid)
            .into_iter()
            .flat_map(|msg| msg.body)
            .collect()
    }

    /// Emit a raw frame through the switch.
    fn send_packet_out(&self, in_port: PortNo, output: PortNo, data: Vec<u8>) {
        self.dp().send(OfMessage::PacketOut(PacketOut {
            in_port,
            actions: vec![Action::Output(output)],
            data,
        }));
    }

    /// Craft and emit an ARP packet.
    #[allow(clippy::too_many_arguments)]
    fn send_arp(
        &self,
        opcode: u16,
        vlan_id: u16,
        src_mac: Mac,
        dst_mac: Mac,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        arp_target_mac: Mac,
        in_port: PortNo,
        output: PortNo,
    ) {
        let arp = Arp {
            opcode,
            sha: src_mac,
            spa: src_ip,
            tha: arp_target_mac,
            tpa: dst_ip,
        };
        let data = frame::arp_frame(tag_of(vlan_id), arp, src_mac, dst_mac);
        self.send_packet_out(in_port, output, data);
    }

    /// Craft and emit an ICMP message back toward the sender of `headers`.
    ///
    /// `src_ip = None` sources the reply from the destination of the
    /// triggering packet (a router IP, for packets addressed to the router).
    fn send_icmp(
        &self,
        in_port: PortNo,
        headers: &Headers,
        vlan_id: u16,
        kind: &IcmpKind,
        src_ip: Option<Ipv4Addr>,
    ) {
        let Some(ipv4) = &headers.ipv4 else {
            return;
        };
        let src_ip = src_ip.unwrap_or_else(|| Ipv4Addr::from(ipv4.destination));
        let dst_ip = Ipv4Addr::from(ipv4.source);
        match frame::icmp_frame(
            tag_of(vlan_id),
            Mac(headers.eth.destination),
            Mac(headers.eth.source),
            src_ip,
            dst_ip,
            kind,
        ) {
            Ok(data) => {
                let in_port_action = self.port_in_port();
                self.send_packet_out(in_port, in_port_action, data);
            }
            Err(e) => warn!("Failed to build ICMP frame: {e} [{:016x}]", self.dp().id()),
        }
    }

    /// Craft and emit a DHCPDISCOVER probe out one port.
    fn send_dhcp_discover(&self, vlan_id: u16, src_mac: Mac, output: PortNo) {
        let xid = self.dp().next_xid();
        match frame::dhcp_discover_frame(tag_of(vlan_id), src_mac, xid) {
            Ok(data) => {
                let controller = self.port_controller();
                self.send_packet_out(controller, output, data);
            }
            Err(e) => warn!(
                "Failed to build DHCPDISCOVER frame: {e} [{:016x}]",
                self.dp().id()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapath::StatsReplyMsg;
    use crate::flow::{FlowMod, FlowModCommand, Match10, MatchRepr, OFPFW_ALL};
    use crate::testing::MockDatapath;
    use net::eth::{ETH_TYPE_ARP, ETH_TYPE_IP};

    fn flow_mods(msgs: Vec<OfMessage>) -> Vec<FlowMod> {
        msgs.into_iter()
            .filter_map(|m| match m {
                OfMessage::FlowMod(fm) => Some(fm),
                _ => None,
            })
            .collect()
    }

    fn ip_dst_spec(cidr: &str) -> MatchSpec {
        MatchSpec {
            eth_type: Some(ETH_TYPE_IP),
            ipv4_dst: Some(cidr.parse().unwrap()),
            ..MatchSpec::default()
        }
    }

    #[test]
    fn test_factory_rejects_nothing_it_knows() {
        for version in [OfVersion::V1_0, OfVersion::V1_2, OfVersion::V1_3] {
            let dp = MockDatapath::new(1, version);
            assert!(ofctl_for(dp).is_ok());
        }
    }

    #[test]
    fn test_v10_packetin_flow_is_wildcarded() {
        let dp = MockDatapath::new(1, OfVersion::V1_0);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        let spec = MatchSpec {
            eth_type: Some(ETH_TYPE_ARP),
            ..MatchSpec::default()
        };
        ofctl.set_packetin_flow(Cookie::vlan_default(0), 1, spec);

        let mods = flow_mods(dp.take_sent());
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].table_id, 0);
        assert_eq!(mods[0].actions, vec![Action::Output(v10::OFPP_CONTROLLER)]);
        match &mods[0].match_ {
            MatchRepr::Wildcarded(Match10 {
                wildcards,
                dl_type,
                ..
            }) => {
                assert_eq!(*dl_type, ETH_TYPE_ARP);
                assert_ne!(*wildcards, OFPFW_ALL);
            }
            MatchRepr::Oxm(_) => panic!("OF1.0 must not emit OXM"),
        }
    }

    #[test]
    fn test_v13_ip_match_goes_to_table_one() {
        let dp = MockDatapath::new(1, OfVersion::V1_3);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        ofctl.set_routing_flow(
            Cookie::route(0, 1),
            27,
            Some(2),
            ip_dst_spec("192.168.5.0/24"),
            Some(Mac([2, 0, 0, 0, 0, 1])),
            Some(Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])),
            0,
            true,
        );

        let mods = flow_mods(dp.take_sent());
        assert_eq!(mods[0].table_id, v12::TABLE_IP);
        assert_eq!(
            mods[0].actions,
            vec![
                Action::DecNwTtl,
                Action::SetEthSrc(Mac([2, 0, 0, 0, 0, 1])),
                Action::SetEthDst(Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])),
                Action::Output(2),
            ]
        );
    }

    #[test]
    fn test_single_table_datapath_collapses_to_table_zero() {
        let dp = MockDatapath::with_tables(1, OfVersion::V1_3, 1);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        ofctl.set_packetin_flow(Cookie::address(0, 1), 1039, ip_dst_spec("10.0.0.1/32"));
        let mods = flow_mods(dp.take_sent());
        assert_eq!(mods[0].table_id, v12::TABLE_L2);
    }

    #[test]
    fn test_v10_never_decrements_ttl() {
        let dp = MockDatapath::new(1, OfVersion::V1_0);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        ofctl.set_routing_flow(
            Cookie::route(0, 1),
            27,
            Some(2),
            ip_dst_spec("192.168.5.0/24"),
            None,
            None,
            0,
            true,
        );
        let mods = flow_mods(dp.take_sent());
        assert!(!mods[0].actions.contains(&Action::DecNwTtl));
    }

    #[test]
    fn test_drop_flow_has_no_actions() {
        let dp = MockDatapath::new(1, OfVersion::V1_3);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        ofctl.set_routing_flow(
            Cookie::vlan_default(0),
            1,
            None,
            MatchSpec::default(),
            None,
            None,
            0,
            false,
        );
        let mods = flow_mods(dp.take_sent());
        assert!(mods[0].actions.is_empty());
    }

    #[test]
    fn test_v13_deletes_by_cookie() {
        let dp = MockDatapath::new(1, OfVersion::V1_3);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        let entry = FlowStatsEntry {
            cookie: Cookie::route(0, 1).raw(),
            table_id: 1,
            priority: 27,
            idle_timeout: 0,
            match_: MatchRepr::Oxm(Vec::new()),
            actions: Vec::new(),
        };
        ofctl.delete_flow(&entry);
        let mods = flow_mods(dp.take_sent());
        assert_eq!(mods[0].command, FlowModCommand::Delete);
        assert_eq!(mods[0].cookie, entry.cookie);
        assert_eq!(mods[0].cookie_mask, u64::MAX);
    }

    #[test]
    fn test_v10_deletes_strictly() {
        let dp = MockDatapath::new(1, OfVersion::V1_0);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        let entry = FlowStatsEntry {
            cookie: Cookie::address(0, 1).raw(),
            table_id: 0,
            priority: 3,
            idle_timeout: 0,
            match_: MatchRepr::Wildcarded(Match10::from_spec(&ip_dst_spec("10.0.0.0/24"))),
            actions: Vec::new(),
        };
        ofctl.delete_flow(&entry);
        let mods = flow_mods(dp.take_sent());
        assert_eq!(mods[0].command, FlowModCommand::DeleteStrict);
        assert_eq!(mods[0].priority, 3);
        assert_eq!(mods[0].match_, entry.match_);
    }

    #[test]
    fn test_packetin_inport_per_version() {
        let msg = PacketInMsg {
            reason: crate::datapath::PacketInReason::Action,
            in_port: Some(7),
            match_fields: vec![OxmField::InPort(9)],
            data: Vec::new(),
        };
        let v10ctl = ofctl_for(MockDatapath::new(1, OfVersion::V1_0)).unwrap();
        let v13ctl = ofctl_for(MockDatapath::new(1, OfVersion::V1_3)).unwrap();
        assert_eq!(v10ctl.packetin_inport(&msg), 7);
        assert_eq!(v13ctl.packetin_inport(&msg), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_all_flow_times_out_to_empty() {
        let dp = MockDatapath::new(1, OfVersion::V1_3);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        let waiters = Waiters::new();
        let flows = ofctl.get_all_flow(&waiters).await;
        assert!(flows.is_empty());
        // the request itself went out
        assert!(matches!(
            dp.take_sent().as_slice(),
            [OfMessage::FlowStatsRequest(_)]
        ));
    }

    #[tokio::test]
    async fn test_get_all_flow_collects_multipart_body() {
        let dp = MockDatapath::new(1, OfVersion::V1_3);
        let ofctl = ofctl_for(dp.clone()).unwrap();
        let waiters = Arc::new(Waiters::new());

        let entry = FlowStatsEntry {
            cookie: Cookie::address(0, 1).raw(),
            table_id: 1,
            priority: 1039,
            idle_timeout: 0,
            match_: MatchRepr::Oxm(Vec::new()),
            actions: Vec::new(),
        };
        let waiters2 = waiters.clone();
        let entry2 = entry.clone();
        let feeder = tokio::spawn(async move {
            // xid 1 is the first the mock hands out
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            waiters2.dispatch(
                1,
                OfVersion::V1_3,
                StatsReplyMsg {
                    xid: 1,
                    flags: crate::version::OFPMPF_REPLY_MORE,
                    body: vec![entry2.clone()],
                },
            );
            waiters2.dispatch(
                1,
                OfVersion::V1_3,
                StatsReplyMsg {
                    xid: 1,
                    flags: 0,
                    body: vec![entry2],
                },
            );
        });
        let flows = ofctl.get_all_flow(&waiters).await;
        feeder.await.unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0], entry);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-switch aggregate of VLAN routers.

use crate::command::{CommandResult, RouterCommand, VlanData, VlanSpec, validate_vid};
use crate::errors::RouterError;
use crate::ports::PortData;
use crate::vlan_router::VlanRouter;
use net::eth::ETH_TYPE_ARP;
use net::headers::Headers;
use net::vlan::VLANID_NONE;
use openflow::cookie::Cookie;
use openflow::datapath::{Datapath, DatapathId, PacketInMsg, PortDesc, PortNo};
use openflow::flow::MatchSpec;
use openflow::priority::{PriorityClass, flow_priority};
use openflow::{OfCtl, Waiters, ofctl_for};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Period of the cyclic gateway re-ARP sweep.
pub const CHK_ROUTING_TBL_INTERVAL: Duration = Duration::from_secs(30);

/// Pause between VLAN routers within one sweep.
pub const SWEEP_STAGGER: Duration = Duration::from_secs(1);

/// Work items serialized onto a router's single writer.
#[derive(Debug)]
pub enum RouterJob {
    PacketIn(PacketInMsg),
    SuspendTimeout { vlan_id: u16, serial: u64 },
}

/// One attached switch, acting as an IPv4 router per VLAN.
pub struct Router {
    dpid: DatapathId,
    ofctl: Arc<dyn OfCtl>,
    ports: PortData,
    vlans: BTreeMap<u16, VlanRouter>,
    jobs: mpsc::UnboundedSender<RouterJob>,
    waiters: Arc<Waiters>,
}

impl Router {
    /// Take ownership of a joining datapath: reset its tables, capture ARP,
    /// and start the untagged VLAN router.
    pub fn new(
        dp: &Arc<dyn Datapath>,
        waiters: Arc<Waiters>,
        jobs: mpsc::UnboundedSender<RouterJob>,
    ) -> Result<Router, RouterError> {
        let dpid = dp.id();
        let ofctl = ofctl_for(dp.clone())?;
        let ports = PortData::new(dp.ports());

        ofctl.clear_flows();
        ofctl.set_sw_config_for_ttl();

        // Set flow: ARP handling (packet in)
        let cookie = Cookie::vlan_default(VLANID_NONE);
        let priority = flow_priority(PriorityClass::ArpHandling, VLANID_NONE, None);
        ofctl.set_packetin_flow(
            cookie,
            priority,
            MatchSpec {
                eth_type: Some(ETH_TYPE_ARP),
                ..MatchSpec::default()
            },
        );
        info!("Set ARP handling (packet in) flow [cookie={cookie}] [{dpid:016x}]");

        let mut vlans = BTreeMap::new();
        vlans.insert(
            VLANID_NONE,
            VlanRouter::new(dpid, VLANID_NONE, false, ofctl.clone(), jobs.clone()),
        );

        info!("Join as router [{dpid:016x}]");
        Ok(Router {
            dpid,
            ofctl,
            ports,
            vlans,
            jobs,
            waiters,
        })
    }

    #[must_use]
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Vlan ids with live routers, ascending.
    #[must_use]
    pub fn vlan_ids(&self) -> Vec<u16> {
        self.vlans.keys().copied().collect()
    }

    pub fn handle_job(&mut self, job: RouterJob) {
        match job {
            RouterJob::PacketIn(msg) => self.packet_in(&msg),
            RouterJob::SuspendTimeout { vlan_id, serial } => {
                if let Some(vlan_router) = self.vlans.get_mut(&vlan_id) {
                    vlan_router.handle_suspend_timeout(serial);
                }
            }
        }
    }

    fn packet_in(&mut self, msg: &PacketInMsg) {
        let headers = match Headers::parse(&msg.data) {
            Ok(headers) => headers,
            Err(e) => {
                debug!("Drop undecodable packet: {e} [{:016x}]", self.dpid);
                return;
            }
        };
        let vlan_id = headers.vlan_vid();
        if let Some(vlan_router) = self.vlans.get_mut(&vlan_id) {
            vlan_router.packet_in(msg, &headers, &self.ports);
        } else {
            debug!(
                "Drop unknown vlan packet [vlan_id={vlan_id}] [{:016x}]",
                self.dpid
            );
        }
    }

    pub fn get_data(&self, spec: VlanSpec) -> Result<Vec<VlanData>, RouterError> {
        match spec {
            VlanSpec::One(vid) => {
                validate_vid(vid)?;
                Ok(self
                    .vlans
                    .get(&vid)
                    .map(|vlan_router| {
                        let mut data = vlan_router.get_data();
                        data.vlan_id = vid_tag(vid);
                        data
                    })
                    .into_iter()
                    .collect())
            }
            VlanSpec::All => Ok(self
                .vlans
                .values()
                .map(|vlan_router| {
                    let mut data = vlan_router.get_data();
                    data.vlan_id = vid_tag(vlan_router.vlan_id());
                    data
                })
                .filter(|data| !data.is_empty())
                .collect()),
        }
    }

    pub async fn set_data(
        &mut self,
        spec: VlanSpec,
        cmd: &RouterCommand,
    ) -> Result<Vec<CommandResult>, RouterError> {
        match spec {
            VlanSpec::One(vid) => {
                validate_vid(vid)?;
                if !self.vlans.contains_key(&vid) {
                    let bare = cmd.bare.unwrap_or(false);
                    self.vlans.insert(
                        vid,
                        VlanRouter::new(self.dpid, vid, bare, self.ofctl.clone(), self.jobs.clone()),
                    );
                    info!(
                        "Add vlan router [vlan_id={vid}, bare={bare}] [{:016x}]",
                        self.dpid
                    );
                }
                if cmd.is_bare_only() {
                    return Ok(vec![CommandResult::ok(
                        format!("Add vlan [vlan_id={vid}]"),
                        vid_tag(vid),
                    )]);
                }
                let ports = &self.ports;
                let result = match self.vlans.get_mut(&vid) {
                    Some(vlan_router) => vlan_router.set_data(cmd, ports),
                    None => Err(RouterError::InvalidParameter),
                };
                match result {
                    Ok(details) => Ok(vec![CommandResult::ok(details, vid_tag(vid))]),
                    Err(e) => {
                        // A half-created VLAN must not linger.
                        self.gc_empty_vlans().await;
                        Err(e)
                    }
                }
            }
            VlanSpec::All => {
                let mut results = Vec::new();
                let ports = &self.ports;
                for (vid, vlan_router) in &mut self.vlans {
                    results.push(match vlan_router.set_data(cmd, ports) {
                        Ok(details) => CommandResult::ok(details, vid_tag(*vid)),
                        Err(e) => CommandResult::ng(e.to_string(), vid_tag(*vid)),
                    });
                }
                Ok(results)
            }
        }
    }

    pub async fn delete_data(
        &mut self,
        spec: VlanSpec,
        cmd: &RouterCommand,
    ) -> Result<Vec<CommandResult>, RouterError> {
        let mut results = Vec::new();
        match spec {
            VlanSpec::One(vid) => {
                validate_vid(vid)?;
                let waiters = self.waiters.clone();
                match self.vlans.get_mut(&vid) {
                    Some(vlan_router) => {
                        let mut result = vlan_router.delete_data(cmd, &waiters).await?;
                        result.vlan_id = vid_tag(vid);
                        results.push(result);
                    }
                    None => {
                        results.push(CommandResult::ng(
                            format!("Vlan is not registered [vlan_id={vid}]"),
                            vid_tag(vid),
                        ));
                    }
                }
            }
            VlanSpec::All => {
                let waiters = self.waiters.clone();
                for (vid, vlan_router) in &mut self.vlans {
                    let mut result = vlan_router.delete_data(cmd, &waiters).await?;
                    result.vlan_id = vid_tag(*vid);
                    results.push(result);
                }
            }
        }
        self.gc_empty_vlans().await;
        Ok(results)
    }

    /// Destroy emptied non-default VLAN routers, flows included. Bare VLANs
    /// are inventory and stay.
    async fn gc_empty_vlans(&mut self) {
        let empty: Vec<u16> = self
            .vlans
            .iter()
            .filter(|(vid, vlan_router)| {
                **vid != VLANID_NONE && !vlan_router.is_bare() && vlan_router.is_empty()
            })
            .map(|(vid, _)| *vid)
            .collect();
        for vid in empty {
            if let Some(mut vlan_router) = self.vlans.remove(&vid) {
                vlan_router.abort_suspends();
                vlan_router.delete_all_flows(&self.waiters).await;
                info!("Delete vlan router [vlan_id={vid}] [{:016x}]", self.dpid);
            }
        }
    }

    /// One step of the cyclic sweep: re-ARP every gateway of one VLAN.
    pub fn sweep_vlan(&self, vlan_id: u16) {
        if let Some(vlan_router) = self.vlans.get(&vlan_id) {
            vlan_router.send_arp_all_gw(&self.ports);
        }
    }

    pub fn port_added(&mut self, port: PortDesc) {
        self.ports.add(port);
    }

    pub fn port_deleted(&mut self, port_no: PortNo) {
        self.ports.delete(port_no);
    }

    /// Datapath went away: stop every pending timer.
    pub fn shutdown(&mut self) {
        for vlan_router in self.vlans.values_mut() {
            vlan_router.abort_suspends();
        }
        info!("Leave router [{:016x}]", self.dpid);
    }
}

fn vid_tag(vid: u16) -> Option<u16> {
    (vid != VLANID_NONE).then_some(vid)
}

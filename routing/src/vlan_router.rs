// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The per-VLAN routing state machine.
//!
//! One `VlanRouter` owns the subnets, policy routing tables and suspend queue
//! of a `(switch, vlan)` pair, and synthesises the flows that keep the switch
//! forwarding on its behalf.

use crate::address::AddressData;
use crate::command::{CommandResult, IdSpec, RouterCommand, VlanData};
use crate::command::{AddressEntry, RouteEntry};
use crate::errors::RouterError;
use crate::ports::PortData;
use crate::router::RouterJob;
use crate::suspend::{ARP_REPLY_TIMER, SuspendPacketList};
use crate::table::{PolicyRoutingTable, Route};
use ipnet::Ipv4Net;
use net::Mac;
use net::arp::{ARP_REPLY, ARP_REQUEST, Arp};
use net::dhcp;
use net::eth::ETH_TYPE_IP;
use net::frame::IcmpKind;
use net::headers::Headers;
use net::ipv4::{parse_cidr, parse_ip};
use openflow::cookie::{COOKIE_DEFAULT_ID, Cookie};
use openflow::datapath::{DatapathId, PacketInMsg, PacketInReason, PortNo};
use openflow::flow::MatchSpec;
use openflow::priority::{PriorityClass, flow_priority, route_class};
use openflow::{OfCtl, Waiters};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Idle timeout of ARP-learned host rewrite flows.
const IDLE_TIMEOUT: u16 = 300;

/// IP protocol number of UDP, as matched by the DHCP egress flow.
const IPPROTO_UDP: u8 = 17;

pub struct VlanRouter {
    dpid: DatapathId,
    vlan_id: u16,
    /// Inventory-only mode: no flows are installed and no frames originated.
    bare: bool,
    ofctl: Arc<dyn OfCtl>,
    jobs: mpsc::UnboundedSender<RouterJob>,
    address_data: AddressData,
    policy_routing_tbl: PolicyRoutingTable,
    packet_buffer: SuspendPacketList,
}

impl VlanRouter {
    pub(crate) fn new(
        dpid: DatapathId,
        vlan_id: u16,
        bare: bool,
        ofctl: Arc<dyn OfCtl>,
        jobs: mpsc::UnboundedSender<RouterJob>,
    ) -> VlanRouter {
        let mut router = VlanRouter {
            dpid,
            vlan_id,
            bare,
            ofctl,
            jobs,
            address_data: AddressData::new(),
            policy_routing_tbl: PolicyRoutingTable::new(),
            packet_buffer: SuspendPacketList::new(),
        };
        router.set_defaultroute_drop();
        router
    }

    #[must_use]
    pub fn vlan_id(&self) -> u16 {
        self.vlan_id
    }

    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    /// True when nothing but the implicit any-source table remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address_data.is_empty() && self.policy_routing_tbl.is_empty()
    }

    // ------------------------------------------------------------------
    // REST-driven mutation
    // ------------------------------------------------------------------

    pub(crate) fn set_data(
        &mut self,
        cmd: &RouterCommand,
        ports: &PortData,
    ) -> Result<String, RouterError> {
        if let Some(address) = &cmd.address {
            let address_id = self.set_address_data(address, ports)?;
            Ok(format!("Add address [address_id={address_id}]"))
        } else if let Some(gateway) = &cmd.gateway {
            let address_id = match &cmd.address_id {
                Some(spec) => Some(spec.as_id().ok_or(RouterError::InvalidParameter)?),
                None => None,
            };
            let route_id =
                self.set_routing_data(cmd.destination.as_deref(), gateway, address_id, ports)?;
            Ok(format!("Add route [route_id={route_id}]"))
        } else if let Some(servers) = &cmd.dhcp_servers {
            let rendered = self.set_dhcp_servers(servers)?;
            Ok(format!("Set DHCP servers [{rendered}]"))
        } else {
            Err(RouterError::InvalidParameter)
        }
    }

    fn set_address_data(&mut self, address: &str, ports: &PortData) -> Result<u32, RouterError> {
        let address = self.address_data.add(address)?;
        if self.bare {
            return Ok(address.address_id);
        }
        let cookie = Cookie::address(self.vlan_id, address.address_id);

        // Set flow: host MAC learning (packet in)
        let priority = flow_priority(PriorityClass::MacLearning, self.vlan_id, None);
        self.ofctl.set_packetin_flow(
            cookie,
            priority,
            MatchSpec {
                eth_type: Some(ETH_TYPE_IP),
                vlan_id: self.vlan_id,
                ipv4_dst: Some(address.net),
                ..MatchSpec::default()
            },
        );
        info!(
            "Set host MAC learning (packet in) flow [cookie={cookie}] [{:016x}]",
            self.dpid
        );

        // Set flow: IP handling (packet in)
        let priority = flow_priority(PriorityClass::IpHandling, self.vlan_id, None);
        self.ofctl.set_packetin_flow(
            cookie,
            priority,
            MatchSpec {
                eth_type: Some(ETH_TYPE_IP),
                vlan_id: self.vlan_id,
                ipv4_dst: Some(host_net(address.default_gw)),
                ..MatchSpec::default()
            },
        );
        info!(
            "Set IP handling (packet in) flow [cookie={cookie}] [{:016x}]",
            self.dpid
        );

        // Announce the new router IP.
        self.send_arp_request(address.default_gw, address.default_gw, None, ports);
        Ok(address.address_id)
    }

    fn set_routing_data(
        &mut self,
        destination: Option<&str>,
        gateway: &str,
        address_id: Option<u32>,
        ports: &PortData,
    ) -> Result<u32, RouterError> {
        let gateway_ip = parse_ip(gateway, "gateway")?;
        let Some(address) = self.address_data.get_by_ip(gateway_ip) else {
            return Err(RouterError::CommandFailure(format!(
                "Gateway={gateway}'s address is not registered."
            )));
        };
        if gateway_ip == address.default_gw {
            return Err(RouterError::CommandFailure(format!(
                "Gateway={gateway} is used as GW of address_id={}",
                address.address_id
            )));
        }
        let send_src_ip = address.default_gw;

        let src = match address_id {
            Some(id) => match self.address_data.get(id) {
                Some(src_address) => Some(src_address.net),
                None => {
                    return Err(RouterError::CommandFailure(format!(
                        "address_id={id} is not registered."
                    )));
                }
            },
            None => None,
        };
        let dst = match destination {
            Some(cidr) => parse_cidr(cidr, "destination")?.1,
            None => default_net(),
        };

        let route = self.policy_routing_tbl.add(dst, gateway_ip, src)?;
        self.set_route_packetin(&route);
        self.send_arp_request(send_src_ip, gateway_ip, None, ports);
        Ok(route.route_id)
    }

    fn set_dhcp_servers(&mut self, servers: &[String]) -> Result<String, RouterError> {
        let mut parsed = Vec::with_capacity(servers.len());
        for server in servers {
            parsed.push(parse_ip(server, "dhcp_servers")?);
        }
        let rendered = parsed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.policy_routing_tbl.dhcp_servers = parsed;
        Ok(rendered)
    }

    fn set_defaultroute_drop(&mut self) {
        if self.bare {
            return;
        }
        let cookie = Cookie::vlan_default(self.vlan_id);
        let priority = flow_priority(PriorityClass::DefaultRouting, self.vlan_id, None);
        self.ofctl.set_routing_flow(
            cookie,
            priority,
            None,
            MatchSpec {
                vlan_id: self.vlan_id,
                ..MatchSpec::default()
            },
            None,
            None,
            0,
            false,
        );
        info!(
            "Set default route (drop) flow [cookie={cookie}] [{:016x}]",
            self.dpid
        );
    }

    fn set_route_packetin(&self, route: &Route) {
        if self.bare {
            return;
        }
        let cookie = Cookie::route(self.vlan_id, route.route_id);
        let class = route_class(route.is_default(), route.src.is_some());
        let priority = flow_priority(class, self.vlan_id, Some(route.dst.prefix_len()));
        self.ofctl.set_packetin_flow(
            cookie,
            priority,
            MatchSpec {
                eth_type: Some(ETH_TYPE_IP),
                vlan_id: self.vlan_id,
                ipv4_src: prefix_field(route.src),
                ipv4_dst: prefix_field(Some(route.dst)),
                ..MatchSpec::default()
            },
        );
        let log_msg = if route.is_default() {
            "default routing"
        } else {
            "static routing"
        };
        info!(
            "Set {log_msg} (packet in) flow [cookie={cookie}] [{:016x}]",
            self.dpid
        );
    }

    // ------------------------------------------------------------------
    // REST-driven rendering and deletion
    // ------------------------------------------------------------------

    pub(crate) fn get_data(&self) -> VlanData {
        let mut routes: Vec<&Route> = self.policy_routing_tbl.iter_routes().collect();
        routes.sort_by_key(|route| route.route_id);
        VlanData {
            vlan_id: None,
            address: self
                .address_data
                .iter()
                .map(|address| AddressEntry {
                    address_id: address.address_id,
                    address: address.rest_address(),
                })
                .collect(),
            route: routes
                .into_iter()
                .map(|route| RouteEntry {
                    route_id: route.route_id,
                    destination: route.dst.to_string(),
                    gateway: route.gateway_ip.to_string(),
                    gateway_mac: route.gateway_mac.map(|mac| mac.to_string()),
                    source: route.src.map(|src| src.to_string()),
                })
                .collect(),
            dhcp_servers: self
                .policy_routing_tbl
                .dhcp_servers
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub(crate) async fn delete_data(
        &mut self,
        cmd: &RouterCommand,
        waiters: &Waiters,
    ) -> Result<CommandResult, RouterError> {
        if let Some(spec) = &cmd.address_id {
            spec.validate()?;
            Ok(self.delete_address_data(spec, waiters).await)
        } else if let Some(spec) = &cmd.route_id {
            spec.validate()?;
            Ok(self.delete_routing_data(spec, waiters).await)
        } else {
            Err(RouterError::InvalidParameter)
        }
    }

    /// Address ids whose subnet still hosts some route's gateway.
    fn addr_relation_routes(&self, target: Option<u32>) -> Vec<u32> {
        let mut skip_ids = Vec::new();
        for route in self.policy_routing_tbl.iter_routes() {
            if let Some(address) = self.address_data.get_by_ip(route.gateway_ip) {
                let id = address.address_id;
                if target.is_none_or(|t| t == id) && !skip_ids.contains(&id) {
                    skip_ids.push(id);
                }
            }
        }
        skip_ids
    }

    async fn delete_address_data(&mut self, spec: &IdSpec, waiters: &Waiters) -> CommandResult {
        let target = spec.as_id();
        let skip_ids = self.addr_relation_routes(target);
        let mut delete_ids = Vec::new();

        if self.bare {
            let candidates: Vec<u32> = self
                .address_data
                .iter()
                .map(|a| a.address_id)
                .filter(|id| target.is_none_or(|t| t == *id))
                .filter(|id| !skip_ids.contains(id))
                .collect();
            for id in candidates {
                self.remove_address(id, &mut delete_ids);
            }
        } else {
            let flows = self.ofctl.get_all_flow(waiters).await;
            for entry in flows {
                let cookie = Cookie::from_raw(entry.cookie);
                if cookie.vlan_id() != u32::from(self.vlan_id) {
                    continue;
                }
                let addr_id = cookie.address_id();
                if addr_id == COOKIE_DEFAULT_ID || skip_ids.contains(&addr_id) {
                    continue;
                }
                match target {
                    // Route flows park their id above the 16-bit address range.
                    None if addr_id > u32::from(u16::MAX) => continue,
                    Some(t) if addr_id != t => continue,
                    _ => {}
                }
                self.ofctl.delete_flow(&entry);
                self.remove_address(addr_id, &mut delete_ids);
            }
        }

        let mut msg: Option<CommandResult> = None;
        if !delete_ids.is_empty() {
            msg = Some(CommandResult::ok(
                format!("Delete address [address_id={}]", join_ids(&delete_ids)),
                None,
            ));
        }
        if !skip_ids.is_empty() {
            let skip_msg = format!(
                "Skip delete (related route exist) [address_id={}]",
                join_ids(&skip_ids)
            );
            msg = Some(match msg {
                Some(mut ok) => {
                    ok.details = format!("{}, {skip_msg}", ok.details);
                    ok
                }
                None => CommandResult::ng(skip_msg, None),
            });
        }
        msg.unwrap_or_else(|| CommandResult::ng("Address is not registered.".to_string(), None))
    }

    fn remove_address(&mut self, address_id: u32, delete_ids: &mut Vec<u32>) {
        if let Some(address) = self.address_data.delete(address_id) {
            // Packets waiting on a neighbor in the dead subnet go with it.
            self.packet_buffer.drop_in_subnet(address.net);
            if !delete_ids.contains(&address_id) {
                delete_ids.push(address_id);
            }
        }
    }

    async fn delete_routing_data(&mut self, spec: &IdSpec, waiters: &Waiters) -> CommandResult {
        let target = spec.as_id();
        let mut delete_ids = Vec::new();
        let mut default_route_deleted = false;

        if self.bare {
            let candidates: Vec<u32> = self
                .policy_routing_tbl
                .iter_routes()
                .map(|r| r.route_id)
                .filter(|id| target.is_none_or(|t| t == *id))
                .collect();
            for id in candidates {
                for route in self.policy_routing_tbl.delete(id) {
                    default_route_deleted |= route.is_default();
                }
                if !delete_ids.contains(&id) {
                    delete_ids.push(id);
                }
            }
        } else {
            let flows = self.ofctl.get_all_flow(waiters).await;
            for entry in flows {
                let cookie = Cookie::from_raw(entry.cookie);
                if cookie.vlan_id() != u32::from(self.vlan_id) {
                    continue;
                }
                let route_id = cookie.route_id();
                if route_id == COOKIE_DEFAULT_ID || target.is_some_and(|t| t != route_id) {
                    continue;
                }
                self.ofctl.delete_flow(&entry);
                for route in self.policy_routing_tbl.delete(route_id) {
                    default_route_deleted |= route.is_default();
                }
                if !delete_ids.contains(&route_id) {
                    delete_ids.push(route_id);
                }
            }
        }
        self.policy_routing_tbl.gc_subnet_tables();

        if default_route_deleted {
            // The drop rule went out with the default route's flows.
            self.set_defaultroute_drop();
        }

        if delete_ids.is_empty() {
            CommandResult::ng("Route is not registered.".to_string(), None)
        } else {
            CommandResult::ok(
                format!("Delete route [route_id={}]", join_ids(&delete_ids)),
                None,
            )
        }
    }

    /// Delete every flow this VLAN owns; used when the VLAN itself goes away.
    pub(crate) async fn delete_all_flows(&self, waiters: &Waiters) {
        if self.bare {
            return;
        }
        let flows = self.ofctl.get_all_flow(waiters).await;
        for entry in flows {
            if Cookie::from_raw(entry.cookie).vlan_id() == u32::from(self.vlan_id) {
                self.ofctl.delete_flow(&entry);
            }
        }
    }

    pub(crate) fn abort_suspends(&mut self) {
        self.packet_buffer.abort_all();
    }

    // ------------------------------------------------------------------
    // Packet-in handling
    // ------------------------------------------------------------------

    pub(crate) fn packet_in(&mut self, msg: &PacketInMsg, headers: &Headers, ports: &PortData) {
        if msg.reason == PacketInReason::InvalidTtl {
            self.packetin_invalid_ttl(msg, headers);
            return;
        }
        if headers.arp.is_some() {
            self.packetin_arp(msg, headers, ports);
            return;
        }
        if let Some(dst) = headers.ipv4_dst() {
            if self.address_data.is_default_gw(dst) {
                if headers.icmp_echo_request().is_some() {
                    self.packetin_icmp_req(msg, headers);
                } else if headers.is_icmp_echo_reply() {
                    debug!(
                        "Receive ICMP echo reply from [{}] [{:016x}]",
                        headers.ipv4_src().unwrap_or(Ipv4Addr::UNSPECIFIED),
                        self.dpid
                    );
                } else if headers.tcp.is_some() || headers.udp.is_some() {
                    self.packetin_tcp_udp(msg, headers);
                }
            } else {
                self.packetin_to_node(msg, headers, ports);
            }
        }
    }

    fn packetin_invalid_ttl(&mut self, msg: &PacketInMsg, headers: &Headers) {
        let Some(src) = headers.ipv4_src() else {
            return;
        };
        info!("Receive invalid ttl packet from [{src}] [{:016x}]", self.dpid);

        let in_port = self.ofctl.packetin_inport(msg);
        if let Some(src_ip) = self.get_send_port_ip(headers) {
            let original = msg.data[headers.l2_len()..].to_vec();
            self.ofctl.send_icmp(
                in_port,
                headers,
                self.vlan_id,
                &IcmpKind::TimeExceeded { original },
                Some(src_ip),
            );
            info!("Send ICMP time exceeded to [{src}] [{:016x}]", self.dpid);
        }
    }

    fn packetin_arp(&mut self, msg: &PacketInMsg, headers: &Headers, ports: &PortData) {
        let Some(arp) = headers.arp else {
            return;
        };
        let Some(src_address) = self.address_data.get_by_ip(arp.spa) else {
            return;
        };
        let src_address_id = src_address.address_id;
        let in_port = self.ofctl.packetin_inport(msg);

        // Update routing table: the talker may be a gateway we wait on.
        let gateway_learned = self.update_routing_tbl(&arp, in_port, ports);
        if !gateway_learned {
            self.learn_host_mac(&arp, in_port, ports);
        }

        if arp.is_gratuitous() {
            // GARP -> packet forward (all)
            self.ofctl
                .send_packet_out(in_port, self.ofctl.port_all(), msg.data.clone());
            debug!(
                "Receive GARP from [{}] [{:016x}]",
                arp.spa, self.dpid
            );
            return;
        }

        if !self.address_data.is_default_gw(arp.tpa) {
            // ARP toward another host; forward within its own subnet only.
            let same_subnet = self
                .address_data
                .get_by_ip(arp.tpa)
                .is_some_and(|dst_address| dst_address.address_id == src_address_id);
            if same_subnet {
                self.ofctl
                    .send_packet_out(in_port, self.ofctl.port_all(), msg.data.clone());
            }
            return;
        }

        match arp.opcode {
            ARP_REQUEST => {
                // ARP request to a router port -> send ARP reply
                let Some(port) = ports.get(in_port) else {
                    return;
                };
                self.ofctl.send_arp(
                    ARP_REPLY,
                    self.vlan_id,
                    port.mac,
                    arp.sha,
                    arp.tpa,
                    arp.spa,
                    port.mac,
                    self.ofctl.port_controller(),
                    in_port,
                );
                info!(
                    "Send ARP reply to [{}] for [{}] [{:016x}]",
                    arp.spa, arp.tpa, self.dpid
                );
            }
            ARP_REPLY => {
                // ARP reply to a router port -> release suspended packets
                let packets = self.packet_buffer.take_for_dst(arp.spa);
                let output = self.ofctl.port_table();
                for packet in packets {
                    self.ofctl
                        .send_packet_out(packet.in_port, output, packet.data);
                    info!(
                        "Send suspended packet to [{}] [{:016x}]",
                        arp.spa, self.dpid
                    );
                }
            }
            _ => {}
        }
    }

    /// Record a gateway MAC from ARP and (re)install the routing flows that
    /// were waiting on it. Returns whether the talker is a known gateway.
    fn update_routing_tbl(&mut self, arp: &Arp, in_port: PortNo, ports: &PortData) -> bool {
        let Some(port) = ports.get(in_port) else {
            return false;
        };
        let port_mac = port.mac;
        let (found, updated) = self.policy_routing_tbl.set_gateway_mac(arp.spa, arp.sha);
        if self.bare {
            return found;
        }
        for route in updated {
            let cookie = Cookie::route(self.vlan_id, route.route_id);
            let class = route_class(route.is_default(), route.src.is_some());
            let priority = flow_priority(class, self.vlan_id, Some(route.dst.prefix_len()));
            self.ofctl.set_routing_flow(
                cookie,
                priority,
                Some(in_port),
                MatchSpec {
                    eth_type: Some(ETH_TYPE_IP),
                    vlan_id: self.vlan_id,
                    ipv4_src: prefix_field(route.src),
                    ipv4_dst: prefix_field(Some(route.dst)),
                    ..MatchSpec::default()
                },
                Some(port_mac),
                Some(arp.sha),
                0,
                true,
            );
            info!(
                "Set routing flow via gateway [{}] [cookie={cookie}] [{:016x}]",
                arp.spa, self.dpid
            );

            if route.is_default() {
                // Client broadcasts toward DHCP servers leave via the same port.
                let priority =
                    flow_priority(PriorityClass::StaticRouting, self.vlan_id, Some(32));
                self.ofctl.set_routing_flow(
                    cookie,
                    priority,
                    Some(in_port),
                    MatchSpec {
                        eth_type: Some(ETH_TYPE_IP),
                        vlan_id: self.vlan_id,
                        ipv4_src: Some(host_net(Ipv4Addr::UNSPECIFIED)),
                        ipv4_dst: Some(host_net(Ipv4Addr::BROADCAST)),
                        ip_proto: Some(IPPROTO_UDP),
                        udp_src: Some(dhcp::CLIENT_PORT),
                        udp_dst: Some(dhcp::SERVER_PORT),
                        ..MatchSpec::default()
                    },
                    Some(port_mac),
                    Some(arp.sha),
                    0,
                    false,
                );
                info!(
                    "Set DHCP egress flow [cookie={cookie}] [{:016x}]",
                    self.dpid
                );
            }
        }
        found
    }

    /// Learn a host MAC from ARP as an L3-termination rewrite flow.
    fn learn_host_mac(&mut self, arp: &Arp, in_port: PortNo, ports: &PortData) {
        if self.bare || self.address_data.is_default_gw(arp.spa) {
            return;
        }
        let Some(port) = ports.get(in_port) else {
            return;
        };
        let Some(address) = self.address_data.get_by_ip(arp.spa) else {
            return;
        };
        let cookie = Cookie::address(self.vlan_id, address.address_id);
        let priority = flow_priority(PriorityClass::ImplicitRouting, self.vlan_id, None);
        self.ofctl.set_routing_flow(
            cookie,
            priority,
            Some(in_port),
            MatchSpec {
                eth_type: Some(ETH_TYPE_IP),
                vlan_id: self.vlan_id,
                ipv4_dst: Some(host_net(arp.spa)),
                ..MatchSpec::default()
            },
            Some(port.mac),
            Some(arp.sha),
            IDLE_TIMEOUT,
            true,
        );
        info!(
            "Set implicit routing flow [cookie={cookie}] [{:016x}]",
            self.dpid
        );
    }

    fn packetin_icmp_req(&mut self, msg: &PacketInMsg, headers: &Headers) {
        let Some((id, seq)) = headers.icmp_echo_request() else {
            return;
        };
        let in_port = self.ofctl.packetin_inport(msg);
        self.ofctl.send_icmp(
            in_port,
            headers,
            self.vlan_id,
            &IcmpKind::EchoReply {
                id,
                seq,
                data: headers.icmp_payload.clone(),
            },
            None,
        );
        info!(
            "Send ICMP echo reply to [{}] [{:016x}]",
            headers.ipv4_src().unwrap_or(Ipv4Addr::UNSPECIFIED),
            self.dpid
        );
    }

    fn packetin_tcp_udp(&mut self, msg: &PacketInMsg, headers: &Headers) {
        let in_port = self.ofctl.packetin_inport(msg);
        let original = msg.data[headers.l2_len()..].to_vec();
        self.ofctl.send_icmp(
            in_port,
            headers,
            self.vlan_id,
            &IcmpKind::DestUnreachPort { original },
            None,
        );
        info!(
            "Send ICMP port unreachable to [{}] [{:016x}]",
            headers.ipv4_src().unwrap_or(Ipv4Addr::UNSPECIFIED),
            self.dpid
        );
    }

    fn packetin_to_node(&mut self, msg: &PacketInMsg, headers: &Headers, ports: &PortData) {
        let in_port = self.ofctl.packetin_inport(msg);

        // Server-to-client DHCP replies are flooded toward the clients that
        // cannot be addressed yet.
        if headers.dhcp.is_some_and(|view| view.is_offer_or_ack()) {
            self.ofctl
                .send_packet_out(in_port, self.ofctl.port_all(), msg.data.clone());
            info!("Flood DHCP reply [{:016x}]", self.dpid);
        }

        if self.packet_buffer.is_full() {
            info!(
                "Packet is dropped, MAX_SUSPENDPACKETS exceeded [{:016x}]",
                self.dpid
            );
            return;
        }
        let Some(ip_dst) = headers.ipv4_dst() else {
            return;
        };
        let ip_src = headers.ipv4_src();

        // Pick the source IP to speak with and the next hop to resolve.
        let target = if let Some(address) = self.address_data.get_by_ip(ip_dst) {
            Some((address.default_gw, ip_dst))
        } else {
            self.policy_routing_tbl
                .lookup(ip_dst, ip_src)
                .and_then(|route| {
                    self.address_data
                        .get_by_ip(route.gateway_ip)
                        .map(|gw_address| (gw_address.default_gw, route.gateway_ip))
                })
        };

        let Some((send_src_ip, next_hop)) = target else {
            debug!(
                "Receive unroutable packet to [{ip_dst}] [{:016x}]",
                self.dpid
            );
            return;
        };

        if let Some(serial) =
            self.packet_buffer
                .add(in_port, headers.clone(), msg.data.clone(), next_hop)
        {
            self.spawn_suspend_timer(serial);
            self.send_arp_request(send_src_ip, next_hop, Some(in_port), ports);
            info!(
                "Suspend packet and send ARP request to [{next_hop}] [{:016x}]",
                self.dpid
            );
        }
    }

    fn spawn_suspend_timer(&mut self, serial: u64) {
        let jobs = self.jobs.clone();
        let vlan_id = self.vlan_id;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ARP_REPLY_TIMER).await;
            let _ = jobs.send(RouterJob::SuspendTimeout { vlan_id, serial });
        });
        self.packet_buffer.attach_timer(serial, timer);
    }

    /// The ARP reply wait timer ran out: answer with host-unreachable.
    pub(crate) fn handle_suspend_timeout(&mut self, serial: u64) {
        let Some(packet) = self.packet_buffer.take_by_serial(serial) else {
            return;
        };
        info!(
            "ARP reply wait timer timed out for [{}] [{:016x}]",
            packet.dst_ip, self.dpid
        );
        if let Some(src_ip) = self.get_send_port_ip(&packet.headers) {
            let original = packet.data[packet.headers.l2_len()..].to_vec();
            self.ofctl.send_icmp(
                packet.in_port,
                &packet.headers,
                self.vlan_id,
                &IcmpKind::DestUnreachHost { original },
                Some(src_ip),
            );
            info!(
                "Send ICMP host unreachable to [{}] [{:016x}]",
                packet
                    .headers
                    .ipv4_src()
                    .unwrap_or(Ipv4Addr::UNSPECIFIED),
                self.dpid
            );
        }
    }

    /// The router IP that speaks for the subnet the packet came from.
    fn get_send_port_ip(&self, headers: &Headers) -> Option<Ipv4Addr> {
        let src_mac = Mac(headers.eth.source);
        let src_ip = headers
            .ipv4_src()
            .or_else(|| headers.arp.map(|arp| arp.spa))?;
        if let Some(address) = self.address_data.get_by_ip(src_ip) {
            return Some(address.default_gw);
        }
        if let Some(route) = self.policy_routing_tbl.by_gateway_mac(src_mac, Some(src_ip)) {
            if let Some(address) = self.address_data.get_by_ip(route.gateway_ip) {
                return Some(address.default_gw);
            }
        }
        debug!(
            "Receive packet from unknown IP [{src_ip}] [{:016x}]",
            self.dpid
        );
        None
    }

    // ------------------------------------------------------------------
    // ARP emission
    // ------------------------------------------------------------------

    /// Broadcast an ARP request out every port except `in_port`.
    pub(crate) fn send_arp_request(
        &self,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        in_port: Option<PortNo>,
        ports: &PortData,
    ) {
        if self.bare {
            return;
        }
        for port in ports.iter() {
            if in_port != Some(port.port_no) {
                self.ofctl.send_arp(
                    ARP_REQUEST,
                    self.vlan_id,
                    port.mac,
                    Mac::BROADCAST,
                    src_ip,
                    dst_ip,
                    Mac::ZERO,
                    self.ofctl.port_controller(),
                    port.port_no,
                );
            }
        }
    }

    /// Re-ARP every known gateway (the cyclic sweep).
    pub(crate) fn send_arp_all_gw(&self, ports: &PortData) {
        for (gateway_ip, _) in self.policy_routing_tbl.gateway_info() {
            if let Some(address) = self.address_data.get_by_ip(gateway_ip) {
                self.send_arp_request(address.default_gw, gateway_ip, None, ports);
            }
        }
    }
}

fn host_net(ip: Ipv4Addr) -> Ipv4Net {
    Ipv4Net::new(ip, 32).unwrap_or_else(|_| unreachable!())
}

fn default_net() -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 0).unwrap_or_else(|_| unreachable!())
}

/// Suppress zero-length prefixes in match fields; a /0 match is no match.
fn prefix_field(net: Option<Ipv4Net>) -> Option<Ipv4Net> {
    net.filter(|n| n.prefix_len() > 0)
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

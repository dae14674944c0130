// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Version-neutral match/action vocabulary and the message structs handed to
//! the wire codec.
//!
//! A [`MatchSpec`] is what the routing layer asks for; the per-version OfCtl
//! lowers it to either an OF1.0 wildcard-bitmask match ([`Match10`]) or an
//! OXM field list, both carried inside [`MatchRepr`].

use crate::datapath::PortNo;
use ipnet::Ipv4Net;
use net::Mac;
use net::eth::ETH_TYPE_IP;

/// The OXM `vlan_vid` present bit (OF1.2+).
pub const OFPVID_PRESENT: u16 = 0x1000;

/// Flow-table id meaning "all tables" in delete and stats requests.
pub const OFPTT_ALL: u8 = 0xff;

/// What a flow should match, version-neutrally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSpec {
    pub eth_type: Option<u16>,
    pub eth_dst: Option<Mac>,
    /// 0 means "no vlan match".
    pub vlan_id: u16,
    pub ipv4_src: Option<Ipv4Net>,
    pub ipv4_dst: Option<Ipv4Net>,
    pub ip_proto: Option<u8>,
    pub udp_src: Option<u16>,
    pub udp_dst: Option<u16>,
}

impl MatchSpec {
    /// True when the match reaches into IP headers; such flows go to the IP
    /// table on multi-table datapaths.
    #[must_use]
    pub fn has_ip_fields(&self) -> bool {
        self.eth_type == Some(ETH_TYPE_IP)
            && (self.ipv4_src.is_some() || self.ipv4_dst.is_some() || self.ip_proto.is_some())
    }
}

/// Actions attached to flows and packet-outs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Output(PortNo),
    SetEthSrc(Mac),
    SetEthDst(Mac),
    DecNwTtl,
}

// OF1.0 wildcard bit layout.
pub const OFPFW_IN_PORT: u32 = 1 << 0;
pub const OFPFW_DL_VLAN: u32 = 1 << 1;
pub const OFPFW_DL_SRC: u32 = 1 << 2;
pub const OFPFW_DL_DST: u32 = 1 << 3;
pub const OFPFW_DL_TYPE: u32 = 1 << 4;
pub const OFPFW_NW_PROTO: u32 = 1 << 5;
pub const OFPFW_TP_SRC: u32 = 1 << 6;
pub const OFPFW_TP_DST: u32 = 1 << 7;
pub const OFPFW_NW_SRC_SHIFT: u32 = 8;
pub const OFPFW_NW_SRC_MASK: u32 = 0x3f << OFPFW_NW_SRC_SHIFT;
pub const OFPFW_NW_DST_SHIFT: u32 = 14;
pub const OFPFW_NW_DST_MASK: u32 = 0x3f << OFPFW_NW_DST_SHIFT;
pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
pub const OFPFW_NW_TOS: u32 = 1 << 21;
pub const OFPFW_ALL: u32 = (1 << 22) - 1;

/// An OF1.0 match: wildcard bitmask plus the fixed field set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match10 {
    pub wildcards: u32,
    pub dl_vlan: u16,
    pub dl_dst: Mac,
    pub dl_type: u16,
    pub nw_proto: u8,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Match10 {
    /// Lower a [`MatchSpec`] to wildcard form.
    #[must_use]
    pub fn from_spec(spec: &MatchSpec) -> Match10 {
        let mut m = Match10 {
            wildcards: OFPFW_ALL,
            ..Match10::default()
        };
        if let Some(eth_type) = spec.eth_type {
            m.wildcards &= !OFPFW_DL_TYPE;
            m.dl_type = eth_type;
        }
        if let Some(eth_dst) = spec.eth_dst {
            m.wildcards &= !OFPFW_DL_DST;
            m.dl_dst = eth_dst;
        }
        if spec.vlan_id != 0 {
            m.wildcards &= !OFPFW_DL_VLAN;
            m.dl_vlan = spec.vlan_id;
        }
        if let Some(src) = spec.ipv4_src {
            m.wildcards &= (u32::from(32 - src.prefix_len()) << OFPFW_NW_SRC_SHIFT)
                | !OFPFW_NW_SRC_MASK;
            m.nw_src = u32::from(src.network());
        }
        if let Some(dst) = spec.ipv4_dst {
            m.wildcards &= (u32::from(32 - dst.prefix_len()) << OFPFW_NW_DST_SHIFT)
                | !OFPFW_NW_DST_MASK;
            m.nw_dst = u32::from(dst.network());
        }
        if let Some(proto) = spec.ip_proto {
            m.wildcards &= !OFPFW_NW_PROTO;
            m.nw_proto = proto;
        }
        if let Some(tp_src) = spec.udp_src {
            m.wildcards &= !OFPFW_TP_SRC;
            m.tp_src = tp_src;
        }
        if let Some(tp_dst) = spec.udp_dst {
            m.wildcards &= !OFPFW_TP_DST;
            m.tp_dst = tp_dst;
        }
        m
    }
}

/// One OXM typed match field (OF1.2/1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OxmField {
    InPort(PortNo),
    EthType(u16),
    EthDst(Mac),
    /// Raw 13-bit value, [`OFPVID_PRESENT`] included.
    VlanVid(u16),
    Ipv4Src(Ipv4Net),
    Ipv4Dst(Ipv4Net),
    IpProto(u8),
    UdpSrc(u16),
    UdpDst(u16),
}

/// Lower a [`MatchSpec`] to an OXM field list.
#[must_use]
pub fn oxm_from_spec(spec: &MatchSpec) -> Vec<OxmField> {
    let mut fields = Vec::new();
    if let Some(eth_type) = spec.eth_type {
        fields.push(OxmField::EthType(eth_type));
    }
    if let Some(eth_dst) = spec.eth_dst {
        fields.push(OxmField::EthDst(eth_dst));
    }
    if spec.vlan_id != 0 {
        fields.push(OxmField::VlanVid(spec.vlan_id | OFPVID_PRESENT));
    }
    if let Some(src) = spec.ipv4_src {
        fields.push(OxmField::Ipv4Src(src));
    }
    if let Some(dst) = spec.ipv4_dst {
        fields.push(OxmField::Ipv4Dst(dst));
    }
    if let Some(proto) = spec.ip_proto {
        fields.push(OxmField::IpProto(proto));
    }
    if let Some(udp_src) = spec.udp_src {
        fields.push(OxmField::UdpSrc(udp_src));
    }
    if let Some(udp_dst) = spec.udp_dst {
        fields.push(OxmField::UdpDst(udp_dst));
    }
    fields
}

/// The match as lowered for one OpenFlow version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRepr {
    Wildcarded(Match10),
    Oxm(Vec<OxmField>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    Delete,
    DeleteStrict,
}

/// A flow-mod toward the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMod {
    pub cookie: u64,
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: u16,
    pub priority: u16,
    pub match_: MatchRepr,
    pub actions: Vec<Action>,
}

/// A packet-out toward the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketOut {
    pub in_port: PortNo,
    pub actions: Vec<Action>,
    pub data: Vec<u8>,
}

/// A flow-stats (OF1.3: multipart) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatsRequest {
    pub xid: u32,
    pub table_id: u8,
    pub out_port: PortNo,
}

/// OF1.3 SetAsync: which packet-in reasons reach the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetAsync {
    pub packet_in_mask: u32,
}

/// Messages the controller sends; the codec serializes them for the
/// datapath's negotiated version.
#[derive(Debug, Clone, PartialEq)]
pub enum OfMessage {
    FlowMod(FlowMod),
    PacketOut(PacketOut),
    FlowStatsRequest(FlowStatsRequest),
    SetAsync(SetAsync),
}

/// One entry of a flow-stats reply, as decoded by the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStatsEntry {
    pub cookie: u64,
    pub table_id: u8,
    pub priority: u16,
    pub idle_timeout: u16,
    pub match_: MatchRepr,
    pub actions: Vec<Action>,
}

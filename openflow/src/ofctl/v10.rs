// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! OpenFlow 1.0: wildcard-bitmask matches, single flow table, no TTL
//! decrement.

use crate::cookie::Cookie;
use crate::datapath::{Datapath, PacketInMsg, PortNo};
use crate::flow::{
    Action, FlowMod, FlowModCommand, FlowStatsEntry, Match10, MatchRepr, MatchSpec, OfMessage,
};
use crate::ofctl::OfCtl;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const OFPP_IN_PORT: PortNo = 0xfff8;
pub const OFPP_TABLE: PortNo = 0xfff9;
pub const OFPP_NORMAL: PortNo = 0xfffa;
pub const OFPP_FLOOD: PortNo = 0xfffb;
pub const OFPP_ALL: PortNo = 0xfffc;
pub const OFPP_CONTROLLER: PortNo = 0xfffd;
pub const OFPP_LOCAL: PortNo = 0xfffe;
pub const OFPP_NONE: PortNo = 0xffff;

pub struct OfCtl10 {
    dp: Arc<dyn Datapath>,
}

impl OfCtl10 {
    pub fn create(dp: Arc<dyn Datapath>) -> Arc<dyn OfCtl> {
        Arc::new(OfCtl10 { dp })
    }
}

#[async_trait]
impl OfCtl for OfCtl10 {
    fn dp(&self) -> &Arc<dyn Datapath> {
        &self.dp
    }

    fn port_in_port(&self) -> PortNo {
        OFPP_IN_PORT
    }
    fn port_table(&self) -> PortNo {
        OFPP_TABLE
    }
    fn port_all(&self) -> PortNo {
        OFPP_ALL
    }
    fn port_controller(&self) -> PortNo {
        OFPP_CONTROLLER
    }
    fn port_any(&self) -> PortNo {
        OFPP_NONE
    }

    fn supports_dec_ttl(&self) -> bool {
        false
    }

    fn set_flow(
        &self,
        cookie: Cookie,
        priority: u16,
        spec: MatchSpec,
        idle_timeout: u16,
        actions: Vec<Action>,
    ) {
        self.dp.send(OfMessage::FlowMod(FlowMod {
            cookie: cookie.raw(),
            cookie_mask: 0,
            table_id: 0,
            command: FlowModCommand::Add,
            idle_timeout,
            priority,
            match_: MatchRepr::Wildcarded(Match10::from_spec(&spec)),
            actions,
        }));
    }

    fn clear_flows(&self) {
        self.dp.send(OfMessage::FlowMod(FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: FlowModCommand::Delete,
            idle_timeout: 0,
            priority: 0,
            match_: MatchRepr::Wildcarded(Match10::from_spec(&MatchSpec::default())),
            actions: Vec::new(),
        }));
    }

    fn set_sw_config_for_ttl(&self) {
        debug!(
            "TTL-invalid packet-in is not supported on OF1.0 [{:016x}]",
            self.dp.id()
        );
    }

    fn delete_flow(&self, entry: &FlowStatsEntry) {
        self.dp.send(OfMessage::FlowMod(FlowMod {
            cookie: entry.cookie,
            cookie_mask: 0,
            table_id: entry.table_id,
            command: FlowModCommand::DeleteStrict,
            idle_timeout: 0,
            priority: entry.priority,
            match_: entry.match_.clone(),
            actions: Vec::new(),
        }));
        info!("Delete flow [cookie=0x{:x}]", entry.cookie);
    }

    fn packetin_inport(&self, msg: &PacketInMsg) -> PortNo {
        msg.in_port.unwrap_or(OFPP_NONE)
    }
}

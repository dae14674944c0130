// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! OpenFlow 1.2: OXM matches and multi-table placement. Shared with 1.3
//! except for delete semantics and the async-config message.

use crate::cookie::Cookie;
use crate::datapath::{Datapath, PortNo};
use crate::flow::{
    Action, FlowMod, FlowModCommand, FlowStatsEntry, MatchRepr, MatchSpec, OfMessage,
    oxm_from_spec,
};
use crate::ofctl::OfCtl;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub const OFPP_IN_PORT: PortNo = 0xfffffff8;
pub const OFPP_TABLE: PortNo = 0xfffffff9;
pub const OFPP_NORMAL: PortNo = 0xfffffffa;
pub const OFPP_FLOOD: PortNo = 0xfffffffb;
pub const OFPP_ALL: PortNo = 0xfffffffc;
pub const OFPP_CONTROLLER: PortNo = 0xfffffffd;
pub const OFPP_LOCAL: PortNo = 0xfffffffe;
pub const OFPP_ANY: PortNo = 0xffffffff;

/// Table used for matches that stay in L2.
pub const TABLE_L2: u8 = 0;
/// Table used for matches that reach into IP headers.
///
/// Some silicon (Arista, Cisco) refuses IP-field matches in table 0; single
/// table datapaths collapse back to 0.
pub const TABLE_IP: u8 = 1;

/// Pick the flow table for a lowered match.
#[must_use]
pub fn table_for(dp: &Arc<dyn Datapath>, spec: &MatchSpec) -> u8 {
    if spec.has_ip_fields() && dp.n_tables() > 1 {
        TABLE_IP
    } else {
        TABLE_L2
    }
}

/// OXM flow-mod construction shared by the 1.2 and 1.3 handlers.
pub fn oxm_set_flow(
    dp: &Arc<dyn Datapath>,
    cookie: Cookie,
    priority: u16,
    spec: &MatchSpec,
    idle_timeout: u16,
    actions: Vec<Action>,
) {
    dp.send(OfMessage::FlowMod(FlowMod {
        cookie: cookie.raw(),
        cookie_mask: 0,
        table_id: table_for(dp, spec),
        command: FlowModCommand::Add,
        idle_timeout,
        priority,
        match_: MatchRepr::Oxm(oxm_from_spec(spec)),
        actions,
    }));
}

/// Delete-all shared by the 1.2 and 1.3 handlers.
pub fn oxm_clear_flows(dp: &Arc<dyn Datapath>) {
    dp.send(OfMessage::FlowMod(FlowMod {
        cookie: 0,
        cookie_mask: 0,
        table_id: crate::flow::OFPTT_ALL,
        command: FlowModCommand::Delete,
        idle_timeout: 0,
        priority: 0,
        match_: MatchRepr::Oxm(Vec::new()),
        actions: Vec::new(),
    }));
}

pub struct OfCtl12 {
    dp: Arc<dyn Datapath>,
}

impl OfCtl12 {
    pub fn create(dp: Arc<dyn Datapath>) -> Arc<dyn OfCtl> {
        Arc::new(OfCtl12 { dp })
    }
}

#[async_trait]
impl OfCtl for OfCtl12 {
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
        OFPP_ANY
    }

    fn supports_dec_ttl(&self) -> bool {
        true
    }

    fn set_flow(
        &self,
        cookie: Cookie,
        priority: u16,
        spec: MatchSpec,
        idle_timeout: u16,
        actions: Vec<Action>,
    ) {
        oxm_set_flow(&self.dp, cookie, priority, &spec, idle_timeout, actions);
    }

    fn clear_flows(&self) {
        oxm_clear_flows(&self.dp);
    }

    fn set_sw_config_for_ttl(&self) {
        debug!(
            "TTL-invalid async config is not supported before OF1.3 [{:016x}]",
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
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! OpenFlow 1.3: OXM matches like 1.2, plus cookie-masked deletes and the
//! SetAsync knob for TTL-invalid packet-ins.

use crate::cookie::Cookie;
use crate::datapath::{Datapath, PortNo};
use crate::flow::{
    Action, FlowMod, FlowModCommand, FlowStatsEntry, MatchRepr, MatchSpec, OFPTT_ALL, OfMessage,
    SetAsync,
};
use crate::ofctl::OfCtl;
use crate::ofctl::v12::{self, oxm_clear_flows, oxm_set_flow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Packet-in reason codes (OF1.3).
pub const OFPR_NO_MATCH: u32 = 0;
pub const OFPR_ACTION: u32 = 1;
pub const OFPR_INVALID_TTL: u32 = 2;

pub struct OfCtl13 {
    dp: Arc<dyn Datapath>,
}

impl OfCtl13 {
    pub fn create(dp: Arc<dyn Datapath>) -> Arc<dyn OfCtl> {
        Arc::new(OfCtl13 { dp })
    }
}

#[async_trait]
impl OfCtl for OfCtl13 {
    fn dp(&self) -> &Arc<dyn Datapath> {
        &self.dp
    }

    fn port_in_port(&self) -> PortNo {
        v12::OFPP_IN_PORT
    }
    fn port_table(&self) -> PortNo {
        v12::OFPP_TABLE
    }
    fn port_all(&self) -> PortNo {
        v12::OFPP_ALL
    }
    fn port_controller(&self) -> PortNo {
        v12::OFPP_CONTROLLER
    }
    fn port_any(&self) -> PortNo {
        v12::OFPP_ANY
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
        self.dp.send(OfMessage::SetAsync(SetAsync {
            packet_in_mask: 1 << OFPR_ACTION | 1 << OFPR_INVALID_TTL,
        }));
        info!(
            "Set SW config for TTL error packet in [{:016x}]",
            self.dp.id()
        );
    }

    fn delete_flow(&self, entry: &FlowStatsEntry) {
        self.dp.send(OfMessage::FlowMod(FlowMod {
            cookie: entry.cookie,
            cookie_mask: u64::MAX,
            table_id: OFPTT_ALL,
            command: FlowModCommand::Delete,
            idle_timeout: 0,
            priority: 0,
            match_: MatchRepr::Oxm(Vec::new()),
            actions: Vec::new(),
        }));
        info!("Delete flow [cookie=0x{:x}]", entry.cookie);
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Session event dispatch: the single consumer of the switch-session layer's
//! event stream.
//!
//! Stats replies are routed straight to the waiters without touching any
//! router lock, so a REST deletion blocked on its stats reply always makes
//! progress even while packet-ins queue up behind it.

use mgmt::{SwitchboardConfig, switchboard};
use openflow::datapath::SessionEvent;
use routing::RouterRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Start the dispatcher. The returned sender is the attach point handed to
/// the switch-session layer.
pub(crate) fn start(
    registry: Arc<RouterRegistry>,
    switchboard: Option<SwitchboardConfig>,
) -> (mpsc::UnboundedSender<SessionEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(registry, switchboard, rx));
    (tx, task)
}

async fn run(
    registry: Arc<RouterRegistry>,
    switchboard: Option<SwitchboardConfig>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::SwitchJoin(dp) => {
                let dpid = dp.id();
                match registry.register(&dp) {
                    Ok(()) => {
                        if let Some(config) = &switchboard {
                            switchboard::notify_join(config, dpid);
                        }
                    }
                    Err(e) => error!("Refuse joining datapath [{dpid:016x}]: {e}"),
                }
            }
            SessionEvent::SwitchLeave(dpid) => registry.unregister(dpid).await,
            SessionEvent::PacketIn { dpid, msg } => registry.packet_in(dpid, msg),
            SessionEvent::StatsReply { dpid, msg } => registry.stats_reply(dpid, msg),
            SessionEvent::PortAdded { dpid, port } => registry.port_added(dpid, port).await,
            SessionEvent::PortDeleted { dpid, port_no } => {
                registry.port_deleted(dpid, port_no).await;
            }
        }
    }
}

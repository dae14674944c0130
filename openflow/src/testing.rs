// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A scripted datapath for exercising rule synthesis without a switch.

use crate::datapath::{Datapath, DatapathId, PortDesc, PortNo};
use crate::flow::OfMessage;
use crate::version::OfVersion;
use net::Mac;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory [`Datapath`] that records every message sent to it.
pub struct MockDatapath {
    dpid: DatapathId,
    version: OfVersion,
    n_tables: u8,
    ports: Mutex<Vec<PortDesc>>,
    xid: AtomicU32,
    sent: Mutex<Vec<OfMessage>>,
}

impl MockDatapath {
    #[must_use]
    pub fn new(dpid: DatapathId, version: OfVersion) -> Arc<MockDatapath> {
        MockDatapath::with_tables(dpid, version, 8)
    }

    #[must_use]
    pub fn with_tables(dpid: DatapathId, version: OfVersion, n_tables: u8) -> Arc<MockDatapath> {
        Arc::new(MockDatapath {
            dpid,
            version,
            n_tables,
            ports: Mutex::new(vec![
                port(1, [0x02, 0, 0, 0, 0, 0x01]),
                port(2, [0x02, 0, 0, 0, 0, 0x02]),
            ]),
            xid: AtomicU32::new(1),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Drain and return everything sent so far.
    #[must_use]
    pub fn take_sent(&self) -> Vec<OfMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of messages sent so far, without draining.
    #[must_use]
    pub fn sent_len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Xid of the most recent flow-stats request, without draining.
    #[must_use]
    pub fn last_stats_xid(&self) -> Option<u32> {
        self.sent.lock().iter().rev().find_map(|msg| match msg {
            OfMessage::FlowStatsRequest(request) => Some(request.xid),
            _ => None,
        })
    }
}

fn port(port_no: PortNo, mac: [u8; 6]) -> PortDesc {
    PortDesc {
        port_no,
        mac: Mac(mac),
    }
}

impl Datapath for MockDatapath {
    fn id(&self) -> DatapathId {
        self.dpid
    }
    fn version(&self) -> OfVersion {
        self.version
    }
    fn n_tables(&self) -> u8 {
        self.n_tables
    }
    fn ports(&self) -> Vec<PortDesc> {
        self.ports.lock().clone()
    }
    fn next_xid(&self) -> u32 {
        self.xid.fetch_add(1, Ordering::Relaxed)
    }
    fn send(&self, msg: OfMessage) {
        self.sent.lock().push(msg);
    }
}

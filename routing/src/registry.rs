// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The controller-wide router registry.
//!
//! One entry per attached datapath. Each entry serializes its mutations
//! behind one async mutex and owns two background tasks: the job worker
//! (packet-ins and suspend timeouts, FIFO per datapath) and the cyclic
//! gateway sweeper. Stats replies bypass the router lock entirely.

use crate::errors::RouterError;
use crate::router::{CHK_ROUTING_TBL_INTERVAL, Router, RouterJob, SWEEP_STAGGER};
use ahash::RandomState;
use openflow::datapath::{Datapath, DatapathId, PacketInMsg, PortDesc, PortNo, StatsReplyMsg};
use openflow::version::OfVersion;
use openflow::Waiters;
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// One registered switch.
pub struct RouterEntry {
    dpid: DatapathId,
    version: OfVersion,
    pub router: Mutex<Router>,
    jobs: mpsc::UnboundedSender<RouterJob>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl RouterEntry {
    #[must_use]
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }
}

/// Maps datapath ids to routers; the single owner of their lifecycle.
pub struct RouterRegistry {
    routers: RwLock<HashMap<DatapathId, Arc<RouterEntry>, RandomState>>,
    waiters: Arc<Waiters>,
}

impl Default for RouterRegistry {
    fn default() -> Self {
        RouterRegistry::new()
    }
}

impl RouterRegistry {
    #[must_use]
    pub fn new() -> RouterRegistry {
        RouterRegistry {
            routers: RwLock::new(HashMap::with_hasher(RandomState::new())),
            waiters: Arc::new(Waiters::new()),
        }
    }

    #[must_use]
    pub fn waiters(&self) -> &Arc<Waiters> {
        &self.waiters
    }

    /// Attach a joining datapath. Fails on an unsupported OpenFlow version;
    /// no router is registered in that case.
    pub fn register(&self, dp: &Arc<dyn Datapath>) -> Result<(), RouterError> {
        let dpid = dp.id();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let router = Router::new(dp, self.waiters.clone(), jobs_tx.clone())?;

        let entry = Arc::new(RouterEntry {
            dpid,
            version: dp.version(),
            router: Mutex::new(router),
            jobs: jobs_tx,
            tasks: SyncMutex::new(Vec::new()),
        });

        let worker = tokio::spawn(job_worker(entry.clone(), jobs_rx));
        let sweeper = tokio::spawn(sweep_loop(entry.clone()));
        entry.tasks.lock().extend([worker, sweeper]);

        self.routers.write().insert(dpid, entry);
        Ok(())
    }

    /// Detach a departed datapath: stop its tasks, cancel its timers, wake
    /// its stats waiters.
    pub async fn unregister(&self, dpid: DatapathId) {
        let Some(entry) = self.routers.write().remove(&dpid) else {
            return;
        };
        for task in entry.tasks.lock().drain(..) {
            task.abort();
        }
        entry.router.lock().await.shutdown();
        self.waiters.purge(dpid);
    }

    #[must_use]
    pub fn lookup(&self, dpid: DatapathId) -> Option<Arc<RouterEntry>> {
        self.routers.read().get(&dpid).cloned()
    }

    /// Every registered router, ascending by datapath id.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<RouterEntry>> {
        let mut entries: Vec<Arc<RouterEntry>> = self.routers.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.dpid);
        entries
    }

    /// Enqueue a packet-in onto its router's worker, preserving FIFO order.
    pub fn packet_in(&self, dpid: DatapathId, msg: PacketInMsg) {
        match self.lookup(dpid) {
            Some(entry) => {
                if entry.jobs.send(RouterJob::PacketIn(msg)).is_err() {
                    error!("Packet-in worker is gone [{dpid:016x}]");
                }
            }
            None => debug!("Packet-in from unregistered datapath [{dpid:016x}]"),
        }
    }

    /// Route a stats reply to its waiter. Never takes a router lock, so a
    /// REST deletion blocked on stats can always be satisfied.
    pub fn stats_reply(&self, dpid: DatapathId, msg: StatsReplyMsg) {
        let Some(entry) = self.lookup(dpid) else {
            debug!("Stats reply from unregistered datapath [{dpid:016x}]");
            return;
        };
        self.waiters.dispatch(dpid, entry.version, msg);
    }

    pub async fn port_added(&self, dpid: DatapathId, port: PortDesc) {
        if let Some(entry) = self.lookup(dpid) {
            entry.router.lock().await.port_added(port);
        }
    }

    pub async fn port_deleted(&self, dpid: DatapathId, port_no: PortNo) {
        if let Some(entry) = self.lookup(dpid) {
            entry.router.lock().await.port_deleted(port_no);
        }
    }

    /// Detach everything; used on controller shutdown.
    pub async fn unregister_all(&self) {
        let dpids: Vec<DatapathId> = self.routers.read().keys().copied().collect();
        for dpid in dpids {
            self.unregister(dpid).await;
        }
    }
}

async fn job_worker(entry: Arc<RouterEntry>, mut jobs: mpsc::UnboundedReceiver<RouterJob>) {
    while let Some(job) = jobs.recv().await {
        entry.router.lock().await.handle_job(job);
    }
}

async fn sweep_loop(entry: Arc<RouterEntry>) {
    loop {
        let vlan_ids = entry.router.lock().await.vlan_ids();
        for vlan_id in vlan_ids {
            entry.router.lock().await.sweep_vlan(vlan_id);
            tokio::time::sleep(SWEEP_STAGGER).await;
        }
        tokio::time::sleep(CHK_ROUTING_TBL_INTERVAL).await;
    }
}

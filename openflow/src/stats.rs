// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Correlation of asynchronous stats requests with their (multi-part)
//! replies, demultiplexed per datapath and bounded in time.

use crate::datapath::{DatapathId, StatsReplyMsg};
use crate::version::OfVersion;
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// How long a stats requester waits for the reply train.
pub const OFP_REPLY_TIMER: Duration = Duration::from_secs(1);

struct Waiter {
    notify: Arc<Notify>,
    msgs: Vec<StatsReplyMsg>,
}

/// Pending stats requests keyed by `(datapath, xid)`.
///
/// Shared between the requesters (which block on it) and the session event
/// dispatcher (which feeds replies in without ever taking a router lock).
#[derive(Default)]
pub struct Waiters {
    inner: Mutex<HashMap<(DatapathId, u32), Waiter, RandomState>>,
}

impl Waiters {
    #[must_use]
    pub fn new() -> Self {
        Waiters {
            inner: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Register interest in replies for `xid` before the request is sent.
    #[must_use]
    pub fn register(&self, dpid: DatapathId, xid: u32) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.inner.lock().insert(
            (dpid, xid),
            Waiter {
                notify: notify.clone(),
                msgs: Vec::new(),
            },
        );
        notify
    }

    /// Feed one reply in. Unknown `(dpid, xid)` pairs are ignored; the waiter
    /// is signalled once the version's more-fragments flag clears.
    pub fn dispatch(&self, dpid: DatapathId, version: OfVersion, msg: StatsReplyMsg) {
        let mut inner = self.inner.lock();
        let Some(waiter) = inner.get_mut(&(dpid, msg.xid)) else {
            debug!("Drop stats reply for unknown xid={} [{dpid:016x}]", msg.xid);
            return;
        };
        let more = version.stats_reply_has_more(msg.flags);
        waiter.msgs.push(msg);
        if !more {
            waiter.notify.notify_one();
        }
    }

    /// Remove the entry, returning whatever fragments arrived.
    #[must_use]
    pub fn take(&self, dpid: DatapathId, xid: u32) -> Vec<StatsReplyMsg> {
        self.inner
            .lock()
            .remove(&(dpid, xid))
            .map(|w| w.msgs)
            .unwrap_or_default()
    }

    /// Drop every pending entry of a departed datapath, waking the waiters.
    pub fn purge(&self, dpid: DatapathId) {
        let mut inner = self.inner.lock();
        inner.retain(|(id, _), waiter| {
            if *id == dpid {
                waiter.notify.notify_one();
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(xid: u32, flags: u16) -> StatsReplyMsg {
        StatsReplyMsg {
            xid,
            flags,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_unknown_xid_ignored() {
        let waiters = Waiters::new();
        waiters.dispatch(1, OfVersion::V1_3, reply(7, 0));
        assert!(waiters.take(1, 7).is_empty());
    }

    #[tokio::test]
    async fn test_multipart_accumulates_until_final_fragment() {
        let waiters = Waiters::new();
        let notify = waiters.register(1, 42);

        waiters.dispatch(1, OfVersion::V1_3, reply(42, crate::version::OFPMPF_REPLY_MORE));
        waiters.dispatch(1, OfVersion::V1_3, reply(42, 0));
        // Final fragment signalled; no timeout needed.
        tokio::time::timeout(Duration::from_millis(50), notify.notified())
            .await
            .expect("waiter should be signalled");
        assert_eq!(waiters.take(1, 42).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial_collection() {
        let waiters = Waiters::new();
        let notify = waiters.register(1, 42);
        waiters.dispatch(1, OfVersion::V1_0, reply(42, crate::version::OFPSF_REPLY_MORE));

        let timed_out = tokio::time::timeout(OFP_REPLY_TIMER, notify.notified())
            .await
            .is_err();
        assert!(timed_out);
        assert_eq!(waiters.take(1, 42).len(), 1);
        // A straggler after the take is dropped on the floor.
        waiters.dispatch(1, OfVersion::V1_0, reply(42, 0));
        assert!(waiters.take(1, 42).is_empty());
    }

    #[test]
    fn test_purge_only_touches_one_datapath() {
        let waiters = Waiters::new();
        let _n1 = waiters.register(1, 10);
        let _n2 = waiters.register(2, 10);
        waiters.purge(1);
        waiters.dispatch(1, OfVersion::V1_3, reply(10, 0));
        waiters.dispatch(2, OfVersion::V1_3, reply(10, 0));
        assert!(waiters.take(1, 10).is_empty());
        assert_eq!(waiters.take(2, 10).len(), 1);
    }
}

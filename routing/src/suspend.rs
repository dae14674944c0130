// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packets parked while their next hop resolves.
//!
//! Each entry owns a timer task that, on expiry, posts a timeout message back
//! to the owning router's job queue; the packet-in worker turns that into an
//! ICMP host-unreachable. Cancelling an already-fired timer is a no-op.

use net::headers::Headers;
use openflow::datapath::PortNo;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long a packet may wait for its ARP reply.
pub const ARP_REPLY_TIMER: Duration = Duration::from_secs(10);

/// Upper bound of parked packets per VLAN router.
pub const MAX_SUSPENDPACKETS: usize = 3;

/// One parked packet.
pub struct SuspendPacket {
    pub serial: u64,
    pub in_port: PortNo,
    pub headers: Headers,
    pub data: Vec<u8>,
    pub dst_ip: Ipv4Addr,
    timer: Option<JoinHandle<()>>,
}

impl SuspendPacket {
    /// Stop the timer. Safe after it has fired.
    pub fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

/// The bounded queue of parked packets.
#[derive(Default)]
pub struct SuspendPacketList {
    next_serial: u64,
    entries: Vec<SuspendPacket>,
}

impl SuspendPacketList {
    #[must_use]
    pub fn new() -> SuspendPacketList {
        SuspendPacketList::default()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_SUSPENDPACKETS
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Park a packet. Returns its serial, or `None` when the queue is full.
    pub fn add(
        &mut self,
        in_port: PortNo,
        headers: Headers,
        data: Vec<u8>,
        dst_ip: Ipv4Addr,
    ) -> Option<u64> {
        if self.is_full() {
            return None;
        }
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        self.entries.push(SuspendPacket {
            serial,
            in_port,
            headers,
            data,
            dst_ip,
            timer: None,
        });
        Some(serial)
    }

    /// Attach the timer task spawned for `serial`.
    pub fn attach_timer(&mut self, serial: u64, timer: JoinHandle<()>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.serial == serial) {
            entry.timer = Some(timer);
        } else {
            // Dequeued before the timer could attach; stop it right away.
            timer.abort();
        }
    }

    /// Remove the entry whose timer fired. `None` when it was resolved first.
    pub fn take_by_serial(&mut self, serial: u64) -> Option<SuspendPacket> {
        let idx = self.entries.iter().position(|e| e.serial == serial)?;
        Some(self.entries.remove(idx))
    }

    /// Remove (and cancel) everything waiting on `dst_ip`.
    pub fn take_for_dst(&mut self, dst_ip: Ipv4Addr) -> Vec<SuspendPacket> {
        let taken = Self::extract(&mut self.entries, |e| e.dst_ip == dst_ip);
        for entry in &taken {
            entry.cancel_timer();
        }
        taken
    }

    /// Drop (and cancel) everything whose destination fell inside a deleted
    /// address.
    pub fn drop_in_subnet(&mut self, net: ipnet::Ipv4Net) {
        for entry in Self::extract(&mut self.entries, |e| net.contains(&e.dst_ip)) {
            entry.cancel_timer();
        }
    }

    /// Cancel every timer; used on datapath teardown.
    pub fn abort_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.cancel_timer();
        }
    }

    fn extract(
        entries: &mut Vec<SuspendPacket>,
        pred: impl Fn(&SuspendPacket) -> bool,
    ) -> Vec<SuspendPacket> {
        let mut taken = Vec::new();
        let mut idx = 0;
        while idx < entries.len() {
            if pred(&entries[idx]) {
                taken.push(entries.remove(idx));
            } else {
                idx += 1;
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::Mac;
    use net::arp::{ARP_REQUEST, Arp};
    use net::frame;

    fn headers() -> Headers {
        let data = frame::arp_frame(
            None,
            Arp {
                opcode: ARP_REQUEST,
                sha: Mac([2, 0, 0, 0, 0, 1]),
                spa: Ipv4Addr::new(10, 0, 0, 9),
                tha: Mac::ZERO,
                tpa: Ipv4Addr::new(10, 0, 0, 1),
            },
            Mac([2, 0, 0, 0, 0, 1]),
            Mac::BROADCAST,
        );
        Headers::parse(&data).unwrap()
    }

    #[test]
    fn test_queue_bounded_at_three() {
        let mut list = SuspendPacketList::new();
        let dst = Ipv4Addr::new(10, 0, 0, 254);
        for _ in 0..MAX_SUSPENDPACKETS {
            assert!(list.add(1, headers(), vec![0u8; 64], dst).is_some());
        }
        assert!(list.is_full());
        assert!(list.add(1, headers(), vec![0u8; 64], dst).is_none());
        assert_eq!(list.len(), MAX_SUSPENDPACKETS);
    }

    #[test]
    fn test_take_for_dst_only_matching() {
        let mut list = SuspendPacketList::new();
        list.add(1, headers(), vec![1], Ipv4Addr::new(10, 0, 0, 254));
        list.add(2, headers(), vec![2], Ipv4Addr::new(10, 0, 1, 254));
        list.add(3, headers(), vec![3], Ipv4Addr::new(10, 0, 0, 254));

        let taken = list.take_for_dst(Ipv4Addr::new(10, 0, 0, 254));
        assert_eq!(taken.len(), 2);
        assert_eq!(list.len(), 1);
        assert!(taken.iter().all(|p| p.dst_ip == Ipv4Addr::new(10, 0, 0, 254)));
    }

    #[test]
    fn test_take_by_serial_once() {
        let mut list = SuspendPacketList::new();
        let serial = list
            .add(1, headers(), vec![1], Ipv4Addr::new(10, 0, 0, 254))
            .unwrap();
        assert!(list.take_by_serial(serial).is_some());
        assert!(list.take_by_serial(serial).is_none());
    }

    #[test]
    fn test_drop_in_subnet() {
        let mut list = SuspendPacketList::new();
        list.add(1, headers(), vec![1], Ipv4Addr::new(10, 0, 0, 254));
        list.add(2, headers(), vec![2], Ipv4Addr::new(172, 16, 0, 1));
        list.drop_in_subnet("10.0.0.0/24".parse().unwrap());
        assert_eq!(list.len(), 1);
        assert_eq!(list.entries[0].dst_ip, Ipv4Addr::new(172, 16, 0, 1));
    }
}

//! The bounded, ordered map of in-flight outbound packets.
//!
//! Keys (sequence numbers) are monotonically increasing by construction, so
//! a `BTreeMap`'s key order coincides with insertion order — this is the
//! "ordered map keyed by the seqnum" the design calls for, without reaching
//! for a third-party ordered-map crate.

use crate::scheduled_packet::ScheduledPacket;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct SendWindow {
    entries: BTreeMap<u32, ScheduledPacket>,
    capacity: usize,
}

impl SendWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn oldest_seqnum(&self) -> Option<u32> {
        self.entries.keys().next().copied()
    }

    pub fn get_mut(&mut self, seqnum: u32) -> Option<&mut ScheduledPacket> {
        self.entries.get_mut(&seqnum)
    }

    pub fn contains(&self, seqnum: u32) -> bool {
        self.entries.contains_key(&seqnum)
    }

    /// Inserts a new in-flight packet. The caller must pass the next monotone
    /// sequence number; this is an invariant of the connection, not checked
    /// here.
    pub fn insert(&mut self, seqnum: u32, scheduled: ScheduledPacket) {
        self.entries.insert(seqnum, scheduled);
    }

    /// Removes all entries with `seqnum < ack`, cancelling each entry's
    /// retransmit timer. Returns whether any removal occurred.
    pub fn retire_up_to(&mut self, ack: u32) -> bool {
        let to_remove: Vec<u32> = self
            .entries
            .range(..ack)
            .map(|(seq, _)| *seq)
            .collect();
        if to_remove.is_empty() {
            return false;
        }
        for seq in to_remove {
            if let Some(mut scheduled) = self.entries.remove(&seq) {
                scheduled.cancel_timer();
            }
        }
        true
    }

    /// Cancels every pending timer and empties the window.
    pub fn clear(&mut self) {
        for (_, mut scheduled) in std::mem::take(&mut self.entries) {
            scheduled.cancel_timer();
        }
    }
}

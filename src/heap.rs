//! A min-heap of received packets, keyed by sequence number, with the extra
//! operation of popping the longest contiguous, fragment-complete prefix.

use crate::packet::Packet;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Wraps a [`Packet`] so the heap orders by `sequence_number` only.
#[derive(Debug)]
struct HeapEntry(Packet);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.sequence_number == other.0.sequence_number
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.sequence_number.cmp(&other.0.sequence_number)
    }
}

/// Buffers out-of-order inbound packets and reassembles contiguous messages.
///
/// Duplicates (a packet whose `sequence_number` is already buffered) are
/// dropped silently on push, matching the duplicate-tolerance property of the
/// transport: re-delivering a previously-seen packet must not change
/// observable state.
#[derive(Debug, Default)]
pub struct ReceiveHeap {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    present: HashSet<u32>,
}

impl ReceiveHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `packet` unless its sequence number is already buffered.
    /// Returns `true` if the packet was inserted, `false` if it was a duplicate.
    pub fn push(&mut self, packet: Packet) -> bool {
        if !self.present.insert(packet.sequence_number) {
            return false;
        }
        self.heap.push(Reverse(HeapEntry(packet)));
        true
    }

    /// The lowest buffered sequence number, if any.
    pub fn peek_min_seqnum(&self) -> Option<u32> {
        self.heap.peek().map(|Reverse(entry)| entry.0.sequence_number)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Scans from the minimum, verifying strict consecutiveness and the
    /// `more_fragments` countdown. On success, removes exactly those entries
    /// and returns them in order. On failure, leaves the heap untouched.
    pub fn attempt_pop_message(&mut self) -> Option<Vec<Packet>> {
        // `into_sorted_vec` would consume the heap; instead peek through a
        // clone of the ordering via repeated pop/push so a failed attempt
        // leaves the heap exactly as it was.
        let mut popped = Vec::new();
        let mut expected_seq: Option<u32> = None;
        // The countdown a fragment at a given position must carry, derived
        // from the first fragment's own `more_fragments` value (pᵢ.more_fragments
        // must equal k - i, where k is the total fragment count).
        let mut expected_remaining: Option<u32> = None;
        let mut ok = true;

        while let Some(Reverse(HeapEntry(candidate))) = self.heap.peek() {
            if let Some(expected) = expected_seq {
                if candidate.sequence_number != expected {
                    ok = false;
                    break;
                }
            }
            if let Some(remaining) = expected_remaining {
                if candidate.more_fragments != remaining {
                    ok = false;
                    break;
                }
            }
            let Reverse(HeapEntry(packet)) = self.heap.pop().unwrap();
            expected_seq = Some(packet.sequence_number.wrapping_add(1));
            expected_remaining = packet.more_fragments.checked_sub(1);
            let done = packet.more_fragments == 0;
            popped.push(packet);
            if done {
                break;
            }
            if self.heap.peek().is_none() {
                // Ran out of buffered packets before more_fragments reached 0.
                ok = false;
                break;
            }
        }

        let complete = ok
            && popped
                .last()
                .map(|last| last.more_fragments == 0)
                .unwrap_or(false);

        if !complete {
            // Put everything back, preserving heap invariants, and report no progress.
            for packet in popped.drain(..) {
                self.heap.push(Reverse(HeapEntry(packet)));
            }
            return None;
        }

        for packet in &popped {
            self.present.remove(&packet.sequence_number);
        }
        Some(popped)
    }
}

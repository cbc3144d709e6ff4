//! Wraparound-aware comparison for sequence numbers.
//!
//! Sequence numbers are logically unbounded but implemented as `u32`, so
//! comparisons must account for wraparound the way TCP implementations do:
//! a sequence number is "less than" another if the signed difference between
//! them is negative. This is the same technique used by reference TCP
//! implementations for the half-open sequence space (e.g. `wrapping_lt` in
//! raw-socket TCP stacks), generalized here to RUDP's seqnum space.

/// Returns `true` if `a` precedes `b` in the circular sequence space.
pub fn seq_lt(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

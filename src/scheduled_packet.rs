//! A single in-flight outbound packet together with its retransmit timer.

use crate::timer::OneShotHandle;
use std::time::Duration;

/// One send-window entry: the serialized bytes of the outbound packet, how
/// long to wait before retransmitting it, the handle of its currently
/// pending retransmit timer, and how many times it has already been sent.
pub struct ScheduledPacket {
    pub serialized_bytes: Vec<u8>,
    pub timeout: Duration,
    pub timer_handle: Option<OneShotHandle>,
    pub retries: u32,
}

impl ScheduledPacket {
    pub fn new(serialized_bytes: Vec<u8>, timeout: Duration) -> Self {
        Self {
            serialized_bytes,
            timeout,
            timer_handle: None,
            retries: 0,
        }
    }

    /// Cancels the pending retransmit timer, if any. Owned exclusively by the
    /// send window entry, so this is the only place a timer is cancelled from.
    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer_handle.take() {
            handle.cancel();
        }
    }
}

impl std::fmt::Debug for ScheduledPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledPacket")
            .field("len", &self.serialized_bytes.len())
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

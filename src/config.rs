//! Fixed, wire-affecting knobs for a [`Connection`](crate::connection::Connection).
//!
//! These correspond to the constants of the external interface: segment
//! size, window size, and the retransmit/keep-alive timing budget. They are
//! grouped into a struct (rather than bare `const`s) so a host application
//! can tune timing to its own network characteristics, e.g. a fast
//! `PACKET_TIMEOUT` in tests.

use std::time::Duration;

/// Tunable parameters for a single [`Connection`](crate::connection::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RudpConfig {
    /// Maximum payload bytes per UDP-safe segment.
    pub udp_safe_segment_size: usize,
    /// Maximum number of in-flight outbound packets.
    pub window_size: usize,
    /// Seconds between retransmissions of an in-flight data/SYN packet.
    pub packet_timeout: Duration,
    /// Delay after which an unacked inbound triggers a bare ACK.
    pub bare_ack_timeout: Duration,
    /// Delay used to schedule a keep-alive bare ACK after activity.
    pub keep_alive_timeout: Duration,
    /// Number of retries at or beyond which a send-window entry triggers shutdown.
    pub max_retransmissions: u32,
}

impl Default for RudpConfig {
    fn default() -> Self {
        Self {
            udp_safe_segment_size: 512,
            window_size: 32,
            packet_timeout: Duration::from_millis(500),
            bare_ack_timeout: Duration::from_millis(200),
            keep_alive_timeout: Duration::from_secs(5),
            max_retransmissions: 8,
        }
    }
}

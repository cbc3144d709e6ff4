//! Error types for the fallible boundaries of the transport.
//!
//! Most of the conditions spec'd in the connection state machine are *not*
//! errors: a malformed handshake, a duplicate segment, or a dead peer are all
//! handled by dropping the packet or shutting the connection down, never by
//! surfacing a `Result` to a caller. The enums here cover only the two
//! boundaries that genuinely can fail independently of protocol state: wire
//! decoding and datagram transmission.

use thiserror::Error;

/// Failure decoding a [`Packet`](crate::packet::Packet) from wire bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketParseError {
    #[error("packet record ended before field `{0}` was found")]
    MissingField(&'static str),
    #[error("field `{field}` had a malformed value: {value}")]
    MalformedField {
        field: &'static str,
        value: String,
    },
    #[error("packet bytes were not valid UTF-8")]
    NotUtf8,
}

/// Failure transmitting a datagram through a [`DatagramSocket`](crate::transport::DatagramSocket).
#[derive(Debug, Error)]
pub enum SendDatagramError {
    #[error("underlying I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer is unreachable")]
    Unreachable,
}

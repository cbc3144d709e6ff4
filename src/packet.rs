//! The RUDP packet and its reference wire codec.
//!
//! The codec itself is an external collaborator per the transport's design —
//! a consumer embedding this crate may swap in a binary codec — but a
//! reference implementation is provided so the crate is runnable end to end.
//! The wire format is a newline-separated `key=value` record, one line per
//! semantic field, terminated by a blank line, matching the "structured text
//! representation" the transport's external interface calls for.

use crate::address::Address;
use crate::error::PacketParseError;

/// A single RUDP wire packet.
///
/// `sequence_number == 0` marks an out-of-order control packet (bare ACK or
/// FIN); any positive value is a payload or SYN packet subject to ordering.
/// `ack == 0` means "no acknowledgement"; a positive value means "I have
/// delivered everything with seqnum < ack."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence_number: u32,
    pub ack: u32,
    pub syn: bool,
    pub fin: bool,
    pub payload: Vec<u8>,
    pub more_fragments: u32,
    pub source: Address,
    pub destination: Address,
}

impl Packet {
    /// Serializes this packet to its wire representation.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("seq={}\n", self.sequence_number));
        out.push_str(&format!("ack={}\n", self.ack));
        out.push_str(&format!("syn={}\n", self.syn));
        out.push_str(&format!("fin={}\n", self.fin));
        out.push_str(&format!("more_fragments={}\n", self.more_fragments));
        out.push_str(&format!("source={}\n", self.source));
        out.push_str(&format!("destination={}\n", self.destination));
        out.push_str(&format!("payload_len={}\n", self.payload.len()));
        out.push('\n');
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses a packet from its wire representation.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, PacketParseError> {
        let separator = find_double_newline(bytes).ok_or(PacketParseError::MissingField("payload_len"))?;
        let header = std::str::from_utf8(&bytes[..separator]).map_err(|_| PacketParseError::NotUtf8)?;
        let payload = bytes[separator + 2..].to_vec();

        let mut fields = std::collections::HashMap::new();
        for line in header.lines() {
            let (key, value) = line
                .split_once('=')
                .ok_or(PacketParseError::MalformedField {
                    field: "line",
                    value: line.to_string(),
                })?;
            fields.insert(key, value);
        }

        let field = |name: &'static str| -> Result<&str, PacketParseError> {
            fields.get(name).copied().ok_or(PacketParseError::MissingField(name))
        };
        let parse_u32 = |name: &'static str| -> Result<u32, PacketParseError> {
            field(name)?
                .parse()
                .map_err(|_| PacketParseError::MalformedField { field: name, value: field(name).unwrap_or("").to_string() })
        };
        let parse_bool = |name: &'static str| -> Result<bool, PacketParseError> {
            field(name)?
                .parse()
                .map_err(|_| PacketParseError::MalformedField { field: name, value: field(name).unwrap_or("").to_string() })
        };
        let parse_addr = |name: &'static str| -> Result<Address, PacketParseError> {
            let raw = field(name)?;
            let socket_addr: std::net::SocketAddr =
                raw.parse().map_err(|_| PacketParseError::MalformedField { field: name, value: raw.to_string() })?;
            Ok(Address::from(socket_addr))
        };

        let payload_len: usize = field("payload_len")?
            .parse()
            .map_err(|_| PacketParseError::MalformedField { field: "payload_len", value: field("payload_len").unwrap_or("").to_string() })?;
        if payload.len() != payload_len {
            return Err(PacketParseError::MalformedField {
                field: "payload_len",
                value: payload_len.to_string(),
            });
        }

        Ok(Packet {
            sequence_number: parse_u32("seq")?,
            ack: parse_u32("ack")?,
            syn: parse_bool("syn")?,
            fin: parse_bool("fin")?,
            more_fragments: parse_u32("more_fragments")?,
            source: parse_addr("source")?,
            destination: parse_addr("destination")?,
            payload,
        })
    }
}

fn find_double_newline(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\n\n")
}

//! The protocol-facing interface: best-effort, non-blocking UDP send.
//!
//! This is named as an external collaborator by the transport's design —
//! a real deployment owns the UDP socket and the dispatch of inbound
//! datagrams to connections — but a thin default implementation and an
//! in-memory loopback are provided so the crate runs end to end.

use crate::address::Address;
use crate::error::SendDatagramError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Sends single datagrams, best-effort and non-blocking from the caller's
/// perspective (the send itself may be async; callers must not await
/// delivery confirmation, since UDP gives none).
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send_datagram(&self, bytes: Vec<u8>, to: Address) -> Result<(), SendDatagramError>;
}

/// A [`DatagramSocket`] backed by a real `tokio::net::UdpSocket`.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(local: Address) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(std::net::SocketAddr::from(local)).await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DatagramSocket for UdpTransport {
    async fn send_datagram(&self, bytes: Vec<u8>, to: Address) -> Result<(), SendDatagramError> {
        self.socket
            .send_to(&bytes, std::net::SocketAddr::from(to))
            .await?;
        Ok(())
    }
}

/// An in-memory, lossless loopback transport for tests: datagrams sent to a
/// paired [`InMemoryTransport`] arrive on its inbound channel instead of a
/// real socket. Lets end-to-end scenarios exercise handshake, segmentation,
/// and retransmission without binding UDP ports.
pub struct InMemoryTransport {
    outbound: mpsc::UnboundedSender<(Vec<u8>, Address)>,
}

impl InMemoryTransport {
    /// Creates a connected pair: datagrams sent on one side are received on
    /// the other's inbound queue.
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<(Vec<u8>, Address)>) {
        let (outbound, inbound) = mpsc::unbounded_channel();
        (Arc::new(Self { outbound }), inbound)
    }
}

#[async_trait]
impl DatagramSocket for InMemoryTransport {
    async fn send_datagram(&self, bytes: Vec<u8>, to: Address) -> Result<(), SendDatagramError> {
        self.outbound
            .send((bytes, to))
            .map_err(|_| SendDatagramError::Unreachable)
    }
}

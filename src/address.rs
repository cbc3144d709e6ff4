//! UDP endpoint addressing.

use std::fmt;
use std::net::IpAddr;

/// A UDP endpoint: an IP address paired with a port.
///
/// A connection tracks three of these (see [`crate::connection::Connection`]):
/// the local bind address, the logical peer address (carried inside every
/// packet), and the relay address (the next-hop UDP destination, which
/// defaults to the peer address but may differ under NAT-traversal relaying).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub ip: IpAddr,
    pub port: u16,
}

impl Address {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

impl From<std::net::SocketAddr> for Address {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<Address> for std::net::SocketAddr {
    fn from(addr: Address) -> Self {
        std::net::SocketAddr::new(addr.ip, addr.port)
    }
}

//! Connection construction and the peer-address-keyed registry.
//!
//! Mirrors the session-table pattern `elvis-core`'s `Udp` protocol uses
//! (`FxDashMap<SessionId, Arc<UdpSession>>`): connections are looked up by
//! peer address in a `DashMap` keyed with the `rustc_hash` hasher, since the
//! address space is attacker-influenced and the default hasher's DoS
//! resistance isn't needed here.
//!
//! The datagram dispatcher that demultiplexes inbound UDP traffic to the
//! right connection is an external collaborator and stays out of this
//! crate's scope; this module only provides the building blocks a
//! dispatcher would use.

use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::address::Address;
use crate::config::RudpConfig;
use crate::connection::Connection;
use crate::handler::ConnectionHandler;
use crate::timer::TimerDriver;
use crate::transport::DatagramSocket;

/// Constructs the application-level handler for a newly-created connection.
///
/// Implementations typically construct a handler, hand it to
/// [`ConnectionFactory::make_new_connection`], and rely on
/// [`ConnectionHandler::attach_connection`](crate::handler::ConnectionHandler::attach_connection)
/// to receive the back-reference once it exists.
pub trait HandlerFactory: Send + Sync {
    fn make_handler(&self) -> Arc<dyn ConnectionHandler>;
}

/// Builds connections with a fixed configuration, timer driver, and
/// transport, and registers each one under its peer address.
pub struct ConnectionFactory {
    config: RudpConfig,
    timer_driver: Arc<dyn TimerDriver>,
    transport: Arc<dyn DatagramSocket>,
    handler_factory: Arc<dyn HandlerFactory>,
    registry: ConnectionRegistry,
}

impl ConnectionFactory {
    pub fn new(
        config: RudpConfig,
        timer_driver: Arc<dyn TimerDriver>,
        transport: Arc<dyn DatagramSocket>,
        handler_factory: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self {
            config,
            timer_driver,
            transport,
            handler_factory,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Builds a new connection to `dest_addr` (relayed via `relay_addr`,
    /// which equals `dest_addr` for a direct peer), constructs its handler,
    /// attaches the back-reference, registers the connection under
    /// `dest_addr`, and returns it.
    pub fn make_new_connection(&self, own_addr: Address, dest_addr: Address, relay_addr: Address) -> Arc<Connection> {
        let handler = self.handler_factory.make_handler();
        let connection = Connection::new(
            own_addr,
            dest_addr,
            relay_addr,
            self.config,
            self.timer_driver.clone(),
            self.transport.clone(),
            handler.clone(),
        );
        handler.attach_connection(connection.clone());
        self.registry.insert(dest_addr, connection.clone());
        connection
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

/// A peer-address-keyed table of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Address, Arc<Connection>, BuildHasherDefault<FxHasher>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::with_hasher(BuildHasherDefault::default()),
        }
    }

    pub fn insert(&self, peer: Address, connection: Arc<Connection>) {
        self.connections.insert(peer, connection);
    }

    pub fn get(&self, peer: &Address) -> Option<Arc<Connection>> {
        self.connections.get(peer).map(|entry| entry.clone())
    }

    pub fn remove(&self, peer: &Address) {
        self.connections.remove(peer);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

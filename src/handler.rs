//! The upstream application handler interface.
//!
//! A handler is the application-level consumer of a single [`Connection`](crate::connection::Connection).
//! It is constructed by a [`HandlerFactory`](crate::factory::HandlerFactory) alongside its
//! connection and receives a back-reference to it so it can send replies.

use std::sync::Arc;

use crate::connection::Connection;

/// Consumes fully-reassembled application messages and observes shutdown.
///
/// Both methods are invoked from the connection's event-loop context and
/// must not block: `receive_message` is called once per reassembled
/// message, and `handle_shutdown` is called exactly once per connection
/// lifetime.
pub trait ConnectionHandler: Send + Sync {
    /// Called once per fully-reassembled application message.
    fn receive_message(&self, payload: Vec<u8>);

    /// Called exactly once per connection lifetime, when the connection is
    /// torn down (by `shutdown()`, a FIN from the peer, or exhausting the
    /// retransmission budget).
    fn handle_shutdown(&self);

    /// Installs the back-reference to this handler's connection. Called by
    /// the factory exactly once, immediately after construction.
    fn attach_connection(&self, connection: Arc<Connection>);
}

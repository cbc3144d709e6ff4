//! A reliable, ordered, message-oriented transport layered over UDP.
//!
//! This crate implements a single [`Connection`](connection::Connection): a
//! virtual, handshake-initiated channel between two UDP endpoints that
//! provides cumulative-ACK reliability, a bounded send window with
//! retransmission, segmentation and reassembly of application messages
//! larger than a safe UDP payload, keep-alives, and graceful two-sided
//! shutdown. It does not implement a listening socket or a demultiplexer for
//! inbound traffic across many peers — those are the job of the embedding
//! application, which owns the UDP socket and routes each inbound datagram
//! to the right [`Connection`] (see [`factory::ConnectionRegistry`] for the
//! building block that lookup would use).

pub mod address;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod handler;
pub mod heap;
pub mod packet;
pub mod scheduled_packet;
pub mod segmenter;
pub mod send_window;
pub mod seqcmp;
pub mod timer;
pub mod transport;

pub use address::Address;
pub use config::RudpConfig;
pub use connection::Connection;
pub use error::{PacketParseError, SendDatagramError};
pub use factory::{ConnectionFactory, ConnectionRegistry, HandlerFactory};
pub use handler::ConnectionHandler;
pub use packet::Packet;
pub use timer::{OneShotHandle, PeriodicTask, TimerDriver, TokioTimerDriver};
pub use transport::{DatagramSocket, InMemoryTransport, UdpTransport};

//! The per-connection state machine: handshake, send window and
//! retransmission, receive heap and reassembly, ACK scheduling, and
//! shutdown.
//!
//! Mirrors the `Arc<Self>` + interior-mutable-state pattern `elvis-core`
//! uses for its protocol sessions (e.g. `ArpSession`, `UdpSession`): the
//! connection is always handed around as an `Arc<Connection>` so timer
//! callbacks and the periodic "looping" drivers can hold their own clone and
//! call back into it after this constructor returns.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;

use crate::address::Address;
use crate::config::RudpConfig;
use crate::handler::ConnectionHandler;
use crate::heap::ReceiveHeap;
use crate::packet::Packet;
use crate::scheduled_packet::ScheduledPacket;
use crate::segmenter::{split_message, Segment};
use crate::send_window::SendWindow;
use crate::seqcmp::seq_lt;
use crate::timer::{PeriodicTask, TimerDriver, TimerFuture};
use crate::transport::DatagramSocket;

/// The mutable state of a connection, touched only from event-loop
/// callbacks: public method bodies and timer/periodic-task callbacks, all of
/// which synchronize through this mutex and never hold it across an `.await`.
struct Inner {
    connected: bool,
    /// Tracks whether the initial one-shot SYN has already been dispatched,
    /// used in place of inspecting timer liveness (spec's guidance for
    /// platforms where that check is unreliable).
    syn_dispatched: bool,
    next_sequence_number: u32,
    next_expected_seqnum: u32,
    /// The sequence number chosen for this connection's SYN; reused,
    /// unchanged, across every SYN/SYNACK retransmission.
    syn_seqnum: u32,
    segment_queue: VecDeque<Segment>,
    send_window: SendWindow,
    receive_heap: ReceiveHeap,
    shutdown_notified: bool,
}

/// A virtual, reliable, ordered channel between two UDP addresses.
pub struct Connection {
    own_addr: Address,
    dest_addr: Address,
    relay_addr: Address,
    config: RudpConfig,
    timer_driver: Arc<dyn TimerDriver>,
    transport: Arc<dyn DatagramSocket>,
    handler: Arc<dyn ConnectionHandler>,
    inner: Mutex<Inner>,
    looping_send: PeriodicTask,
    looping_ack: PeriodicTask,
    looping_receive: PeriodicTask,
}

impl Connection {
    /// Constructs a new connection with `connected = false` and schedules
    /// the initial one-shot SYN at `t = 0`, so a pending inbound SYN can be
    /// processed first within the same event turn.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        own_addr: Address,
        dest_addr: Address,
        relay_addr: Address,
        config: RudpConfig,
        timer_driver: Arc<dyn TimerDriver>,
        transport: Arc<dyn DatagramSocket>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Arc<Self> {
        // Chosen uniformly in [1, 2^16 - 1) to avoid colliding with 0, which
        // is reserved for out-of-order control packets, and to reduce
        // collision with stale network packets.
        let syn_seqnum = rand::thread_rng().gen_range(1..u16::MAX as u32);
        let inner = Inner {
            connected: false,
            syn_dispatched: false,
            next_sequence_number: syn_seqnum.wrapping_add(1),
            next_expected_seqnum: 0,
            syn_seqnum,
            segment_queue: VecDeque::new(),
            send_window: SendWindow::new(config.window_size),
            receive_heap: ReceiveHeap::new(),
            shutdown_notified: false,
        };
        let connection = Arc::new(Self {
            own_addr,
            dest_addr,
            relay_addr,
            config,
            timer_driver,
            transport,
            handler,
            inner: Mutex::new(inner),
            looping_send: PeriodicTask::new(),
            looping_ack: PeriodicTask::new(),
            looping_receive: PeriodicTask::new(),
        });

        let fired = connection.clone();
        let task: TimerFuture = Box::pin(async move { fired.initial_syn_fire().await });
        connection.timer_driver.schedule(Duration::ZERO, task);
        connection
    }

    /// The three addresses this connection was built with: own bind address,
    /// logical destination, and next-hop relay address.
    pub fn addresses(&self) -> (Address, Address, Address) {
        (self.own_addr, self.dest_addr, self.relay_addr)
    }

    /// Splits `bytes` into segments and enqueues them for sending. Never
    /// blocks; preserves submission order. A zero-length message is a no-op.
    pub async fn send_message(self: &Arc<Self>, bytes: Vec<u8>) {
        let segments = split_message(&bytes, self.config.udp_safe_segment_size);
        if segments.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        for segment in segments {
            inner.segment_queue.push_back(segment);
        }
        self.try_enable_looping_send(&inner);
    }

    /// Dispatches one validated inbound packet. Invoked exactly once per
    /// datagram by the external dispatcher.
    pub async fn receive_packet(self: &Arc<Self>, packet: Packet) {
        let mut inner = self.inner.lock().unwrap();
        if packet.fin {
            let should_process = inner.connected || inner.syn_dispatched;
            drop(inner);
            if should_process {
                self.shutdown().await;
            } else {
                tracing::trace!("dropping FIN before handshake completed");
            }
            return;
        }
        if packet.syn && !inner.connected {
            self.handle_syn(&mut inner, packet);
            return;
        }
        if !packet.syn && inner.connected {
            self.handle_casual(&mut inner, packet);
            return;
        }
        tracing::trace!(
            syn = packet.syn,
            fin = packet.fin,
            "dropping packet that matched no dispatch branch"
        );
    }

    /// Sends a single out-of-order FIN, stops the periodic drivers, clears
    /// the send window, and notifies the handler — exactly once per
    /// connection lifetime. A second call is a complete no-op: it produces
    /// no datagram and does not call the handler again.
    pub async fn shutdown(self: &Arc<Self>) {
        let fin_packet = {
            let mut inner = self.inner.lock().unwrap();
            if inner.shutdown_notified {
                return;
            }
            inner.shutdown_notified = true;
            self.looping_send.stop();
            self.looping_ack.stop();
            self.looping_receive.stop();
            inner.send_window.clear();
            inner.connected = false;
            Packet {
                sequence_number: 0,
                ack: 0,
                syn: false,
                fin: true,
                payload: Vec::new(),
                more_fragments: 0,
                source: self.own_addr,
                destination: self.dest_addr,
            }
        };
        self.transmit(&fin_packet).await;
        tracing::info!("connection shut down");
        self.handler.handle_shutdown();
    }

    // --- handshake -------------------------------------------------------

    async fn initial_syn_fire(self: Arc<Self>) {
        let mut inner = self.inner.lock().unwrap();
        self.send_syn_locked(&mut inner);
    }

    fn send_syn_locked(self: &Arc<Self>, inner: &mut Inner) {
        let packet = Packet {
            sequence_number: inner.syn_seqnum,
            ack: inner.next_expected_seqnum,
            syn: true,
            fin: false,
            payload: Vec::new(),
            more_fragments: 0,
            source: self.own_addr,
            destination: self.dest_addr,
        };
        let seqnum = inner.syn_seqnum;
        self.schedule_in_order(inner, seqnum, packet);
        inner.syn_dispatched = true;
    }

    fn handle_syn(self: &Arc<Self>, inner: &mut Inner, packet: Packet) {
        if packet.ack > 0 {
            // Peer sent a SYNACK.
            let Some(oldest) = inner.send_window.oldest_seqnum() else {
                // We never sent a SYN — defend against malicious/confused initiation.
                tracing::debug!("dropping SYNACK with no prior SYN outstanding");
                return;
            };
            if packet.ack == oldest.wrapping_add(1) {
                inner.send_window.retire_up_to(packet.ack);
                inner.connected = true;
                tracing::info!("handshake complete (SYNACK acknowledged our SYN)");
                self.try_enable_looping_send(inner);
            } else {
                tracing::debug!(
                    ack = packet.ack,
                    oldest,
                    "dropping SYNACK with mismatched ack during handshake"
                );
            }
            return;
        }

        // A bare SYN from the peer.
        inner.next_expected_seqnum = packet.sequence_number.wrapping_add(1);
        inner.send_window.clear();
        inner.connected = true;
        if inner.syn_dispatched {
            // Our own one-shot SYN already fired; this dispatch is now a SYNACK.
            self.send_syn_locked(inner);
        }
        // Otherwise the pending one-shot fires later and observes the
        // updated `next_expected_seqnum`, becoming a SYNACK on its own.
    }

    // --- casual packet processing -----------------------------------------

    fn handle_casual(self: &Arc<Self>, inner: &mut Inner, packet: Packet) {
        if packet.ack > 0 && !inner.send_window.is_empty() && inner.send_window.retire_up_to(packet.ack) {
            self.try_enable_looping_send(inner);
        }

        if packet.sequence_number > 0 {
            let seq = packet.sequence_number;
            let expected = inner.next_expected_seqnum;
            if seq_lt(seq, expected) {
                // Already delivered: the peer's retransmit raced our bare
                // ACK. Drop it rather than re-inserting into the heap, or a
                // later in-order arrival would pop and re-deliver it.
                return;
            }
            inner.receive_heap.push(packet);
            if seq == expected {
                inner.next_expected_seqnum = expected.wrapping_add(1);
                self.reset_ack_timer(inner.connected, self.config.bare_ack_timeout);
                self.try_enable_looping_receive(inner);
            }
        }
    }

    // --- retransmission ----------------------------------------------------

    fn schedule_in_order(self: &Arc<Self>, inner: &mut Inner, seqnum: u32, packet: Packet) {
        let mut scheduled = ScheduledPacket::new(packet.to_wire(), self.config.packet_timeout);
        let conn = self.clone();
        let handle = self.timer_driver.schedule(
            Duration::ZERO,
            Box::pin(async move { conn.do_send_packet(seqnum).await }),
        );
        scheduled.timer_handle = Some(handle);
        inner.send_window.insert(seqnum, scheduled);
    }

    async fn do_send_packet(self: Arc<Self>, seqnum: u32) {
        let bytes = {
            let mut inner = self.inner.lock().unwrap();
            let Some(scheduled) = inner.send_window.get_mut(seqnum) else {
                drop(inner);
                panic!(
                    "_do_send_packet fired for seqnum {seqnum} absent from the send window; \
                     this is an invariant violation, not a recoverable condition"
                );
            };
            if scheduled.retries >= self.config.max_retransmissions {
                drop(inner);
                tracing::warn!(seqnum, "max retransmissions exceeded, shutting down");
                self.shutdown().await;
                return;
            }
            scheduled.serialized_bytes.clone()
        };

        if let Err(error) = self.transport.send_datagram(bytes, self.relay_addr).await {
            tracing::warn!(%error, seqnum, "failed to transmit datagram");
        }

        let connected = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(scheduled) = inner.send_window.get_mut(seqnum) {
                scheduled.retries += 1;
                let timeout = scheduled.timeout;
                let conn = self.clone();
                let handle = self.timer_driver.schedule(
                    timeout,
                    Box::pin(async move { conn.do_send_packet(seqnum).await }),
                );
                scheduled.timer_handle = Some(handle);
            }
            inner.connected
        };
        // Any byte we emit implicitly acts as keep-alive.
        self.reset_ack_timer(connected, self.config.keep_alive_timeout);
    }

    async fn transmit(&self, packet: &Packet) {
        if let Err(error) = self
            .transport
            .send_datagram(packet.to_wire(), self.relay_addr)
            .await
        {
            tracing::warn!(%error, "failed to transmit datagram");
        }
    }

    // --- looping drivers -----------------------------------------------------

    fn try_enable_looping_send(self: &Arc<Self>, inner: &Inner) {
        if inner.connected && !inner.send_window.is_full() && !inner.segment_queue.is_empty() {
            let conn = self.clone();
            self.looping_send
                .start(&self.timer_driver, Duration::ZERO, move || {
                    let conn = conn.clone();
                    async move { conn.looping_send_tick().await }
                });
        }
    }

    async fn looping_send_tick(self: Arc<Self>) -> Option<Duration> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.connected || inner.send_window.is_full() || inner.segment_queue.is_empty() {
                return None;
            }
            let segment = inner
                .segment_queue
                .pop_front()
                .expect("checked non-empty above");
            let seq = inner.next_sequence_number;
            inner.next_sequence_number = inner.next_sequence_number.wrapping_add(1);
            let packet = Packet {
                sequence_number: seq,
                ack: 0,
                syn: false,
                fin: false,
                payload: segment.bytes,
                more_fragments: segment.remaining,
                source: self.own_addr,
                destination: self.dest_addr,
            };
            self.schedule_in_order(&mut inner, seq, packet);
        }
        let inner = self.inner.lock().unwrap();
        if inner.connected && !inner.send_window.is_full() && !inner.segment_queue.is_empty() {
            Some(Duration::ZERO)
        } else {
            None
        }
    }

    fn reset_ack_timer(self: &Arc<Self>, connected: bool, period: Duration) {
        if !connected {
            return;
        }
        self.looping_ack.stop();
        let conn = self.clone();
        self.looping_ack.start(&self.timer_driver, period, move || {
            let conn = conn.clone();
            async move { conn.looping_ack_tick().await }
        });
    }

    async fn looping_ack_tick(self: Arc<Self>) -> Option<Duration> {
        let (connected, next_expected) = {
            let inner = self.inner.lock().unwrap();
            (inner.connected, inner.next_expected_seqnum)
        };
        if !connected {
            return None;
        }
        let packet = Packet {
            sequence_number: 0,
            ack: next_expected,
            syn: false,
            fin: false,
            payload: Vec::new(),
            more_fragments: 0,
            source: self.own_addr,
            destination: self.dest_addr,
        };
        self.transmit(&packet).await;
        Some(self.config.keep_alive_timeout)
    }

    fn try_enable_looping_receive(self: &Arc<Self>, inner: &Inner) {
        if !inner.receive_heap.is_empty() {
            let conn = self.clone();
            self.looping_receive
                .start(&self.timer_driver, Duration::ZERO, move || {
                    let conn = conn.clone();
                    async move { conn.looping_receive_tick().await }
                });
        }
    }

    async fn looping_receive_tick(self: Arc<Self>) -> Option<Duration> {
        let payload = {
            let mut inner = self.inner.lock().unwrap();
            let fragments = inner.receive_heap.attempt_pop_message()?;
            let last_seq = fragments
                .last()
                .expect("a reassembled message has at least one fragment")
                .sequence_number;
            let extended_to = last_seq.wrapping_add(1);
            if seq_lt(inner.next_expected_seqnum, extended_to) {
                inner.next_expected_seqnum = extended_to;
            }
            let connected = inner.connected;
            self.reset_ack_timer(connected, self.config.bare_ack_timeout);
            fragments
                .into_iter()
                .flat_map(|packet| packet.payload)
                .collect::<Vec<u8>>()
        };
        self.handler.receive_message(payload);

        let inner = self.inner.lock().unwrap();
        if inner.connected && !inner.receive_heap.is_empty() {
            Some(Duration::ZERO)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("own_addr", &self.own_addr)
            .field("dest_addr", &self.dest_addr)
            .field("relay_addr", &self.relay_addr)
            .finish()
    }
}

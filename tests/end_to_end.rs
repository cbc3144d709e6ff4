//! Scenario-level tests driven over [`InMemoryTransport`] pairs: real
//! handshakes, real segmentation, and real timer-driven retransmission, all
//! on the Tokio test runtime with short configured timeouts so the tests
//! complete quickly.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rudp::{
    Address, Connection, ConnectionHandler, InMemoryTransport, RudpConfig, TokioTimerDriver,
};

fn addr(port: u16) -> Address {
    Address::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
}

fn fast_config() -> RudpConfig {
    RudpConfig {
        udp_safe_segment_size: 8,
        window_size: 4,
        packet_timeout: Duration::from_millis(30),
        bare_ack_timeout: Duration::from_millis(20),
        keep_alive_timeout: Duration::from_millis(200),
        max_retransmissions: 5,
    }
}

/// Records every reassembled message and shutdown notification it receives.
#[derive(Default)]
struct RecordingHandler {
    messages: Mutex<Vec<Vec<u8>>>,
    shutdowns: Mutex<u32>,
}

impl ConnectionHandler for RecordingHandler {
    fn receive_message(&self, payload: Vec<u8>) {
        self.messages.lock().unwrap().push(payload);
    }

    fn handle_shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }

    fn attach_connection(&self, _connection: Arc<Connection>) {}
}

/// Pipes every datagram sent from one in-memory transport straight into the
/// peer connection's `receive_packet`, acting as the minimal stand-in for
/// the out-of-scope inbound dispatcher.
fn spawn_pump(
    mut inbound: tokio::sync::mpsc::UnboundedReceiver<(Vec<u8>, Address)>,
    peer: Arc<Connection>,
) {
    tokio::spawn(async move {
        while let Some((bytes, _to)) = inbound.recv().await {
            if let Ok(packet) = rudp::Packet::from_wire(&bytes) {
                peer.receive_packet(packet).await;
            }
        }
    });
}

/// Like [`spawn_pump`], but drops the first datagram that looks like a data
/// segment (non-control, non-empty payload), simulating one lost UDP
/// datagram so the sender's retransmit timer is exercised.
fn spawn_pump_dropping_first_data_packet(
    mut inbound: tokio::sync::mpsc::UnboundedReceiver<(Vec<u8>, Address)>,
    peer: Arc<Connection>,
) {
    tokio::spawn(async move {
        let mut dropped_once = false;
        while let Some((bytes, _to)) = inbound.recv().await {
            if let Ok(packet) = rudp::Packet::from_wire(&bytes) {
                let is_data_segment = !packet.syn && !packet.fin && !packet.payload.is_empty();
                if is_data_segment && !dropped_once {
                    dropped_once = true;
                    continue;
                }
                peer.receive_packet(packet).await;
            }
        }
    });
}

/// Like [`spawn_pump`], but drops every datagram carrying a payload, forever
/// — control traffic (SYN/SYNACK/FIN/bare ACK) still gets through. Models a
/// peer that stopped acknowledging data but hasn't torn down the socket.
fn spawn_pump_dropping_all_data_packets(
    mut inbound: tokio::sync::mpsc::UnboundedReceiver<(Vec<u8>, Address)>,
    peer: Arc<Connection>,
) {
    tokio::spawn(async move {
        while let Some((bytes, _to)) = inbound.recv().await {
            if let Ok(packet) = rudp::Packet::from_wire(&bytes) {
                if packet.payload.is_empty() {
                    peer.receive_packet(packet).await;
                }
            }
        }
    });
}

async fn connected_pair() -> (Arc<Connection>, Arc<RecordingHandler>, Arc<Connection>, Arc<RecordingHandler>) {
    let config = fast_config();
    let timer_driver: Arc<dyn rudp::timer::TimerDriver> = Arc::new(TokioTimerDriver);

    let (transport_a, inbound_a) = InMemoryTransport::pair();
    let (transport_b, inbound_b) = InMemoryTransport::pair();

    let handler_a = Arc::new(RecordingHandler::default());
    let handler_b = Arc::new(RecordingHandler::default());

    let a = Connection::new(
        addr(1),
        addr(2),
        addr(2),
        config,
        timer_driver.clone(),
        transport_a,
        handler_a.clone(),
    );
    let b = Connection::new(
        addr(2),
        addr(1),
        addr(1),
        config,
        timer_driver,
        transport_b,
        handler_b.clone(),
    );

    spawn_pump(inbound_a, b.clone());
    spawn_pump(inbound_b, a.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    (a, handler_a, b, handler_b)
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_completes_and_short_message_is_delivered() {
    let (a, _handler_a, b, handler_b) = connected_pair().await;

    a.send_message(b"hello".to_vec()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let messages = handler_b.messages.lock().unwrap();
    assert_eq!(messages.as_slice(), [b"hello".to_vec()]);
    drop(a);
    drop(b);
}

#[tokio::test(flavor = "multi_thread")]
async fn message_larger_than_segment_size_is_reassembled_in_order() {
    let (a, _handler_a, b, handler_b) = connected_pair().await;

    let long_message = b"this message is longer than eight bytes per segment".to_vec();
    a.send_message(long_message.clone()).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let messages = handler_b.messages.lock().unwrap();
    assert_eq!(messages.as_slice(), [long_message]);
    drop(a);
    drop(b);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_notifies_the_peer_exactly_once() {
    let (a, _handler_a, b, handler_b) = connected_pair().await;

    a.shutdown().await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(*handler_b.shutdowns.lock().unwrap(), 1);

    // A second shutdown call on the same connection must not re-notify.
    a.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*handler_b.shutdowns.lock().unwrap(), 1);
    drop(b);
}

/// Feeds a receiving connection three data segments out of order and
/// verifies they are reassembled into a single in-order delivery, with no
/// delivery at all until the gap is filled.
#[tokio::test(flavor = "multi_thread")]
async fn out_of_order_segments_are_reassembled_once() {
    let config = fast_config();
    let timer_driver: Arc<dyn rudp::timer::TimerDriver> = Arc::new(TokioTimerDriver);
    let (transport, _inbound) = InMemoryTransport::pair();
    let handler = Arc::new(RecordingHandler::default());

    let b = Connection::new(addr(2), addr(1), addr(1), config, timer_driver, transport, handler.clone());

    // Let B's own initial SYN fire, then hand it a bare SYN from "A" with a
    // known sequence number so subsequent seqnums are predictable.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let syn = rudp::Packet {
        sequence_number: 500,
        ack: 0,
        syn: true,
        fin: false,
        payload: Vec::new(),
        more_fragments: 0,
        source: addr(1),
        destination: addr(2),
    };
    b.receive_packet(syn).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let segment = |seq: u32, more_fragments: u32, byte: u8| rudp::Packet {
        sequence_number: seq,
        ack: 0,
        syn: false,
        fin: false,
        payload: vec![byte],
        more_fragments,
        source: addr(1),
        destination: addr(2),
    };

    // next_expected_seqnum is 501 after the SYN above. S1=501, S2=502, S3=503.
    b.receive_packet(segment(503, 0, b'c')).await; // arrives first: buffered, no delivery
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(handler.messages.lock().unwrap().is_empty());

    b.receive_packet(segment(501, 2, b'a')).await; // fills the front: still incomplete
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(handler.messages.lock().unwrap().is_empty());

    b.receive_packet(segment(502, 1, b'b')).await; // fills the gap: reassembly completes
    tokio::time::sleep(Duration::from_millis(50)).await;

    let messages = handler.messages.lock().unwrap();
    assert_eq!(messages.as_slice(), [vec![b'a', b'b', b'c']]);
}

/// Drops the first transmission of a data segment; the sender must
/// retransmit after `packet_timeout` and the peer must still deliver the
/// message exactly once.
#[tokio::test(flavor = "multi_thread")]
async fn lost_packet_is_retransmitted_and_delivered_once() {
    let config = fast_config();
    let timer_driver: Arc<dyn rudp::timer::TimerDriver> = Arc::new(TokioTimerDriver);

    let (transport_a, inbound_a) = InMemoryTransport::pair();
    let (transport_b, inbound_b) = InMemoryTransport::pair();

    let handler_a = Arc::new(RecordingHandler::default());
    let handler_b = Arc::new(RecordingHandler::default());

    let a = Connection::new(addr(1), addr(2), addr(2), config, timer_driver.clone(), transport_a, handler_a.clone());
    let b = Connection::new(addr(2), addr(1), addr(1), config, timer_driver, transport_b, handler_b.clone());

    spawn_pump_dropping_first_data_packet(inbound_a, b.clone());
    spawn_pump(inbound_b, a.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    a.send_message(b"lost".to_vec()).await;

    // The first transmission is dropped; the retransmit timer (30ms) must
    // fire before the peer ever sees the segment.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let messages = handler_b.messages.lock().unwrap();
    assert_eq!(messages.as_slice(), [b"lost".to_vec()]);
}

/// Drops every data segment A sends, forever. A must exhaust
/// `max_retransmissions` and shut itself down; the peer never sees the
/// message.
#[tokio::test(flavor = "multi_thread")]
async fn peer_death_exhausts_retransmissions_and_shuts_down() {
    let config = fast_config();
    let timer_driver: Arc<dyn rudp::timer::TimerDriver> = Arc::new(TokioTimerDriver);

    let (transport_a, inbound_a) = InMemoryTransport::pair();
    let (transport_b, inbound_b) = InMemoryTransport::pair();

    let handler_a = Arc::new(RecordingHandler::default());
    let handler_b = Arc::new(RecordingHandler::default());

    let a = Connection::new(addr(1), addr(2), addr(2), config, timer_driver.clone(), transport_a, handler_a.clone());
    let b = Connection::new(addr(2), addr(1), addr(1), config, timer_driver, transport_b, handler_b.clone());

    spawn_pump_dropping_all_data_packets(inbound_a, b.clone());
    spawn_pump(inbound_b, a.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    a.send_message(b"gone".to_vec()).await;

    // max_retransmissions=5 at packet_timeout=30ms apart; generous margin.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(*handler_a.shutdowns.lock().unwrap(), 1);
    assert!(handler_b.messages.lock().unwrap().is_empty());
}

/// An unsolicited SYNACK (no prior SYN from this connection) must be
/// dropped: no message is ever delivered and the connection never shuts
/// itself down in response to it.
#[tokio::test(flavor = "multi_thread")]
async fn malicious_synack_bootstrap_is_dropped() {
    let config = fast_config();
    let timer_driver: Arc<dyn rudp::timer::TimerDriver> = Arc::new(TokioTimerDriver);
    let (transport, _inbound) = InMemoryTransport::pair();
    let handler = Arc::new(RecordingHandler::default());

    let b = Connection::new(addr(2), addr(1), addr(1), config, timer_driver, transport, handler.clone());

    let malicious_synack = rudp::Packet {
        sequence_number: 9999,
        ack: 42,
        syn: true,
        fin: false,
        payload: Vec::new(),
        more_fragments: 0,
        source: addr(1),
        destination: addr(2),
    };
    b.receive_packet(malicious_synack).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(handler.messages.lock().unwrap().is_empty());
    assert_eq!(*handler.shutdowns.lock().unwrap(), 0);
}

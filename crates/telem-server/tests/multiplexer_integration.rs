//! Integration tests for the collector loop.
//!
//! Each test binds a [`Multiplexer`] on an ephemeral loopback port, runs it
//! as a background task, and drives it with plain `TcpStream`s writing
//! hand-encoded frames.  Progress is observed through the event channel from
//! [`Multiplexer::subscribe`]; the final tally comes back from `run` once the
//! cancellation token fires.
//!
//! They verify:
//!
//! - k frames from one identifier produce a tally of exactly k.
//! - A peer sending garbage is dropped without disturbing a well-behaved peer.
//! - A frame naming an unknown device type is still counted.
//! - A peer that disconnects is removed from the connection set.
//! - A frame delivered a few bytes at a time is still decoded, and other
//!   peers are served while it trickles in.

use std::net::SocketAddr;
use std::time::Duration;

use telem_core::{encode_frame, DeviceType, Frame, FrameType};
use telem_server::application::tally::IngestionTally;
use telem_server::infrastructure::network::{Multiplexer, ServerError, ServerEvent};
use telem_server::infrastructure::storage::config::NetworkConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    addr: SocketAddr,
    events: UnboundedReceiver<ServerEvent>,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<IngestionTally, ServerError>>,
}

impl Harness {
    fn start() -> Self {
        let config = NetworkConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            read_chunk_size: 16,
            ..NetworkConfig::default()
        };
        let mut mux = Multiplexer::bind(&config).expect("bind loopback");
        let addr = mux.local_addr().expect("local addr");
        let events = mux.subscribe();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(mux.run(shutdown.clone()));
        Self {
            addr,
            events,
            shutdown,
            handle,
        }
    }

    async fn connect(&mut self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        let local = stream.local_addr().expect("local addr");
        self.wait_for(|e| matches!(e, ServerEvent::ConnectionAccepted { peer } if *peer == local))
            .await;
        stream
    }

    /// Returns the first event matching `pred`, skipping the rest.
    async fn wait_for(&mut self, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                let event = self.events.recv().await.expect("event channel open");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for server event")
    }

    async fn wait_for_frame(&mut self, id: &str) -> u64 {
        match self
            .wait_for(|e| matches!(e, ServerEvent::FrameIngested { pack, .. } if pack.device_id == id))
            .await
        {
            ServerEvent::FrameIngested { count, .. } => count,
            _ => unreachable!(),
        }
    }

    async fn stop(self) -> IngestionTally {
        self.shutdown.cancel();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server loop failed")
    }
}

fn frame_bytes(device_type: DeviceType, id: &str, payload: &str) -> Vec<u8> {
    encode_frame(&Frame::new(device_type, id, payload))
}

// ── Tally tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_k_frames_from_one_device_tally_to_k() {
    // Arrange
    let mut h = Harness::start();
    let mut device = h.connect().await;

    // Act
    for i in 0..5 {
        device
            .write_all(&frame_bytes(DeviceType::UptimeMonitor, "node-1", &(i * 1000).to_string()))
            .await
            .unwrap();
    }
    let mut last = 0;
    for _ in 0..5 {
        last = h.wait_for_frame("node-1").await;
    }
    let tally = h.stop().await;

    // Assert
    assert_eq!(last, 5);
    assert_eq!(tally.count("node-1"), Some(5));
    assert_eq!(tally.len(), 1);
}

#[tokio::test]
async fn test_two_devices_are_counted_separately() {
    let mut h = Harness::start();
    let mut a = h.connect().await;
    let mut b = h.connect().await;

    a.write_all(&frame_bytes(DeviceType::TempMonitor, "a", "1.000000")).await.unwrap();
    b.write_all(&frame_bytes(DeviceType::TempMonitor, "b", "2.000000")).await.unwrap();
    b.write_all(&frame_bytes(DeviceType::TempMonitor, "b", "3.000000")).await.unwrap();

    h.wait_for_frame("a").await;
    h.wait_for_frame("b").await;
    h.wait_for_frame("b").await;
    let tally = h.stop().await;

    assert_eq!(tally.sorted(), vec![("a", 1), ("b", 2)]);
}

#[tokio::test]
async fn test_shutdown_with_no_traffic_returns_empty_tally() {
    let h = Harness::start();
    let tally = h.stop().await;
    assert!(tally.is_empty());
}

// ── Failure isolation tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_bad_magic_peer_is_dropped_without_affecting_others() {
    // Arrange
    let mut h = Harness::start();
    let mut good = h.connect().await;
    let mut bad = h.connect().await;
    let bad_peer = bad.local_addr().unwrap();

    // Act
    let mut garbage = frame_bytes(DeviceType::TempMonitor, "evil", "0");
    garbage[..4].copy_from_slice(&[0xBA, 0xAD, 0xF0, 0x0D]);
    bad.write_all(&garbage).await.unwrap();
    h.wait_for(|e| matches!(e, ServerEvent::ConnectionClosed { peer, .. } if *peer == bad_peer))
        .await;

    good.write_all(&frame_bytes(DeviceType::TempMonitor, "good", "50.000000"))
        .await
        .unwrap();
    h.wait_for_frame("good").await;
    let tally = h.stop().await;

    // Assert
    assert_eq!(tally.count("good"), Some(1));
    assert_eq!(tally.count("evil"), None);
}

#[tokio::test]
async fn test_unknown_device_type_is_still_tallied() {
    // Arrange
    let mut h = Harness::start();
    let mut device = h.connect().await;

    let mut bytes = encode_frame(&Frame::new(FrameType(99), "mystery", "1"));
    bytes.extend(frame_bytes(DeviceType::UptimeMonitor, "mystery", "1000"));

    // Act
    device.write_all(&bytes).await.unwrap();
    let first = h
        .wait_for(|e| matches!(e, ServerEvent::FrameIngested { pack, .. } if pack.device_id == "mystery"))
        .await;
    let second = h.wait_for_frame("mystery").await;
    let tally = h.stop().await;

    // Assert: the odd ordinal is counted and the connection keeps going.
    match first {
        ServerEvent::FrameIngested { pack, count } => {
            assert_eq!(pack.device_type, FrameType(99));
            assert_eq!(pack.data, b"1");
            assert_eq!(count, 1);
        }
        _ => unreachable!(),
    }
    assert_eq!(second, 2);
    assert_eq!(tally.count("mystery"), Some(2));
}

#[tokio::test]
async fn test_disconnect_removes_connection_and_keeps_tally() {
    let mut h = Harness::start();
    let mut device = h.connect().await;
    let device_addr = device.local_addr().unwrap();

    device.write_all(&frame_bytes(DeviceType::UptimeMonitor, "gone", "0")).await.unwrap();
    h.wait_for_frame("gone").await;
    drop(device);

    h.wait_for(|e| matches!(e, ServerEvent::ConnectionClosed { peer, .. } if *peer == device_addr))
        .await;
    let tally = h.stop().await;

    assert_eq!(tally.count("gone"), Some(1));
}

#[tokio::test]
async fn test_disconnect_mid_frame_discards_partial_frame() {
    let mut h = Harness::start();
    let mut device = h.connect().await;
    let device_addr = device.local_addr().unwrap();

    let bytes = frame_bytes(DeviceType::TempMonitor, "half", "12.000000");
    device.write_all(&bytes[..bytes.len() / 2]).await.unwrap();
    drop(device);

    let event = h
        .wait_for(|e| matches!(e, ServerEvent::ConnectionClosed { peer, .. } if *peer == device_addr))
        .await;
    match event {
        ServerEvent::ConnectionClosed { reason, .. } => assert!(reason.contains("short read"), "{reason}"),
        _ => unreachable!(),
    }
    assert_eq!(h.stop().await.count("half"), None);
}

// ── Slow peer tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_trickled_frame_does_not_block_other_peers() {
    // Arrange
    let mut h = Harness::start();
    let mut slow = h.connect().await;
    let mut fast = h.connect().await;
    let slow_bytes = frame_bytes(DeviceType::TempMonitor, "slow", "42.000000");

    // Act: half of the slow frame, then a whole fast frame.
    let split = slow_bytes.len() / 2;
    for byte in &slow_bytes[..split] {
        slow.write_all(std::slice::from_ref(byte)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    fast.write_all(&frame_bytes(DeviceType::TempMonitor, "fast", "1.000000"))
        .await
        .unwrap();
    let fast_count = h.wait_for_frame("fast").await;

    for byte in &slow_bytes[split..] {
        slow.write_all(std::slice::from_ref(byte)).await.unwrap();
    }
    let slow_count = h.wait_for_frame("slow").await;
    let tally = h.stop().await;

    // Assert
    assert_eq!(fast_count, 1);
    assert_eq!(slow_count, 1);
    assert_eq!(tally.total(), 2);
}

#[tokio::test]
async fn test_back_to_back_frames_in_one_write_are_all_counted() {
    let mut h = Harness::start();
    let mut device = h.connect().await;

    let mut burst = Vec::new();
    for i in 0..10 {
        burst.extend(frame_bytes(DeviceType::UptimeMonitor, "burst", &(i * 1000).to_string()));
    }
    device.write_all(&burst).await.unwrap();

    for _ in 0..10 {
        h.wait_for_frame("burst").await;
    }
    assert_eq!(h.stop().await.count("burst"), Some(10));
}

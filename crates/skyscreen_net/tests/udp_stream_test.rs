//! Integration tests for frame streaming over loopback UDP.

use std::time::Duration;

use skyscreen_core::{FlatSpaceTransform, FrameSink, Geometry, SyncMode};
use skyscreen_net::{
    ChunkSerializer, NetworkStreamReceiver, NetworkStreamWriter, StreamConfig, UdpTransport,
};

fn geometry() -> Geometry {
    Geometry::new(36, 28, 3).unwrap()
}

fn receiver() -> NetworkStreamReceiver {
    let config = StreamConfig {
        bind: "127.0.0.1:0".to_string(),
        read_timeout_ms: 50,
        ..StreamConfig::default()
    };
    NetworkStreamReceiver::bind(&config, geometry()).unwrap()
}

fn writer_for(receiver: &NetworkStreamReceiver) -> NetworkStreamWriter {
    let config = StreamConfig {
        target: format!("127.0.0.1:{}", receiver.local_addr().port()),
        ..StreamConfig::default()
    };
    NetworkStreamWriter::connect(&config, geometry()).unwrap()
}

#[test]
fn test_frames_arrive_whole_and_in_order() {
    let mut receiver = receiver();
    let mut writer = writer_for(&receiver);
    assert_eq!(writer.sync_mode(), SyncMode::NoneRequired);

    for value in 1..=5u8 {
        writer.frame_mut().unwrap().fill(value);
        writer.frame_ready().unwrap();

        let frame = receiver.recv_frame_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(frame.len(), 36 * 28 * 3);
        assert!(frame.as_bytes().iter().all(|&b| b == value));
    }

    assert_eq!(writer.frames_sent(), 5);
    assert_eq!(writer.stats().packets_sent, 15);
    assert_eq!(receiver.latest_frame_id(), Some(4));
    assert_eq!(receiver.stats().frames_completed, 5);
}

#[test]
fn test_no_frame_times_out() {
    let mut receiver = receiver();
    assert!(receiver.recv_frame_timeout(Duration::from_millis(100)).unwrap().is_none());
    assert!(receiver.latest_frame().is_none());
}

#[test]
fn test_lost_chunk_drops_frame() {
    let mut receiver = receiver();
    let config = StreamConfig::default();
    let layout = config.layout(geometry()).unwrap();
    let mut serializer = ChunkSerializer::new(layout);
    let mut socket = UdpTransport::bind_for(receiver.local_addr()).unwrap();
    let destination = format!("127.0.0.1:{}", receiver.local_addr().port()).parse().unwrap();

    let first = vec![1u8; geometry().frame_byte_size()];
    let second = vec![2u8; geometry().frame_byte_size()];

    // Frame 10 loses chunk 1.
    for index in [0, 2] {
        socket.send_to(serializer.serialize(&first, 10, index), destination).unwrap();
    }
    for index in 0..layout.chunk_count() {
        socket.send_to(serializer.serialize(&second, 11, index), destination).unwrap();
    }

    let frame = receiver.recv_frame_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(frame.as_bytes().iter().all(|&b| b == 2));
    assert_eq!(receiver.latest_frame_id(), Some(11));
    assert_eq!(receiver.stats().frames_dropped, 1);
}

#[test]
fn test_flat_space_pattern_over_network() {
    let mut receiver = receiver();
    let mut transform = FlatSpaceTransform::new(writer_for(&receiver)).unwrap();

    transform.flat_mut().fill(42);
    transform.frame_ready().unwrap();

    let frame = receiver.recv_frame_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(frame.as_bytes().iter().all(|&b| b == 42));
    assert_eq!(transform.inner().frames_sent(), 1);
}

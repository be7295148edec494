//! Player runs against real outputs.

use std::time::Duration;

use skyscreen::{run_for, OutputMode, PatternKind, PlayerConfig, StopReason};
use skyscreen_core::{BufferTarget, Geometry, NoSync, ReaderSession, SyncConfig, SyncMode};
use skyscreen_net::{NetworkStreamReceiver, StreamConfig};

fn small_geometry() -> Geometry {
    Geometry::new(16, 8, 3).unwrap()
}

#[test]
fn test_shared_output_leaves_last_frame_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame");
    let config = PlayerConfig {
        geometry: small_geometry(),
        sync: SyncConfig::with_mode(SyncMode::NoSync),
        output: OutputMode::Shared,
        pattern: PatternKind::Solid,
        shared_file: Some(path.clone()),
        frame_rate: 1000,
        ..PlayerConfig::default()
    };

    let summary = run_for(&config, 3).unwrap();
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.stop_reason, StopReason::FrameLimit);

    let mut reader =
        ReaderSession::new(small_geometry(), BufferTarget::shared(&path), Box::new(NoSync::new()));
    reader
        .scoped(|r| {
            let frame = r.start_read()?;
            // Solid fills with the frame index; the last frame is index 2.
            assert!(frame.as_bytes().iter().all(|&b| b == 2));
            r.finish_read()
        })
        .unwrap();
}

#[test]
fn test_udp_output_reaches_receiver() {
    let stream = StreamConfig { bind: "127.0.0.1:0".to_string(), ..StreamConfig::default() };
    let mut receiver = NetworkStreamReceiver::bind(&stream, small_geometry()).unwrap();

    let config = PlayerConfig {
        geometry: small_geometry(),
        output: OutputMode::Udp,
        pattern: PatternKind::Grid,
        stream: StreamConfig {
            target: format!("127.0.0.1:{}", receiver.local_addr().port()),
            ..StreamConfig::default()
        },
        frame_rate: 1000,
        ..PlayerConfig::default()
    };
    let summary = run_for(&config, 3).unwrap();
    assert_eq!(summary.frames, 3);

    let mut received = 0;
    while receiver.recv_frame_timeout(Duration::from_secs(2)).unwrap().is_some() {
        received += 1;
        if received == 3 {
            break;
        }
    }
    assert_eq!(received, 3);
    assert_eq!(receiver.latest_frame_id(), Some(2));
}

//! Integration tests for writer/reader sessions over a shared mapping.

use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use skyscreen_core::{
    BufferTarget, FrameSink, Geometry, MessageBusPublisher, MessageBusSubscriber, NoSync,
    ReadState, ReaderSession, SkyError, SyncConfig, SyncMode, WriterSession,
};

fn small() -> Geometry {
    Geometry::new(4, 4, 3).unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Writer and reader joined by a message bus on an ephemeral port.
fn bus_pair(target: &BufferTarget, geometry: Geometry) -> (WriterSession, ReaderSession) {
    let publisher = MessageBusPublisher::bind("127.0.0.1:0").unwrap();
    let subscriber =
        MessageBusSubscriber::connect(publisher.local_addr(), Duration::from_millis(10)).unwrap();
    wait_until(|| publisher.subscriber_count() == 1);

    let writer = WriterSession::new(geometry, target.clone(), Box::new(publisher));
    let reader = ReaderSession::new(geometry, target.clone(), Box::new(subscriber));
    (writer, reader)
}

#[test]
fn test_no_sync_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));
    let config = SyncConfig::with_mode(SyncMode::NoSync);

    let mut writer = WriterSession::from_config(small(), target.clone(), &config).unwrap();
    writer.enter().unwrap();
    {
        let mut frame = writer.frame_mut().unwrap();
        assert_eq!(frame.len(), 48);
        for (i, byte) in frame.as_bytes_mut().iter_mut().enumerate() {
            *byte = i as u8;
        }
    }
    writer.frame_ready().unwrap();

    let mut reader = ReaderSession::from_config(small(), target, &config).unwrap();
    reader.enter().unwrap();
    let frame = reader.start_read().unwrap();
    assert_eq!(frame[[0, 0, 0]], 0);
    assert_eq!(frame[[1, 0, 0]], 12);
    assert_eq!(frame[[3, 3, 2]], 47);
    reader.finish_read().unwrap();

    // No new frame_ready: the same frame comes back unchanged.
    let again = reader.start_read().unwrap();
    assert_eq!(again.as_bytes(), (0..48).map(|i| i as u8).collect::<Vec<_>>().as_slice());
    reader.finish_read().unwrap();
    assert_eq!(reader.frames_read(), 2);
}

#[test]
fn test_untimed_start_read_waits_for_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));
    let (mut writer, mut reader) = bus_pair(&target, small());
    writer.enter().unwrap();
    reader.enter().unwrap();

    let handle = thread::spawn(move || {
        let bytes = reader.start_read().unwrap().as_bytes().to_vec();
        reader.finish_read().unwrap();
        bytes
    });

    thread::sleep(Duration::from_millis(200));
    assert!(!handle.is_finished(), "start_read returned before any frame_ready");

    writer.frame_mut().unwrap().fill(9);
    writer.frame_ready().unwrap();

    let bytes = handle.join().unwrap();
    assert_eq!(bytes.len(), 48);
    assert!(bytes.iter().all(|&b| b == 9));
}

#[test]
fn test_message_bus_blocks_until_frame_ready() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));
    let (mut writer, mut reader) = bus_pair(&target, small());
    writer.enter().unwrap();
    reader.enter().unwrap();

    // Nothing announced yet.
    assert!(reader.start_read_timeout(Duration::from_millis(100)).unwrap().is_none());
    assert_eq!(reader.read_state(), ReadState::Idle);

    writer.frame_mut().unwrap().fill(7);
    writer.frame_ready().unwrap();

    let frame = reader.start_read_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(frame.as_bytes().iter().all(|&b| b == 7));
    reader.finish_read().unwrap();
    assert_eq!(reader.frames_read(), 1);
}

#[test]
fn test_message_bus_coalesces_bursts() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));
    let (mut writer, mut reader) = bus_pair(&target, small());
    writer.enter().unwrap();
    reader.enter().unwrap();

    for value in 1..=3 {
        writer.frame_mut().unwrap().fill(value);
        writer.frame_ready().unwrap();
    }
    thread::sleep(Duration::from_millis(200));

    let frame = reader.start_read_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(frame[[0, 0, 0]], 3);
    reader.finish_read().unwrap();

    // The burst counts as a single frame.
    assert!(reader.start_read_timeout(Duration::from_millis(100)).unwrap().is_none());
}

#[test]
fn test_notifications_during_read_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));
    let (mut writer, mut reader) = bus_pair(&target, small());
    writer.enter().unwrap();
    reader.enter().unwrap();

    writer.frame_ready().unwrap();
    assert!(reader.start_read_timeout(Duration::from_secs(5)).unwrap().is_some());

    writer.frame_ready().unwrap();
    thread::sleep(Duration::from_millis(200));
    reader.finish_read().unwrap();

    assert!(reader.start_read_timeout(Duration::from_millis(100)).unwrap().is_none());

    writer.frame_ready().unwrap();
    assert!(reader.start_read_timeout(Duration::from_secs(5)).unwrap().is_some());
}

#[test]
fn test_double_start_read_is_protocol_violation() {
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));

    let mut writer = WriterSession::new(small(), target.clone(), Box::new(NoSync::new()));
    writer.enter().unwrap();

    let mut reader = ReaderSession::new(small(), target, Box::new(NoSync::new()));
    reader.enter().unwrap();
    let _ = reader.start_read().unwrap();
    assert!(matches!(reader.start_read(), Err(SkyError::ProtocolViolation(_))));
}

#[test]
fn test_random_cells_visible_to_reader() {
    let geometry = Geometry::new(36, 28, 3).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let target = BufferTarget::shared(dir.path().join("frame"));

    let mut writer = WriterSession::new(geometry, target.clone(), Box::new(NoSync::new()));
    let mut reader = ReaderSession::new(geometry, target, Box::new(NoSync::new()));
    writer.enter().unwrap();
    reader.enter().unwrap();

    let mut rng = rand::thread_rng();
    let cells: Vec<(usize, usize, usize, u8)> = (0..200)
        .map(|_| (rng.gen_range(0..36), rng.gen_range(0..28), rng.gen_range(0..3), rng.gen()))
        .collect();

    {
        let mut frame = writer.frame_mut().unwrap();
        for &(v, r, c, value) in &cells {
            frame[[v, r, c]] = value;
        }
    }
    writer.frame_ready().unwrap();

    let frame = reader.start_read().unwrap();
    // Later writes to the same cell win, so compare against the last one.
    for (i, &(v, r, c, _)) in cells.iter().enumerate() {
        let last = cells[i..]
            .iter()
            .rev()
            .find(|&&(v2, r2, c2, _)| (v2, r2, c2) == (v, r, c))
            .map(|&(.., value)| value);
        assert_eq!(Some(frame[[v, r, c]]), last);
    }
}

#[test]
fn test_reader_rejects_wrong_sized_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame");
    std::fs::write(&path, [0u8; 10]).unwrap();

    let mut reader = ReaderSession::new(small(), BufferTarget::shared(&path), Box::new(NoSync::new()));
    match reader.enter() {
        Err(SkyError::SizeMismatch { expected, actual }) => {
            assert_eq!(expected, 48);
            assert_eq!(actual, 10);
        }
        other => panic!("expected SizeMismatch, got {other:?}"),
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 10);
}

#[test]
fn test_reader_before_writer_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader =
        ReaderSession::new(small(), BufferTarget::shared(dir.path().join("missing")), Box::new(NoSync::new()));
    assert!(matches!(reader.enter(), Err(SkyError::NotFound { .. })));
}

//! # Message-Bus Sync
//!
//! Publish/subscribe "frame ready" notifications over TCP.
//!
//! ## Wire Format
//!
//! ```text
//! ┌───────────────────────────────┐
//! │ generation (u64, little-end.) │   one per frame_ready(), starting at 1
//! └───────────────────────────────┘
//! ```
//!
//! No frame data travels on this channel.
//!
//! ## Delivery
//!
//! - Publisher writes are non-blocking. A subscriber whose socket is full
//!   misses the notification.
//! - Subscribers connect in the background and reconnect if the publisher
//!   restarts. Notifications sent before they connect are lost.
//! - The subscriber queue holds one notification. Extra notifications
//!   coalesce into it, because the buffer always holds the latest frame.
//! - Notifications that land while a frame is being read are discarded on
//!   release.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use super::{ReaderSync, SyncMode, WriterSync};
use crate::error::{SkyError, SkyResult};

/// Size of one notification on the wire.
const NOTIFICATION_SIZE: usize = 8;

/// How often the accept loop checks for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(5);

/// How often a blocked subscriber read checks for shutdown.
const READ_POLL: Duration = Duration::from_millis(50);

/// Upper bound on a single connect attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Publisher delivery statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct PublisherStats {
    /// Notifications fully or partly written to a subscriber.
    pub delivered: u64,
    /// Notifications skipped because a subscriber socket was full.
    pub missed: u64,
    /// Subscribers dropped after a write error.
    pub disconnected: u64,
}

/// One connected subscriber on the publisher side.
struct Subscriber {
    stream: TcpStream,
    peer: SocketAddr,
    /// Tail of a notification that only partly fit in the socket.
    backlog: Vec<u8>,
}

enum Delivery {
    Sent,
    Missed,
}

impl Subscriber {
    fn push(&mut self, message: &[u8]) -> io::Result<Delivery> {
        if !self.backlog.is_empty() {
            let n = write_some(&mut self.stream, &self.backlog)?;
            self.backlog.drain(..n);
            if !self.backlog.is_empty() {
                return Ok(Delivery::Missed);
            }
        }

        let n = write_some(&mut self.stream, message)?;
        if n == 0 {
            return Ok(Delivery::Missed);
        }
        // A notification is never split by a later one.
        self.backlog.extend_from_slice(&message[n..]);
        Ok(Delivery::Sent)
    }
}

/// Non-blocking write that reports "would block" as zero bytes.
fn write_some(stream: &mut TcpStream, buf: &[u8]) -> io::Result<usize> {
    match stream.write(buf) {
        Ok(0) if !buf.is_empty() => Err(io::ErrorKind::WriteZero.into()),
        Ok(n) => Ok(n),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Writer side: binds a port and notifies every connected subscriber.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut publisher = MessageBusPublisher::bind("127.0.0.1:5555")?;
/// loop {
///     draw(&mut frame);
///     publisher.frame_ready()?; // never blocks
/// }
/// ```
pub struct MessageBusPublisher {
    local_addr: SocketAddr,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    running: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    generation: u64,
    stats: PublisherStats,
}

impl MessageBusPublisher {
    /// Binds the publish endpoint and starts accepting subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] if the port cannot be bound.
    pub fn bind(addr: impl ToSocketAddrs) -> SkyResult<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|e| SkyError::transport("binding frame publisher", e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| SkyError::transport("configuring frame publisher", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SkyError::transport("reading publisher address", e))?;

        let subscribers = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let acceptor = {
            let subscribers = Arc::clone(&subscribers);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("skyscreen-bus-accept".to_string())
                .spawn(move || accept_loop(&listener, &subscribers, &running))
                .map_err(|e| SkyError::transport("spawning publisher thread", e))?
        };

        tracing::info!("frame publisher listening on {}", local_addr);

        Ok(Self {
            local_addr,
            subscribers,
            running,
            acceptor: Some(acceptor),
            generation: 0,
            stats: PublisherStats::default(),
        })
    }

    /// The bound address (useful when binding port 0).
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivery statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &PublisherStats {
        &self.stats
    }
}

fn accept_loop(listener: &TcpListener, subscribers: &Mutex<Vec<Subscriber>>, running: &AtomicBool) {
    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    tracing::warn!("rejecting frame subscriber {}: {}", peer, e);
                    continue;
                }
                let _ = stream.set_nodelay(true);
                subscribers.lock().push(Subscriber { stream, peer, backlog: Vec::new() });
                tracing::info!("frame subscriber connected: {}", peer);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                tracing::warn!("frame publisher accept failed: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

impl WriterSync for MessageBusPublisher {
    fn mode(&self) -> SyncMode {
        SyncMode::MessageBus
    }

    fn frame_ready(&mut self) -> SkyResult<()> {
        self.generation += 1;
        let message = self.generation.to_le_bytes();
        let stats = &mut self.stats;

        self.subscribers.lock().retain_mut(|subscriber| match subscriber.push(&message) {
            Ok(Delivery::Sent) => {
                stats.delivered += 1;
                true
            }
            Ok(Delivery::Missed) => {
                stats.missed += 1;
                true
            }
            Err(e) => {
                stats.disconnected += 1;
                tracing::warn!("frame subscriber {} dropped: {}", subscriber.peer, e);
                false
            }
        });

        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for MessageBusPublisher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

/// Reader side: connects to a publisher and waits for notifications.
pub struct MessageBusSubscriber {
    publisher: SocketAddr,
    notifications: Receiver<u64>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    coalesced: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
    latest_generation: u64,
}

impl MessageBusSubscriber {
    /// Starts connecting to the publisher at `addr` in the background.
    ///
    /// Returns immediately; the publisher does not need to exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidAddress`] if `addr` does not resolve.
    pub fn connect(addr: impl ToSocketAddrs, reconnect_interval: Duration) -> SkyResult<Self> {
        let publisher = addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| SkyError::InvalidAddress("frame publisher address".to_string()))?;

        let (sender, notifications) = bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let connected = Arc::new(AtomicBool::new(false));
        let coalesced = Arc::new(AtomicU64::new(0));

        let worker = {
            let link = SubscriberLink {
                publisher,
                sender,
                stale: notifications.clone(),
                running: Arc::clone(&running),
                connected: Arc::clone(&connected),
                coalesced: Arc::clone(&coalesced),
                reconnect_interval,
            };
            thread::Builder::new()
                .name("skyscreen-bus-sub".to_string())
                .spawn(move || link.run())
                .map_err(|e| SkyError::transport("spawning subscriber thread", e))?
        };

        Ok(Self {
            publisher,
            notifications,
            running,
            connected,
            coalesced,
            worker: Some(worker),
            latest_generation: 0,
        })
    }

    /// Address of the publisher this subscriber follows.
    #[inline]
    #[must_use]
    pub const fn publisher_addr(&self) -> SocketAddr {
        self.publisher
    }

    /// Whether the background connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Generation of the most recently observed notification.
    #[inline]
    #[must_use]
    pub const fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    /// Notifications folded into an already pending one.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    fn worker_gone() -> SkyError {
        SkyError::transport(
            "waiting for frame notification",
            io::Error::new(io::ErrorKind::BrokenPipe, "subscriber worker stopped"),
        )
    }
}

impl ReaderSync for MessageBusSubscriber {
    fn mode(&self) -> SyncMode {
        SyncMode::MessageBus
    }

    fn wait_for_frame(&mut self, timeout: Option<Duration>) -> SkyResult<bool> {
        let first = match timeout {
            None => self.notifications.recv().map_err(|_| Self::worker_gone())?,
            Some(timeout) => match self.notifications.recv_timeout(timeout) {
                Ok(generation) => generation,
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => return Err(Self::worker_gone()),
            },
        };
        self.latest_generation = self.notifications.try_iter().fold(first, u64::max);
        Ok(true)
    }

    fn release_frame(&mut self) -> SkyResult<()> {
        let discarded = self.notifications.try_iter().count();
        if discarded > 0 {
            tracing::debug!("discarded {} notification(s) that arrived mid-read", discarded);
        }
        Ok(())
    }
}

impl Drop for MessageBusSubscriber {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// State owned by the subscriber's background thread.
struct SubscriberLink {
    publisher: SocketAddr,
    sender: Sender<u64>,
    /// Used to evict an unread generation so the queue holds the newest.
    stale: Receiver<u64>,
    running: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    coalesced: Arc<AtomicU64>,
    reconnect_interval: Duration,
}

impl SubscriberLink {
    fn run(self) {
        while self.running.load(Ordering::Acquire) {
            let stream = match TcpStream::connect_timeout(&self.publisher, CONNECT_TIMEOUT) {
                Ok(stream) => stream,
                Err(_) => {
                    thread::sleep(self.reconnect_interval);
                    continue;
                }
            };
            if let Err(e) = stream.set_read_timeout(Some(READ_POLL)) {
                tracing::warn!("cannot configure subscriber socket: {}", e);
                thread::sleep(self.reconnect_interval);
                continue;
            }

            self.connected.store(true, Ordering::Release);
            tracing::info!("subscribed to frame publisher {}", self.publisher);

            let keep_going = self.read_notifications(stream);

            self.connected.store(false, Ordering::Release);
            if !keep_going {
                return;
            }
            tracing::debug!("frame publisher {} went away, reconnecting", self.publisher);
            thread::sleep(self.reconnect_interval);
        }
    }

    /// Queues `generation`, replacing any generation not yet read.
    ///
    /// Returns false when the subscriber itself has gone away.
    fn push_latest(&self, mut generation: u64) -> bool {
        loop {
            match self.sender.try_send(generation) {
                Ok(()) => return true,
                Err(TrySendError::Full(g)) => {
                    if let Ok(older) = self.stale.try_recv() {
                        self.coalesced.fetch_add(1, Ordering::Relaxed);
                        generation = g.max(older);
                    } else {
                        generation = g;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    /// Returns false when the subscriber itself has gone away.
    fn read_notifications(&self, mut stream: TcpStream) -> bool {
        let mut buf = [0u8; NOTIFICATION_SIZE];
        let mut filled = 0;

        while self.running.load(Ordering::Acquire) {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => return true,
                Ok(n) => {
                    filled += n;
                    if filled < NOTIFICATION_SIZE {
                        continue;
                    }
                    filled = 0;
                    if !self.push_latest(u64::from_le_bytes(buf)) {
                        return false;
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    tracing::warn!("frame subscription to {} failed: {}", self.publisher, e);
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn pair() -> (MessageBusPublisher, MessageBusSubscriber) {
        let publisher = MessageBusPublisher::bind("127.0.0.1:0").unwrap();
        let subscriber =
            MessageBusSubscriber::connect(publisher.local_addr(), Duration::from_millis(10)).unwrap();
        wait_until(|| publisher.subscriber_count() == 1);
        (publisher, subscriber)
    }

    #[test]
    fn test_wait_times_out_without_notification() {
        let (_publisher, mut subscriber) = pair();
        let start = Instant::now();
        assert!(!subscriber.wait_for_frame(Some(Duration::from_millis(100))).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_notification_wakes_subscriber() {
        let (mut publisher, mut subscriber) = pair();
        publisher.frame_ready().unwrap();
        assert!(subscriber.wait_for_frame(Some(Duration::from_secs(5))).unwrap());
        assert_eq!(subscriber.latest_generation(), 1);
        assert_eq!(publisher.stats().delivered, 1);
    }

    #[test]
    fn test_burst_coalesces_into_one_wakeup() {
        let (mut publisher, mut subscriber) = pair();
        for _ in 0..5 {
            publisher.frame_ready().unwrap();
        }
        assert_eq!(publisher.generation(), 5);
        thread::sleep(Duration::from_millis(200));

        assert!(subscriber.wait_for_frame(Some(Duration::from_secs(5))).unwrap());
        subscriber.release_frame().unwrap();
        assert!(!subscriber.wait_for_frame(Some(Duration::from_millis(100))).unwrap());
        assert!(subscriber.coalesced() >= 1);
    }

    #[test]
    fn test_burst_keeps_newest_generation() {
        let (mut publisher, mut subscriber) = pair();
        for _ in 0..5 {
            publisher.frame_ready().unwrap();
        }
        thread::sleep(Duration::from_millis(300));

        assert!(subscriber.wait_for_frame(Some(Duration::from_secs(5))).unwrap());
        assert_eq!(subscriber.latest_generation(), 5);
    }

    #[test]
    fn test_subscriber_may_start_before_publisher() {
        // Reserve a free port, then release it for the publisher.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let mut subscriber =
            MessageBusSubscriber::connect(("127.0.0.1", port), Duration::from_millis(10)).unwrap();
        assert!(!subscriber.is_connected());

        let mut publisher = MessageBusPublisher::bind(("127.0.0.1", port)).unwrap();
        wait_until(|| publisher.subscriber_count() == 1);
        publisher.frame_ready().unwrap();
        assert!(subscriber.wait_for_frame(Some(Duration::from_secs(5))).unwrap());
    }

    #[test]
    fn test_dead_subscriber_is_dropped() {
        let (mut publisher, subscriber) = pair();
        drop(subscriber);
        // The first writes after a peer closes may still succeed.
        wait_until(|| {
            publisher.frame_ready().unwrap();
            publisher.subscriber_count() == 0
        });
        assert_eq!(publisher.stats().disconnected, 1);
    }
}

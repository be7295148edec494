//! # Transport Layer
//!
//! Thin UDP wrapper with packet statistics.
//!
//! ## Design
//!
//! - Blocking socket with an optional read timeout
//! - One receive buffer, reused for every datagram
//! - No reliability: a lost datagram stays lost

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use skyscreen_core::{SkyError, SkyResult};

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// UDP socket wrapper for frame streaming.
///
/// This is a thin wrapper around std UDP with:
/// - Read timeout control
/// - Packet statistics
pub struct UdpTransport {
    /// The underlying socket.
    socket: UdpSocket,
    /// Local address.
    local_addr: SocketAddr,
    /// Receive buffer.
    recv_buffer: Box<[u8]>,
    /// Statistics.
    stats: TransportStats,
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
}

impl UdpTransport {
    /// Creates a new transport bound to the specified address.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] if the socket cannot be bound.
    pub fn bind(addr: impl ToSocketAddrs) -> SkyResult<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| SkyError::transport("binding UDP socket", e))?;
        let local_addr =
            socket.local_addr().map_err(|e| SkyError::transport("reading local address", e))?;

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: vec![0u8; MAX_UDP_PAYLOAD].into_boxed_slice(),
            stats: TransportStats::default(),
        })
    }

    /// Binds an ephemeral port of the same family as `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] if the socket cannot be bound.
    pub fn bind_for(peer: SocketAddr) -> SkyResult<Self> {
        if peer.is_ipv4() {
            Self::bind(("0.0.0.0", 0))
        } else {
            Self::bind(("::", 0))
        }
    }

    /// Returns the local address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sets how long `recv` may block. `None` blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] for a zero duration or a socket failure.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> SkyResult<()> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|e| SkyError::transport("setting read timeout", e))
    }

    /// Sends a datagram to the specified address.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] if the send fails.
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> SkyResult<usize> {
        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(SkyError::transport("sending datagram", e))
            }
        }
    }

    /// Receives a datagram.
    ///
    /// Returns the datagram and source address, or `None` if the read
    /// timeout elapsed first.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] for any other socket failure.
    pub fn recv(&mut self) -> SkyResult<Option<(&[u8], SocketAddr)>> {
        match self.socket.recv_from(&mut self.recv_buffer) {
            Ok((len, addr)) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += len as u64;
                Ok(Some((&self.recv_buffer[..len], addr)))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => {
                self.stats.recv_errors += 1;
                Err(SkyError::transport("receiving datagram", e))
            }
        }
    }

    /// Returns statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TransportStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_counts_packets() {
        let mut receiver = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut sender = UdpTransport::bind_for(receiver.local_addr()).unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        sender.send_to(b"frame", receiver.local_addr()).unwrap();
        let (data, from) = receiver.recv().unwrap().unwrap();
        assert_eq!(data, b"frame");
        assert_eq!(from.port(), sender.local_addr().port());

        assert_eq!(sender.stats().packets_sent, 1);
        assert_eq!(sender.stats().bytes_sent, 5);
        assert_eq!(receiver.stats().bytes_received, 5);

        sender.reset_stats();
        assert_eq!(*sender.stats(), TransportStats::default());
    }

    #[test]
    fn test_recv_times_out() {
        let mut receiver = UdpTransport::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        assert!(receiver.recv().unwrap().is_none());
        assert_eq!(receiver.stats().recv_errors, 0);
    }
}

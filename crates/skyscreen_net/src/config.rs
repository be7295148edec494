//! Stream configuration and destination parsing.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyscreen_core::{Geometry, SkyError, SkyResult};

use crate::protocol::ChunkLayout;

/// Port used when a destination names only a host.
pub const DEFAULT_STREAM_PORT: u16 = 5555;

/// Datagram size that fits a typical MTU with room to spare.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1200;

/// UDP streaming settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Where the writer sends frames, `host` or `host:port`.
    pub target: String,
    /// Address the receiver binds.
    pub bind: String,
    /// Largest datagram the writer emits, header included.
    pub max_datagram_size: usize,
    /// How long a receiver blocks per datagram before re-checking.
    pub read_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            target: format!("localhost:{DEFAULT_STREAM_PORT}"),
            bind: format!("0.0.0.0:{DEFAULT_STREAM_PORT}"),
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            read_timeout_ms: 1000,
        }
    }
}

impl StreamConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] on malformed input.
    pub fn from_toml_str(text: &str) -> SkyResult<Self> {
        toml::from_str(text).map_err(|e| SkyError::InvalidConfig(e.to_string()))
    }

    /// Parsed destination.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidAddress`] for a malformed target.
    pub fn destination(&self) -> SkyResult<StreamTarget> {
        self.target.parse()
    }

    /// Chunk layout for frames of `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] if the datagram size is unusable.
    pub fn layout(&self, geometry: Geometry) -> SkyResult<ChunkLayout> {
        ChunkLayout::new(geometry.frame_byte_size(), self.max_datagram_size)
    }

    /// Read timeout as a duration.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// A `host[:port]` destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    /// Host name or address.
    pub host: String,
    /// UDP port.
    pub port: u16,
}

impl StreamTarget {
    /// Resolves to a socket address, IPv4 first.
    ///
    /// Receivers bind `0.0.0.0` by default, so a name that also maps to
    /// `::1` (as `localhost` usually does) must not pick the IPv6 entry.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidAddress`] if the host does not resolve.
    pub fn resolve(&self) -> SkyResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(prefer_ipv4)
            .ok_or_else(|| SkyError::InvalidAddress(self.to_string()))
    }
}

/// First IPv4 address, else the first address of any family.
fn prefer_ipv4(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let mut fallback = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        fallback = fallback.or(Some(addr));
    }
    fallback
}

impl FromStr for StreamTarget {
    type Err = SkyError;

    fn from_str(s: &str) -> SkyResult<Self> {
        let invalid = || SkyError::InvalidAddress(s.to_string());
        let mut parts = s.split(':');
        let host = parts.next().unwrap_or_default();
        let port = match parts.next() {
            None => DEFAULT_STREAM_PORT,
            Some(port) => port.parse().map_err(|_| invalid())?,
        };
        if host.is_empty() || parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_default_port() {
        let target: StreamTarget = "skyscreen.local".parse().unwrap();
        assert_eq!(target.host, "skyscreen.local");
        assert_eq!(target.port, DEFAULT_STREAM_PORT);

        let target: StreamTarget = "10.0.0.7:6000".parse().unwrap();
        assert_eq!(target.port, 6000);
        assert_eq!(target.to_string(), "10.0.0.7:6000");
    }

    #[test]
    fn test_target_rejects_malformed() {
        for bad in ["a:b:c", ":5555", "host:", "host:70000", "host:port"] {
            assert!(
                matches!(bad.parse::<StreamTarget>(), Err(SkyError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolves_localhost() {
        let addr = StreamTarget { host: "127.0.0.1".to_string(), port: 7000 }.resolve().unwrap();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn test_ipv4_preferred_over_ipv6() {
        let v6: SocketAddr = "[::1]:5555".parse().unwrap();
        let v4: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        assert_eq!(prefer_ipv4([v6, v4]), Some(v4));
        assert_eq!(prefer_ipv4([v6]), Some(v6));
        assert_eq!(prefer_ipv4(Vec::new()), None);
    }

    #[test]
    fn test_default_target_matches_default_bind_family() {
        let config = StreamConfig::default();
        let target = config.destination().unwrap().resolve().unwrap();
        let bind: SocketAddr = config.bind.parse().unwrap();
        assert_eq!(target.is_ipv4(), bind.is_ipv4());
        assert_eq!(target.port(), bind.port());
    }

    #[test]
    fn test_defaults_and_layout() {
        let config = StreamConfig::from_toml_str("max_datagram_size = 500").unwrap();
        assert_eq!(config.target, "localhost:5555");
        let layout = config.layout(Geometry::new(4, 4, 3).unwrap()).unwrap();
        assert_eq!(layout.stride(), 488);
        assert_eq!(layout.chunk_count(), 1);
    }
}
